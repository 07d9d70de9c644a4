#[cfg(test)]
mod integration_tests {
    use crate::schemas::ApiResponse;
    use crate::test_utils::test_utils::{
        create_service, place_order, register_user, setup_test_app, setup_test_server, setup_test_server_with_state,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use model::entities::payment::{self, PaymentStatus};
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let server = setup_test_server().await;
        let student = register_user(&server, "ama", "student").await;
        assert!(student.id > 0);

        let response = server.get("/api/v1/users/profile").add_header(student.auth().0, student.auth().1).await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["username"], "ama");
        assert_eq!(body.data["user_type"], "student");
    }

    #[tokio::test]
    async fn test_register_rejects_mismatched_passwords() {
        let server = setup_test_server().await;
        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "username": "kofi",
                "email": "kofi@campus.test",
                "password": "password123",
                "password_confirm": "password124",
                "user_type": "student",
                "phone_number": "0241234567",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert!(body["errors"]["password_confirm"].is_array());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username() {
        let server = setup_test_server().await;
        register_user(&server, "esi", "student").await;

        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "username": "esi",
                "email": "other@campus.test",
                "password": "password123",
                "password_confirm": "password123",
                "user_type": "student",
                "phone_number": "0209999999",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_protected_endpoint_requires_token() {
        let server = setup_test_server().await;

        let response = server.get("/api/v1/users/profile").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_refresh_token_cannot_be_reused() {
        let server = setup_test_server().await;
        let student = register_user(&server, "yaw", "student").await;

        let first = server.post("/api/v1/auth/refresh").json(&json!({ "refresh": student.refresh })).await;
        first.assert_status(StatusCode::OK);
        let rotated: ApiResponse<Value> = first.json();
        assert_ne!(rotated.data["refresh"].as_str().unwrap(), student.refresh);

        let replay = server.post("/api/v1/auth/refresh").json(&json!({ "refresh": student.refresh })).await;
        replay.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let server = setup_test_server().await;
        let student = register_user(&server, "abena", "student").await;
        let (name, value) = student.auth();

        let response = server
            .post("/api/v1/auth/logout")
            .add_header(name, value)
            .json(&json!({ "refresh": student.refresh }))
            .await;
        response.assert_status(StatusCode::OK);

        let replay = server.post("/api/v1/auth/refresh").json(&json!({ "refresh": student.refresh })).await;
        replay.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_students_cannot_create_services() {
        let server = setup_test_server().await;
        let student = register_user(&server, "kwame", "student").await;
        let (name, value) = student.auth();

        let response = server
            .post("/api/v1/services")
            .add_header(name, value)
            .json(&json!({
                "service_name": "Notes",
                "description": "Lecture notes",
                "category": "academic",
                "contact_info": "0244000000",
            }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["message"], "Permission denied");
        assert!(body["errors"]["detail"].is_string());
    }

    #[tokio::test]
    async fn test_contact_service_requires_contact_info() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "print_shop", "vendor").await;
        let (name, value) = vendor.auth();

        let response = server
            .post("/api/v1/services")
            .add_header(name, value)
            .json(&json!({
                "service_name": "Printing",
                "description": "A4 colour printing",
                "category": "printing",
                "service_type": "contact",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["errors"]["contact_info"].is_array());
    }

    #[tokio::test]
    async fn test_service_listing_and_detail() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "jollof_hub", "vendor").await;
        let service_id = create_service(&server, &vendor, "Jollof Rice", "ordering").await;

        let response = server.get("/api/v1/services").add_query_param("search", "jollof").await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0]["can_order"], true);
        assert_eq!(body.data[0]["can_book"], false);

        let detail = server.get(&format!("/api/v1/services/{service_id}")).await;
        detail.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = detail.json();
        assert_eq!(body.data["service_name"], "Jollof Rice");
        assert_eq!(body.data["category_display"], "Food & Beverages");
    }

    #[tokio::test]
    async fn test_service_categories_are_listed() {
        let server = setup_test_server().await;

        let response = server.get("/api/v1/services/categories").await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Vec<Value>> = response.json();
        assert!(body.data.iter().any(|category| category["value"] == "laundry"));
    }

    #[tokio::test]
    async fn test_booking_slot_cannot_be_double_booked() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "barber", "vendor").await;
        let first = register_user(&server, "student_one", "student").await;
        let second = register_user(&server, "student_two", "student").await;
        let service_id = create_service(&server, &vendor, "Haircut", "booking").await;
        let slot = (Utc::now() + Duration::days(2)).to_rfc3339();

        let (name, value) = first.auth();
        let created = server
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "service_id": service_id, "booking_date": slot }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = created.json();
        assert_eq!(body.data["booking_status"], "pending");

        let (name, value) = second.auth();
        let clash = server
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "service_id": service_id, "booking_date": slot }))
            .await;
        clash.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = clash.json();
        assert_eq!(body["message"], "This time slot is already booked.");
    }

    #[tokio::test]
    async fn test_booking_in_the_past_is_rejected() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "tutor", "vendor").await;
        let student = register_user(&server, "late_student", "student").await;
        let service_id = create_service(&server, &vendor, "Maths Tutoring", "booking").await;
        let (name, value) = student.auth();

        let response = server
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({
                "service_id": service_id,
                "booking_date": (Utc::now() - Duration::hours(1)).to_rfc3339(),
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_booking_lifecycle_notifies_vendor() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "salon", "vendor").await;
        let student = register_user(&server, "client", "student").await;
        let service_id = create_service(&server, &vendor, "Braiding", "booking").await;

        let (name, value) = student.auth();
        let created = server
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({
                "service_id": service_id,
                "booking_date": (Utc::now() + Duration::days(1)).to_rfc3339(),
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let booking: ApiResponse<Value> = created.json();
        let booking_id = booking.data["id"].as_i64().unwrap();

        let (name, value) = vendor.auth();
        let unread = server.get("/api/v1/notifications/unread-count").add_header(name, value).await;
        unread.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = unread.json();
        assert!(body.data["unread_count"].as_u64().unwrap() >= 1);

        // Students cannot confirm their own bookings
        let (name, value) = student.auth();
        server
            .post(&format!("/api/v1/bookings/{booking_id}/confirm"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = vendor.auth();
        let confirmed = server.post(&format!("/api/v1/bookings/{booking_id}/confirm")).add_header(name, value).await;
        confirmed.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = confirmed.json();
        assert_eq!(body.data["booking_status"], "confirmed");

        let (name, value) = vendor.auth();
        let completed = server.post(&format!("/api/v1/bookings/{booking_id}/complete")).add_header(name, value).await;
        completed.assert_status(StatusCode::OK);

        // Completed bookings cannot be cancelled
        let (name, value) = student.auth();
        server
            .post(&format!("/api/v1/bookings/{booking_id}/cancel"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_review_is_unique_and_updates_rating() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "laundry", "vendor").await;
        let student = register_user(&server, "reviewer", "student").await;
        let service_id = create_service(&server, &vendor, "Wash and Fold", "contact").await;
        let (name, value) = student.auth();

        let created = server
            .post(&format!("/api/v1/services/{service_id}/reviews"))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "rating": 4, "comment": "Quick and tidy" }))
            .await;
        created.assert_status(StatusCode::CREATED);

        let duplicate = server
            .post(&format!("/api/v1/services/{service_id}/reviews"))
            .add_header(name, value)
            .json(&json!({ "rating": 2 }))
            .await;
        duplicate.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = duplicate.json();
        assert_eq!(body["message"], "You have already reviewed this service.");

        let detail = server.get(&format!("/api/v1/services/{service_id}")).await;
        let body: ApiResponse<Value> = detail.json();
        assert_eq!(body.data["total_ratings"], 1);
        assert!(!body.data["rating"].is_null());
    }

    #[tokio::test]
    async fn test_order_pay_and_confirm() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "canteen", "vendor").await;
        let student = register_user(&server, "hungry", "student").await;
        let service_id = create_service(&server, &vendor, "Waakye", "ordering").await;
        let (name, value) = student.auth();

        let created = server
            .post("/api/v1/orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "service_id": service_id, "quantity": 2, "delivery_address": "Hall 3" }))
            .await;
        if created.status_code() != StatusCode::CREATED {
            panic!("Expected 201 Created, got {}: {}", created.status_code(), created.text());
        }
        let order: ApiResponse<Value> = created.json();
        let order_id = order.data["id"].as_i64().unwrap();
        assert_eq!(order.data["order_status"], "pending");
        assert_eq!(order.data["total_amount"], "50.00");

        let payment = server
            .post("/api/v1/payments")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "order_id": order_id, "payment_method": "cash" }))
            .await;
        payment.assert_status(StatusCode::CREATED);
        let payment: ApiResponse<Value> = payment.json();
        let payment_id = payment.data["id"].as_i64().unwrap();
        assert_eq!(payment.data["status"], "pending");
        assert_eq!(payment.data["currency"], "GHS");

        let processed = server
            .post(&format!("/api/v1/payments/{payment_id}/process"))
            .add_header(name.clone(), value.clone())
            .await;
        processed.assert_status(StatusCode::OK);

        let detail = server.get(&format!("/api/v1/orders/{order_id}")).add_header(name.clone(), value.clone()).await;
        let body: ApiResponse<Value> = detail.json();
        assert_eq!(body.data["order_status"], "confirmed");

        // A paid order cannot be paid again
        let again = server
            .post("/api/v1/payments")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "order_id": order_id, "payment_method": "cash" }))
            .await;
        again.assert_status(StatusCode::BAD_REQUEST);

        // Customers may only cancel pending orders
        let cancel = server.post(&format!("/api/v1/orders/{order_id}/cancel")).add_header(name, value).await;
        cancel.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = cancel.json();
        assert_eq!(body["message"], "Only pending orders can be cancelled.");
    }

    #[tokio::test]
    async fn test_payment_needs_exactly_one_target() {
        let server = setup_test_server().await;
        let student = register_user(&server, "payer", "student").await;
        let (name, value) = student.auth();

        let response = server
            .post("/api/v1/payments")
            .add_header(name, value)
            .json(&json!({ "payment_method": "cash" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_complaint_reaches_admins() {
        let server = setup_test_server().await;
        let admin = register_user(&server, "dean", "admin").await;
        let student = register_user(&server, "unhappy", "student").await;
        let (name, value) = student.auth();

        let created = server
            .post("/api/v1/complaints")
            .add_header(name, value)
            .json(&json!({
                "complaint_type": "platform",
                "priority": "urgent",
                "subject": "App keeps logging me out",
                "description": "Every few minutes I have to log in again.",
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let complaint: ApiResponse<Value> = created.json();
        assert_eq!(complaint.data["is_urgent"], true);
        let complaint_id = complaint.data["id"].as_i64().unwrap();

        let (name, value) = admin.auth();
        let inbox = server.get("/api/v1/notifications").add_header(name.clone(), value.clone()).await;
        inbox.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = inbox.json();
        assert_eq!(body.data["notifications"][0]["notification_type"], "complaint_received");

        let resolved = server
            .put(&format!("/api/v1/complaints/{complaint_id}"))
            .add_header(name, value)
            .json(&json!({ "status": "resolved", "admin_response": "Fixed in the latest release." }))
            .await;
        resolved.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = resolved.json();
        assert_eq!(body.data["is_resolved"], true);
        assert!(!body.data["resolved_at"].is_null());
    }

    #[tokio::test]
    async fn test_mark_all_notifications_read() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "printer", "vendor").await;
        let student = register_user(&server, "booker", "student").await;
        let service_id = create_service(&server, &vendor, "Binding", "booking").await;

        let (name, value) = student.auth();
        server
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({
                "service_id": service_id,
                "booking_date": (Utc::now() + Duration::days(3)).to_rfc3339(),
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let (name, value) = vendor.auth();
        let marked = server.post("/api/v1/notifications/mark-all-read").add_header(name.clone(), value.clone()).await;
        marked.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = marked.json();
        assert!(body.data["affected"].as_u64().unwrap() >= 1);

        let unread = server.get("/api/v1/notifications/unread-count").add_header(name, value).await;
        let body: ApiResponse<Value> = unread.json();
        assert_eq!(body.data["unread_count"], 0);
    }

    #[tokio::test]
    async fn test_admin_dashboard_is_admin_only() {
        let server = setup_test_server().await;
        let admin = register_user(&server, "registrar", "admin").await;
        let student = register_user(&server, "curious", "student").await;

        let (name, value) = student.auth();
        server
            .get("/api/v1/analytics/dashboard")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = admin.auth();
        let response = server.get("/api/v1/analytics/dashboard").add_header(name, value).await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["users"]["total"], 2);
        assert_eq!(body.data["users"]["admins"], 1);
    }

    #[tokio::test]
    async fn test_vendor_analytics_for_current_vendor() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "analyst_vendor", "vendor").await;
        create_service(&server, &vendor, "Smoothies", "ordering").await;
        let (name, value) = vendor.auth();

        let response = server
            .get("/api/v1/analytics/vendors/current")
            .add_query_param("time_range", "7d")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::OK);

        let invalid = server
            .get("/api/v1/analytics/vendors/current")
            .add_query_param("time_range", "2w")
            .add_header(name, value)
            .await;
        invalid.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_assistant_chat_keeps_session() {
        let server = setup_test_server().await;
        let student = register_user(&server, "chatty", "student").await;
        let (name, value) = student.auth();

        let first = server
            .post("/api/v1/assistant/chat")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "message": "Hello there" }))
            .await;
        first.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = first.json();
        let session_id = body.data["session_id"].as_str().unwrap().to_string();
        assert_eq!(body.data["intent"], "general");

        let second = server
            .post("/api/v1/assistant/chat")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "message": "I need food delivered", "session_id": session_id }))
            .await;
        second.assert_status(StatusCode::OK);

        let messages = server
            .get(&format!("/api/v1/assistant/conversations/{session_id}/messages"))
            .add_header(name, value)
            .await;
        messages.assert_status(StatusCode::OK);
        let body: ApiResponse<Vec<Value>> = messages.json();
        // One user and one assistant message per turn
        assert_eq!(body.data.len(), 4);
    }

    #[tokio::test]
    async fn test_vendor_application_approval_promotes_user() {
        let server = setup_test_server().await;
        let admin = register_user(&server, "approver", "admin").await;
        let applicant = register_user(&server, "aspiring", "student").await;
        let (name, value) = applicant.auth();

        let submitted = server
            .post("/api/v1/vendor-applications")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "business_name": "Campus Cuts",
                "business_description": "Affordable haircuts near the library",
                "category": "beauty",
                "address": "Library Road",
                "phone": "0241112223",
                "email": "cuts@campus.test",
            }))
            .await;
        if submitted.status_code() != StatusCode::CREATED {
            panic!("Expected 201 Created, got {}: {}", submitted.status_code(), submitted.text());
        }
        let body: ApiResponse<Value> = submitted.json();
        let application_id = body.data["id"].as_i64().unwrap();

        let (admin_name, admin_value) = admin.auth();
        server
            .post(&format!("/api/v1/vendor-applications/{application_id}/approve"))
            .add_header(admin_name, admin_value)
            .await
            .assert_status(StatusCode::OK);

        let profile = server.get("/api/v1/users/profile").add_header(name, value).await;
        let body: ApiResponse<Value> = profile.json();
        assert_eq!(body.data["user_type"], "vendor");
    }

    #[tokio::test]
    async fn test_order_lines_are_priced_from_the_catalogue() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "grill", "vendor").await;
        let student = register_user(&server, "bargain", "student").await;
        let service_id = create_service(&server, &vendor, "Kebab Stand", "ordering").await;

        let (vendor_header, vendor_value) = vendor.auth();
        let item = server
            .post(&format!("/api/v1/services/{service_id}/items"))
            .add_header(vendor_header, vendor_value)
            .json(&json!({ "name": "Beef Kebab", "price": "30.00" }))
            .await;
        item.assert_status(StatusCode::CREATED);
        let item: ApiResponse<Value> = item.json();
        let item_id = item.data["id"].as_i64().unwrap();

        let (name, value) = student.auth();
        let created = server
            .post("/api/v1/orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "service_id": service_id,
                "items": [{ "service_item_id": item_id, "quantity": 2, "unit_price": "0.01" }],
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let order: ApiResponse<Value> = created.json();
        assert_eq!(order.data["total_amount"], "60.00");
        assert_eq!(order.data["items"][0]["unit_price"], "30.00");
        assert_eq!(order.data["items"][0]["total_price"], "60.00");

        let oversized = server
            .post("/api/v1/orders")
            .add_header(name, value)
            .json(&json!({
                "service_id": service_id,
                "items": [{ "service_item_id": item_id, "quantity": 1001 }],
            }))
            .await;
        oversized.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_order_status_cannot_skip_steps() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "rider", "vendor").await;
        let student = register_user(&server, "impatient", "student").await;
        let service_id = create_service(&server, &vendor, "Fried Rice", "ordering").await;
        let order_id = place_order(&server, &student, service_id, 1).await;
        let (name, value) = vendor.auth();

        let response = server
            .post(&format!("/api/v1/orders/{order_id}/status"))
            .add_header(name, value)
            .json(&json!({ "status": "delivering" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["message"], "Cannot change status from 'pending' to 'delivering'.");
    }

    #[tokio::test]
    async fn test_momo_payment_settles_once() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "momo_shop", "vendor").await;
        let student = register_user(&server, "momo_user", "student").await;
        let service_id = create_service(&server, &vendor, "Banku", "ordering").await;
        let order_id = place_order(&server, &student, service_id, 1).await;
        let (name, value) = student.auth();

        let initiated = server
            .post("/api/v1/payments/momo/initiate")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "amount": "25.00", "phone_number": "0241234567", "order_id": order_id }))
            .await;
        initiated.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = initiated.json();
        assert_eq!(body.data["status"], "PENDING");
        assert_eq!(body.data["amount"], "25.00");
        assert!(body.data["transaction_id"].as_str().unwrap().starts_with("MOMO_"));
        let payment_id = body.data["payment_id"].as_i64().unwrap();
        let reference = body.data["reference"].as_str().unwrap().to_string();

        let stored = server.get(&format!("/api/v1/payments/{payment_id}")).add_header(name.clone(), value.clone()).await;
        let stored: ApiResponse<Value> = stored.json();
        assert_eq!(stored.data["status"], "processing");
        assert_eq!(stored.data["payment_method"], "mobile_money");

        let first = server
            .get(&format!("/api/v1/payments/momo/verify/{reference}"))
            .add_header(name.clone(), value.clone())
            .await;
        first.assert_status(StatusCode::OK);
        let first: ApiResponse<Value> = first.json();
        let outcome = first.data["status"].as_str().unwrap().to_string();
        assert!(outcome == "successful" || outcome == "failed", "unexpected outcome {outcome}");

        for _ in 0..3 {
            let again = server
                .get(&format!("/api/v1/payments/momo/verify/{reference}"))
                .add_header(name.clone(), value.clone())
                .await;
            let again: ApiResponse<Value> = again.json();
            assert_eq!(again.data["status"], outcome.as_str());
        }
    }

    #[tokio::test]
    async fn test_closed_payments_cannot_be_processed() {
        let (server, state) = setup_test_server_with_state().await;
        let vendor = register_user(&server, "closed_shop", "vendor").await;
        let student = register_user(&server, "closed_payer", "student").await;
        let service_id = create_service(&server, &vendor, "Kelewele", "ordering").await;
        let order_id = place_order(&server, &student, service_id, 1).await;
        let (name, value) = student.auth();

        let created = server
            .post("/api/v1/payments")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "order_id": order_id, "payment_method": "cash" }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let created: ApiResponse<Value> = created.json();
        let payment_id = created.data["id"].as_i64().unwrap() as i32;

        for (status, label) in [(PaymentStatus::Cancelled, "cancelled"), (PaymentStatus::Failed, "failed")] {
            let stored = payment::Entity::find_by_id(payment_id).one(&state.db).await.unwrap().unwrap();
            let mut active: payment::ActiveModel = stored.into();
            active.status = Set(status);
            active.update(&state.db).await.unwrap();

            let response = server
                .post(&format!("/api/v1/payments/{payment_id}/process"))
                .add_header(name.clone(), value.clone())
                .await;

            response.assert_status(StatusCode::BAD_REQUEST);
            let body: Value = response.json();
            assert_eq!(body["message"], format!("Cannot change status from '{label}' to 'successful'."));
        }

        let order = server.get(&format!("/api/v1/orders/{order_id}")).add_header(name, value).await;
        let order: ApiResponse<Value> = order.json();
        assert_eq!(order.data["order_status"], "pending");
    }

    #[tokio::test]
    async fn test_popular_services_rank_by_order_count() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "food_court", "vendor").await;
        let student = register_user(&server, "regular", "student").await;
        let quiet = create_service(&server, &vendor, "Salad Bar", "ordering").await;
        let busy = create_service(&server, &vendor, "Shawarma", "ordering").await;
        place_order(&server, &student, busy, 1).await;
        place_order(&server, &student, busy, 2).await;
        place_order(&server, &student, quiet, 1).await;

        let response = server.get("/api/v1/services/popular").add_query_param("limit", 1).await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0]["id"], busy);
        assert_eq!(body.data[0]["base_price"], "25.00");
    }

    #[tokio::test]
    async fn test_unavailable_services_refuse_new_work() {
        let server = setup_test_server().await;
        let vendor = register_user(&server, "closed_for_now", "vendor").await;
        let student = register_user(&server, "early_bird", "student").await;
        let barber = create_service(&server, &vendor, "Trim", "booking").await;
        let kitchen = create_service(&server, &vendor, "Porridge", "ordering").await;
        let (vendor_header, vendor_value) = vendor.auth();
        for service_id in [barber, kitchen] {
            server
                .post(&format!("/api/v1/services/{service_id}/availability"))
                .add_header(vendor_header.clone(), vendor_value.clone())
                .json(&json!({ "availability_status": "unavailable" }))
                .await
                .assert_status(StatusCode::OK);
        }
        let (name, value) = student.auth();

        let booking = server
            .post("/api/v1/bookings")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "service_id": barber, "booking_date": (Utc::now() + Duration::days(1)).to_rfc3339() }))
            .await;
        booking.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = booking.json();
        assert_eq!(body["message"], "This service is currently unavailable.");

        let order = server
            .post("/api/v1/orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "service_id": kitchen, "quantity": 1 }))
            .await;
        order.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = order.json();
        assert_eq!(body["message"], "This service is currently unavailable.");

        let wrong_kind = server
            .post("/api/v1/orders")
            .add_header(name, value)
            .json(&json!({ "service_id": barber, "quantity": 1 }))
            .await;
        wrong_kind.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = wrong_kind.json();
        assert_eq!(body["message"], "This service does not accept orders.");
    }
}
