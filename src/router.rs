use crate::handlers::{
    analytics::{admin_dashboard, service_analytics, vendor_analytics},
    assistant::{
        analyze_sentiment, assistant_analytics, chat, clear_conversation, conversation_messages,
        generate_recommendations, list_conversations, list_recommendations, recommendation_clicked,
        recommendation_viewed,
    },
    auth::{login, logout, refresh_token, register},
    bookings::{
        cancel_booking, complete_booking, confirm_booking, create_booking, get_booking, list_bookings,
        upcoming_bookings,
    },
    complaints::{create_complaint, get_complaint, list_complaints, update_complaint},
    health::health_check,
    notifications::{
        admin_create_notification, bulk_action, cleanup_notifications, create_from_template, create_template,
        delete_notification, get_preferences, list_notifications, list_templates, mark_all_read, mark_read,
        mark_unread, notification_analytics, notification_stats, unread_count, update_preferences,
    },
    orders::{cancel_order, confirm_order, create_order, get_order, list_orders, update_order_status},
    payments::{create_payment, get_payment, initiate_momo, list_payments, process_payment, verify_momo},
    reviews::{create_review, delete_review, list_service_reviews, my_reviews, update_review},
    services::{
        add_service_item, create_service, delete_service, delete_service_item, get_service, list_categories,
        list_service_items, list_services, my_services, popular_services, top_rated_services, update_availability,
        update_service, update_service_item,
    },
    sockets::{notifications_socket, vendor_notifications_socket},
    users::{delete_account, get_profile, get_user, get_users, update_profile},
    vendor_applications::{
        approve_application, list_applications, my_application, reject_application, submit_application,
    },
    vendor_profiles::{
        get_vendor_profile, list_vendor_profiles, my_vendor_profile, update_my_vendor_profile,
        vendor_dashboard_stats, verified_vendors,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let timeout = state.settings.request_timeout();

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Authentication
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh_token))
        .route("/api/v1/auth/logout", post(logout))
        // Users
        .route("/api/v1/users", get(get_users))
        .route("/api/v1/users/profile", get(get_profile).put(update_profile).delete(delete_account))
        .route("/api/v1/users/:user_id", get(get_user))
        // Vendor onboarding
        .route("/api/v1/vendor-applications", post(submit_application).get(list_applications))
        .route("/api/v1/vendor-applications/my", get(my_application))
        .route("/api/v1/vendor-applications/:application_id/approve", post(approve_application))
        .route("/api/v1/vendor-applications/:application_id/reject", post(reject_application))
        .route("/api/v1/vendors", get(list_vendor_profiles))
        .route("/api/v1/vendors/verified", get(verified_vendors))
        .route("/api/v1/vendors/me", get(my_vendor_profile).put(update_my_vendor_profile))
        .route("/api/v1/vendors/dashboard", get(vendor_dashboard_stats))
        .route("/api/v1/vendors/:profile_id", get(get_vendor_profile))
        // Services and catalogue items
        .route("/api/v1/services", get(list_services).post(create_service))
        .route("/api/v1/services/mine", get(my_services))
        .route("/api/v1/services/categories", get(list_categories))
        .route("/api/v1/services/top-rated", get(top_rated_services))
        .route("/api/v1/services/popular", get(popular_services))
        .route(
            "/api/v1/services/:service_id",
            get(get_service).put(update_service).delete(delete_service),
        )
        .route("/api/v1/services/:service_id/availability", post(update_availability))
        .route("/api/v1/services/:service_id/items", get(list_service_items).post(add_service_item))
        .route(
            "/api/v1/services/:service_id/items/:item_id",
            put(update_service_item).delete(delete_service_item),
        )
        // Reviews
        .route("/api/v1/services/:service_id/reviews", get(list_service_reviews).post(create_review))
        .route("/api/v1/reviews/my", get(my_reviews))
        .route("/api/v1/reviews/:review_id", put(update_review).delete(delete_review))
        // Bookings
        .route("/api/v1/bookings", get(list_bookings).post(create_booking))
        .route("/api/v1/bookings/upcoming", get(upcoming_bookings))
        .route("/api/v1/bookings/:booking_id", get(get_booking))
        .route("/api/v1/bookings/:booking_id/confirm", post(confirm_booking))
        .route("/api/v1/bookings/:booking_id/cancel", post(cancel_booking))
        .route("/api/v1/bookings/:booking_id/complete", post(complete_booking))
        // Orders
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/orders/:order_id", get(get_order))
        .route("/api/v1/orders/:order_id/confirm", post(confirm_order))
        .route("/api/v1/orders/:order_id/status", post(update_order_status))
        .route("/api/v1/orders/:order_id/cancel", post(cancel_order))
        // Payments
        .route("/api/v1/payments", get(list_payments).post(create_payment))
        .route("/api/v1/payments/momo/initiate", post(initiate_momo))
        .route("/api/v1/payments/momo/verify/:reference", get(verify_momo))
        .route("/api/v1/payments/:payment_id", get(get_payment))
        .route("/api/v1/payments/:payment_id/process", post(process_payment))
        // Notifications
        .route("/api/v1/notifications", get(list_notifications))
        .route("/api/v1/notifications/stats", get(notification_stats))
        .route("/api/v1/notifications/unread-count", get(unread_count))
        .route("/api/v1/notifications/preferences", get(get_preferences).put(update_preferences))
        .route("/api/v1/notifications/mark-all-read", post(mark_all_read))
        .route("/api/v1/notifications/bulk-action", post(bulk_action))
        .route("/api/v1/notifications/admin/create", post(admin_create_notification))
        .route("/api/v1/notifications/admin/from-template", post(create_from_template))
        .route("/api/v1/notifications/templates", get(list_templates).post(create_template))
        .route("/api/v1/notifications/analytics", get(notification_analytics))
        .route("/api/v1/notifications/cleanup", post(cleanup_notifications))
        .route("/api/v1/notifications/:notification_id", axum::routing::delete(delete_notification))
        .route("/api/v1/notifications/:notification_id/read", post(mark_read))
        .route("/api/v1/notifications/:notification_id/unread", post(mark_unread))
        // Complaints
        .route("/api/v1/complaints", get(list_complaints).post(create_complaint))
        .route("/api/v1/complaints/:complaint_id", get(get_complaint).put(update_complaint))
        // Analytics
        .route("/api/v1/analytics/dashboard", get(admin_dashboard))
        .route("/api/v1/analytics/vendors/:vendor_id", get(vendor_analytics))
        .route("/api/v1/analytics/services/:service_id", get(service_analytics))
        // Assistant
        .route("/api/v1/assistant/chat", post(chat))
        .route("/api/v1/assistant/conversations", get(list_conversations))
        .route("/api/v1/assistant/conversations/:session_id/messages", get(conversation_messages))
        .route("/api/v1/assistant/conversations/:session_id/clear", post(clear_conversation))
        .route("/api/v1/assistant/recommendations", get(list_recommendations))
        .route("/api/v1/assistant/recommendations/generate", post(generate_recommendations))
        .route("/api/v1/assistant/recommendations/:recommendation_id/viewed", post(recommendation_viewed))
        .route("/api/v1/assistant/recommendations/:recommendation_id/clicked", post(recommendation_clicked))
        .route("/api/v1/assistant/sentiment", post(analyze_sentiment))
        .route("/api/v1/assistant/analytics", get(assistant_analytics))
        // Realtime
        .route("/ws/notifications/", get(notifications_socket))
        .route("/ws/vendor-notifications/", get(vendor_notifications_socket))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
