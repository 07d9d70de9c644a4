//! SeaORM entities for the campus marketplace. Each module holds one table
//! plus the domain rules that only depend on that row.

pub mod ai_chatbot_log;
pub mod ai_conversation;
pub mod ai_message;
pub mod ai_sentiment_analysis;
pub mod ai_service_recommendation;
pub mod blacklisted_token;
pub mod booking;
pub mod complaint;
pub mod notification;
pub mod notification_delivery_log;
pub mod notification_preference;
pub mod notification_template;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod review;
pub mod service;
pub mod service_item;
pub mod user;
pub mod vendor_application;
pub mod vendor_profile;

pub mod prelude {
    pub use super::ai_chatbot_log::Entity as AiChatbotLog;
    pub use super::ai_conversation::Entity as AiConversation;
    pub use super::ai_message::Entity as AiMessage;
    pub use super::ai_sentiment_analysis::Entity as AiSentimentAnalysis;
    pub use super::ai_service_recommendation::Entity as AiServiceRecommendation;
    pub use super::blacklisted_token::Entity as BlacklistedToken;
    pub use super::booking::Entity as Booking;
    pub use super::complaint::Entity as Complaint;
    pub use super::notification::Entity as Notification;
    pub use super::notification_delivery_log::Entity as NotificationDeliveryLog;
    pub use super::notification_preference::Entity as NotificationPreference;
    pub use super::notification_template::Entity as NotificationTemplate;
    pub use super::order::Entity as Order;
    pub use super::order_item::Entity as OrderItem;
    pub use super::payment::Entity as Payment;
    pub use super::review::Entity as Review;
    pub use super::service::Entity as Service;
    pub use super::service_item::Entity as ServiceItem;
    pub use super::user::Entity as User;
    pub use super::vendor_application::Entity as VendorApplication;
    pub use super::vendor_profile::Entity as VendorProfile;
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait,
        ModelTrait, QueryFilter, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;
        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    async fn create_user(db: &DatabaseConnection, username: &str, user_type: user::UserType) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@campus.test")),
            phone_number: Set(None),
            first_name: Set(None),
            last_name: Set(None),
            profile_picture: Set(None),
            user_type: Set(user_type),
            password_hash: Set("not-a-real-hash".to_string()),
            is_active: Set(true),
            date_joined: Set(Utc::now()),
            last_login: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    async fn create_service(db: &DatabaseConnection, vendor_id: i32) -> Result<service::Model, DbErr> {
        let mut active = service::ActiveModel {
            vendor_id: Set(vendor_id),
            service_name: Set("Campus Cuts".to_string()),
            description: Set("Fades and trims near Hostel B".to_string()),
            category: Set(service::ServiceCategory::Beauty),
            service_type: Set(service::ServiceType::Booking),
            base_price: Set(Some(Decimal::new(2500, 2))),
            has_flexible_pricing: Set(false),
            is_available: Set(true),
            availability_status: Set(service::AvailabilityStatus::Available),
            contact_info: Set(None),
            location: Set(None),
            image_url: Set(None),
            rating: Set(None),
            total_ratings: Set(0),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        active.apply_support_flags(service::ServiceType::Booking);
        active.insert(db).await
    }

    fn booking_at(service_id: i32, student_id: i32, at: chrono::DateTime<Utc>) -> booking::ActiveModel {
        booking::ActiveModel {
            service_id: Set(service_id),
            student_id: Set(student_id),
            booking_date: Set(at),
            booking_status: Set(booking::BookingStatus::Pending),
            notes: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
    }

    fn payment_for(payer_id: i32, booking_id: Option<i32>, order_id: Option<i32>) -> payment::ActiveModel {
        payment::ActiveModel {
            payer_id: Set(payer_id),
            booking_id: Set(booking_id),
            order_id: Set(order_id),
            amount: Set(Decimal::new(2500, 2)),
            currency: Set("GHS".to_string()),
            payment_method: Set(payment::PaymentMethod::Cash),
            mobile_money_provider: Set(None),
            transaction_id: Set(payment::generate_transaction_id()),
            status: Set(payment::PaymentStatus::Pending),
            phone_number: Set(None),
            reference_number: Set(None),
            payment_notes: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let vendor = create_user(&db, "kofi", user::UserType::Vendor).await?;
        let student = create_user(&db, "ama", user::UserType::Student).await?;
        let other_student = create_user(&db, "yaw", user::UserType::Student).await?;
        let service = create_service(&db, vendor.id).await?;
        assert!(service.supports_booking);
        assert!(!service.supports_ordering);

        let slot = Utc::now() + Duration::days(2);
        let booking = booking_at(service.id, student.id, slot).insert(&db).await?;

        // Same service and instant is rejected by the unique index.
        let clash = booking_at(service.id, other_student.id, slot).insert(&db).await;
        assert!(clash.is_err());

        review::ActiveModel {
            service_id: Set(service.id),
            user_id: Set(student.id),
            rating: Set(5),
            comment: Set(Some("Sharp fade".to_string())),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        let second_review = review::ActiveModel {
            service_id: Set(service.id),
            user_id: Set(student.id),
            rating: Set(1),
            comment: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await;
        assert!(second_review.is_err());

        // Exactly one payment target.
        payment_for(student.id, Some(booking.id), None).insert(&db).await?;
        assert!(payment_for(student.id, None, None).insert(&db).await.is_err());

        let reviews = service.find_related(Review).all(&db).await?;
        assert_eq!(reviews.len(), 1);

        let vendor_services = Service::find()
            .filter(service::Column::VendorId.eq(vendor.id))
            .all(&db)
            .await?;
        assert_eq!(vendor_services.len(), 1);

        let bookings = Booking::find()
            .filter(booking::Column::ServiceId.eq(service.id))
            .all(&db)
            .await?;
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].student_id, student.id);

        Ok(())
    }

    #[tokio::test]
    async fn deleting_a_notification_removes_its_delivery_logs() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let student = create_user(&db, "esi", user::UserType::Student).await?;

        let note = notification::ActiveModel {
            user_id: Set(student.id),
            title: Set("Hello".to_string()),
            message: Set("Welcome to the market".to_string()),
            notification_type: Set(notification::NotificationType::General),
            priority: Set(notification::Priority::Medium),
            related_object_type: Set(None),
            related_object_id: Set(None),
            related_service_id: Set(None),
            related_booking_id: Set(None),
            related_order_id: Set(None),
            is_read: Set(false),
            is_sent: Set(false),
            is_delivered: Set(false),
            send_email: Set(false),
            send_push: Set(true),
            send_sms: Set(false),
            metadata: Set(serde_json::json!({})),
            action_url: Set(None),
            action_text: Set(None),
            created_at: Set(Utc::now()),
            read_at: Set(None),
            sent_at: Set(None),
            delivered_at: Set(None),
            expires_at: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        notification_delivery_log::ActiveModel {
            notification_id: Set(note.id),
            channel: Set(notification_delivery_log::DeliveryChannel::InApp),
            status: Set(notification_delivery_log::DeliveryStatus::Delivered),
            provider: Set(None),
            error_message: Set(None),
            attempted_at: Set(Utc::now()),
            delivered_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let read = note.clone().mark_as_read(Utc::now()).update(&db).await?;
        assert!(read.is_read);
        assert!(read.read_at.is_some());

        Notification::delete_by_id(note.id).exec(&db).await?;
        assert!(NotificationDeliveryLog::find().all(&db).await?.is_empty());
        Ok(())
    }
}
