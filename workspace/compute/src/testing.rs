//! Fixtures shared by the compute tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};

use common::RealtimeEvent;
use model::entities::order::OrderStatus;
use model::entities::service::{AvailabilityStatus, ServiceCategory, ServiceType};
use model::entities::user::UserType;
use model::entities::{order, review, service, user};

use crate::notifier::NotificationSink;

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None).await.expect("Migrations failed.");
    db
}

pub async fn create_user(db: &DatabaseConnection, username: &str, user_type: UserType) -> user::Model {
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
    .expect("Failed to create user")
}

pub async fn create_service(
    db: &DatabaseConnection,
    vendor_id: i32,
    name: &str,
    category: ServiceCategory,
    service_type: ServiceType,
    location: Option<&str>,
) -> service::Model {
    let mut active = service::ActiveModel {
        vendor_id: Set(vendor_id),
        service_name: Set(name.to_string()),
        description: Set(format!("{name} on campus")),
        category: Set(category),
        service_type: Set(service_type),
        base_price: Set(Some(Decimal::new(1500, 2))),
        has_flexible_pricing: Set(false),
        is_available: Set(true),
        availability_status: Set(AvailabilityStatus::Available),
        contact_info: Set(None),
        location: Set(location.map(str::to_string)),
        image_url: Set(None),
        rating: Set(None),
        total_ratings: Set(0),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    active.apply_support_flags(service_type);
    active.insert(db).await.expect("Failed to create service")
}

pub async fn create_order(
    db: &DatabaseConnection,
    service_id: i32,
    customer_id: i32,
    total: Decimal,
    status: OrderStatus,
    at: DateTime<Utc>,
) -> order::Model {
    order::ActiveModel {
        service_id: Set(service_id),
        customer_id: Set(customer_id),
        special_instructions: Set(None),
        delivery_address: Set(None),
        order_status: Set(status),
        total_amount: Set(total),
        created_at: Set(at),
        updated_at: Set(at),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create order")
}

pub async fn create_review(db: &DatabaseConnection, service_id: i32, user_id: i32, rating: i32) -> review::Model {
    review::ActiveModel {
        service_id: Set(service_id),
        user_id: Set(user_id),
        rating: Set(rating),
        comment: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create review")
}

/// Remembers every event it is asked to publish.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, RealtimeEvent)>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<(String, RealtimeEvent)> {
        self.events.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, group: &str, event: RealtimeEvent) {
        self.events
            .lock()
            .expect("sink lock poisoned")
            .push((group.to_string(), event));
    }
}
