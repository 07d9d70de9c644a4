use common::StatusCounts;
use model::entities::{booking, order, service};
use sea_orm::{ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Counters shown on a vendor's dashboard and pushed as `vendor_stats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VendorDashboard {
    pub vendor_id: i32,
    pub total_services: u64,
    pub active_services: u64,
    pub bookings: StatusCounts,
    pub orders: StatusCounts,
    pub unread_notifications: u64,
}

pub async fn vendor_dashboard(db: &DatabaseConnection, vendor_id: i32) -> Result<VendorDashboard, AppError> {
    let services = service::Entity::find()
        .filter(service::Column::VendorId.eq(vendor_id))
        .all(db)
        .await?;
    let service_ids: Vec<i32> = services.iter().map(|s| s.id).collect();
    let active_services = services.iter().filter(|s| s.is_available).count() as u64;

    let booking_statuses: Vec<booking::BookingStatus> = booking::Entity::find()
        .select_only()
        .column(booking::Column::BookingStatus)
        .filter(booking::Column::ServiceId.is_in(service_ids.clone()))
        .into_tuple()
        .all(db)
        .await?;
    let order_statuses: Vec<order::OrderStatus> = order::Entity::find()
        .select_only()
        .column(order::Column::OrderStatus)
        .filter(order::Column::ServiceId.is_in(service_ids))
        .into_tuple()
        .all(db)
        .await?;

    Ok(VendorDashboard {
        vendor_id,
        total_services: services.len() as u64,
        active_services,
        bookings: StatusCounts::from_statuses(booking_statuses.iter().map(ActiveEnum::to_value)),
        orders: StatusCounts::from_statuses(order_statuses.iter().map(ActiveEnum::to_value)),
        unread_notifications: compute::notifier::unread_count(db, vendor_id).await?,
    })
}
