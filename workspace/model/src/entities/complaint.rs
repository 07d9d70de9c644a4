use sea_orm::entity::prelude::*;

use super::notification::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ComplaintType {
    #[sea_orm(string_value = "service")]
    Service,
    #[sea_orm(string_value = "order")]
    Order,
    #[sea_orm(string_value = "booking")]
    Booking,
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "vendor")]
    Vendor,
    #[sea_orm(string_value = "platform")]
    Platform,
    #[sea_orm(string_value = "other")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ComplaintStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "complaints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub complainant_id: i32,
    pub complaint_type: ComplaintType,
    pub related_service_id: Option<i32>,
    pub related_order_id: Option<i32>,
    pub related_booking_id: Option<i32>,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub status: ComplaintStatus,
    pub priority: Priority,
    #[sea_orm(column_type = "Text", nullable)]
    pub admin_response: Option<String>,
    pub resolved_at: Option<DateTimeUtc>,
    pub assigned_admin_id: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ComplainantId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Complainant,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedAdminId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    AssignedAdmin,
    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::RelatedServiceId",
        to = "super::service::Column::Id",
        on_delete = "SetNull"
    )]
    Service,
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::RelatedOrderId",
        to = "super::order::Column::Id",
        on_delete = "SetNull"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::RelatedBookingId",
        to = "super::booking::Column::Id",
        on_delete = "SetNull"
    )]
    Booking,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, ComplaintStatus::Resolved | ComplaintStatus::Closed)
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }
}

/// Service, order and booking complaints must point at the thing they are about.
/// Returns the offending field and message.
pub fn missing_related_entity(
    complaint_type: ComplaintType,
    service_id: Option<i32>,
    order_id: Option<i32>,
    booking_id: Option<i32>,
) -> Option<(&'static str, &'static str)> {
    match complaint_type {
        ComplaintType::Service if service_id.is_none() => {
            Some(("related_service", "Service complaints must reference a service."))
        }
        ComplaintType::Order if order_id.is_none() => {
            Some(("related_order", "Order complaints must reference an order."))
        }
        ComplaintType::Booking if booking_id.is_none() => {
            Some(("related_booking", "Booking complaints must reference a booking."))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_complaints_need_their_subject() {
        assert!(missing_related_entity(ComplaintType::Service, None, None, None).is_some());
        assert!(missing_related_entity(ComplaintType::Service, Some(1), None, None).is_none());
        assert_eq!(
            missing_related_entity(ComplaintType::Booking, Some(1), Some(2), None).map(|(field, _)| field),
            Some("related_booking")
        );
        assert!(missing_related_entity(ComplaintType::Platform, None, None, None).is_none());
    }
}
