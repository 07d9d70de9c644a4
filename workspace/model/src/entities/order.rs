use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use crate::transitions::StatusTransitions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "preparing")]
    Preparing,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "delivering")]
    Delivering,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl StatusTransitions for OrderStatus {
    fn allowed_transitions(&self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Preparing, Cancelled],
            Preparing => &[Ready, Cancelled],
            Ready => &[Delivering, Completed, Cancelled],
            Delivering => &[Completed, Cancelled],
            Completed => &[],
            Cancelled => &[],
        }
    }
}

/// A student's purchase from an ordering-type service.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub service_id: i32,
    pub customer_id: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub special_instructions: Option<String>,
    pub delivery_address: Option<String>,
    pub order_status: OrderStatus,
    /// Sum of the order's item totals.
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_amount: Decimal,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::ServiceId",
        to = "super::service::Column::Id",
        on_delete = "Cascade"
    )]
    Service,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CustomerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    #[test]
    fn kitchen_flow_is_linear_until_ready() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(!Pending.can_transition_to(Preparing));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Ready.can_transition_to(Completed));
        assert!(Ready.can_transition_to(Delivering));
        assert!(!Delivering.can_transition_to(Ready));
        assert!(Completed.is_terminal());
    }

    #[test]
    fn every_open_order_can_be_cancelled() {
        for status in [Pending, Confirmed, Preparing, Ready, Delivering] {
            assert!(status.can_transition_to(Cancelled), "{:?}", status);
        }
    }
}
