use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::transitions::StatusTransitions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "mobile_money")]
    MobileMoney,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum MobileMoneyProvider {
    #[sea_orm(string_value = "mtn")]
    Mtn,
    #[sea_orm(string_value = "vodafone")]
    Vodafone,
    #[sea_orm(string_value = "airtel")]
    Airtel,
    #[sea_orm(string_value = "telecel")]
    Telecel,
}

impl MobileMoneyProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            MobileMoneyProvider::Mtn => "MTN",
            MobileMoneyProvider::Vodafone => "VODAFONE",
            MobileMoneyProvider::Airtel => "AIRTEL",
            MobileMoneyProvider::Telecel => "TELECEL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "successful")]
    Successful,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl StatusTransitions for PaymentStatus {
    fn allowed_transitions(&self) -> &'static [Self] {
        use PaymentStatus::*;
        match self {
            Pending => &[Processing, Successful, Failed, Cancelled],
            Processing => &[Successful, Failed, Cancelled],
            Successful => &[Refunded],
            Failed => &[Pending],
            Cancelled => &[],
            Refunded => &[],
        }
    }
}

/// Money moving for a booking or an order. The table enforces that exactly
/// one of `booking_id` / `order_id` is set.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub payer_id: i32,
    pub booking_id: Option<i32>,
    pub order_id: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub mobile_money_provider: Option<MobileMoneyProvider>,
    #[sea_orm(unique)]
    pub transaction_id: String,
    pub status: PaymentStatus,
    pub phone_number: Option<String>,
    pub reference_number: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub payment_notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::PayerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Payer,
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id",
        on_delete = "Cascade"
    )]
    Booking,
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl ActiveModelBehavior for ActiveModel {}

/// What a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Booking(i32),
    Order(i32),
}

impl PaymentTarget {
    /// Exactly one of the two ids must be present.
    pub fn from_ids(booking_id: Option<i32>, order_id: Option<i32>) -> Result<Self, &'static str> {
        match (booking_id, order_id) {
            (Some(booking_id), None) => Ok(PaymentTarget::Booking(booking_id)),
            (None, Some(order_id)) => Ok(PaymentTarget::Order(order_id)),
            (Some(_), Some(_)) => Err("A payment can settle either a booking or an order, not both."),
            (None, None) => Err("Either booking_id or order_id is required."),
        }
    }

    pub fn booking_id(&self) -> Option<i32> {
        match self {
            PaymentTarget::Booking(id) => Some(*id),
            PaymentTarget::Order(_) => None,
        }
    }

    pub fn order_id(&self) -> Option<i32> {
        match self {
            PaymentTarget::Order(id) => Some(*id),
            PaymentTarget::Booking(_) => None,
        }
    }
}

impl Model {
    pub fn target(&self) -> Option<PaymentTarget> {
        PaymentTarget::from_ids(self.booking_id, self.order_id).ok()
    }
}

/// Mobile money needs a wallet provider and a phone number to charge.
pub fn validate_method_details(
    method: PaymentMethod,
    provider: Option<MobileMoneyProvider>,
    phone_number: Option<&str>,
) -> Result<(), &'static str> {
    if method == PaymentMethod::MobileMoney {
        if provider.is_none() {
            return Err("Mobile money provider is required for mobile money payments.");
        }
        if phone_number.map(str::trim).unwrap_or_default().is_empty() {
            return Err("Phone number is required for mobile money payments.");
        }
    }
    Ok(())
}

fn hex_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_uppercase()
}

/// `TXN_` followed by 16 uppercase hex characters.
pub fn generate_transaction_id() -> String {
    format!("TXN_{}", hex_suffix())
}

/// `MOMO_` followed by 16 uppercase hex characters.
pub fn generate_momo_transaction_id() -> String {
    format!("MOMO_{}", hex_suffix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payments_need_exactly_one_target() {
        assert_eq!(PaymentTarget::from_ids(Some(3), None), Ok(PaymentTarget::Booking(3)));
        assert_eq!(PaymentTarget::from_ids(None, Some(9)), Ok(PaymentTarget::Order(9)));
        assert!(PaymentTarget::from_ids(Some(3), Some(9)).is_err());
        assert!(PaymentTarget::from_ids(None, None).is_err());
    }

    #[test]
    fn mobile_money_requires_provider_and_phone() {
        assert!(validate_method_details(PaymentMethod::Card, None, None).is_ok());
        assert!(validate_method_details(PaymentMethod::MobileMoney, None, Some("0241234567")).is_err());
        assert!(validate_method_details(PaymentMethod::MobileMoney, Some(MobileMoneyProvider::Mtn), Some("  ")).is_err());
        assert!(
            validate_method_details(PaymentMethod::MobileMoney, Some(MobileMoneyProvider::Mtn), Some("0241234567"))
                .is_ok()
        );
    }

    #[test]
    fn transaction_ids_have_fixed_shape() {
        let id = generate_transaction_id();
        assert!(id.starts_with("TXN_"));
        assert_eq!(id.len(), 20);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(id, generate_transaction_id());
        assert!(generate_momo_transaction_id().starts_with("MOMO_"));
    }

    #[test]
    fn successful_payments_can_only_be_refunded() {
        use PaymentStatus::*;
        assert_eq!(Successful.allowed_transitions(), &[Refunded]);
        assert!(Processing.can_transition_to(Failed));
        assert!(!Refunded.can_transition_to(Successful));
    }
}
