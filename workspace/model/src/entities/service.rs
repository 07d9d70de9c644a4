use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::transitions::StatusTransitions;

/// Catalogue section a service (or a vendor application) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ServiceCategory {
    #[sea_orm(string_value = "food")]
    Food,
    #[sea_orm(string_value = "beauty")]
    Beauty,
    #[sea_orm(string_value = "printing")]
    Printing,
    #[sea_orm(string_value = "laundry")]
    Laundry,
    #[sea_orm(string_value = "academic")]
    Academic,
    #[sea_orm(string_value = "transport")]
    Transport,
    #[sea_orm(string_value = "health")]
    Health,
    #[sea_orm(string_value = "entertainment")]
    Entertainment,
    #[sea_orm(string_value = "gym")]
    Gym,
    #[sea_orm(string_value = "other")]
    Other,
}

impl ServiceCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceCategory::Food => "Food & Beverages",
            ServiceCategory::Beauty => "Beauty & Grooming",
            ServiceCategory::Printing => "Printing & Copying",
            ServiceCategory::Laundry => "Laundry Services",
            ServiceCategory::Academic => "Academic Services",
            ServiceCategory::Transport => "Transportation",
            ServiceCategory::Health => "Health & Wellness",
            ServiceCategory::Entertainment => "Entertainment",
            ServiceCategory::Gym => "Gym & Fitness",
            ServiceCategory::Other => "Other Services",
        }
    }
}

/// How students interact with a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ServiceType {
    #[sea_orm(string_value = "booking")]
    Booking,
    #[sea_orm(string_value = "ordering")]
    Ordering,
    #[sea_orm(string_value = "contact")]
    Contact,
    #[sea_orm(string_value = "walk_in")]
    WalkIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum AvailabilityStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "busy")]
    Busy,
    #[sea_orm(string_value = "unavailable")]
    Unavailable,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl AvailabilityStatus {
    /// Whether a service in this state still accepts students.
    pub fn accepts_customers(&self) -> bool {
        matches!(self, AvailabilityStatus::Available | AvailabilityStatus::Busy)
    }
}

impl StatusTransitions for AvailabilityStatus {
    fn allowed_transitions(&self) -> &'static [Self] {
        use AvailabilityStatus::*;
        match self {
            Available => &[Busy, Unavailable, Closed],
            Busy => &[Available, Unavailable, Closed],
            Unavailable => &[Available, Busy],
            Closed => &[Available, Busy],
        }
    }
}

/// An offering listed by a vendor.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub vendor_id: i32,
    pub service_name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category: ServiceCategory,
    pub service_type: ServiceType,
    /// Flat price in GHS; `None` for services priced per item.
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub base_price: Option<Decimal>,
    pub has_flexible_pricing: bool,
    pub is_available: bool,
    pub availability_status: AvailabilityStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub contact_info: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    /// Average review rating, two decimal places.
    #[sea_orm(column_type = "Decimal(Some((3, 2)))", nullable)]
    pub rating: Option<Decimal>,
    pub total_ratings: i32,
    pub supports_booking: bool,
    pub supports_ordering: bool,
    pub supports_walk_in: bool,
    pub requires_contact: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::VendorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Vendor,
    #[sea_orm(has_many = "super::service_item::Entity")]
    ServiceItem,
    #[sea_orm(has_many = "super::booking::Entity")]
    Booking,
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
    #[sea_orm(has_many = "super::review::Entity")]
    Review,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl Related<super::service_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceItem.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Support flags implied by a service type, in the order
/// (booking, ordering, walk_in, contact).
pub fn support_flags(service_type: ServiceType) -> (bool, bool, bool, bool) {
    (
        service_type == ServiceType::Booking,
        service_type == ServiceType::Ordering,
        service_type == ServiceType::WalkIn,
        service_type == ServiceType::Contact,
    )
}

impl ActiveModel {
    /// Recomputes the support flags from `service_type`. Call before every save
    /// that may have touched the type.
    pub fn apply_support_flags(&mut self, service_type: ServiceType) {
        let (booking, ordering, walk_in, contact) = support_flags(service_type);
        self.supports_booking = Set(booking);
        self.supports_ordering = Set(ordering);
        self.supports_walk_in = Set(walk_in);
        self.requires_contact = Set(contact);
    }
}

impl Model {
    pub fn can_book(&self) -> bool {
        self.supports_booking && self.is_available
    }

    pub fn can_order(&self) -> bool {
        self.supports_ordering && self.is_available
    }

    pub fn can_walk_in(&self) -> bool {
        self.supports_walk_in && self.is_available
    }

    pub fn needs_contact(&self) -> bool {
        self.requires_contact
    }

    pub fn supported_service_types(&self) -> Vec<&'static str> {
        let mut supported = Vec::new();
        if self.supports_booking {
            supported.push("booking");
        }
        if self.supports_ordering {
            supported.push("ordering");
        }
        if self.supports_walk_in {
            supported.push("walk_in");
        }
        if self.requires_contact {
            supported.push("contact");
        }
        supported
    }

    /// Cheapest and dearest price a student can pay. Item prices win over the
    /// base price when pricing is flexible and there is at least one item.
    pub fn price_range(&self, item_prices: &[Decimal]) -> (Decimal, Decimal) {
        if self.has_flexible_pricing {
            let min = item_prices.iter().min();
            let max = item_prices.iter().max();
            if let (Some(min), Some(max)) = (min, max) {
                return (*min, *max);
            }
        }
        let flat = self.base_price.unwrap_or(Decimal::ZERO);
        (flat, flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn sample(service_type: ServiceType) -> Model {
        let (booking, ordering, walk_in, contact) = support_flags(service_type);
        Model {
            id: 1,
            vendor_id: 1,
            service_name: "Campus Cuts".to_string(),
            description: "Fades and trims".to_string(),
            category: ServiceCategory::Beauty,
            service_type,
            base_price: Some(Decimal::new(2500, 2)),
            has_flexible_pricing: false,
            is_available: true,
            availability_status: AvailabilityStatus::Available,
            contact_info: None,
            location: None,
            image_url: None,
            rating: None,
            total_ratings: 0,
            supports_booking: booking,
            supports_ordering: ordering,
            supports_walk_in: walk_in,
            requires_contact: contact,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn booking_services_can_only_be_booked_while_available() {
        let mut service = sample(ServiceType::Booking);
        assert!(service.can_book());
        assert!(!service.can_order());
        assert_eq!(service.supported_service_types(), vec!["booking"]);

        service.is_available = false;
        assert!(!service.can_book());
    }

    #[test]
    fn flexible_pricing_uses_item_prices() {
        let mut service = sample(ServiceType::Ordering);
        let items = [Decimal::new(500, 2), Decimal::new(1200, 2)];
        assert_eq!(service.price_range(&items), (Decimal::new(2500, 2), Decimal::new(2500, 2)));

        service.has_flexible_pricing = true;
        assert_eq!(service.price_range(&items), (Decimal::new(500, 2), Decimal::new(1200, 2)));
        assert_eq!(service.price_range(&[]), (Decimal::new(2500, 2), Decimal::new(2500, 2)));
    }

    #[test]
    fn availability_transitions_follow_the_table() {
        use AvailabilityStatus::*;
        assert!(Available.can_transition_to(Closed));
        assert!(!Unavailable.can_transition_to(Closed));
        let err = Closed.transition_to(Unavailable).unwrap_err();
        assert_eq!(err.to_string(), "Cannot change status from 'closed' to 'unavailable'.");
    }
}
