use chrono::Duration;
use sea_orm::entity::prelude::*;
use sea_orm::Set;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
pub enum NotificationType {
    #[sea_orm(string_value = "order_update")]
    OrderUpdate,
    #[sea_orm(string_value = "booking_update")]
    BookingUpdate,
    #[sea_orm(string_value = "payment_update")]
    PaymentUpdate,
    #[sea_orm(string_value = "service_recommendation")]
    ServiceRecommendation,
    #[sea_orm(string_value = "system_announcement")]
    SystemAnnouncement,
    #[sea_orm(string_value = "vendor_application")]
    VendorApplication,
    #[sea_orm(string_value = "admin_alert")]
    AdminAlert,
    #[sea_orm(string_value = "general")]
    General,
    #[sea_orm(string_value = "booking_created")]
    BookingCreated,
    #[sea_orm(string_value = "booking_cancelled")]
    BookingCancelled,
    #[sea_orm(string_value = "booking_confirmed")]
    BookingConfirmed,
    #[sea_orm(string_value = "booking_completed")]
    BookingCompleted,
    #[sea_orm(string_value = "order_created")]
    OrderCreated,
    #[sea_orm(string_value = "order_cancelled")]
    OrderCancelled,
    #[sea_orm(string_value = "order_confirmed")]
    OrderConfirmed,
    #[sea_orm(string_value = "payment_received")]
    PaymentReceived,
    #[sea_orm(string_value = "review_received")]
    ReviewReceived,
    #[sea_orm(string_value = "complaint_received")]
    ComplaintReceived,
}

/// Preference bucket a notification type is filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceCategory {
    Orders,
    Bookings,
    Payments,
    Recommendations,
    Announcements,
    Other,
}

impl NotificationType {
    pub fn preference_category(&self) -> PreferenceCategory {
        use NotificationType::*;
        match self {
            OrderUpdate | OrderCreated | OrderCancelled | OrderConfirmed => PreferenceCategory::Orders,
            BookingUpdate | BookingCreated | BookingCancelled | BookingConfirmed | BookingCompleted => {
                PreferenceCategory::Bookings
            }
            PaymentUpdate | PaymentReceived => PreferenceCategory::Payments,
            ServiceRecommendation => PreferenceCategory::Recommendations,
            SystemAnnouncement => PreferenceCategory::Announcements,
            VendorApplication | AdminAlert | General | ReviewReceived | ComplaintReceived => {
                PreferenceCategory::Other
            }
        }
    }
}

/// Urgency shared by notifications and complaints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum Priority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

/// A message addressed to one user. Written first, then delivered through the
/// channels the user's preferences allow.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub related_object_type: Option<String>,
    pub related_object_id: Option<i32>,
    pub related_service_id: Option<i32>,
    pub related_booking_id: Option<i32>,
    pub related_order_id: Option<i32>,
    pub is_read: bool,
    pub is_sent: bool,
    pub is_delivered: bool,
    pub send_email: bool,
    pub send_push: bool,
    pub send_sms: bool,
    pub metadata: Json,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub created_at: DateTimeUtc,
    pub read_at: Option<DateTimeUtc>,
    pub sent_at: Option<DateTimeUtc>,
    pub delivered_at: Option<DateTimeUtc>,
    pub expires_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::notification_delivery_log::Entity")]
    DeliveryLog,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::notification_delivery_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_expired(&self, now: DateTimeUtc) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }

    /// Active model with the read flag set. Already-read rows keep their `read_at`.
    pub fn mark_as_read(self, now: DateTimeUtc) -> ActiveModel {
        let already_read = self.is_read;
        let mut active: ActiveModel = self.into();
        if !already_read {
            active.is_read = Set(true);
            active.read_at = Set(Some(now));
        }
        active
    }

    pub fn mark_as_unread(self) -> ActiveModel {
        let mut active: ActiveModel = self.into();
        active.is_read = Set(false);
        active.read_at = Set(None);
        active
    }

    pub fn mark_as_sent(self, now: DateTimeUtc) -> ActiveModel {
        let mut active: ActiveModel = self.into();
        active.is_sent = Set(true);
        active.sent_at = Set(Some(now));
        active
    }

    pub fn mark_as_delivered(self, now: DateTimeUtc) -> ActiveModel {
        let mut active: ActiveModel = self.into();
        active.is_delivered = Set(true);
        active.delivered_at = Set(Some(now));
        active
    }
}

/// Expiry timestamp `hours` after `now`; non-positive values mean no expiry.
pub fn expiry_after(now: DateTimeUtc, hours: i64) -> Option<DateTimeUtc> {
    (hours > 0).then(|| now + Duration::hours(hours))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn types_map_to_preference_buckets() {
        assert_eq!(NotificationType::BookingCreated.preference_category(), PreferenceCategory::Bookings);
        assert_eq!(NotificationType::OrderUpdate.preference_category(), PreferenceCategory::Orders);
        assert_eq!(NotificationType::PaymentReceived.preference_category(), PreferenceCategory::Payments);
        assert_eq!(
            NotificationType::SystemAnnouncement.preference_category(),
            PreferenceCategory::Announcements
        );
        assert_eq!(NotificationType::General.preference_category(), PreferenceCategory::Other);
    }

    #[test]
    fn expiry_is_optional() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(expiry_after(now, 24), Some(Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap()));
        assert_eq!(expiry_after(now, 0), None);
    }

    #[test]
    fn urgent_sorts_highest() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low < Priority::Medium);
    }
}
