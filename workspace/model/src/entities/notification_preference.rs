use chrono::NaiveTime;
use sea_orm::entity::prelude::*;

use super::notification::PreferenceCategory;
use super::notification_delivery_log::DeliveryChannel;

pub const DEFAULT_MAX_PER_HOUR: i32 = 10;
pub const DEFAULT_MAX_PER_DAY: i32 = 50;

/// Per-user delivery switches. Rows are created lazily with the defaults.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_preferences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_id: i32,
    pub email_enabled: bool,
    pub email_order_updates: bool,
    pub email_booking_updates: bool,
    pub email_payment_updates: bool,
    pub email_recommendations: bool,
    pub email_announcements: bool,
    pub push_enabled: bool,
    pub push_order_updates: bool,
    pub push_booking_updates: bool,
    pub push_payment_updates: bool,
    pub push_recommendations: bool,
    pub push_announcements: bool,
    pub sms_enabled: bool,
    pub sms_order_updates: bool,
    pub sms_booking_updates: bool,
    pub sms_payment_updates: bool,
    pub quiet_hours_enabled: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    pub max_notifications_per_hour: i32,
    pub max_notifications_per_day: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// Row with every default switch: e-mail and push on, SMS and quiet hours off.
    pub fn defaults_for(user_id: i32, now: DateTimeUtc) -> Self {
        use sea_orm::Set;
        ActiveModel {
            user_id: Set(user_id),
            email_enabled: Set(true),
            email_order_updates: Set(true),
            email_booking_updates: Set(true),
            email_payment_updates: Set(true),
            email_recommendations: Set(true),
            email_announcements: Set(true),
            push_enabled: Set(true),
            push_order_updates: Set(true),
            push_booking_updates: Set(true),
            push_payment_updates: Set(true),
            push_recommendations: Set(true),
            push_announcements: Set(true),
            sms_enabled: Set(false),
            sms_order_updates: Set(false),
            sms_booking_updates: Set(false),
            sms_payment_updates: Set(false),
            quiet_hours_enabled: Set(false),
            quiet_hours_start: Set(None),
            quiet_hours_end: Set(None),
            max_notifications_per_hour: Set(DEFAULT_MAX_PER_HOUR),
            max_notifications_per_day: Set(DEFAULT_MAX_PER_DAY),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    }
}

/// `start <= end` is the closed range `[start, end]`; otherwise the window
/// wraps midnight.
pub fn within_quiet_window(start: NaiveTime, end: NaiveTime, at: NaiveTime) -> bool {
    if start <= end {
        start <= at && at <= end
    } else {
        at >= start || at <= end
    }
}

impl Model {
    pub fn in_quiet_hours(&self, at: NaiveTime) -> bool {
        match (self.quiet_hours_enabled, self.quiet_hours_start, self.quiet_hours_end) {
            (true, Some(start), Some(end)) => within_quiet_window(start, end, at),
            _ => false,
        }
    }

    /// Master switch for the channel combined with the category switch.
    /// `in_app` is always on; `Other` follows the master switch alone.
    pub fn channel_enabled(&self, channel: DeliveryChannel, category: PreferenceCategory) -> bool {
        use PreferenceCategory::*;
        match channel {
            DeliveryChannel::InApp => true,
            DeliveryChannel::Email => {
                self.email_enabled
                    && match category {
                        Orders => self.email_order_updates,
                        Bookings => self.email_booking_updates,
                        Payments => self.email_payment_updates,
                        Recommendations => self.email_recommendations,
                        Announcements => self.email_announcements,
                        Other => true,
                    }
            }
            DeliveryChannel::Push => {
                self.push_enabled
                    && match category {
                        Orders => self.push_order_updates,
                        Bookings => self.push_booking_updates,
                        Payments => self.push_payment_updates,
                        Recommendations => self.push_recommendations,
                        Announcements => self.push_announcements,
                        Other => true,
                    }
            }
            DeliveryChannel::Sms => {
                self.sms_enabled
                    && match category {
                        Orders => self.sms_order_updates,
                        Bookings => self.sms_booking_updates,
                        Payments => self.sms_payment_updates,
                        Recommendations | Announcements => false,
                        Other => true,
                    }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn defaults() -> Model {
        Model {
            id: 1,
            user_id: 1,
            email_enabled: true,
            email_order_updates: true,
            email_booking_updates: true,
            email_payment_updates: true,
            email_recommendations: true,
            email_announcements: true,
            push_enabled: true,
            push_order_updates: true,
            push_booking_updates: true,
            push_payment_updates: true,
            push_recommendations: true,
            push_announcements: true,
            sms_enabled: false,
            sms_order_updates: false,
            sms_booking_updates: false,
            sms_payment_updates: false,
            quiet_hours_enabled: false,
            quiet_hours_start: None,
            quiet_hours_end: None,
            max_notifications_per_hour: DEFAULT_MAX_PER_HOUR,
            max_notifications_per_day: DEFAULT_MAX_PER_DAY,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn daytime_window_is_inclusive() {
        assert!(within_quiet_window(t(13, 0), t(15, 0), t(13, 0)));
        assert!(within_quiet_window(t(13, 0), t(15, 0), t(15, 0)));
        assert!(!within_quiet_window(t(13, 0), t(15, 0), t(16, 0)));
    }

    #[test]
    fn window_wrapping_midnight() {
        assert!(within_quiet_window(t(22, 0), t(7, 0), t(23, 30)));
        assert!(within_quiet_window(t(22, 0), t(7, 0), t(3, 0)));
        assert!(!within_quiet_window(t(22, 0), t(7, 0), t(12, 0)));
    }

    #[test]
    fn quiet_hours_need_both_bounds_and_the_switch() {
        let mut prefs = defaults();
        prefs.quiet_hours_start = Some(t(22, 0));
        prefs.quiet_hours_end = Some(t(7, 0));
        assert!(!prefs.in_quiet_hours(t(23, 0)));
        prefs.quiet_hours_enabled = true;
        assert!(prefs.in_quiet_hours(t(23, 0)));
        prefs.quiet_hours_end = None;
        assert!(!prefs.in_quiet_hours(t(23, 0)));
    }

    #[test]
    fn channel_switches_combine_master_and_category() {
        let mut prefs = defaults();
        assert!(prefs.channel_enabled(DeliveryChannel::Email, PreferenceCategory::Orders));
        assert!(!prefs.channel_enabled(DeliveryChannel::Sms, PreferenceCategory::Orders));
        prefs.push_booking_updates = false;
        assert!(!prefs.channel_enabled(DeliveryChannel::Push, PreferenceCategory::Bookings));
        assert!(prefs.channel_enabled(DeliveryChannel::Push, PreferenceCategory::Payments));
        prefs.email_enabled = false;
        assert!(!prefs.channel_enabled(DeliveryChannel::Email, PreferenceCategory::Other));
        assert!(prefs.channel_enabled(DeliveryChannel::InApp, PreferenceCategory::Other));
    }
}
