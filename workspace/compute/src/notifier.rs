//! Notification dispatch.
//!
//! Every notification is written first, then filtered through the recipient's
//! preferences (quiet hours, rate limits, channel switches), delivered through
//! the stub providers and finally pushed to any live WebSocket subscribers via
//! a [`NotificationSink`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use common::{NotificationPayload, RealtimeEvent};
use model::entities::notification::{self, NotificationType, Priority};
use model::entities::notification_delivery_log::{self, DeliveryChannel, DeliveryStatus};
use model::entities::{notification_preference, notification_template, user};

use crate::error::{ComputeError, Result};

/// Group every vendor connection joins.
pub const VENDOR_BROADCAST_GROUP: &str = "vendor_notifications";

pub fn user_group(user_id: i32) -> String {
    format!("user_{user_id}")
}

pub fn vendor_group(vendor_id: i32) -> String {
    format!("vendor_{vendor_id}")
}

/// Destination for realtime events. Publishing never fails; a group with no
/// listeners simply drops the event.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, group: &str, event: RealtimeEvent);
}

/// Sink for contexts without live connections (CLI, tests).
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn publish(&self, group: &str, _event: RealtimeEvent) {
        debug!(group, "dropping realtime event, no sink attached");
    }
}

/// A notification about to be sent.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub related_object_type: Option<String>,
    pub related_object_id: Option<i32>,
    pub related_service_id: Option<i32>,
    pub related_booking_id: Option<i32>,
    pub related_order_id: Option<i32>,
    pub send_email: bool,
    pub send_push: bool,
    pub send_sms: bool,
    pub metadata: Value,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewNotification {
    /// Medium priority, push only, no expiry.
    pub fn new(
        user_id: i32,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            notification_type,
            priority: Priority::Medium,
            related_object_type: None,
            related_object_id: None,
            related_service_id: None,
            related_booking_id: None,
            related_order_id: None,
            send_email: false,
            send_push: true,
            send_sms: false,
            metadata: json!({}),
            action_url: None,
            action_text: None,
            expires_at: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn channels(mut self, email: bool, push: bool, sms: bool) -> Self {
        self.send_email = email;
        self.send_push = push;
        self.send_sms = sms;
        self
    }

    pub fn related_object(mut self, object_type: impl Into<String>, object_id: i32) -> Self {
        self.related_object_type = Some(object_type.into());
        self.related_object_id = Some(object_id);
        self
    }

    pub fn related_service(mut self, service_id: i32) -> Self {
        self.related_service_id = Some(service_id);
        self
    }

    pub fn related_booking(mut self, booking_id: i32) -> Self {
        self.related_booking_id = Some(booking_id);
        self.related_object("booking", booking_id)
    }

    pub fn related_order(mut self, order_id: i32) -> Self {
        self.related_order_id = Some(order_id);
        self.related_object("order", order_id)
    }

    pub fn action(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self.action_text = Some(text.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    fn into_active_model(self, now: DateTime<Utc>) -> notification::ActiveModel {
        notification::ActiveModel {
            user_id: Set(self.user_id),
            title: Set(self.title),
            message: Set(self.message),
            notification_type: Set(self.notification_type),
            priority: Set(self.priority),
            related_object_type: Set(self.related_object_type),
            related_object_id: Set(self.related_object_id),
            related_service_id: Set(self.related_service_id),
            related_booking_id: Set(self.related_booking_id),
            related_order_id: Set(self.related_order_id),
            is_read: Set(false),
            is_sent: Set(false),
            is_delivered: Set(false),
            send_email: Set(self.send_email),
            send_push: Set(self.send_push),
            send_sms: Set(self.send_sms),
            metadata: Set(self.metadata),
            action_url: Set(self.action_url),
            action_text: Set(self.action_text),
            created_at: Set(now),
            read_at: Set(None),
            sent_at: Set(None),
            delivered_at: Set(None),
            expires_at: Set(self.expires_at),
            ..Default::default()
        }
    }
}

/// Stores and delivers a notification at the current time.
pub async fn send_notification(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    new: NewNotification,
) -> Result<notification::Model> {
    send_notification_at(db, sink, new, Utc::now()).await
}

/// Stores and delivers a notification as of `now`. The stored row is returned
/// even when quiet hours or rate limits hold back delivery; `is_sent` tells
/// the two apart.
#[instrument(skip(db, sink, new), fields(user_id = new.user_id, notification_type = ?new.notification_type))]
pub async fn send_notification_at(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    new: NewNotification,
    now: DateTime<Utc>,
) -> Result<notification::Model> {
    let recipient = user::Entity::find_by_id(new.user_id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound(format!("User {}", new.user_id)))?;

    let category = new.notification_type.preference_category();
    let urgent = new.priority == Priority::Urgent;
    let stored = new.into_active_model(now).insert(db).await?;
    debug!(notification_id = stored.id, "notification stored");

    let preferences = preferences_for(db, recipient.id).await?;
    if !urgent {
        if preferences.in_quiet_hours(now.time()) {
            info!(notification_id = stored.id, "recipient is in quiet hours, delivery skipped");
            return Ok(stored);
        }
        if rate_limited(db, &preferences, now).await? {
            warn!(notification_id = stored.id, "recipient rate limit reached, delivery skipped");
            return Ok(stored);
        }
    }

    let requested = [
        (DeliveryChannel::Email, stored.send_email, "email-stub"),
        (DeliveryChannel::Push, stored.send_push, "push-stub"),
        (DeliveryChannel::Sms, stored.send_sms, "sms-stub"),
    ];
    for (channel, wanted, provider) in requested {
        if wanted && preferences.channel_enabled(channel, category) {
            info!(notification_id = stored.id, ?channel, to = %recipient.email, "delivering notification");
            log_delivery(db, stored.id, channel, Some(provider), now).await?;
        }
    }

    let mut active = stored.mark_as_sent(now);
    active.is_delivered = Set(true);
    active.delivered_at = Set(Some(now));
    let sent = active.update(db).await?;
    log_delivery(db, sent.id, DeliveryChannel::InApp, None, now).await?;

    publish_notification(db, sink, &recipient, &sent).await?;
    Ok(sent)
}

/// Side-effect notification: failures are logged, never returned.
pub async fn notify(db: &DatabaseConnection, sink: &dyn NotificationSink, new: NewNotification) {
    let user_id = new.user_id;
    if let Err(err) = send_notification(db, sink, new).await {
        error!(user_id, error = %err, "failed to send notification");
    }
}

async fn log_delivery(
    db: &DatabaseConnection,
    notification_id: i32,
    channel: DeliveryChannel,
    provider: Option<&str>,
    now: DateTime<Utc>,
) -> Result<notification_delivery_log::Model> {
    let log = notification_delivery_log::ActiveModel {
        notification_id: Set(notification_id),
        channel: Set(channel),
        status: Set(DeliveryStatus::Delivered),
        provider: Set(provider.map(str::to_string)),
        error_message: Set(None),
        attempted_at: Set(now),
        delivered_at: Set(Some(now)),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(log)
}

async fn sent_since(db: &DatabaseConnection, user_id: i32, since: DateTime<Utc>) -> Result<u64> {
    Ok(notification::Entity::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsSent.eq(true))
        .filter(notification::Column::SentAt.gte(since))
        .count(db)
        .await?)
}

async fn rate_limited(
    db: &DatabaseConnection,
    preferences: &notification_preference::Model,
    now: DateTime<Utc>,
) -> Result<bool> {
    let last_hour = sent_since(db, preferences.user_id, now - Duration::hours(1)).await?;
    if last_hour >= preferences.max_notifications_per_hour.max(0) as u64 {
        return Ok(true);
    }
    let last_day = sent_since(db, preferences.user_id, now - Duration::days(1)).await?;
    Ok(last_day >= preferences.max_notifications_per_day.max(0) as u64)
}

/// Loads the user's preferences, creating the default row on first use.
pub async fn preferences_for(db: &DatabaseConnection, user_id: i32) -> Result<notification_preference::Model> {
    let existing = notification_preference::Entity::find()
        .filter(notification_preference::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    if let Some(preferences) = existing {
        return Ok(preferences);
    }
    debug!(user_id, "creating default notification preferences");
    Ok(notification_preference::ActiveModel::defaults_for(user_id, Utc::now())
        .insert(db)
        .await?)
}

pub async fn unread_count(db: &DatabaseConnection, user_id: i32) -> Result<u64> {
    Ok(notification::Entity::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .count(db)
        .await?)
}

pub fn to_payload(note: &notification::Model) -> NotificationPayload {
    NotificationPayload {
        id: note.id,
        title: note.title.clone(),
        message: note.message.clone(),
        notification_type: note.notification_type.to_value(),
        priority: note.priority.to_value(),
        is_read: note.is_read,
        related_service_id: note.related_service_id,
        related_booking_id: note.related_booking_id,
        related_order_id: note.related_order_id,
        action_url: note.action_url.clone(),
        action_text: note.action_text.clone(),
        metadata: note.metadata.clone(),
        created_at: note.created_at,
    }
}

/// Pushes the notification and the new unread count to the recipient's group.
/// Vendors also get a copy on their vendor group.
pub async fn publish_notification(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    recipient: &user::Model,
    note: &notification::Model,
) -> Result<()> {
    let payload = to_payload(note);
    let group = user_group(recipient.id);
    sink.publish(&group, RealtimeEvent::Notification { notification: payload.clone() })
        .await;
    let unread = unread_count(db, recipient.id).await?;
    sink.publish(&group, RealtimeEvent::NotificationCountUpdate { unread_count: unread })
        .await;
    if recipient.is_vendor() {
        sink.publish(&vendor_group(recipient.id), RealtimeEvent::VendorNotification { notification: payload })
            .await;
    }
    Ok(())
}

/// Renders a template for one user and sends the result.
#[instrument(skip(db, sink, template, variables), fields(template = %template.name))]
pub async fn create_from_template(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    template: &notification_template::Model,
    user_id: i32,
    variables: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> Result<notification::Model> {
    if !template.is_active {
        return Err(ComputeError::Validation(format!(
            "Notification template '{}' is inactive.",
            template.name
        )));
    }
    let (title, message) = template.render(variables).map_err(|missing| {
        warn!(missing = %missing, "template variable missing");
        ComputeError::MissingTemplateVariable(missing)
    })?;

    let new = NewNotification::new(user_id, template.notification_type, title, message)
        .priority(template.default_priority)
        .channels(
            template.default_send_email,
            template.default_send_push,
            template.default_send_sms,
        )
        .expires_at(notification::expiry_after(now, i64::from(template.default_expiry_hours)))
        .metadata(json!({ "template_name": template.name, "variables": variables }));
    send_notification_at(db, sink, new, now).await
}

/// Deletes notifications that are both expired and read.
#[instrument(skip(db))]
pub async fn cleanup_expired(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64> {
    let deleted = notification::Entity::delete_many()
        .filter(notification::Column::ExpiresAt.lt(now))
        .filter(notification::Column::IsRead.eq(true))
        .exec(db)
        .await?;
    info!(deleted = deleted.rows_affected, "expired notifications cleaned up");
    Ok(deleted.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, create_user, setup_db};
    use chrono::{NaiveTime, TimeZone};
    use model::entities::user::UserType;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, minute, 0).unwrap()
    }

    async fn enable_quiet_hours(db: &DatabaseConnection, user_id: i32, start: (u32, u32), end: (u32, u32)) {
        let prefs = preferences_for(db, user_id).await.unwrap();
        let mut active: notification_preference::ActiveModel = prefs.into();
        active.quiet_hours_enabled = Set(true);
        active.quiet_hours_start = Set(NaiveTime::from_hms_opt(start.0, start.1, 0));
        active.quiet_hours_end = Set(NaiveTime::from_hms_opt(end.0, end.1, 0));
        active.update(db).await.unwrap();
    }

    #[tokio::test]
    async fn delivered_notifications_are_logged_and_pushed() {
        let db = setup_db().await;
        let student = create_user(&db, "ama", UserType::Student).await;
        let sink = RecordingSink::default();

        let sent = send_notification_at(
            &db,
            &sink,
            NewNotification::new(student.id, NotificationType::OrderUpdate, "Order ready", "Come pick it up")
                .channels(true, true, false),
            at(12, 0),
        )
        .await
        .unwrap();

        assert!(sent.is_sent);
        assert!(sent.is_delivered);
        let logs = notification_delivery_log::Entity::find()
            .filter(notification_delivery_log::Column::NotificationId.eq(sent.id))
            .all(&db)
            .await
            .unwrap();
        let channels: Vec<DeliveryChannel> = logs.iter().map(|log| log.channel).collect();
        assert_eq!(channels, vec![DeliveryChannel::Email, DeliveryChannel::Push, DeliveryChannel::InApp]);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, format!("user_{}", student.id));
        assert_eq!(events[1].1, RealtimeEvent::NotificationCountUpdate { unread_count: 1 });
    }

    #[tokio::test]
    async fn quiet_hours_wrapping_midnight_hold_back_delivery() {
        let db = setup_db().await;
        let student = create_user(&db, "kwame", UserType::Student).await;
        enable_quiet_hours(&db, student.id, (22, 0), (7, 0)).await;
        let sink = RecordingSink::default();

        let held = send_notification_at(
            &db,
            &sink,
            NewNotification::new(student.id, NotificationType::General, "Late", "Sleep well"),
            at(23, 30),
        )
        .await
        .unwrap();
        assert!(!held.is_sent);
        assert!(sink.events().is_empty());

        let urgent = send_notification_at(
            &db,
            &sink,
            NewNotification::new(student.id, NotificationType::AdminAlert, "Urgent", "Read now")
                .priority(Priority::Urgent),
            at(2, 0),
        )
        .await
        .unwrap();
        assert!(urgent.is_sent);
        assert!(!sink.events().is_empty());
    }

    #[tokio::test]
    async fn hourly_rate_limit_skips_all_but_urgent() {
        let db = setup_db().await;
        let student = create_user(&db, "efua", UserType::Student).await;
        let prefs = preferences_for(&db, student.id).await.unwrap();
        let mut active: notification_preference::ActiveModel = prefs.into();
        active.max_notifications_per_hour = Set(1);
        active.update(&db).await.unwrap();

        let first = send_notification_at(
            &db,
            &NoopSink,
            NewNotification::new(student.id, NotificationType::General, "One", "first"),
            at(10, 0),
        )
        .await
        .unwrap();
        let second = send_notification_at(
            &db,
            &NoopSink,
            NewNotification::new(student.id, NotificationType::General, "Two", "second"),
            at(10, 5),
        )
        .await
        .unwrap();
        let urgent = send_notification_at(
            &db,
            &NoopSink,
            NewNotification::new(student.id, NotificationType::General, "Three", "third").priority(Priority::Urgent),
            at(10, 6),
        )
        .await
        .unwrap();

        assert!(first.is_sent);
        assert!(!second.is_sent);
        assert!(urgent.is_sent);
    }

    #[tokio::test]
    async fn vendors_receive_a_copy_on_their_group() {
        let db = setup_db().await;
        let vendor = create_user(&db, "kofi", UserType::Vendor).await;
        let sink = RecordingSink::default();

        send_notification_at(
            &db,
            &sink,
            NewNotification::new(vendor.id, NotificationType::BookingCreated, "New booking", "Someone booked"),
            at(9, 0),
        )
        .await
        .unwrap();

        let groups: Vec<String> = sink.events().into_iter().map(|(group, _)| group).collect();
        assert!(groups.contains(&format!("vendor_{}", vendor.id)));
    }

    #[tokio::test]
    async fn templates_report_missing_variables() {
        let db = setup_db().await;
        let student = create_user(&db, "abena", UserType::Student).await;
        let template = notification_template::ActiveModel {
            name: Set("order_ready".to_string()),
            notification_type: Set(NotificationType::OrderUpdate),
            title_template: Set("Order #{order_id} ready".to_string()),
            message_template: Set("Pick up at {location}".to_string()),
            default_priority: Set(Priority::High),
            default_send_email: Set(false),
            default_send_push: Set(true),
            default_send_sms: Set(false),
            default_expiry_hours: Set(24),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let mut variables = HashMap::new();
        variables.insert("order_id".to_string(), "7".to_string());
        let err = create_from_template(&db, &NoopSink, &template, student.id, &variables, at(8, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::MissingTemplateVariable(ref name) if name == "location"));

        variables.insert("location".to_string(), "Hostel B".to_string());
        let note = create_from_template(&db, &NoopSink, &template, student.id, &variables, at(8, 0))
            .await
            .unwrap();
        assert_eq!(note.title, "Order #7 ready");
        assert_eq!(note.priority, Priority::High);
        assert_eq!(note.expires_at, Some(at(8, 0) + Duration::hours(24)));
        assert_eq!(note.metadata["template_name"], "order_ready");
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_read_rows() {
        let db = setup_db().await;
        let student = create_user(&db, "yaa", UserType::Student).await;
        let expired = send_notification_at(
            &db,
            &NoopSink,
            NewNotification::new(student.id, NotificationType::General, "Old", "old news")
                .expires_at(Some(at(9, 0))),
            at(8, 0),
        )
        .await
        .unwrap();
        send_notification_at(
            &db,
            &NoopSink,
            NewNotification::new(student.id, NotificationType::General, "Unread", "still unread")
                .expires_at(Some(at(9, 0))),
            at(8, 0),
        )
        .await
        .unwrap();
        expired.mark_as_read(at(8, 30)).update(&db).await.unwrap();

        assert_eq!(cleanup_expired(&db, at(10, 0)).await.unwrap(), 1);
        assert_eq!(unread_count(&db, student.id).await.unwrap(), 1);
    }
}
