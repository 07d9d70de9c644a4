use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Notification as pushed to WebSocket clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationPayload {
    pub id: i32,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub priority: String,
    pub is_read: bool,
    pub related_service_id: Option<i32>,
    pub related_booking_id: Option<i32>,
    pub related_order_id: Option<i32>,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Server-to-client message. Serialized with a `type` tag, e.g.
/// `{"type": "notification_count_update", "unread_count": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    ConnectionEstablished {
        message: String,
        user_id: i32,
        username: String,
    },
    VendorConnectionEstablished {
        message: String,
        vendor_id: i32,
        business_name: String,
    },
    Notification {
        notification: NotificationPayload,
    },
    VendorNotification {
        notification: NotificationPayload,
    },
    NotificationCountUpdate {
        unread_count: u64,
    },
    NotificationMarkedRead {
        notification_id: i32,
    },
    UnreadCount {
        count: u64,
    },
    RecentNotifications {
        notifications: Vec<NotificationPayload>,
    },
    VendorStats {
        #[schema(value_type = Object)]
        stats: Value,
    },
    ServiceNotifications {
        service_id: i32,
        notifications: Vec<NotificationPayload>,
    },
    Error {
        message: String,
    },
}

impl RealtimeEvent {
    pub fn error(message: impl Into<String>) -> Self {
        RealtimeEvent::Error { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_a_type_tag() {
        let json = serde_json::to_value(RealtimeEvent::NotificationCountUpdate { unread_count: 3 }).unwrap();
        assert_eq!(json["type"], "notification_count_update");
        assert_eq!(json["unread_count"], 3);

        let json = serde_json::to_value(RealtimeEvent::UnreadCount { count: 0 }).unwrap();
        assert_eq!(json["type"], "unread_count");
    }
}
