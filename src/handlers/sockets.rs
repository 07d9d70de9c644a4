//! WebSocket endpoints for live notifications.
//!
//! Clients authenticate with `?token=<access>` (browsers cannot set headers on
//! a WebSocket handshake) or a bearer header. A failed handshake is upgraded
//! and then closed with code 4001 so clients can tell auth failures apart
//! from network errors.

use std::borrow::Cow;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use chrono::Utc;
use common::RealtimeEvent;
use compute::notifier::{self, user_group, vendor_group, VENDOR_BROADCAST_GROUP};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use model::entities::{notification, service, user};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, warn};
use utoipa::IntoParams;

use crate::auth::{authenticate, bearer_token};
use crate::handlers::vendor_profiles::profile_for;
use crate::helpers::stats::vendor_dashboard;
use crate::schemas::AppState;

const AUTH_FAILED_CODE: u16 = 4001;
const DEFAULT_RECENT: u64 = 10;
const MAX_RECENT: u64 = 50;
const SERVICE_NOTIFICATION_LIMIT: u64 = 20;
const COMMAND_FAILED_MESSAGE: &str = "Could not process the request.";

#[derive(Debug, Deserialize, IntoParams)]
pub struct SocketQuery {
    /// Access token
    pub token: Option<String>,
}

/// Client-to-server message, tagged by `type`.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    MarkAsRead { notification_id: i32 },
    GetUnreadCount,
    GetRecentNotifications { limit: Option<u64> },
    GetVendorStats,
    GetServiceNotifications { service_id: i32 },
}

type Sender = SplitSink<WebSocket, Message>;

async fn caller_from(state: &AppState, query: SocketQuery, headers: &HeaderMap) -> Option<user::Model> {
    let token = query.token.or_else(|| bearer_token(headers).map(str::to_string))?;
    match authenticate(state, &token).await {
        Ok(account) => Some(account),
        Err(err) => {
            debug!("WebSocket authentication failed: {err}");
            None
        }
    }
}

async fn reject(mut socket: WebSocket, reason: &'static str) {
    let frame = CloseFrame { code: AUTH_FAILED_CODE, reason: Cow::Borrowed(reason) };
    if let Err(err) = socket.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {err}");
    }
}

async fn send_event(sender: &mut Sender, event: &RealtimeEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(Message::Text(text)).await
}

/// Per-user notification stream
#[utoipa::path(
    get,
    path = "/ws/notifications/",
    tag = "realtime",
    params(SocketQuery),
    responses((status = 101, description = "Switching to the WebSocket protocol"))
)]
pub async fn notifications_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    headers: HeaderMap,
) -> Response {
    let caller = caller_from(&state, query, &headers).await;
    ws.on_upgrade(move |socket| async move {
        match caller {
            Some(account) => user_session(socket, state, account).await,
            None => reject(socket, "Authentication failed").await,
        }
    })
}

/// Vendor stream: the vendor's own notifications plus vendor-wide broadcasts
#[utoipa::path(
    get,
    path = "/ws/vendor-notifications/",
    tag = "realtime",
    params(SocketQuery),
    responses((status = 101, description = "Switching to the WebSocket protocol"))
)]
pub async fn vendor_notifications_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    headers: HeaderMap,
) -> Response {
    let caller = caller_from(&state, query, &headers).await.filter(user::Model::is_vendor);
    ws.on_upgrade(move |socket| async move {
        match caller {
            Some(account) => vendor_session(socket, state, account).await,
            None => reject(socket, "Vendor authentication failed").await,
        }
    })
}

#[instrument(skip_all, fields(user_id = account.id))]
async fn user_session(socket: WebSocket, state: AppState, account: user::Model) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.hub.subscribe(&user_group(account.id));
    info!("Notification socket connected");

    let greeting = RealtimeEvent::ConnectionEstablished {
        message: "Connected to notifications".to_string(),
        user_id: account.id,
        username: account.username.clone(),
    };
    if send_event(&mut sender, &greeting).await.is_err() {
        return;
    }

    'session: loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "socket fell behind, events dropped"),
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    for reply in respond(&state, &account, false, &text).await {
                        if send_event(&mut sender, &reply).await.is_err() {
                            break 'session;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!("socket error: {err}");
                    break;
                }
            },
        }
    }

    drop(events);
    state.hub.prune();
    info!("Notification socket disconnected");
}

#[instrument(skip_all, fields(vendor_id = account.id))]
async fn vendor_session(socket: WebSocket, state: AppState, account: user::Model) {
    let business_name = match profile_for(&state.db, &account).await {
        Ok(profile) => profile.business_name,
        Err(err) => {
            warn!("Could not load vendor profile: {err}");
            account.full_name()
        }
    };
    let (mut sender, mut receiver) = socket.split();
    let mut own = state.hub.subscribe(&vendor_group(account.id));
    let mut broadcast = state.hub.subscribe(VENDOR_BROADCAST_GROUP);
    info!("Vendor socket connected");

    let greeting = RealtimeEvent::VendorConnectionEstablished {
        message: "Connected to vendor notifications".to_string(),
        vendor_id: account.id,
        business_name,
    };
    if send_event(&mut sender, &greeting).await.is_err() {
        return;
    }

    'session: loop {
        let event = tokio::select! {
            event = own.recv() => event,
            event = broadcast.recv() => event,
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        for reply in respond(&state, &account, true, &text).await {
                            if send_event(&mut sender, &reply).await.is_err() {
                                break 'session;
                            }
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!("socket error: {err}");
                        break;
                    }
                }
            }
        };
        match event {
            Ok(event) => {
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "socket fell behind, events dropped"),
            Err(RecvError::Closed) => break,
        }
    }

    drop(own);
    drop(broadcast);
    state.hub.prune();
    info!("Vendor socket disconnected");
}

/// Answers one client message. Failures become `error` events rather than
/// closing the socket.
async fn respond(state: &AppState, account: &user::Model, vendor: bool, text: &str) -> Vec<RealtimeEvent> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            debug!("unparseable client message: {err}");
            return vec![RealtimeEvent::error("Unsupported or malformed message.")];
        }
    };
    match handle(state, account, vendor, message).await {
        Ok(events) => events,
        Err(message) => vec![RealtimeEvent::error(message)],
    }
}

/// Logs the underlying failure and hands the client a generic message.
fn command_failed(err: impl std::fmt::Display) -> String {
    error!("socket command failed: {err}");
    COMMAND_FAILED_MESSAGE.to_string()
}

async fn handle(
    state: &AppState,
    account: &user::Model,
    vendor: bool,
    message: ClientMessage,
) -> Result<Vec<RealtimeEvent>, String> {
    let db = &state.db;
    match message {
        ClientMessage::MarkAsRead { notification_id } => {
            let note = notification::Entity::find_by_id(notification_id)
                .filter(notification::Column::UserId.eq(account.id))
                .one(db)
                .await
                .map_err(command_failed)?
                .ok_or_else(|| "Notification not found.".to_string())?;
            if !note.is_read {
                note.mark_as_read(Utc::now()).update(db).await.map_err(command_failed)?;
            }
            let unread_count = notifier::unread_count(db, account.id).await.map_err(command_failed)?;
            Ok(vec![
                RealtimeEvent::NotificationMarkedRead { notification_id },
                RealtimeEvent::NotificationCountUpdate { unread_count },
            ])
        }
        ClientMessage::GetUnreadCount => {
            let count = notifier::unread_count(db, account.id).await.map_err(command_failed)?;
            Ok(vec![RealtimeEvent::UnreadCount { count }])
        }
        ClientMessage::GetRecentNotifications { limit } => {
            let limit = limit.unwrap_or(DEFAULT_RECENT).clamp(1, MAX_RECENT);
            let recent = notification::Entity::find()
                .filter(notification::Column::UserId.eq(account.id))
                .order_by_desc(notification::Column::CreatedAt)
                .order_by_desc(notification::Column::Id)
                .limit(limit)
                .all(db)
                .await
                .map_err(command_failed)?;
            Ok(vec![RealtimeEvent::RecentNotifications {
                notifications: recent.iter().map(notifier::to_payload).collect(),
            }])
        }
        ClientMessage::GetVendorStats if vendor => {
            let dashboard = vendor_dashboard(db, account.id).await.map_err(command_failed)?;
            let stats = serde_json::to_value(dashboard).map_err(command_failed)?;
            Ok(vec![RealtimeEvent::VendorStats { stats }])
        }
        ClientMessage::GetServiceNotifications { service_id } if vendor => {
            let owned = service::Entity::find_by_id(service_id)
                .filter(service::Column::VendorId.eq(account.id))
                .one(db)
                .await
                .map_err(command_failed)?;
            if owned.is_none() {
                return Err("Service not found.".to_string());
            }
            let notes = notification::Entity::find()
                .filter(notification::Column::UserId.eq(account.id))
                .filter(notification::Column::RelatedServiceId.eq(service_id))
                .order_by_desc(notification::Column::CreatedAt)
                .order_by_desc(notification::Column::Id)
                .limit(SERVICE_NOTIFICATION_LIMIT)
                .all(db)
                .await
                .map_err(command_failed)?;
            Ok(vec![RealtimeEvent::ServiceNotifications {
                service_id,
                notifications: notes.iter().map(notifier::to_payload).collect(),
            }])
        }
        ClientMessage::GetVendorStats | ClientMessage::GetServiceNotifications { .. } => {
            Err("This message is only available on the vendor socket.".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::setup_test_app_state;
    use model::entities::user::UserType;
    use sea_orm::{ConnectionTrait, Set};

    #[test]
    fn client_messages_parse_by_type_tag() {
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"mark_as_read","notification_id":4}"#).unwrap(),
            ClientMessage::MarkAsRead { notification_id: 4 }
        );
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"get_unread_count"}"#).unwrap(),
            ClientMessage::GetUnreadCount
        );
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"get_recent_notifications"}"#).unwrap(),
            ClientMessage::GetRecentNotifications { limit: None }
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }

    #[tokio::test]
    async fn database_failures_are_not_leaked_to_clients() {
        let state = setup_test_app_state().await;
        let now = Utc::now();
        let account = user::ActiveModel {
            username: Set("efua".to_string()),
            email: Set("efua@campus.test".to_string()),
            password_hash: Set("hash".to_string()),
            user_type: Set(UserType::Student),
            is_active: Set(true),
            date_joined: Set(now),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();
        state.db.execute_unprepared("DROP TABLE notifications").await.unwrap();

        let replies = respond(&state, &account, false, r#"{"type":"get_unread_count"}"#).await;

        assert_eq!(replies, vec![RealtimeEvent::error(COMMAND_FAILED_MESSAGE)]);
    }
}
