use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use common::{DailyNotificationStats, RealtimeEvent};
use compute::{analytics, notifier, NewNotification};
use model::entities::notification::{self, NotificationType, Priority};
use model::entities::{notification_preference, notification_template, user};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::{ensure_admin, CurrentUser};
use crate::errors::AppError;
use crate::helpers::converters::{parse_enum, parse_optional_enum};
use crate::schemas::{ApiResponse, AppState};

/// Notification as returned by the REST API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub priority: String,
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
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<notification::Model> for NotificationResponse {
    fn from(model: notification::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            title: model.title,
            message: model.message,
            notification_type: model.notification_type.to_value(),
            priority: model.priority.to_value(),
            related_object_type: model.related_object_type,
            related_object_id: model.related_object_id,
            related_service_id: model.related_service_id,
            related_booking_id: model.related_booking_id,
            related_order_id: model.related_order_id,
            is_read: model.is_read,
            is_sent: model.is_sent,
            is_delivered: model.is_delivered,
            send_email: model.send_email,
            send_push: model.send_push,
            send_sms: model.send_sms,
            metadata: model.metadata,
            action_url: model.action_url,
            action_text: model.action_text,
            created_at: model.created_at,
            read_at: model.read_at,
            sent_at: model.sent_at,
            delivered_at: model.delivered_at,
            expires_at: model.expires_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct NotificationQuery {
    pub notification_type: Option<String>,
    pub priority: Option<String>,
    pub is_read: Option<bool>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Rows to skip (default: 0)
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub total_count: u64,
    pub unread_count: u64,
    pub has_more: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationStatsResponse {
    pub total: u64,
    pub unread: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

/// Rows touched by a bulk operation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AffectedResponse {
    pub affected: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PreferencesResponse {
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
    pub updated_at: DateTime<Utc>,
}

impl From<notification_preference::Model> for PreferencesResponse {
    fn from(model: notification_preference::Model) -> Self {
        Self {
            email_enabled: model.email_enabled,
            email_order_updates: model.email_order_updates,
            email_booking_updates: model.email_booking_updates,
            email_payment_updates: model.email_payment_updates,
            email_recommendations: model.email_recommendations,
            email_announcements: model.email_announcements,
            push_enabled: model.push_enabled,
            push_order_updates: model.push_order_updates,
            push_booking_updates: model.push_booking_updates,
            push_payment_updates: model.push_payment_updates,
            push_recommendations: model.push_recommendations,
            push_announcements: model.push_announcements,
            sms_enabled: model.sms_enabled,
            sms_order_updates: model.sms_order_updates,
            sms_booking_updates: model.sms_booking_updates,
            sms_payment_updates: model.sms_payment_updates,
            quiet_hours_enabled: model.quiet_hours_enabled,
            quiet_hours_start: model.quiet_hours_start,
            quiet_hours_end: model.quiet_hours_end,
            max_notifications_per_hour: model.max_notifications_per_hour,
            max_notifications_per_day: model.max_notifications_per_day,
            updated_at: model.updated_at,
        }
    }
}

/// Partial update; omitted fields keep their value.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdatePreferencesRequest {
    pub email_enabled: Option<bool>,
    pub email_order_updates: Option<bool>,
    pub email_booking_updates: Option<bool>,
    pub email_payment_updates: Option<bool>,
    pub email_recommendations: Option<bool>,
    pub email_announcements: Option<bool>,
    pub push_enabled: Option<bool>,
    pub push_order_updates: Option<bool>,
    pub push_booking_updates: Option<bool>,
    pub push_payment_updates: Option<bool>,
    pub push_recommendations: Option<bool>,
    pub push_announcements: Option<bool>,
    pub sms_enabled: Option<bool>,
    pub sms_order_updates: Option<bool>,
    pub sms_booking_updates: Option<bool>,
    pub sms_payment_updates: Option<bool>,
    pub quiet_hours_enabled: Option<bool>,
    /// `HH:MM:SS`
    pub quiet_hours_start: Option<NaiveTime>,
    /// `HH:MM:SS`
    pub quiet_hours_end: Option<NaiveTime>,
    #[validate(range(min = 0, max = 1000))]
    pub max_notifications_per_hour: Option<i32>,
    #[validate(range(min = 0, max = 10000))]
    pub max_notifications_per_day: Option<i32>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct BulkActionRequest {
    pub notification_ids: Vec<i32>,
    /// mark_read, mark_unread or delete
    pub action: String,
}

/// Admin-authored notification for one user or every active user of a type
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct AdminNotificationRequest {
    pub user_id: Option<i32>,
    /// student, vendor or admin; used when `user_id` is absent
    pub user_type: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
    /// Defaults to general
    pub notification_type: Option<String>,
    /// Defaults to medium
    pub priority: Option<String>,
    #[serde(default)]
    pub send_email: bool,
    #[serde(default)]
    pub send_sms: bool,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    #[validate(range(min = 1, max = 8760))]
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BroadcastResponse {
    pub sent_count: usize,
    pub notification_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TemplateNotificationRequest {
    pub template_name: String,
    pub user_id: i32,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub notification_type: String,
    #[validate(length(min = 1, max = 200))]
    pub title_template: String,
    #[validate(length(min = 1))]
    pub message_template: String,
    pub default_priority: Option<String>,
    #[serde(default)]
    pub default_send_email: bool,
    pub default_send_push: Option<bool>,
    #[serde(default)]
    pub default_send_sms: bool,
    #[validate(range(min = 1, max = 8760))]
    pub default_expiry_hours: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateResponse {
    pub id: i32,
    pub name: String,
    pub notification_type: String,
    pub title_template: String,
    pub message_template: String,
    pub default_priority: String,
    pub default_send_email: bool,
    pub default_send_push: bool,
    pub default_send_sms: bool,
    pub default_expiry_hours: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<notification_template::Model> for TemplateResponse {
    fn from(model: notification_template::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            notification_type: model.notification_type.to_value(),
            title_template: model.title_template,
            message_template: model.message_template,
            default_priority: model.default_priority.to_value(),
            default_send_email: model.default_send_email,
            default_send_push: model.default_send_push,
            default_send_sms: model.default_send_sms,
            default_expiry_hours: model.default_expiry_hours,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct AnalyticsQuery {
    /// Day to summarise, `YYYY-MM-DD` (default: today)
    pub date: Option<NaiveDate>,
}

async fn own_notification(
    db: &DatabaseConnection,
    caller: &user::Model,
    notification_id: i32,
) -> Result<notification::Model, AppError> {
    notification::Entity::find_by_id(notification_id)
        .filter(notification::Column::UserId.eq(caller.id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Notification"))
}

/// Pushes the caller's new unread count to their open sockets.
async fn push_unread_count(state: &AppState, user_id: i32) -> Result<u64, AppError> {
    let unread = notifier::unread_count(&state.db, user_id).await?;
    state.hub.broadcast(
        &notifier::user_group(user_id),
        RealtimeEvent::NotificationCountUpdate { unread_count: unread },
    );
    Ok(unread)
}

/// List the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Notifications retrieved successfully", body = ApiResponse<NotificationListResponse>),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Valid(Query(query)): Valid<Query<NotificationQuery>>,
) -> Result<Json<ApiResponse<NotificationListResponse>>, AppError> {
    trace!("Entering list_notifications function");
    let limit = query.limit.unwrap_or(20);
    let offset = query.offset.unwrap_or(0);

    let mut finder = notification::Entity::find().filter(notification::Column::UserId.eq(caller.id));
    if let Some(kind) = parse_optional_enum::<NotificationType>("notification_type", query.notification_type.as_deref())? {
        finder = finder.filter(notification::Column::NotificationType.eq(kind));
    }
    if let Some(priority) = parse_optional_enum::<Priority>("priority", query.priority.as_deref())? {
        finder = finder.filter(notification::Column::Priority.eq(priority));
    }
    if let Some(is_read) = query.is_read {
        finder = finder.filter(notification::Column::IsRead.eq(is_read));
    }

    let total_count = finder.clone().count(&state.db).await?;
    let notifications = finder
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(&state.db)
        .await?;
    let unread_count = notifier::unread_count(&state.db, caller.id).await?;
    debug!("Returning {} of {} notifications", notifications.len(), total_count);

    let response = NotificationListResponse {
        has_more: offset + (notifications.len() as u64) < total_count,
        notifications: notifications.into_iter().map(NotificationResponse::from).collect(),
        total_count,
        unread_count,
    };
    Ok(Json(ApiResponse::ok(response, "Notifications retrieved successfully")))
}

/// Counts of the caller's notifications by type and priority
#[utoipa::path(
    get,
    path = "/api/v1/notifications/stats",
    tag = "notifications",
    responses(
        (status = 200, description = "Notification stats retrieved successfully", body = ApiResponse<NotificationStatsResponse>)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn notification_stats(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<NotificationStatsResponse>>, AppError> {
    let stats = analytics::notification_stats(&state.db, caller.id).await?;
    let response = NotificationStatsResponse {
        total: stats.total,
        unread: stats.unread,
        by_type: stats.by_type,
        by_priority: stats.by_priority,
    };
    Ok(Json(ApiResponse::ok(response, "Notification stats retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    tag = "notifications",
    responses(
        (status = 200, description = "Unread count retrieved successfully", body = ApiResponse<UnreadCountResponse>)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<UnreadCountResponse>>, AppError> {
    let unread_count = notifier::unread_count(&state.db, caller.id).await?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { unread_count }, "Unread count retrieved successfully")))
}

/// The caller's delivery preferences, created with defaults on first use
#[utoipa::path(
    get,
    path = "/api/v1/notifications/preferences",
    tag = "notifications",
    responses(
        (status = 200, description = "Preferences retrieved successfully", body = ApiResponse<PreferencesResponse>)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn get_preferences(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<PreferencesResponse>>, AppError> {
    let preferences = notifier::preferences_for(&state.db, caller.id).await?;
    Ok(Json(ApiResponse::ok(PreferencesResponse::from(preferences), "Preferences retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/preferences",
    tag = "notifications",
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Preferences updated successfully", body = ApiResponse<PreferencesResponse>),
        (status = 400, description = "Invalid preferences", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_preferences(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdatePreferencesRequest>,
) -> Result<Json<ApiResponse<PreferencesResponse>>, AppError> {
    request.validate()?;
    let current = notifier::preferences_for(&state.db, caller.id).await?;
    let mut active: notification_preference::ActiveModel = current.into();

    macro_rules! apply {
        ($($field:ident),* $(,)?) => {
            $(if let Some(value) = request.$field {
                active.$field = Set(value);
            })*
        };
    }
    apply!(
        email_enabled,
        email_order_updates,
        email_booking_updates,
        email_payment_updates,
        email_recommendations,
        email_announcements,
        push_enabled,
        push_order_updates,
        push_booking_updates,
        push_payment_updates,
        push_recommendations,
        push_announcements,
        sms_enabled,
        sms_order_updates,
        sms_booking_updates,
        sms_payment_updates,
        quiet_hours_enabled,
        max_notifications_per_hour,
        max_notifications_per_day,
    );
    if request.quiet_hours_start.is_some() {
        active.quiet_hours_start = Set(request.quiet_hours_start);
    }
    if request.quiet_hours_end.is_some() {
        active.quiet_hours_end = Set(request.quiet_hours_end);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    if updated.quiet_hours_enabled && (updated.quiet_hours_start.is_none() || updated.quiet_hours_end.is_none()) {
        warn!("Quiet hours enabled without a full window; they will not apply");
    }
    info!("Notification preferences updated");
    Ok(Json(ApiResponse::ok(PreferencesResponse::from(updated), "Preferences updated successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{notification_id}/read",
    tag = "notifications",
    params(("notification_id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read", body = ApiResponse<NotificationResponse>),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn mark_read(
    Path(notification_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<NotificationResponse>>, AppError> {
    let note = own_notification(&state.db, &caller, notification_id).await?;
    let updated = if note.is_read { note } else { note.mark_as_read(Utc::now()).update(&state.db).await? };
    push_unread_count(&state, caller.id).await?;
    Ok(Json(ApiResponse::ok(NotificationResponse::from(updated), "Notification marked as read")))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{notification_id}/unread",
    tag = "notifications",
    params(("notification_id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as unread", body = ApiResponse<NotificationResponse>),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn mark_unread(
    Path(notification_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<NotificationResponse>>, AppError> {
    let note = own_notification(&state.db, &caller, notification_id).await?;
    let updated = note.mark_as_unread().update(&state.db).await?;
    push_unread_count(&state, caller.id).await?;
    Ok(Json(ApiResponse::ok(NotificationResponse::from(updated), "Notification marked as unread")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{notification_id}",
    tag = "notifications",
    params(("notification_id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted successfully", body = ApiResponse<AffectedResponse>),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn delete_notification(
    Path(notification_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<AffectedResponse>>, AppError> {
    let note = own_notification(&state.db, &caller, notification_id).await?;
    let deleted = note.delete(&state.db).await?;
    push_unread_count(&state, caller.id).await?;
    Ok(Json(ApiResponse::ok(
        AffectedResponse { affected: deleted.rows_affected },
        "Notification deleted successfully",
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/mark-all-read",
    tag = "notifications",
    responses(
        (status = 200, description = "All notifications marked as read", body = ApiResponse<AffectedResponse>)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<AffectedResponse>>, AppError> {
    let affected = set_read_flag(&state.db, caller.id, None, true).await?;
    info!("Marked {} notifications as read", affected);
    push_unread_count(&state, caller.id).await?;
    Ok(Json(ApiResponse::ok(AffectedResponse { affected }, "All notifications marked as read")))
}

/// Flips `is_read` on the user's notifications, all of them when `ids` is `None`.
async fn set_read_flag(
    db: &DatabaseConnection,
    user_id: i32,
    ids: Option<&[i32]>,
    read: bool,
) -> Result<u64, AppError> {
    let read_at: Option<DateTime<Utc>> = read.then(Utc::now);
    let mut update = notification::Entity::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(read))
        .col_expr(notification::Column::ReadAt, Expr::value(read_at))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(!read));
    if let Some(ids) = ids {
        update = update.filter(notification::Column::Id.is_in(ids.to_vec()));
    }
    Ok(update.exec(db).await?.rows_affected)
}

/// Apply one action to several of the caller's notifications
#[utoipa::path(
    post,
    path = "/api/v1/notifications/bulk-action",
    tag = "notifications",
    request_body = BulkActionRequest,
    responses(
        (status = 200, description = "Bulk action applied", body = ApiResponse<AffectedResponse>),
        (status = 400, description = "Unknown action or no ids", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id, action = %request.action))]
pub async fn bulk_action(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<BulkActionRequest>,
) -> Result<Json<ApiResponse<AffectedResponse>>, AppError> {
    if request.notification_ids.is_empty() {
        return Err(AppError::field("notification_ids", "Select at least one notification."));
    }
    let ids = request.notification_ids.as_slice();
    let affected = match request.action.as_str() {
        "mark_read" => set_read_flag(&state.db, caller.id, Some(ids), true).await?,
        "mark_unread" => set_read_flag(&state.db, caller.id, Some(ids), false).await?,
        "delete" => {
            notification::Entity::delete_many()
                .filter(notification::Column::UserId.eq(caller.id))
                .filter(notification::Column::Id.is_in(request.notification_ids.clone()))
                .exec(&state.db)
                .await?
                .rows_affected
        }
        other => {
            return Err(AppError::field(
                "action",
                format!("'{other}' is not a valid choice. Use one of: mark_read, mark_unread, delete."),
            ))
        }
    };
    push_unread_count(&state, caller.id).await?;
    Ok(Json(ApiResponse::ok(AffectedResponse { affected }, "Bulk action applied")))
}

/// Send a notification to one user or broadcast it to a user type (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/notifications/admin/create",
    tag = "notifications",
    request_body = AdminNotificationRequest,
    responses(
        (status = 201, description = "Notifications sent", body = ApiResponse<BroadcastResponse>),
        (status = 400, description = "Missing recipient or invalid data", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn admin_create_notification(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<AdminNotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BroadcastResponse>>), AppError> {
    ensure_admin(&caller)?;
    request.validate()?;
    let notification_type = parse_optional_enum::<NotificationType>("notification_type", request.notification_type.as_deref())?
        .unwrap_or(NotificationType::General);
    let priority = parse_optional_enum::<Priority>("priority", request.priority.as_deref())?.unwrap_or(Priority::Medium);

    let recipients: Vec<i32> = match (request.user_id, request.user_type.as_deref()) {
        (Some(user_id), _) => {
            user::Entity::find_by_id(user_id)
                .one(&state.db)
                .await?
                .ok_or_else(|| AppError::not_found("User"))?;
            vec![user_id]
        }
        (None, Some(raw)) => {
            let user_type: user::UserType = parse_enum("user_type", raw)?;
            user::Entity::find()
                .select_only()
                .column(user::Column::Id)
                .filter(user::Column::UserType.eq(user_type))
                .filter(user::Column::IsActive.eq(true))
                .into_tuple()
                .all(&state.db)
                .await?
        }
        (None, None) => return Err(AppError::field("user_id", "Either user_id or user_type is required.")),
    };

    let now = Utc::now();
    let expires_at = request.expires_in_hours.and_then(|hours| notification::expiry_after(now, hours));
    let mut notification_ids = Vec::with_capacity(recipients.len());
    for user_id in recipients {
        let mut new = NewNotification::new(user_id, notification_type, request.title.clone(), request.message.clone())
            .priority(priority)
            .channels(request.send_email, true, request.send_sms)
            .expires_at(expires_at);
        if let (Some(url), Some(text)) = (request.action_url.as_ref(), request.action_text.as_ref()) {
            new = new.action(url.clone(), text.clone());
        }
        let sent = notifier::send_notification_at(&state.db, state.hub.as_ref(), new, now).await?;
        notification_ids.push(sent.id);
    }
    info!("Admin {} sent {} notifications", caller.id, notification_ids.len());

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            BroadcastResponse { sent_count: notification_ids.len(), notification_ids },
            "Notifications sent successfully",
        )),
    ))
}

/// Render a stored template for one user and send it (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/notifications/admin/from-template",
    tag = "notifications",
    request_body = TemplateNotificationRequest,
    responses(
        (status = 201, description = "Notification sent", body = ApiResponse<NotificationResponse>),
        (status = 400, description = "Missing template variable or inactive template", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "Template or user not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id, template = %request.template_name))]
pub async fn create_from_template(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<TemplateNotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<NotificationResponse>>), AppError> {
    ensure_admin(&caller)?;
    let template = notification_template::Entity::find()
        .filter(notification_template::Column::Name.eq(request.template_name.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Notification template"))?;
    let sent = notifier::create_from_template(
        &state.db,
        state.hub.as_ref(),
        &template,
        request.user_id,
        &request.variables,
        Utc::now(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(NotificationResponse::from(sent), "Notification sent successfully")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/templates",
    tag = "notifications",
    responses(
        (status = 200, description = "Templates retrieved successfully", body = ApiResponse<Vec<TemplateResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_templates(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<Vec<TemplateResponse>>>, AppError> {
    ensure_admin(&caller)?;
    let templates = notification_template::Entity::find()
        .order_by_asc(notification_template::Column::Name)
        .all(&state.db)
        .await?;
    Ok(Json(ApiResponse::ok(
        templates.into_iter().map(TemplateResponse::from).collect(),
        "Templates retrieved successfully",
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/templates",
    tag = "notifications",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created successfully", body = ApiResponse<TemplateResponse>),
        (status = 400, description = "Invalid template or duplicate name", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn create_template(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TemplateResponse>>), AppError> {
    ensure_admin(&caller)?;
    request.validate()?;
    let notification_type: NotificationType = parse_enum("notification_type", &request.notification_type)?;
    let default_priority =
        parse_optional_enum::<Priority>("default_priority", request.default_priority.as_deref())?.unwrap_or(Priority::Medium);
    let taken = notification_template::Entity::find()
        .filter(notification_template::Column::Name.eq(request.name.as_str()))
        .count(&state.db)
        .await?;
    if taken > 0 {
        return Err(AppError::field("name", "A template with this name already exists."));
    }

    let now = Utc::now();
    let created = notification_template::ActiveModel {
        name: Set(request.name),
        notification_type: Set(notification_type),
        title_template: Set(request.title_template),
        message_template: Set(request.message_template),
        default_priority: Set(default_priority),
        default_send_email: Set(request.default_send_email),
        default_send_push: Set(request.default_send_push.unwrap_or(true)),
        default_send_sms: Set(request.default_send_sms),
        default_expiry_hours: Set(request.default_expiry_hours.unwrap_or(24)),
        is_active: Set(request.is_active.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!("Notification template '{}' created", created.name);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TemplateResponse::from(created), "Template created successfully")),
    ))
}

/// Per-type delivery and read rates for one day (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/notifications/analytics",
    tag = "notifications",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Notification analytics retrieved successfully", body = ApiResponse<Vec<DailyNotificationStats>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn notification_analytics(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<Vec<DailyNotificationStats>>>, AppError> {
    ensure_admin(&caller)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let stats = analytics::notification_analytics(&state.db, date).await?;
    Ok(Json(ApiResponse::ok(stats, "Notification analytics retrieved successfully")))
}

/// Delete notifications that are expired and already read (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/notifications/cleanup",
    tag = "notifications",
    responses(
        (status = 200, description = "Expired notifications removed", body = ApiResponse<AffectedResponse>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn cleanup_notifications(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<AffectedResponse>>, AppError> {
    ensure_admin(&caller)?;
    let affected = notifier::cleanup_expired(&state.db, Utc::now()).await?;
    state.hub.prune();
    Ok(Json(ApiResponse::ok(AffectedResponse { affected }, "Expired notifications removed")))
}
