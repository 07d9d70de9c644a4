use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::{notifier, NewNotification};
use model::entities::complaint::{self, missing_related_entity, ComplaintStatus, ComplaintType};
use model::entities::notification::{NotificationType, Priority};
use model::entities::{booking, order, service, user};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::{ensure_admin, ensure_student, CurrentUser};
use crate::errors::AppError;
use crate::helpers::converters::{page_window, parse_enum, parse_optional_enum};
use crate::schemas::{ApiResponse, AppState};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateComplaintRequest {
    /// service, order, booking, payment, vendor, platform or other
    pub complaint_type: String,
    /// low, medium, high or urgent (default: medium)
    pub priority: Option<String>,
    pub related_service: Option<i32>,
    pub related_order: Option<i32>,
    pub related_booking: Option<i32>,
    #[validate(length(min = 1, max = 200, message = "Subject must be between 1 and 200 characters."))]
    pub subject: String,
    #[validate(length(min = 1, message = "Description is required."))]
    pub description: String,
}

/// Admin triage; omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateComplaintRequest {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_admin_id: Option<i32>,
    pub admin_response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComplaintResponse {
    pub id: i32,
    pub complainant_id: i32,
    pub complaint_type: String,
    pub priority: String,
    pub status: String,
    pub related_service: Option<i32>,
    pub related_order: Option<i32>,
    pub related_booking: Option<i32>,
    pub subject: String,
    pub description: String,
    pub admin_response: Option<String>,
    pub assigned_admin_id: Option<i32>,
    pub is_resolved: bool,
    pub is_urgent: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<complaint::Model> for ComplaintResponse {
    fn from(model: complaint::Model) -> Self {
        Self {
            is_resolved: model.is_resolved(),
            is_urgent: model.is_urgent(),
            id: model.id,
            complainant_id: model.complainant_id,
            complaint_type: model.complaint_type.to_value(),
            priority: model.priority.to_value(),
            status: model.status.to_value(),
            related_service: model.related_service_id,
            related_order: model.related_order_id,
            related_booking: model.related_booking_id,
            subject: model.subject,
            description: model.description,
            admin_response: model.admin_response,
            assigned_admin_id: model.assigned_admin_id,
            resolved_at: model.resolved_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ComplaintQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub complaint_type: Option<String>,
}

async fn ensure_exists<E: EntityTrait>(
    db: &DatabaseConnection,
    id: Option<i32>,
    field: &str,
    label: &str,
) -> Result<(), AppError>
where
    <E::PrimaryKey as sea_orm::PrimaryKeyTrait>::ValueType: From<i32>,
{
    if let Some(id) = id {
        if E::find_by_id(id).one(db).await?.is_none() {
            return Err(AppError::field(field, format!("{label} {id} does not exist.")));
        }
    }
    Ok(())
}

async fn find_complaint(db: &DatabaseConnection, complaint_id: i32) -> Result<complaint::Model, AppError> {
    complaint::Entity::find_by_id(complaint_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Complaint"))
}

/// File a complaint
#[utoipa::path(
    post,
    path = "/api/v1/complaints",
    tag = "complaints",
    request_body = CreateComplaintRequest,
    responses(
        (status = 201, description = "Complaint submitted successfully", body = ApiResponse<ComplaintResponse>),
        (status = 400, description = "Missing related entity or invalid data", body = ErrorResponse),
        (status = 403, description = "Only students can file complaints", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn create_complaint(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<CreateComplaintRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ComplaintResponse>>), AppError> {
    trace!("Entering create_complaint function");
    ensure_student(&caller, "file complaints")?;
    request.validate()?;
    let complaint_type: ComplaintType = parse_enum("complaint_type", &request.complaint_type)?;
    let priority = parse_optional_enum::<Priority>("priority", request.priority.as_deref())?.unwrap_or(Priority::Medium);
    if let Some((field, message)) =
        missing_related_entity(complaint_type, request.related_service, request.related_order, request.related_booking)
    {
        return Err(AppError::field(field, message));
    }
    ensure_exists::<service::Entity>(&state.db, request.related_service, "related_service", "Service").await?;
    ensure_exists::<order::Entity>(&state.db, request.related_order, "related_order", "Order").await?;
    ensure_exists::<booking::Entity>(&state.db, request.related_booking, "related_booking", "Booking").await?;

    let now = Utc::now();
    let created = complaint::ActiveModel {
        complainant_id: Set(caller.id),
        complaint_type: Set(complaint_type),
        related_service_id: Set(request.related_service),
        related_order_id: Set(request.related_order),
        related_booking_id: Set(request.related_booking),
        subject: Set(request.subject),
        description: Set(request.description),
        status: Set(ComplaintStatus::Pending),
        priority: Set(priority),
        admin_response: Set(None),
        resolved_at: Set(None),
        assigned_admin_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!("Complaint {} filed ({})", created.id, created.complaint_type.to_value());

    let admins: Vec<i32> = user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::UserType.eq(user::UserType::Admin))
        .filter(user::Column::IsActive.eq(true))
        .into_tuple()
        .all(&state.db)
        .await?;
    debug!("Alerting {} admins", admins.len());
    let alert_priority = if created.is_urgent() { Priority::Urgent } else { Priority::High };
    for admin_id in admins {
        notifier::notify(
            &state.db,
            state.hub.as_ref(),
            NewNotification::new(
                admin_id,
                NotificationType::ComplaintReceived,
                format!("New Complaint: {}", created.subject),
                format!("{} filed a {} complaint.", caller.full_name(), created.complaint_type.to_value()),
            )
            .priority(alert_priority)
            .related_object("complaint", created.id)
            .metadata(json!({ "complaint_type": created.complaint_type.to_value() })),
        )
        .await;
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ComplaintResponse::from(created), "Complaint submitted successfully")),
    ))
}

/// List complaints: admins see all, everyone else their own
#[utoipa::path(
    get,
    path = "/api/v1/complaints",
    tag = "complaints",
    params(ComplaintQuery),
    responses(
        (status = 200, description = "Complaints retrieved successfully", body = ApiResponse<Vec<ComplaintResponse>>),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_complaints(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Valid(Query(query)): Valid<Query<ComplaintQuery>>,
) -> Result<Json<ApiResponse<Vec<ComplaintResponse>>>, AppError> {
    let (page, limit) = page_window(query.page, query.limit, 20);
    let mut finder = complaint::Entity::find();
    if !caller.is_admin() {
        finder = finder.filter(complaint::Column::ComplainantId.eq(caller.id));
    }
    if let Some(status) = parse_optional_enum::<ComplaintStatus>("status", query.status.as_deref())? {
        finder = finder.filter(complaint::Column::Status.eq(status));
    }
    if let Some(kind) = parse_optional_enum::<ComplaintType>("complaint_type", query.complaint_type.as_deref())? {
        finder = finder.filter(complaint::Column::ComplaintType.eq(kind));
    }
    let complaints = finder
        .order_by_desc(complaint::Column::CreatedAt)
        .order_by_desc(complaint::Column::Id)
        .paginate(&state.db, limit)
        .fetch_page(page)
        .await?;
    Ok(Json(ApiResponse::ok(
        complaints.into_iter().map(ComplaintResponse::from).collect(),
        "Complaints retrieved successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/complaints/{complaint_id}",
    tag = "complaints",
    params(("complaint_id" = i32, Path, description = "Complaint ID")),
    responses(
        (status = 200, description = "Complaint retrieved successfully", body = ApiResponse<ComplaintResponse>),
        (status = 403, description = "Not the complainant or an admin", body = ErrorResponse),
        (status = 404, description = "Complaint not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn get_complaint(
    Path(complaint_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<ComplaintResponse>>, AppError> {
    let found = find_complaint(&state.db, complaint_id).await?;
    if found.complainant_id != caller.id && !caller.is_admin() {
        return Err(AppError::forbidden("You can only view your own complaints."));
    }
    Ok(Json(ApiResponse::ok(ComplaintResponse::from(found), "Complaint retrieved successfully")))
}

/// Triage a complaint (admin only)
#[utoipa::path(
    put,
    path = "/api/v1/complaints/{complaint_id}",
    tag = "complaints",
    params(("complaint_id" = i32, Path, description = "Complaint ID")),
    request_body = UpdateComplaintRequest,
    responses(
        (status = 200, description = "Complaint updated successfully", body = ApiResponse<ComplaintResponse>),
        (status = 400, description = "Invalid status, priority or assignee", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "Complaint not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_complaint(
    Path(complaint_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdateComplaintRequest>,
) -> Result<Json<ApiResponse<ComplaintResponse>>, AppError> {
    ensure_admin(&caller)?;
    let found = find_complaint(&state.db, complaint_id).await?;
    let status = parse_optional_enum::<ComplaintStatus>("status", request.status.as_deref())?;
    let priority = parse_optional_enum::<Priority>("priority", request.priority.as_deref())?;
    if let Some(admin_id) = request.assigned_admin_id {
        let assignee = user::Entity::find_by_id(admin_id).one(&state.db).await?;
        if !assignee.as_ref().is_some_and(user::Model::is_admin) {
            return Err(AppError::field("assigned_admin_id", "Complaints can only be assigned to admins."));
        }
    }

    let now = Utc::now();
    let mut active: complaint::ActiveModel = found.into();
    if let Some(status) = status {
        active.status = Set(status);
        if status == ComplaintStatus::Resolved {
            active.resolved_at = Set(Some(now));
        }
    }
    if let Some(priority) = priority {
        active.priority = Set(priority);
    }
    if request.assigned_admin_id.is_some() {
        active.assigned_admin_id = Set(request.assigned_admin_id);
    }
    if request.admin_response.is_some() {
        active.admin_response = Set(request.admin_response);
    }
    active.updated_at = Set(now);
    let updated = active.update(&state.db).await?;
    info!("Complaint {} updated to {}", updated.id, updated.status.to_value());

    let mut message = format!("Your complaint \"{}\" is now {}.", updated.subject, updated.status.to_value().replace('_', " "));
    if let Some(response) = &updated.admin_response {
        message.push_str(&format!(" Response: {response}"));
    }
    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(updated.complainant_id, NotificationType::General, "Complaint Update", message)
            .related_object("complaint", updated.id),
    )
    .await;

    Ok(Json(ApiResponse::ok(ComplaintResponse::from(updated), "Complaint updated successfully")))
}
