use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::{notifier, NewNotification};
use model::entities::notification::{NotificationType, Priority};
use model::entities::service::ServiceCategory;
use model::entities::user::UserType;
use model::entities::vendor_application::{self, ApplicationStatus};
use model::entities::{user, vendor_profile};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::{ensure_admin, ensure_student, CurrentUser};
use crate::errors::AppError;
use crate::helpers::converters::{page_window, parse_enum, parse_optional_enum};
use crate::schemas::{ApiResponse, AppState};

/// Request body for applying to become a vendor
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct SubmitApplicationRequest {
    pub business_name: String,
    pub business_description: String,
    /// Service category, e.g. `food` or `laundry`
    pub category: String,
    pub address: String,
    pub phone: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(url(message = "Enter a valid URL."))]
    pub website: Option<String>,
    pub experience: Option<String>,
    pub reason: Option<String>,
}

/// Optional reviewer notes for approve/reject
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ReviewApplicationRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VendorApplicationResponse {
    pub id: i32,
    pub applicant_id: i32,
    pub business_name: String,
    pub business_description: String,
    pub category: String,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub experience: Option<String>,
    pub reason: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub reviewed_by: Option<i32>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<vendor_application::Model> for VendorApplicationResponse {
    fn from(model: vendor_application::Model) -> Self {
        Self {
            id: model.id,
            applicant_id: model.applicant_id,
            business_name: model.business_name,
            business_description: model.business_description,
            category: model.category.to_value(),
            address: model.address,
            phone: model.phone,
            email: model.email,
            website: model.website,
            experience: model.experience,
            reason: model.reason,
            status: model.status.to_value(),
            notes: model.notes,
            reviewed_by: model.reviewed_by,
            submitted_at: model.submitted_at,
            reviewed_at: model.reviewed_at,
        }
    }
}

/// Query parameters for listing applications
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ApplicationQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Filter by status: pending, approved, rejected
    pub status: Option<String>,
}

/// Submit a vendor application
#[utoipa::path(
    post,
    path = "/api/v1/vendor-applications",
    tag = "vendor-applications",
    request_body = SubmitApplicationRequest,
    responses(
        (status = 201, description = "Application submitted successfully", body = ApiResponse<VendorApplicationResponse>),
        (status = 400, description = "Invalid application or already applied", body = ErrorResponse),
        (status = 403, description = "Only students can apply", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn submit_application(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<VendorApplicationResponse>>), AppError> {
    trace!("Entering submit_application function");
    ensure_student(&caller, "apply to become vendors")?;
    request.validate()?;

    let problems = vendor_application::validate_application_text(
        &request.business_name,
        &request.business_description,
        &request.address,
    );
    if let Some((field, message)) = problems.first() {
        return Err(AppError::field(field, *message));
    }
    let category: ServiceCategory = parse_enum("category", &request.category)?;

    let existing = vendor_application::Entity::find()
        .filter(vendor_application::Column::ApplicantId.eq(caller.id))
        .count(&state.db)
        .await?;
    if existing > 0 {
        warn!("User {} already has a vendor application", caller.id);
        return Err(AppError::bad_request("You have already submitted a vendor application."));
    }

    let application = vendor_application::ActiveModel {
        applicant_id: Set(caller.id),
        business_name: Set(request.business_name.trim().to_string()),
        business_description: Set(request.business_description.trim().to_string()),
        category: Set(category),
        address: Set(request.address.trim().to_string()),
        phone: Set(request.phone),
        email: Set(request.email),
        website: Set(request.website),
        experience: Set(request.experience),
        reason: Set(request.reason),
        status: Set(ApplicationStatus::Pending),
        notes: Set(None),
        reviewed_by: Set(None),
        submitted_at: Set(Utc::now()),
        reviewed_at: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Vendor application {} submitted by user {}", application.id, caller.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            VendorApplicationResponse::from(application),
            "Application submitted successfully",
        )),
    ))
}

/// Get the caller's own application
#[utoipa::path(
    get,
    path = "/api/v1/vendor-applications/my",
    tag = "vendor-applications",
    responses(
        (status = 200, description = "Application retrieved successfully", body = ApiResponse<VendorApplicationResponse>),
        (status = 404, description = "No application submitted", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn my_application(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<VendorApplicationResponse>>, AppError> {
    let application = vendor_application::Entity::find()
        .filter(vendor_application::Column::ApplicantId.eq(caller.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Vendor application"))?;
    Ok(Json(ApiResponse::ok(
        VendorApplicationResponse::from(application),
        "Application retrieved successfully",
    )))
}

/// List vendor applications (admin)
#[utoipa::path(
    get,
    path = "/api/v1/vendor-applications",
    tag = "vendor-applications",
    params(ApplicationQuery),
    responses(
        (status = 200, description = "Applications retrieved successfully", body = ApiResponse<Vec<VendorApplicationResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_applications(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Valid(Query(query)): Valid<Query<ApplicationQuery>>,
) -> Result<Json<ApiResponse<Vec<VendorApplicationResponse>>>, AppError> {
    ensure_admin(&caller)?;
    let (page, limit) = page_window(query.page, query.limit, 20);

    let mut finder = vendor_application::Entity::find();
    if let Some(status) = parse_optional_enum::<ApplicationStatus>("status", query.status.as_deref())? {
        finder = finder.filter(vendor_application::Column::Status.eq(status));
    }
    let applications = finder
        .order_by_desc(vendor_application::Column::SubmittedAt)
        .order_by_desc(vendor_application::Column::Id)
        .paginate(&state.db, limit)
        .fetch_page(page)
        .await?;

    debug!("Retrieved {} vendor applications", applications.len());
    Ok(Json(ApiResponse::ok(
        applications.into_iter().map(VendorApplicationResponse::from).collect(),
        "Applications retrieved successfully",
    )))
}

async fn pending_application(state: &AppState, application_id: i32) -> Result<vendor_application::Model, AppError> {
    let application = vendor_application::Entity::find_by_id(application_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Vendor application"))?;
    if !application.is_pending() {
        return Err(AppError::field(
            "status",
            format!("Application has already been {}.", application.status.to_value()),
        ));
    }
    Ok(application)
}

/// Approve a pending application
///
/// Promotes the applicant to vendor and creates their vendor profile.
#[utoipa::path(
    post,
    path = "/api/v1/vendor-applications/{application_id}/approve",
    tag = "vendor-applications",
    params(("application_id" = i32, Path, description = "Application ID")),
    request_body = Option<ReviewApplicationRequest>,
    responses(
        (status = 200, description = "Application approved", body = ApiResponse<VendorApplicationResponse>),
        (status = 400, description = "Application is not pending", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(admin_id = caller.id))]
pub async fn approve_application(
    Path(application_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    request: Option<Json<ReviewApplicationRequest>>,
) -> Result<Json<ApiResponse<VendorApplicationResponse>>, AppError> {
    ensure_admin(&caller)?;
    let application = pending_application(&state, application_id).await?;
    let notes = request.and_then(|Json(body)| body.notes);
    let now = Utc::now();

    let txn = state.db.begin().await?;
    let mut active: vendor_application::ActiveModel = application.into();
    active.status = Set(ApplicationStatus::Approved);
    active.reviewed_by = Set(Some(caller.id));
    active.reviewed_at = Set(Some(now));
    if notes.is_some() {
        active.notes = Set(notes);
    }
    let application = active.update(&txn).await?;

    let applicant = user::Entity::find_by_id(application.applicant_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Applicant"))?;
    let mut promoted: user::ActiveModel = applicant.into();
    promoted.user_type = Set(UserType::Vendor);
    promoted.update(&txn).await?;

    let existing_profile = vendor_profile::Entity::find()
        .filter(vendor_profile::Column::UserId.eq(application.applicant_id))
        .one(&txn)
        .await?;
    if existing_profile.is_none() {
        vendor_profile::ActiveModel {
            user_id: Set(application.applicant_id),
            business_name: Set(application.business_name.clone()),
            description: Set(Some(application.business_description.clone())),
            business_hours: Set(None),
            address: Set(Some(application.address.clone())),
            phone: Set(application.phone.clone()),
            email: Set(application.email.clone()),
            website: Set(application.website.clone()),
            is_verified: Set(false),
            is_active: Set(true),
            mtn_momo_number: Set(None),
            vodafone_cash_number: Set(None),
            airtel_money_number: Set(None),
            telecel_cash_number: Set(None),
            preferred_payment_method: Set(vendor_profile::PreferredPaymentMethod::MtnMomo),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;
    info!("Vendor application {} approved by admin {}", application.id, caller.id);

    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            application.applicant_id,
            NotificationType::VendorApplication,
            "Vendor Application Approved",
            format!(
                "Congratulations! Your application for {} has been approved. You can now list services.",
                application.business_name
            ),
        )
        .priority(Priority::High)
        .related_object("vendor_application", application.id)
        .metadata(json!({ "status": "approved" })),
    )
    .await;

    Ok(Json(ApiResponse::ok(VendorApplicationResponse::from(application), "Application approved")))
}

/// Reject a pending application
#[utoipa::path(
    post,
    path = "/api/v1/vendor-applications/{application_id}/reject",
    tag = "vendor-applications",
    params(("application_id" = i32, Path, description = "Application ID")),
    request_body = Option<ReviewApplicationRequest>,
    responses(
        (status = 200, description = "Application rejected", body = ApiResponse<VendorApplicationResponse>),
        (status = 400, description = "Application is not pending", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(admin_id = caller.id))]
pub async fn reject_application(
    Path(application_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    request: Option<Json<ReviewApplicationRequest>>,
) -> Result<Json<ApiResponse<VendorApplicationResponse>>, AppError> {
    ensure_admin(&caller)?;
    let application = pending_application(&state, application_id).await?;
    let notes = request.and_then(|Json(body)| body.notes);

    let mut active: vendor_application::ActiveModel = application.into();
    active.status = Set(ApplicationStatus::Rejected);
    active.reviewed_by = Set(Some(caller.id));
    active.reviewed_at = Set(Some(Utc::now()));
    active.notes = Set(notes.clone());
    let application = active.update(&state.db).await?;
    info!("Vendor application {} rejected by admin {}", application.id, caller.id);

    let mut message = format!("Your vendor application for {} was not approved.", application.business_name);
    if let Some(notes) = notes.as_deref() {
        message.push_str(&format!(" Notes: {notes}"));
    }
    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            application.applicant_id,
            NotificationType::VendorApplication,
            "Vendor Application Update",
            message,
        )
        .related_object("vendor_application", application.id)
        .metadata(json!({ "status": "rejected" })),
    )
    .await;

    Ok(Json(ApiResponse::ok(VendorApplicationResponse::from(application), "Application rejected")))
}
