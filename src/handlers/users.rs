use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user;
use sea_orm::{ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::helpers::converters::{page_window, parse_optional_enum};
use crate::schemas::{ApiResponse, AppState, StatusMessage};

/// Request body for updating the caller's profile. Username and user type
/// cannot be changed.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(url(message = "Enter a valid URL."))]
    pub profile_picture: Option<String>,
}

/// User response model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub user_type: String,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            full_name: model.full_name(),
            id: model.id,
            username: model.username,
            email: model.email,
            user_type: model.user_type.to_value(),
            phone_number: model.phone_number,
            first_name: model.first_name,
            last_name: model.last_name,
            profile_picture: model.profile_picture,
            is_active: model.is_active,
            date_joined: model.date_joined,
            last_login: model.last_login,
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct UserQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Filter by user type (admins only)
    pub user_type: Option<String>,
}

/// Get the caller's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    tag = "users",
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(caller), fields(user_id = caller.id))]
pub async fn get_profile(CurrentUser(caller): CurrentUser) -> Json<ApiResponse<UserResponse>> {
    trace!("Entering get_profile function");
    Json(ApiResponse::ok(UserResponse::from(caller), "Profile retrieved successfully"))
}

/// Update the caller's profile
#[utoipa::path(
    put,
    path = "/api/v1/users/profile",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid profile data", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    trace!("Entering update_profile function");
    request.validate()?;

    let mut active: user::ActiveModel = caller.into();
    if let Some(email) = request.email {
        active.email = Set(email.trim().to_lowercase());
    }
    if let Some(phone) = request.phone_number {
        if phone.len() < 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::field("phone_number", "Phone number must contain at least 10 digits."));
        }
        active.phone_number = Set(Some(phone));
    }
    if let Some(first_name) = request.first_name {
        active.first_name = Set(Some(first_name));
    }
    if let Some(last_name) = request.last_name {
        active.last_name = Set(Some(last_name));
    }
    if let Some(picture) = request.profile_picture {
        active.profile_picture = Set(Some(picture));
    }

    let updated = active.update(&state.db).await?;
    info!("Profile updated for user {}", updated.id);
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "Profile updated successfully")))
}

/// Delete the caller's account
#[utoipa::path(
    delete,
    path = "/api/v1/users/profile",
    tag = "users",
    responses(
        (status = 200, description = "Account deleted successfully", body = ApiResponse<StatusMessage>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<StatusMessage>>, AppError> {
    let user_id = caller.id;
    caller.delete(&state.db).await?;
    warn!("Account {} deleted by its owner", user_id);
    Ok(Json(ApiResponse::ok(StatusMessage::new("Account deleted."), "Account deleted successfully")))
}

/// List users
///
/// Admins see every account; anyone else sees only themself.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(UserQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn get_users(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Valid(Query(query)): Valid<Query<UserQuery>>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, AppError> {
    trace!("Entering get_users function");
    if !caller.is_admin() {
        debug!("Non-admin caller sees only their own account");
        return Ok(Json(ApiResponse::ok(vec![UserResponse::from(caller)], "Users retrieved successfully")));
    }

    let (page, limit) = page_window(query.page, query.limit, 20);
    let mut finder = user::Entity::find();
    if let Some(user_type) = parse_optional_enum::<user::UserType>("user_type", query.user_type.as_deref())? {
        finder = finder.filter(user::Column::UserType.eq(user_type));
    }
    let users = finder
        .order_by_asc(user::Column::Id)
        .paginate(&state.db, limit)
        .fetch_page(page)
        .await?;

    info!("Retrieved {} users", users.len());
    Ok(Json(ApiResponse::ok(
        users.into_iter().map(UserResponse::from).collect(),
        "Users retrieved successfully",
    )))
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 403, description = "Not the caller's account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), AppError> {
    if !caller.is_admin() && caller.id != user_id {
        return Err(AppError::forbidden("You can only view your own account."));
    }
    let account = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(UserResponse::from(account), "User retrieved successfully"))))
}
