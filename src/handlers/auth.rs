use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use model::entities::{blacklisted_token, user};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{self, CurrentUser, TokenType};
use crate::errors::AppError;
use crate::handlers::users::UserResponse;
use crate::helpers::converters::parse_enum;
use crate::schemas::{ApiResponse, AppState, StatusMessage};

/// Request body for registering an account
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150, message = "Username must be between 3 and 150 characters."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: String,
    pub password_confirm: String,
    /// One of `student`, `vendor`, `admin`
    pub user_type: String,
    /// Digits only, at least 10 of them
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(url(message = "Enter a valid URL."))]
    pub profile_picture: Option<String>,
}

/// Request body for logging in
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    /// Username or e-mail address
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserResponse,
}

fn valid_phone_number(phone: &str) -> bool {
    phone.len() >= 10 && phone.chars().all(|c| c.is_ascii_digit())
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid registration data", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), AppError> {
    trace!("Entering register function");
    request.validate()?;

    if request.password != request.password_confirm {
        return Err(AppError::field("password_confirm", "Passwords don't match."));
    }
    let user_type: user::UserType = parse_enum("user_type", &request.user_type)?;
    if !valid_phone_number(&request.phone_number) {
        return Err(AppError::field("phone_number", "Phone number must contain at least 10 digits."));
    }

    let password_hash = auth::hash_password(&request.password)?;
    let account = user::ActiveModel {
        username: Set(request.username.trim().to_string()),
        email: Set(request.email.trim().to_lowercase()),
        phone_number: Set(Some(request.phone_number)),
        first_name: Set(request.first_name),
        last_name: Set(request.last_name),
        profile_picture: Set(request.profile_picture),
        user_type: Set(user_type),
        password_hash: Set(password_hash),
        is_active: Set(true),
        date_joined: Set(Utc::now()),
        last_login: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("User registered with ID: {}, type: {:?}", account.id, account.user_type);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(account), "User registered successfully")),
    ))
}

/// Obtain an access/refresh token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(login = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    trace!("Entering login function");
    let login = request.username.trim();
    let invalid = || AppError::bad_request("Invalid username/email or password.");

    let account = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(login))
                .add(user::Column::Email.eq(login.to_lowercase())),
        )
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            debug!("No account matches the login");
            invalid()
        })?;

    if !account.is_active || !auth::verify_password(&request.password, &account.password_hash) {
        warn!("Rejected login for user ID: {}", account.id);
        return Err(invalid());
    }

    let tokens = auth::issue_tokens(&state.settings.jwt, &account)?;
    let mut active: user::ActiveModel = account.into();
    active.last_login = Set(Some(Utc::now()));
    let account = active.update(&state.db).await?;

    info!("User {} logged in", account.id);
    Ok(Json(ApiResponse::ok(
        LoginResponse { access: tokens.access, refresh: tokens.refresh, user: UserResponse::from(account) },
        "Login successful",
    )))
}

/// Records `token` as revoked. Returns `false` when another request revoked
/// it first.
async fn record_blacklisted(db: &DatabaseConnection, token: &str, user_id: i32) -> Result<bool, AppError> {
    let inserted = blacklisted_token::ActiveModel {
        token: Set(token.to_string()),
        user_id: Set(user_id),
        blacklisted_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await;
    match inserted {
        Ok(_) => Ok(true),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            debug!("Token for user {} was blacklisted concurrently", user_id);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

async fn blacklist(state: &AppState, token: &str, user_id: i32) -> Result<bool, AppError> {
    if auth::is_blacklisted(&state.db, token).await? {
        debug!("Token for user {} already blacklisted", user_id);
        return Ok(false);
    }
    record_blacklisted(&state.db, token, user_id).await
}

/// Rotate a refresh token
///
/// The presented refresh token is blacklisted and cannot be used again.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Refresh token invalid, expired or revoked", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, AppError> {
    trace!("Entering refresh_token function");
    let claims = auth::decode_token(&state.settings.jwt, &request.refresh, TokenType::Refresh)?;
    if auth::is_blacklisted(&state.db, &request.refresh).await? {
        warn!("Blacklisted refresh token presented for user {}", claims.sub);
        return Err(AppError::unauthorized("Token is blacklisted."));
    }

    let account = user::Entity::find_by_id(claims.user_id()?)
        .one(&state.db)
        .await?
        .filter(|account| account.is_active)
        .ok_or_else(|| AppError::unauthorized("User not found."))?;

    if !blacklist(&state, &request.refresh, account.id).await? {
        warn!("Refresh token for user {} was rotated by a concurrent request", account.id);
        return Err(AppError::unauthorized("Token is blacklisted."));
    }
    let tokens = auth::issue_tokens(&state.settings.jwt, &account)?;
    info!("Rotated refresh token for user {}", account.id);
    Ok(Json(ApiResponse::ok(
        TokenResponse { access: tokens.access, refresh: tokens.refresh },
        "Token refreshed successfully",
    )))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Logged out", body = ApiResponse<StatusMessage>),
        (status = 401, description = "Not authenticated or token invalid", body = ErrorResponse),
        (status = 403, description = "Token belongs to another user", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<StatusMessage>>, AppError> {
    let claims = auth::decode_token(&state.settings.jwt, &request.refresh, TokenType::Refresh)?;
    if claims.user_id()? != caller.id {
        return Err(AppError::forbidden("You can only log out your own sessions."));
    }
    blacklist(&state, &request.refresh, caller.id).await?;
    info!("User {} logged out", caller.id);
    Ok(Json(ApiResponse::ok(StatusMessage::new("Successfully logged out."), "Logged out successfully")))
}

#[cfg(test)]
mod tests {
    use super::{record_blacklisted, valid_phone_number};
    use crate::test_utils::test_utils::setup_test_db;
    use chrono::Utc;
    use model::entities::user::{self, UserType};
    use sea_orm::{ActiveModelTrait, Set};

    #[tokio::test]
    async fn second_revocation_of_same_token_reports_lost_race() {
        let db = setup_test_db().await;
        let now = Utc::now();
        let account = user::ActiveModel {
            username: Set("kojo".to_string()),
            email: Set("kojo@campus.test".to_string()),
            password_hash: Set("hash".to_string()),
            user_type: Set(UserType::Student),
            phone_number: Set(Some("0240000001".to_string())),
            is_active: Set(true),
            date_joined: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        assert!(record_blacklisted(&db, "refresh-token", account.id).await.unwrap());
        assert!(!record_blacklisted(&db, "refresh-token", account.id).await.unwrap());
    }

    #[test]
    fn phone_numbers_need_ten_digits() {
        assert!(valid_phone_number("0241234567"));
        assert!(!valid_phone_number("024123456"));
        assert!(!valid_phone_number("+233241234567"));
    }
}
