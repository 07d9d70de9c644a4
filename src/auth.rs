//! Password hashing, JWT issue/verify and the `CurrentUser` extractor.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use model::entities::{blacklisted_token, user};
use rand::rngs::OsRng;
use sea_orm::{ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::errors::AppError;
use crate::schemas::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub user_type: String,
    pub token_type: TokenType,
    /// Unique per token so two tokens minted in the same second differ.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i32, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::unauthorized("Token subject is not a user id."))
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

fn mint(settings: &JwtSettings, account: &user::Model, token_type: TokenType, ttl: Duration) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: account.id.to_string(),
        username: account.username.clone(),
        user_type: account.user_type.to_value(),
        token_type,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(settings.secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))
}

pub fn issue_tokens(settings: &JwtSettings, account: &user::Model) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access: mint(settings, account, TokenType::Access, Duration::minutes(settings.access_ttl_minutes))?,
        refresh: mint(settings, account, TokenType::Refresh, Duration::days(settings.refresh_ttl_days))?,
    })
}

/// Verifies signature and expiry and checks the token is of `expected` type.
pub fn decode_token(settings: &JwtSettings, token: &str, expected: TokenType) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        debug!(error = %e, "token rejected");
        AppError::unauthorized("Token is invalid or expired.")
    })?;
    if data.claims.token_type != expected {
        return Err(AppError::unauthorized("Token has the wrong type."));
    }
    Ok(data.claims)
}

pub async fn is_blacklisted(db: &DatabaseConnection, token: &str) -> Result<bool, AppError> {
    Ok(blacklisted_token::Entity::find()
        .filter(blacklisted_token::Column::Token.eq(token))
        .count(db)
        .await?
        > 0)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves an access token to an active user.
pub async fn authenticate(state: &AppState, token: &str) -> Result<user::Model, AppError> {
    let claims = decode_token(&state.settings.jwt, token, TokenType::Access)?;
    let account = user::Entity::find_by_id(claims.user_id()?)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found."))?;
    if !account.is_active {
        return Err(AppError::unauthorized("User account is disabled."));
    }
    Ok(account)
}

/// The authenticated caller, taken from `Authorization: Bearer <access>`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Authentication credentials were not provided."))?;
        authenticate(state, token).await.map(CurrentUser)
    }
}

pub fn ensure_admin(account: &user::Model) -> Result<(), AppError> {
    if account.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("Only admins can perform this action."))
    }
}

pub fn ensure_student(account: &user::Model, action: &str) -> Result<(), AppError> {
    if account.is_student() {
        Ok(())
    } else {
        Err(AppError::forbidden(format!("Only students can {action}.")))
    }
}

pub fn ensure_vendor(account: &user::Model, action: &str) -> Result<(), AppError> {
    if account.is_vendor() {
        Ok(())
    } else {
        Err(AppError::forbidden(format!("Only vendors can {action}.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use model::entities::user::UserType;

    fn account() -> user::Model {
        user::Model {
            id: 7,
            username: "ama".into(),
            email: "ama@campus.edu".into(),
            phone_number: None,
            first_name: None,
            last_name: None,
            profile_picture: None,
            user_type: UserType::Vendor,
            password_hash: String::new(),
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn tokens_round_trip_with_their_type() {
        let settings = JwtSettings::default();
        let pair = issue_tokens(&settings, &account()).unwrap();
        assert_ne!(pair.access, pair.refresh);

        let claims = decode_token(&settings, &pair.access, TokenType::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.user_type, "vendor");
        assert!(decode_token(&settings, &pair.access, TokenType::Refresh).is_err());
        assert!(decode_token(&settings, &pair.refresh, TokenType::Refresh).is_ok());
    }

    #[test]
    fn foreign_secrets_are_rejected() {
        let pair = issue_tokens(&JwtSettings::default(), &account()).unwrap();
        let other = JwtSettings { secret: "another".into(), ..JwtSettings::default() };
        assert!(matches!(
            decode_token(&other, &pair.access, TokenType::Access),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("anything", "not-a-hash"));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
