use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use compute::{notifier, ratings, NewNotification};
use model::entities::notification::NotificationType;
use model::entities::review::{self, MAX_RATING, MIN_RATING};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::auth::{ensure_student, CurrentUser};
use crate::errors::AppError;
use crate::handlers::services::find_service;
use crate::schemas::{ApiResponse, AppState, StatusMessage};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateReviewRequest {
    /// 1 to 5 stars
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    pub service_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<review::Model> for ReviewResponse {
    fn from(model: review::Model) -> Self {
        Self {
            id: model.id,
            service_id: model.service_id,
            user_id: model.user_id,
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn check_rating(rating: i32) -> Result<(), AppError> {
    if !review::is_valid_rating(rating) {
        return Err(AppError::field(
            "rating",
            format!("Rating must be between {MIN_RATING} and {MAX_RATING}."),
        ));
    }
    Ok(())
}

async fn find_review(state: &AppState, review_id: i32) -> Result<review::Model, AppError> {
    review::Entity::find_by_id(review_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))
}

/// Review a service
#[utoipa::path(
    post,
    path = "/api/v1/services/{service_id}/reviews",
    tag = "reviews",
    params(("service_id" = i32, Path, description = "Service ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid rating or duplicate review", body = ErrorResponse),
        (status = 403, description = "Only students can review", body = ErrorResponse),
        (status = 404, description = "Service not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn create_review(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReviewResponse>>), AppError> {
    ensure_student(&caller, "review services")?;
    check_rating(request.rating)?;
    let listing = find_service(&state.db, service_id).await?;

    let existing = review::Entity::find()
        .filter(review::Column::ServiceId.eq(listing.id))
        .filter(review::Column::UserId.eq(caller.id))
        .count(&state.db)
        .await?;
    if existing > 0 {
        return Err(AppError::bad_request("You have already reviewed this service."));
    }

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let created = review::ActiveModel {
        service_id: Set(listing.id),
        user_id: Set(caller.id),
        rating: Set(request.rating),
        comment: Set(request.comment),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let rated = ratings::recompute_service_rating(&txn, listing.id).await?;
    txn.commit().await?;
    info!(
        "Review {} added to service {}; rating now {:?} over {}",
        created.id, listing.id, rated.rating, rated.total_ratings
    );

    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            listing.vendor_id,
            NotificationType::ReviewReceived,
            format!("New Review for {}", listing.service_name),
            format!("{} rated {} {} stars.", caller.full_name(), listing.service_name, created.rating),
        )
        .related_service(listing.id)
        .related_object("review", created.id)
        .metadata(json!({ "rating": created.rating })),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ReviewResponse::from(created), "Review created successfully")),
    ))
}

/// List a service's reviews, newest first
#[utoipa::path(
    get,
    path = "/api/v1/services/{service_id}/reviews",
    tag = "reviews",
    params(("service_id" = i32, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Reviews retrieved successfully", body = ApiResponse<Vec<ReviewResponse>>),
        (status = 404, description = "Service not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_service_reviews(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ReviewResponse>>>, AppError> {
    let listing = find_service(&state.db, service_id).await?;
    let reviews = listing
        .find_related(review::Entity)
        .order_by_desc(review::Column::CreatedAt)
        .all(&state.db)
        .await?;
    debug!("Retrieved {} reviews for service {}", reviews.len(), service_id);
    Ok(Json(ApiResponse::ok(
        reviews.into_iter().map(ReviewResponse::from).collect(),
        "Reviews retrieved successfully",
    )))
}

/// The caller's reviews
#[utoipa::path(
    get,
    path = "/api/v1/reviews/my",
    tag = "reviews",
    responses(
        (status = 200, description = "Reviews retrieved successfully", body = ApiResponse<Vec<ReviewResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn my_reviews(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<Vec<ReviewResponse>>>, AppError> {
    let reviews = review::Entity::find()
        .filter(review::Column::UserId.eq(caller.id))
        .order_by_desc(review::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(ApiResponse::ok(
        reviews.into_iter().map(ReviewResponse::from).collect(),
        "Reviews retrieved successfully",
    )))
}

/// Update a review (author only)
#[utoipa::path(
    put,
    path = "/api/v1/reviews/{review_id}",
    tag = "reviews",
    params(("review_id" = i32, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid rating", body = ErrorResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_review(
    Path(review_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdateReviewRequest>,
) -> Result<Json<ApiResponse<ReviewResponse>>, AppError> {
    let existing = find_review(&state, review_id).await?;
    if existing.user_id != caller.id {
        warn!("User {} tried to edit review {}", caller.id, review_id);
        return Err(AppError::forbidden("You can only edit your own reviews."));
    }
    if let Some(rating) = request.rating {
        check_rating(rating)?;
    }

    let service_id = existing.service_id;
    let txn = state.db.begin().await?;
    let mut active: review::ActiveModel = existing.into();
    if let Some(rating) = request.rating {
        active.rating = Set(rating);
    }
    if request.comment.is_some() {
        active.comment = Set(request.comment);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    ratings::recompute_service_rating(&txn, service_id).await?;
    txn.commit().await?;

    info!("Review {} updated", review_id);
    Ok(Json(ApiResponse::ok(ReviewResponse::from(updated), "Review updated successfully")))
}

/// Delete a review (author or admin)
#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{review_id}",
    tag = "reviews",
    params(("review_id" = i32, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review deleted successfully", body = ApiResponse<StatusMessage>),
        (status = 403, description = "Not the author or an admin", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn delete_review(
    Path(review_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<StatusMessage>>, AppError> {
    let existing = find_review(&state, review_id).await?;
    if existing.user_id != caller.id && !caller.is_admin() {
        return Err(AppError::forbidden("You can only delete your own reviews."));
    }

    let service_id = existing.service_id;
    let txn = state.db.begin().await?;
    existing.delete(&txn).await?;
    ratings::recompute_service_rating(&txn, service_id).await?;
    txn.commit().await?;

    info!("Review {} deleted by user {}", review_id, caller.id);
    Ok(Json(ApiResponse::ok(StatusMessage::new("Review deleted."), "Review deleted successfully")))
}
