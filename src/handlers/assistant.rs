use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use common::AssistantAnalytics;
use compute::assistant;
use model::entities::{ai_conversation, ai_message, ai_service_recommendation, ai_sentiment_analysis, service, user};
use sea_orm::{ActiveEnum, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{ensure_admin, CurrentUser};
use crate::errors::AppError;
use crate::schemas::{ApiResponse, AppState};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters."))]
    pub message: String,
    /// Continue an existing conversation; a new one is started when absent
    pub session_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub context: Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub session_id: String,
    pub conversation_id: i32,
    pub response: String,
    pub intent: String,
    #[schema(value_type = Object)]
    pub entities: Value,
    pub confidence: f64,
    pub suggestions: Vec<String>,
    pub tokens_used: i32,
    pub response_time_ms: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub id: i32,
    pub session_id: String,
    pub title: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ai_conversation::Model> for ConversationResponse {
    fn from(model: ai_conversation::Model) -> Self {
        Self {
            id: model.id,
            session_id: model.session_id,
            title: model.title,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: i32,
    pub message_type: String,
    pub content: String,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub tokens_used: i32,
    pub response_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ai_message::Model> for MessageResponse {
    fn from(model: ai_message::Model) -> Self {
        Self {
            id: model.id,
            message_type: model.message_type.to_value(),
            content: model.content,
            metadata: model.metadata,
            tokens_used: model.tokens_used,
            response_time_ms: model.response_time_ms,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearConversationResponse {
    pub session_id: String,
    pub deleted_messages: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecommendationResponse {
    pub id: i32,
    pub service_id: i32,
    pub service_name: Option<String>,
    pub confidence_score: f64,
    pub reason: String,
    pub is_viewed: bool,
    pub is_clicked: bool,
    pub created_at: DateTime<Utc>,
}

impl RecommendationResponse {
    fn build(model: ai_service_recommendation::Model, listing: Option<service::Model>) -> Self {
        Self {
            id: model.id,
            service_id: model.service_id,
            service_name: listing.map(|s| s.service_name),
            confidence_score: model.confidence_score,
            reason: model.reason,
            is_viewed: model.is_viewed,
            is_clicked: model.is_clicked,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct SentimentRequest {
    #[validate(length(min = 1, max = 5000, message = "Text must be between 1 and 5000 characters."))]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SentimentResponse {
    pub id: i32,
    pub sentiment_score: f64,
    pub sentiment_label: String,
    pub confidence: f64,
    #[schema(value_type = Vec<String>)]
    pub keywords: Value,
}

impl From<ai_sentiment_analysis::Model> for SentimentResponse {
    fn from(model: ai_sentiment_analysis::Model) -> Self {
        Self {
            id: model.id,
            sentiment_score: model.sentiment_score,
            sentiment_label: model.sentiment_label,
            confidence: model.confidence,
            keywords: model.keywords,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct GenerateRecommendationsRequest {
    pub user_id: i32,
}

/// Send a message to the campus assistant
#[utoipa::path(
    post,
    path = "/api/v1/assistant/chat",
    tag = "assistant",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant replied", body = ApiResponse<ChatResponse>),
        (status = 400, description = "Empty or oversized message", body = ErrorResponse),
        (status = 404, description = "Session belongs to another user", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn chat(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ApiResponse<ChatResponse>>, AppError> {
    request.validate()?;
    let turn = assistant::chat(&state.db, &caller, request.session_id, &request.message, request.context).await?;
    debug!(intent = turn.reply.intent.as_str(), "assistant replied in {}ms", turn.response_time_ms);

    let response = ChatResponse {
        session_id: turn.session_id,
        conversation_id: turn.conversation.id,
        response: turn.reply.response,
        intent: turn.reply.intent.as_str().to_string(),
        entities: turn.reply.entities,
        confidence: turn.reply.confidence,
        suggestions: turn.reply.suggestions.into_iter().map(String::from).collect(),
        tokens_used: turn.reply.tokens_used,
        response_time_ms: turn.response_time_ms,
    };
    Ok(Json(ApiResponse::ok(response, "Assistant replied")))
}

/// The caller's active conversations, most recent first
#[utoipa::path(
    get,
    path = "/api/v1/assistant/conversations",
    tag = "assistant",
    responses(
        (status = 200, description = "Conversations retrieved successfully", body = ApiResponse<Vec<ConversationResponse>>)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<Vec<ConversationResponse>>>, AppError> {
    let conversations = ai_conversation::Entity::find()
        .filter(ai_conversation::Column::UserId.eq(caller.id))
        .filter(ai_conversation::Column::IsActive.eq(true))
        .order_by_desc(ai_conversation::Column::UpdatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(ApiResponse::ok(
        conversations.into_iter().map(ConversationResponse::from).collect(),
        "Conversations retrieved successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/assistant/conversations/{session_id}/messages",
    tag = "assistant",
    params(("session_id" = String, Path, description = "Conversation session id")),
    responses(
        (status = 200, description = "Messages retrieved successfully", body = ApiResponse<Vec<MessageResponse>>),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn conversation_messages(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<Vec<MessageResponse>>>, AppError> {
    let conversation = assistant::find_conversation(&state.db, caller.id, &session_id).await?;
    let messages = assistant::conversation_messages(&state.db, &conversation).await?;
    Ok(Json(ApiResponse::ok(
        messages.into_iter().map(MessageResponse::from).collect(),
        "Messages retrieved successfully",
    )))
}

/// Delete a conversation's messages and close it
#[utoipa::path(
    post,
    path = "/api/v1/assistant/conversations/{session_id}/clear",
    tag = "assistant",
    params(("session_id" = String, Path, description = "Conversation session id")),
    responses(
        (status = 200, description = "Conversation cleared", body = ApiResponse<ClearConversationResponse>),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn clear_conversation(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<ClearConversationResponse>>, AppError> {
    let deleted_messages = assistant::clear_conversation(&state.db, caller.id, &session_id).await?;
    info!("Conversation {} cleared ({} messages)", session_id, deleted_messages);
    Ok(Json(ApiResponse::ok(
        ClearConversationResponse { session_id, deleted_messages },
        "Conversation cleared",
    )))
}

/// Unviewed service suggestions for the caller
#[utoipa::path(
    get,
    path = "/api/v1/assistant/recommendations",
    tag = "assistant",
    responses(
        (status = 200, description = "Recommendations retrieved successfully", body = ApiResponse<Vec<RecommendationResponse>>)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_recommendations(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<Vec<RecommendationResponse>>>, AppError> {
    let pending = assistant::pending_recommendations(&state.db, caller.id).await?;
    Ok(Json(ApiResponse::ok(
        pending
            .into_iter()
            .map(|(recommendation, listing)| RecommendationResponse::build(recommendation, listing))
            .collect(),
        "Recommendations retrieved successfully",
    )))
}

async fn mark(
    state: &AppState,
    caller: &user::Model,
    recommendation_id: i32,
    clicked: bool,
) -> Result<RecommendationResponse, AppError> {
    let updated = assistant::mark_recommendation(&state.db, caller.id, recommendation_id, clicked).await?;
    let listing = service::Entity::find_by_id(updated.service_id).one(&state.db).await?;
    Ok(RecommendationResponse::build(updated, listing))
}

#[utoipa::path(
    post,
    path = "/api/v1/assistant/recommendations/{recommendation_id}/viewed",
    tag = "assistant",
    params(("recommendation_id" = i32, Path, description = "Recommendation ID")),
    responses(
        (status = 200, description = "Recommendation marked as viewed", body = ApiResponse<RecommendationResponse>),
        (status = 404, description = "Recommendation not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn recommendation_viewed(
    Path(recommendation_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<RecommendationResponse>>, AppError> {
    let response = mark(&state, &caller, recommendation_id, false).await?;
    Ok(Json(ApiResponse::ok(response, "Recommendation marked as viewed")))
}

#[utoipa::path(
    post,
    path = "/api/v1/assistant/recommendations/{recommendation_id}/clicked",
    tag = "assistant",
    params(("recommendation_id" = i32, Path, description = "Recommendation ID")),
    responses(
        (status = 200, description = "Recommendation marked as clicked", body = ApiResponse<RecommendationResponse>),
        (status = 404, description = "Recommendation not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn recommendation_clicked(
    Path(recommendation_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<RecommendationResponse>>, AppError> {
    let response = mark(&state, &caller, recommendation_id, true).await?;
    Ok(Json(ApiResponse::ok(response, "Recommendation marked as clicked")))
}

/// Score the sentiment of a piece of text and store the result
#[utoipa::path(
    post,
    path = "/api/v1/assistant/sentiment",
    tag = "assistant",
    request_body = SentimentRequest,
    responses(
        (status = 201, description = "Sentiment analysed", body = ApiResponse<SentimentResponse>),
        (status = 400, description = "Empty text", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn analyze_sentiment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<SentimentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SentimentResponse>>), AppError> {
    request.validate()?;
    let analysis = assistant::record_sentiment(&state.db, Some(caller.id), &request.text).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(SentimentResponse::from(analysis), "Sentiment analysed")),
    ))
}

/// Assistant usage totals (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/assistant/analytics",
    tag = "assistant",
    responses(
        (status = 200, description = "Assistant analytics retrieved successfully", body = ApiResponse<AssistantAnalytics>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn assistant_analytics(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<AssistantAnalytics>>, AppError> {
    ensure_admin(&caller)?;
    let report = assistant::assistant_analytics(&state.db).await?;
    Ok(Json(ApiResponse::ok(report, "Assistant analytics retrieved successfully")))
}

/// Refresh a user's service recommendations (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/assistant/recommendations/generate",
    tag = "assistant",
    request_body = GenerateRecommendationsRequest,
    responses(
        (status = 200, description = "Recommendations generated", body = ApiResponse<Vec<RecommendationResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id, target = request.user_id))]
pub async fn generate_recommendations(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<GenerateRecommendationsRequest>,
) -> Result<Json<ApiResponse<Vec<RecommendationResponse>>>, AppError> {
    ensure_admin(&caller)?;
    user::Entity::find_by_id(request.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let generated = assistant::generate_recommendations(&state.db, request.user_id, Utc::now()).await?;
    info!("Generated {} recommendations for user {}", generated.len(), request.user_id);

    let mut responses = Vec::with_capacity(generated.len());
    for recommendation in generated {
        let listing = service::Entity::find_by_id(recommendation.service_id).one(&state.db).await?;
        responses.push(RecommendationResponse::build(recommendation, listing));
    }
    Ok(Json(ApiResponse::ok(responses, "Recommendations generated")))
}
