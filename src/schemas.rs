use std::sync::Arc;

use common::{AdminDashboard, VendorAnalytics};
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::config::Settings;
use crate::realtime::NotificationHub;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for expensive read-only aggregates
    pub cache: Cache<String, CachedData>,
    pub settings: Arc<Settings>,
    /// Realtime groups for WebSocket push
    pub hub: Arc<NotificationHub>,
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    Dashboard(AdminDashboard),
    VendorAnalytics(VendorAnalytics),
    Categories(Vec<CategoryInfo>),
}

/// A service category and its display label.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryInfo {
    pub value: String,
    pub label: String,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self { data, message: message.into(), success: true }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub message: String,
    /// Field errors (`{field: [messages]}`) or `{detail}` for permission errors
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub errors: Option<Value>,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    /// Live WebSocket broadcast groups
    pub realtime_groups: usize,
}

/// Confirmation payload for endpoints that only change state.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusMessage {
    pub detail: String,
}

impl StatusMessage {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

/// Registers the JWT bearer scheme referenced by `security(("bearer_auth" = []))`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::logout,
        crate::handlers::users::get_profile,
        crate::handlers::users::update_profile,
        crate::handlers::users::delete_account,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::vendor_applications::submit_application,
        crate::handlers::vendor_applications::list_applications,
        crate::handlers::vendor_applications::my_application,
        crate::handlers::vendor_applications::approve_application,
        crate::handlers::vendor_applications::reject_application,
        crate::handlers::vendor_profiles::list_vendor_profiles,
        crate::handlers::vendor_profiles::verified_vendors,
        crate::handlers::vendor_profiles::get_vendor_profile,
        crate::handlers::vendor_profiles::my_vendor_profile,
        crate::handlers::vendor_profiles::update_my_vendor_profile,
        crate::handlers::vendor_profiles::vendor_dashboard_stats,
        crate::handlers::services::create_service,
        crate::handlers::services::list_services,
        crate::handlers::services::my_services,
        crate::handlers::services::get_service,
        crate::handlers::services::update_service,
        crate::handlers::services::delete_service,
        crate::handlers::services::update_availability,
        crate::handlers::services::list_categories,
        crate::handlers::services::top_rated_services,
        crate::handlers::services::popular_services,
        crate::handlers::services::add_service_item,
        crate::handlers::services::list_service_items,
        crate::handlers::services::update_service_item,
        crate::handlers::services::delete_service_item,
        crate::handlers::reviews::create_review,
        crate::handlers::reviews::list_service_reviews,
        crate::handlers::reviews::my_reviews,
        crate::handlers::reviews::update_review,
        crate::handlers::reviews::delete_review,
        crate::handlers::bookings::create_booking,
        crate::handlers::bookings::list_bookings,
        crate::handlers::bookings::upcoming_bookings,
        crate::handlers::bookings::get_booking,
        crate::handlers::bookings::confirm_booking,
        crate::handlers::bookings::cancel_booking,
        crate::handlers::bookings::complete_booking,
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::confirm_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::payments::create_payment,
        crate::handlers::payments::list_payments,
        crate::handlers::payments::get_payment,
        crate::handlers::payments::process_payment,
        crate::handlers::payments::initiate_momo,
        crate::handlers::payments::verify_momo,
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::notification_stats,
        crate::handlers::notifications::unread_count,
        crate::handlers::notifications::get_preferences,
        crate::handlers::notifications::update_preferences,
        crate::handlers::notifications::mark_read,
        crate::handlers::notifications::mark_unread,
        crate::handlers::notifications::delete_notification,
        crate::handlers::notifications::mark_all_read,
        crate::handlers::notifications::bulk_action,
        crate::handlers::notifications::admin_create_notification,
        crate::handlers::notifications::create_from_template,
        crate::handlers::notifications::list_templates,
        crate::handlers::notifications::create_template,
        crate::handlers::notifications::notification_analytics,
        crate::handlers::notifications::cleanup_notifications,
        crate::handlers::complaints::create_complaint,
        crate::handlers::complaints::list_complaints,
        crate::handlers::complaints::get_complaint,
        crate::handlers::complaints::update_complaint,
        crate::handlers::analytics::admin_dashboard,
        crate::handlers::analytics::vendor_analytics,
        crate::handlers::analytics::service_analytics,
        crate::handlers::assistant::chat,
        crate::handlers::assistant::list_conversations,
        crate::handlers::assistant::conversation_messages,
        crate::handlers::assistant::clear_conversation,
        crate::handlers::assistant::list_recommendations,
        crate::handlers::assistant::recommendation_viewed,
        crate::handlers::assistant::recommendation_clicked,
        crate::handlers::assistant::analyze_sentiment,
        crate::handlers::assistant::assistant_analytics,
        crate::handlers::assistant::generate_recommendations,
        crate::handlers::sockets::notifications_socket,
        crate::handlers::sockets::vendor_notifications_socket,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            StatusMessage,
            CategoryInfo,
            crate::helpers::stats::VendorDashboard,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::RefreshRequest,
            crate::handlers::auth::TokenResponse,
            crate::handlers::auth::LoginResponse,
            crate::handlers::users::UpdateProfileRequest,
            crate::handlers::users::UserResponse,
            crate::handlers::vendor_applications::SubmitApplicationRequest,
            crate::handlers::vendor_applications::ReviewApplicationRequest,
            crate::handlers::vendor_applications::VendorApplicationResponse,
            crate::handlers::vendor_profiles::MobileMoneyNumber,
            crate::handlers::vendor_profiles::VendorProfileResponse,
            crate::handlers::vendor_profiles::UpdateVendorProfileRequest,
            crate::handlers::services::CreateServiceRequest,
            crate::handlers::services::UpdateServiceRequest,
            crate::handlers::services::UpdateAvailabilityRequest,
            crate::handlers::services::CreateServiceItemRequest,
            crate::handlers::services::UpdateServiceItemRequest,
            crate::handlers::services::ServiceItemResponse,
            crate::handlers::services::ServiceResponse,
            crate::handlers::reviews::CreateReviewRequest,
            crate::handlers::reviews::UpdateReviewRequest,
            crate::handlers::reviews::ReviewResponse,
            crate::handlers::bookings::CreateBookingRequest,
            crate::handlers::bookings::BookingResponse,
            crate::handlers::orders::OrderLineRequest,
            crate::handlers::orders::CreateOrderRequest,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::handlers::orders::OrderItemResponse,
            crate::handlers::orders::OrderResponse,
            crate::handlers::payments::CreatePaymentRequest,
            crate::handlers::payments::MomoInitiateRequest,
            crate::handlers::payments::MomoInitiateResponse,
            crate::handlers::payments::MomoVerifyResponse,
            crate::handlers::payments::PaymentResponse,
            crate::handlers::notifications::NotificationResponse,
            crate::handlers::notifications::NotificationListResponse,
            crate::handlers::notifications::NotificationStatsResponse,
            crate::handlers::notifications::UnreadCountResponse,
            crate::handlers::notifications::AffectedResponse,
            crate::handlers::notifications::PreferencesResponse,
            crate::handlers::notifications::UpdatePreferencesRequest,
            crate::handlers::notifications::BulkActionRequest,
            crate::handlers::notifications::AdminNotificationRequest,
            crate::handlers::notifications::BroadcastResponse,
            crate::handlers::notifications::TemplateNotificationRequest,
            crate::handlers::notifications::CreateTemplateRequest,
            crate::handlers::notifications::TemplateResponse,
            crate::handlers::complaints::CreateComplaintRequest,
            crate::handlers::complaints::UpdateComplaintRequest,
            crate::handlers::complaints::ComplaintResponse,
            crate::handlers::assistant::ChatRequest,
            crate::handlers::assistant::ChatResponse,
            crate::handlers::assistant::ConversationResponse,
            crate::handlers::assistant::MessageResponse,
            crate::handlers::assistant::ClearConversationResponse,
            crate::handlers::assistant::RecommendationResponse,
            crate::handlers::assistant::SentimentRequest,
            crate::handlers::assistant::SentimentResponse,
            crate::handlers::assistant::GenerateRecommendationsRequest,
            common::AdminDashboard,
            common::UserCounts,
            common::ServiceCounts,
            common::StatusCounts,
            common::PaymentCounts,
            common::VendorAnalytics,
            common::RevenueMetrics,
            common::OrderMetrics,
            common::CustomerMetrics,
            common::DemandCell,
            common::PopularService,
            common::LocationInsight,
            common::ServiceAnalytics,
            common::AssistantAnalytics,
            common::DailyNotificationStats,
            common::TimeRange,
            common::NotificationPayload,
            common::RealtimeEvent,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and token rotation"),
        (name = "users", description = "User profiles and administration"),
        (name = "vendor-applications", description = "Vendor onboarding applications"),
        (name = "vendors", description = "Vendor business profiles"),
        (name = "services", description = "Service listings and catalogue items"),
        (name = "reviews", description = "Service reviews and ratings"),
        (name = "bookings", description = "Appointment bookings"),
        (name = "orders", description = "Orders and order lines"),
        (name = "payments", description = "Payments and mobile money"),
        (name = "notifications", description = "Notifications, preferences and templates"),
        (name = "complaints", description = "Student complaints"),
        (name = "analytics", description = "Dashboards and vendor analytics"),
        (name = "assistant", description = "Chat assistant, recommendations and sentiment"),
        (name = "realtime", description = "WebSocket notification streams"),
    ),
    info(
        title = "Campus Market API",
        description = "Campus services marketplace connecting students with vendors",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
