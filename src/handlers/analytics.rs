use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use common::{AdminDashboard, ServiceAnalytics, TimeRange, VendorAnalytics};
use compute::analytics;
use serde::Deserialize;
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{ensure_admin, CurrentUser};
use crate::errors::AppError;
use crate::handlers::services::find_service;
use crate::schemas::{ApiResponse, AppState, CachedData};

const DASHBOARD_CACHE_KEY: &str = "admin_dashboard";

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct TimeRangeQuery {
    /// 7d, 30d, 90d or 1y (default: 30d)
    pub time_range: Option<String>,
}

impl TimeRangeQuery {
    fn range(&self) -> Result<TimeRange, AppError> {
        match self.time_range.as_deref() {
            Some(raw) => raw.parse().map_err(|msg: String| AppError::field("time_range", msg)),
            None => Ok(TimeRange::default()),
        }
    }
}

/// Platform-wide counts (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/analytics/dashboard",
    tag = "analytics",
    responses(
        (status = 200, description = "Dashboard retrieved successfully", body = ApiResponse<AdminDashboard>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<AdminDashboard>>, AppError> {
    trace!("Entering admin_dashboard function");
    ensure_admin(&caller)?;

    if let Some(CachedData::Dashboard(dashboard)) = state.cache.get(DASHBOARD_CACHE_KEY).await {
        debug!("Returning cached dashboard");
        return Ok(Json(ApiResponse::ok(dashboard, "Dashboard retrieved from cache")));
    }

    let dashboard = analytics::admin_dashboard(&state.db).await?;
    state
        .cache
        .insert(DASHBOARD_CACHE_KEY.to_string(), CachedData::Dashboard(dashboard.clone()))
        .await;
    info!("Dashboard computed and cached");
    Ok(Json(ApiResponse::ok(dashboard, "Dashboard retrieved successfully")))
}

/// Revenue, orders, customers and demand for a vendor
///
/// `vendor_id` may be `current` for the calling vendor.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/vendors/{vendor_id}",
    tag = "analytics",
    params(
        ("vendor_id" = String, Path, description = "Vendor user ID or `current`"),
        TimeRangeQuery
    ),
    responses(
        (status = 200, description = "Vendor analytics retrieved successfully", body = ApiResponse<VendorAnalytics>),
        (status = 400, description = "Invalid vendor id or time range", body = ErrorResponse),
        (status = 403, description = "Not the vendor or an admin", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn vendor_analytics(
    Path(vendor_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<TimeRangeQuery>,
) -> Result<Json<ApiResponse<VendorAnalytics>>, AppError> {
    let vendor_id = if vendor_id == "current" {
        caller.id
    } else {
        vendor_id
            .parse::<i32>()
            .map_err(|_| AppError::field("vendor_id", "Vendor id must be a number or 'current'."))?
    };
    if vendor_id != caller.id && !caller.is_admin() {
        return Err(AppError::forbidden("You can only view your own analytics."));
    }
    if vendor_id == caller.id && !caller.is_vendor() && !caller.is_admin() {
        return Err(AppError::forbidden("Only vendors have vendor analytics."));
    }
    let range = query.range()?;

    let cache_key = format!("vendor_analytics_{}_{}", vendor_id, range.as_str());
    if let Some(CachedData::VendorAnalytics(report)) = state.cache.get(&cache_key).await {
        debug!("Returning cached vendor analytics");
        return Ok(Json(ApiResponse::ok(report, "Vendor analytics retrieved from cache")));
    }

    let report = analytics::vendor_analytics(&state.db, vendor_id, range, Utc::now()).await?;
    state.cache.insert(cache_key, CachedData::VendorAnalytics(report.clone())).await;
    Ok(Json(ApiResponse::ok(report, "Vendor analytics retrieved successfully")))
}

/// Revenue, orders and rating for one service (owner or admin)
#[utoipa::path(
    get,
    path = "/api/v1/analytics/services/{service_id}",
    tag = "analytics",
    params(
        ("service_id" = i32, Path, description = "Service ID"),
        TimeRangeQuery
    ),
    responses(
        (status = 200, description = "Service analytics retrieved successfully", body = ApiResponse<ServiceAnalytics>),
        (status = 403, description = "Not the owner or an admin", body = ErrorResponse),
        (status = 404, description = "Service not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn service_analytics(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<TimeRangeQuery>,
) -> Result<Json<ApiResponse<ServiceAnalytics>>, AppError> {
    let listing = find_service(&state.db, service_id).await?;
    if listing.vendor_id != caller.id && !caller.is_admin() {
        return Err(AppError::forbidden("You can only view analytics for your own services."));
    }
    let report = analytics::service_analytics(&state.db, &listing, query.range()?, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(report, "Service analytics retrieved successfully")))
}
