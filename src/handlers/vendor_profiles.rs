use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user::{self, normalize_phone_number};
use model::entities::vendor_profile::{self, PreferredPaymentMethod};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::{ensure_vendor, CurrentUser};
use crate::errors::AppError;
use crate::helpers::converters::{page_window, parse_enum};
use crate::helpers::stats::{vendor_dashboard, VendorDashboard};
use crate::schemas::{ApiResponse, AppState};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MobileMoneyNumber {
    pub wallet: String,
    pub number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VendorProfileResponse {
    pub id: i32,
    pub user_id: i32,
    pub business_name: String,
    pub description: Option<String>,
    pub business_hours: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub mtn_momo_number: Option<String>,
    pub vodafone_cash_number: Option<String>,
    pub airtel_money_number: Option<String>,
    pub telecel_cash_number: Option<String>,
    pub preferred_payment_method: String,
    /// Configured wallets, in display order
    pub mobile_money_numbers: Vec<MobileMoneyNumber>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<vendor_profile::Model> for VendorProfileResponse {
    fn from(model: vendor_profile::Model) -> Self {
        let mobile_money_numbers = model
            .mobile_money_numbers()
            .into_iter()
            .map(|(wallet, number)| MobileMoneyNumber { wallet: wallet.to_string(), number })
            .collect();
        Self {
            id: model.id,
            user_id: model.user_id,
            business_name: model.business_name,
            description: model.description,
            business_hours: model.business_hours,
            address: model.address,
            phone: model.phone,
            email: model.email,
            website: model.website,
            is_verified: model.is_verified,
            is_active: model.is_active,
            mtn_momo_number: model.mtn_momo_number,
            vodafone_cash_number: model.vodafone_cash_number,
            airtel_money_number: model.airtel_money_number,
            telecel_cash_number: model.telecel_cash_number,
            preferred_payment_method: model.preferred_payment_method.to_value(),
            mobile_money_numbers,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Request body for updating the caller's vendor profile
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateVendorProfileRequest {
    #[validate(length(min = 3, message = "Business name must be at least 3 characters long."))]
    pub business_name: Option<String>,
    pub description: Option<String>,
    pub business_hours: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(url(message = "Enter a valid URL."))]
    pub website: Option<String>,
    pub mtn_momo_number: Option<String>,
    pub vodafone_cash_number: Option<String>,
    pub airtel_money_number: Option<String>,
    pub telecel_cash_number: Option<String>,
    /// One of mtn_momo, vodafone_cash, airtel_money, telecel_cash, bank_transfer, cash
    pub preferred_payment_method: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct VendorProfileQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Case-sensitive substring of the business name
    pub search: Option<String>,
}

/// Loads the vendor's profile, creating a blank one for vendors that were
/// registered directly rather than through an application.
pub async fn profile_for(db: &DatabaseConnection, vendor: &user::Model) -> Result<vendor_profile::Model, AppError> {
    let existing = vendor_profile::Entity::find()
        .filter(vendor_profile::Column::UserId.eq(vendor.id))
        .one(db)
        .await?;
    if let Some(profile) = existing {
        return Ok(profile);
    }
    debug!("Creating default vendor profile for user {}", vendor.id);
    let now = Utc::now();
    Ok(vendor_profile::ActiveModel {
        user_id: Set(vendor.id),
        business_name: Set(format!("{}'s Business", vendor.full_name())),
        description: Set(None),
        business_hours: Set(None),
        address: Set(None),
        phone: Set(vendor.phone_number.clone()),
        email: Set(Some(vendor.email.clone())),
        website: Set(None),
        is_verified: Set(false),
        is_active: Set(true),
        mtn_momo_number: Set(None),
        vodafone_cash_number: Set(None),
        airtel_money_number: Set(None),
        telecel_cash_number: Set(None),
        preferred_payment_method: Set(PreferredPaymentMethod::MtnMomo),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

fn wallet_number(field: &str, raw: String) -> Result<Option<String>, AppError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    normalize_phone_number(&raw)
        .map(Some)
        .ok_or_else(|| AppError::field(field, "Mobile money numbers must contain at least 10 digits."))
}

/// List active vendor profiles
#[utoipa::path(
    get,
    path = "/api/v1/vendors",
    tag = "vendors",
    params(VendorProfileQuery),
    responses(
        (status = 200, description = "Vendor profiles retrieved successfully", body = ApiResponse<Vec<VendorProfileResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn list_vendor_profiles(
    State(state): State<AppState>,
    Valid(Query(query)): Valid<Query<VendorProfileQuery>>,
) -> Result<Json<ApiResponse<Vec<VendorProfileResponse>>>, AppError> {
    trace!("Entering list_vendor_profiles function");
    let (page, limit) = page_window(query.page, query.limit, 20);
    let mut finder = vendor_profile::Entity::find().filter(vendor_profile::Column::IsActive.eq(true));
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        finder = finder.filter(vendor_profile::Column::BusinessName.contains(search.trim()));
    }
    let profiles = finder
        .order_by_asc(vendor_profile::Column::BusinessName)
        .paginate(&state.db, limit)
        .fetch_page(page)
        .await?;
    Ok(Json(ApiResponse::ok(
        profiles.into_iter().map(VendorProfileResponse::from).collect(),
        "Vendor profiles retrieved successfully",
    )))
}

/// List verified vendors
#[utoipa::path(
    get,
    path = "/api/v1/vendors/verified",
    tag = "vendors",
    responses(
        (status = 200, description = "Verified vendors retrieved successfully", body = ApiResponse<Vec<VendorProfileResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn verified_vendors(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<VendorProfileResponse>>>, AppError> {
    let profiles = vendor_profile::Entity::find()
        .filter(vendor_profile::Column::IsActive.eq(true))
        .filter(vendor_profile::Column::IsVerified.eq(true))
        .order_by_asc(vendor_profile::Column::BusinessName)
        .all(&state.db)
        .await?;
    Ok(Json(ApiResponse::ok(
        profiles.into_iter().map(VendorProfileResponse::from).collect(),
        "Verified vendors retrieved successfully",
    )))
}

/// Get a vendor profile
#[utoipa::path(
    get,
    path = "/api/v1/vendors/{profile_id}",
    tag = "vendors",
    params(("profile_id" = i32, Path, description = "Vendor profile ID")),
    responses(
        (status = 200, description = "Vendor profile retrieved successfully", body = ApiResponse<VendorProfileResponse>),
        (status = 404, description = "Vendor profile not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_vendor_profile(
    Path(profile_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<VendorProfileResponse>>, AppError> {
    let profile = vendor_profile::Entity::find_by_id(profile_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Vendor profile"))?;
    Ok(Json(ApiResponse::ok(
        VendorProfileResponse::from(profile),
        "Vendor profile retrieved successfully",
    )))
}

/// Get the caller's vendor profile
#[utoipa::path(
    get,
    path = "/api/v1/vendors/me",
    tag = "vendors",
    responses(
        (status = 200, description = "Vendor profile retrieved successfully", body = ApiResponse<VendorProfileResponse>),
        (status = 403, description = "Vendors only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn my_vendor_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<VendorProfileResponse>>, AppError> {
    ensure_vendor(&caller, "view a vendor profile")?;
    let profile = profile_for(&state.db, &caller).await?;
    Ok(Json(ApiResponse::ok(
        VendorProfileResponse::from(profile),
        "Vendor profile retrieved successfully",
    )))
}

/// Update the caller's vendor profile
#[utoipa::path(
    put,
    path = "/api/v1/vendors/me",
    tag = "vendors",
    request_body = UpdateVendorProfileRequest,
    responses(
        (status = 200, description = "Vendor profile updated successfully", body = ApiResponse<VendorProfileResponse>),
        (status = 400, description = "Invalid profile data", body = ErrorResponse),
        (status = 403, description = "Vendors only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_my_vendor_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdateVendorProfileRequest>,
) -> Result<Json<ApiResponse<VendorProfileResponse>>, AppError> {
    ensure_vendor(&caller, "update a vendor profile")?;
    request.validate()?;
    let profile = profile_for(&state.db, &caller).await?;

    let mut active: vendor_profile::ActiveModel = profile.into();
    if let Some(name) = request.business_name {
        active.business_name = Set(name.trim().to_string());
    }
    if request.description.is_some() {
        active.description = Set(request.description);
    }
    if request.business_hours.is_some() {
        active.business_hours = Set(request.business_hours);
    }
    if request.address.is_some() {
        active.address = Set(request.address);
    }
    if request.phone.is_some() {
        active.phone = Set(request.phone);
    }
    if request.email.is_some() {
        active.email = Set(request.email);
    }
    if request.website.is_some() {
        active.website = Set(request.website);
    }
    if let Some(number) = request.mtn_momo_number {
        active.mtn_momo_number = Set(wallet_number("mtn_momo_number", number)?);
    }
    if let Some(number) = request.vodafone_cash_number {
        active.vodafone_cash_number = Set(wallet_number("vodafone_cash_number", number)?);
    }
    if let Some(number) = request.airtel_money_number {
        active.airtel_money_number = Set(wallet_number("airtel_money_number", number)?);
    }
    if let Some(number) = request.telecel_cash_number {
        active.telecel_cash_number = Set(wallet_number("telecel_cash_number", number)?);
    }
    if let Some(method) = request.preferred_payment_method.as_deref() {
        active.preferred_payment_method = Set(parse_enum("preferred_payment_method", method)?);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    info!("Vendor profile {} updated", updated.id);
    Ok(Json(ApiResponse::ok(
        VendorProfileResponse::from(updated),
        "Vendor profile updated successfully",
    )))
}

/// Vendor dashboard counters
#[utoipa::path(
    get,
    path = "/api/v1/vendors/dashboard",
    tag = "vendors",
    responses(
        (status = 200, description = "Dashboard retrieved successfully", body = ApiResponse<VendorDashboard>),
        (status = 403, description = "Vendors only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn vendor_dashboard_stats(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<VendorDashboard>>, AppError> {
    ensure_vendor(&caller, "view the vendor dashboard")?;
    let dashboard = vendor_dashboard(&state.db, caller.id).await?;
    debug!(
        "Vendor {} has {} services, {} active",
        caller.id, dashboard.total_services, dashboard.active_services
    );
    Ok(Json(ApiResponse::ok(dashboard, "Dashboard retrieved successfully")))
}
