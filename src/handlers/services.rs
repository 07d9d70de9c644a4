use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::service::{self, AvailabilityStatus, ServiceCategory, ServiceType};
use model::entities::{order, service_item};
use model::money::{two_places, two_places_opt};
use model::StatusTransitions;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Iterable, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::{ensure_vendor, CurrentUser};
use crate::errors::AppError;
use crate::helpers::converters::{page_window, parse_enum, parse_optional_enum};
use crate::schemas::{ApiResponse, AppState, CachedData, CategoryInfo, StatusMessage};

const CATEGORIES_CACHE_KEY: &str = "service_categories";

/// Request body for creating a service
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, max = 200, message = "Service name must be between 1 and 200 characters."))]
    pub service_name: String,
    pub description: String,
    /// food, beauty, printing, laundry, academic, transport, health, entertainment, gym or other
    pub category: String,
    /// booking, ordering, contact or walk_in (default: contact)
    pub service_type: Option<String>,
    pub base_price: Option<Decimal>,
    #[serde(default)]
    pub has_flexible_pricing: bool,
    pub contact_info: Option<String>,
    pub location: Option<String>,
    #[validate(url(message = "Enter a valid URL."))]
    pub image_url: Option<String>,
}

/// Request body for updating a service
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateServiceRequest {
    #[validate(length(min = 1, max = 200, message = "Service name must be between 1 and 200 characters."))]
    pub service_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub service_type: Option<String>,
    pub base_price: Option<Decimal>,
    pub has_flexible_pricing: Option<bool>,
    pub contact_info: Option<String>,
    pub location: Option<String>,
    #[validate(url(message = "Enter a valid URL."))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateAvailabilityRequest {
    /// available, busy, unavailable or closed
    pub availability_status: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateServiceItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateServiceItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceItemResponse {
    pub id: i32,
    pub service_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<service_item::Model> for ServiceItemResponse {
    fn from(model: service_item::Model) -> Self {
        Self {
            id: model.id,
            service_id: model.service_id,
            name: model.name,
            description: model.description,
            price: two_places(model.price),
            image_url: model.image_url,
            is_available: model.is_available,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Service response model with derived booking/ordering capabilities
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceResponse {
    pub id: i32,
    pub vendor_id: i32,
    pub service_name: String,
    pub description: String,
    pub category: String,
    pub category_display: String,
    pub service_type: String,
    pub base_price: Option<Decimal>,
    pub has_flexible_pricing: bool,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub is_available: bool,
    pub availability_status: String,
    pub contact_info: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<Decimal>,
    pub total_ratings: i32,
    pub can_book: bool,
    pub can_order: bool,
    pub can_walk_in: bool,
    pub needs_contact: bool,
    pub supported_service_types: Vec<String>,
    /// Present on detail responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ServiceItemResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceResponse {
    /// `item_prices` are the prices of the service's available items.
    pub fn build(model: service::Model, item_prices: &[Decimal]) -> Self {
        let (min_price, max_price) = model.price_range(item_prices);
        Self {
            can_book: model.can_book(),
            can_order: model.can_order(),
            can_walk_in: model.can_walk_in(),
            needs_contact: model.needs_contact(),
            supported_service_types: model.supported_service_types().into_iter().map(String::from).collect(),
            category_display: model.category.display_name().to_string(),
            min_price: two_places(min_price),
            max_price: two_places(max_price),
            id: model.id,
            vendor_id: model.vendor_id,
            service_name: model.service_name,
            description: model.description,
            category: model.category.to_value(),
            service_type: model.service_type.to_value(),
            base_price: two_places_opt(model.base_price),
            has_flexible_pricing: model.has_flexible_pricing,
            is_available: model.is_available,
            availability_status: model.availability_status.to_value(),
            contact_info: model.contact_info,
            location: model.location,
            image_url: model.image_url,
            rating: two_places_opt(model.rating),
            total_ratings: model.total_ratings,
            items: None,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Builds responses for a page of services with one item query.
pub async fn service_responses(
    db: &DatabaseConnection,
    services: Vec<service::Model>,
) -> Result<Vec<ServiceResponse>, AppError> {
    let ids: Vec<i32> = services.iter().map(|s| s.id).collect();
    let items = service_item::Entity::find()
        .filter(service_item::Column::ServiceId.is_in(ids))
        .filter(service_item::Column::IsAvailable.eq(true))
        .all(db)
        .await?;
    let mut prices: HashMap<i32, Vec<Decimal>> = HashMap::new();
    for item in items {
        prices.entry(item.service_id).or_default().push(item.price);
    }
    Ok(services
        .into_iter()
        .map(|listing| {
            let item_prices = prices.remove(&listing.id).unwrap_or_default();
            ServiceResponse::build(listing, &item_prices)
        })
        .collect())
}

/// Query parameters for listing services
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ServiceQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub category: Option<String>,
    pub service_type: Option<String>,
    pub vendor_id: Option<i32>,
    /// Availability filter (default: only available services)
    pub available: Option<bool>,
    /// Substring of the name or description
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct RankingQuery {
    /// Number of services to return (default: 10)
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u64>,
    pub category: Option<String>,
}

pub async fn find_service(db: &DatabaseConnection, service_id: i32) -> Result<service::Model, AppError> {
    service::Entity::find_by_id(service_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Service"))
}

async fn owned_service(
    db: &DatabaseConnection,
    service_id: i32,
    caller: &model::entities::user::Model,
) -> Result<service::Model, AppError> {
    let listing = find_service(db, service_id).await?;
    if listing.vendor_id != caller.id {
        warn!("User {} tried to modify service {} owned by {}", caller.id, listing.id, listing.vendor_id);
        return Err(AppError::forbidden("You can only manage your own services."));
    }
    Ok(listing)
}

fn check_price(field: &str, price: Option<Decimal>) -> Result<(), AppError> {
    match price {
        Some(price) if price <= Decimal::ZERO => Err(AppError::field(field, "Price must be greater than zero.")),
        _ => Ok(()),
    }
}

fn check_contact(service_type: ServiceType, contact_info: Option<&str>) -> Result<(), AppError> {
    let missing = contact_info.map(str::trim).unwrap_or_default().is_empty();
    if service_type == ServiceType::Contact && missing {
        return Err(AppError::field(
            "contact_info",
            "Contact information is required for contact-type services.",
        ));
    }
    Ok(())
}

async fn ensure_unique_name(
    db: &DatabaseConnection,
    vendor_id: i32,
    name: &str,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut finder = service::Entity::find()
        .filter(service::Column::VendorId.eq(vendor_id))
        .filter(service::Column::ServiceName.eq(name));
    if let Some(id) = except {
        finder = finder.filter(service::Column::Id.ne(id));
    }
    if finder.count(db).await? > 0 {
        return Err(AppError::field("service_name", "You already have a service with this name."));
    }
    Ok(())
}

/// Create a new service
#[utoipa::path(
    post,
    path = "/api/v1/services",
    tag = "services",
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Service created successfully", body = ApiResponse<ServiceResponse>),
        (status = 400, description = "Invalid service data", body = ErrorResponse),
        (status = 403, description = "Only vendors can create services", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(vendor_id = caller.id))]
pub async fn create_service(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceResponse>>), AppError> {
    trace!("Entering create_service function");
    ensure_vendor(&caller, "create services")?;
    request.validate()?;

    let category: ServiceCategory = parse_enum("category", &request.category)?;
    let service_type = parse_optional_enum::<ServiceType>("service_type", request.service_type.as_deref())?
        .unwrap_or(ServiceType::Contact);
    check_price("base_price", request.base_price)?;
    check_contact(service_type, request.contact_info.as_deref())?;
    let name = request.service_name.trim().to_string();
    ensure_unique_name(&state.db, caller.id, &name, None).await?;

    let now = Utc::now();
    let mut listing = service::ActiveModel {
        vendor_id: Set(caller.id),
        service_name: Set(name),
        description: Set(request.description),
        category: Set(category),
        service_type: Set(service_type),
        base_price: Set(request.base_price),
        has_flexible_pricing: Set(request.has_flexible_pricing),
        is_available: Set(true),
        availability_status: Set(AvailabilityStatus::Available),
        contact_info: Set(request.contact_info),
        location: Set(request.location),
        image_url: Set(request.image_url),
        rating: Set(None),
        total_ratings: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    listing.apply_support_flags(service_type);
    let listing = listing.insert(&state.db).await?;

    info!("Service {} created by vendor {}", listing.id, caller.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ServiceResponse::build(listing, &[]), "Service created successfully")),
    ))
}

/// List services
#[utoipa::path(
    get,
    path = "/api/v1/services",
    tag = "services",
    params(ServiceQuery),
    responses(
        (status = 200, description = "Services retrieved successfully", body = ApiResponse<Vec<ServiceResponse>>),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_services(
    State(state): State<AppState>,
    Valid(Query(query)): Valid<Query<ServiceQuery>>,
) -> Result<Json<ApiResponse<Vec<ServiceResponse>>>, AppError> {
    trace!("Entering list_services function");
    let (page, limit) = page_window(query.page, query.limit, 20);

    let mut finder = service::Entity::find()
        .filter(service::Column::IsAvailable.eq(query.available.unwrap_or(true)));
    if let Some(category) = parse_optional_enum::<ServiceCategory>("category", query.category.as_deref())? {
        finder = finder.filter(service::Column::Category.eq(category));
    }
    if let Some(service_type) = parse_optional_enum::<ServiceType>("service_type", query.service_type.as_deref())? {
        finder = finder.filter(service::Column::ServiceType.eq(service_type));
    }
    if let Some(vendor_id) = query.vendor_id {
        finder = finder.filter(service::Column::VendorId.eq(vendor_id));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        finder = finder.filter(
            Condition::any()
                .add(service::Column::ServiceName.contains(search))
                .add(service::Column::Description.contains(search)),
        );
    }

    let services = finder
        .order_by_desc(service::Column::CreatedAt)
        .order_by_desc(service::Column::Id)
        .paginate(&state.db, limit)
        .fetch_page(page)
        .await?;
    debug!("Retrieved {} services", services.len());

    let data = service_responses(&state.db, services).await?;
    Ok(Json(ApiResponse::ok(data, "Services retrieved successfully")))
}

/// List the calling vendor's services, including unavailable ones
#[utoipa::path(
    get,
    path = "/api/v1/services/mine",
    tag = "services",
    responses(
        (status = 200, description = "Services retrieved successfully", body = ApiResponse<Vec<ServiceResponse>>),
        (status = 403, description = "Vendors only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(vendor_id = caller.id))]
pub async fn my_services(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<Vec<ServiceResponse>>>, AppError> {
    ensure_vendor(&caller, "list their services")?;
    let services = service::Entity::find()
        .filter(service::Column::VendorId.eq(caller.id))
        .order_by_asc(service::Column::ServiceName)
        .all(&state.db)
        .await?;
    let data = service_responses(&state.db, services).await?;
    Ok(Json(ApiResponse::ok(data, "Services retrieved successfully")))
}

/// Get a service with its items
#[utoipa::path(
    get,
    path = "/api/v1/services/{service_id}",
    tag = "services",
    params(("service_id" = i32, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service retrieved successfully", body = ApiResponse<ServiceResponse>),
        (status = 404, description = "Service not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_service(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ServiceResponse>>, AppError> {
    let listing = find_service(&state.db, service_id).await?;
    let items = listing
        .find_related(service_item::Entity)
        .order_by_asc(service_item::Column::Name)
        .all(&state.db)
        .await?;
    let prices: Vec<Decimal> = items.iter().filter(|i| i.is_available).map(|i| i.price).collect();
    let mut response = ServiceResponse::build(listing, &prices);
    response.items = Some(items.into_iter().map(ServiceItemResponse::from).collect());
    Ok(Json(ApiResponse::ok(response, "Service retrieved successfully")))
}

/// Update a service (owner only)
#[utoipa::path(
    put,
    path = "/api/v1/services/{service_id}",
    tag = "services",
    params(("service_id" = i32, Path, description = "Service ID")),
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Service updated successfully", body = ApiResponse<ServiceResponse>),
        (status = 400, description = "Invalid service data", body = ErrorResponse),
        (status = 403, description = "Not the service owner", body = ErrorResponse),
        (status = 404, description = "Service not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_service(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<ApiResponse<ServiceResponse>>, AppError> {
    request.validate()?;
    let listing = owned_service(&state.db, service_id, &caller).await?;

    let service_type = parse_optional_enum::<ServiceType>("service_type", request.service_type.as_deref())?
        .unwrap_or(listing.service_type);
    let contact_info = request.contact_info.clone().or_else(|| listing.contact_info.clone());
    check_contact(service_type, contact_info.as_deref())?;
    check_price("base_price", request.base_price)?;

    let mut active: service::ActiveModel = listing.clone().into();
    if let Some(name) = request.service_name {
        let name = name.trim().to_string();
        ensure_unique_name(&state.db, caller.id, &name, Some(listing.id)).await?;
        active.service_name = Set(name);
    }
    if let Some(description) = request.description {
        active.description = Set(description);
    }
    if let Some(category) = request.category.as_deref() {
        active.category = Set(parse_enum("category", category)?);
    }
    if request.base_price.is_some() {
        active.base_price = Set(request.base_price);
    }
    if let Some(flexible) = request.has_flexible_pricing {
        active.has_flexible_pricing = Set(flexible);
    }
    if request.location.is_some() {
        active.location = Set(request.location);
    }
    if request.image_url.is_some() {
        active.image_url = Set(request.image_url);
    }
    active.contact_info = Set(contact_info);
    active.service_type = Set(service_type);
    active.apply_support_flags(service_type);
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    info!("Service {} updated", updated.id);
    let mut data = service_responses(&state.db, vec![updated]).await?;
    let response = data.pop().ok_or_else(|| AppError::Internal("service response missing".into()))?;
    Ok(Json(ApiResponse::ok(response, "Service updated successfully")))
}

/// Delete a service (owner or admin)
#[utoipa::path(
    delete,
    path = "/api/v1/services/{service_id}",
    tag = "services",
    params(("service_id" = i32, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service deleted successfully", body = ApiResponse<StatusMessage>),
        (status = 403, description = "Not the owner or an admin", body = ErrorResponse),
        (status = 404, description = "Service not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn delete_service(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<StatusMessage>>, AppError> {
    let listing = find_service(&state.db, service_id).await?;
    if listing.vendor_id != caller.id && !caller.is_admin() {
        return Err(AppError::forbidden("You can only delete your own services."));
    }
    listing.delete(&state.db).await?;
    info!("Service {} deleted by user {}", service_id, caller.id);
    Ok(Json(ApiResponse::ok(StatusMessage::new("Service deleted."), "Service deleted successfully")))
}

/// Change a service's availability status
#[utoipa::path(
    post,
    path = "/api/v1/services/{service_id}/availability",
    tag = "services",
    params(("service_id" = i32, Path, description = "Service ID")),
    request_body = UpdateAvailabilityRequest,
    responses(
        (status = 200, description = "Availability updated successfully", body = ApiResponse<ServiceResponse>),
        (status = 400, description = "Invalid status transition", body = ErrorResponse),
        (status = 403, description = "Not the service owner", body = ErrorResponse),
        (status = 404, description = "Service not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_availability(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<ApiResponse<ServiceResponse>>, AppError> {
    let listing = owned_service(&state.db, service_id, &caller).await?;
    let requested: AvailabilityStatus = parse_enum("availability_status", &request.availability_status)?;
    let next = listing.availability_status.transition_to(requested)?;

    let mut active: service::ActiveModel = listing.into();
    active.availability_status = Set(next);
    active.is_available = Set(next.accepts_customers());
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;
    info!("Service {} availability set to {}", updated.id, next.to_value());

    let mut data = service_responses(&state.db, vec![updated]).await?;
    let response = data.pop().ok_or_else(|| AppError::Internal("service response missing".into()))?;
    Ok(Json(ApiResponse::ok(response, "Availability updated successfully")))
}

/// List service categories
#[utoipa::path(
    get,
    path = "/api/v1/services/categories",
    tag = "services",
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Vec<CategoryInfo>>)
    )
)]
#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> Json<ApiResponse<Vec<CategoryInfo>>> {
    if let Some(CachedData::Categories(categories)) = state.cache.get(CATEGORIES_CACHE_KEY).await {
        trace!("Service categories served from cache");
        return Json(ApiResponse::ok(categories, "Categories retrieved successfully"));
    }
    let categories: Vec<CategoryInfo> = ServiceCategory::iter()
        .map(|category| CategoryInfo {
            value: category.to_value(),
            label: category.display_name().to_string(),
        })
        .collect();
    state
        .cache
        .insert(CATEGORIES_CACHE_KEY.to_string(), CachedData::Categories(categories.clone()))
        .await;
    Json(ApiResponse::ok(categories, "Categories retrieved successfully"))
}

/// Highest rated available services
#[utoipa::path(
    get,
    path = "/api/v1/services/top-rated",
    tag = "services",
    params(RankingQuery),
    responses(
        (status = 200, description = "Top rated services retrieved successfully", body = ApiResponse<Vec<ServiceResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn top_rated_services(
    State(state): State<AppState>,
    Valid(Query(query)): Valid<Query<RankingQuery>>,
) -> Result<Json<ApiResponse<Vec<ServiceResponse>>>, AppError> {
    let mut finder = service::Entity::find()
        .filter(service::Column::IsAvailable.eq(true))
        .filter(service::Column::Rating.is_not_null());
    if let Some(category) = parse_optional_enum::<ServiceCategory>("category", query.category.as_deref())? {
        finder = finder.filter(service::Column::Category.eq(category));
    }
    let services = finder
        .order_by_desc(service::Column::Rating)
        .order_by_desc(service::Column::TotalRatings)
        .limit(query.limit.unwrap_or(10))
        .all(&state.db)
        .await?;
    let data = service_responses(&state.db, services).await?;
    Ok(Json(ApiResponse::ok(data, "Top rated services retrieved successfully")))
}

/// Available services ranked by number of orders
#[utoipa::path(
    get,
    path = "/api/v1/services/popular",
    tag = "services",
    params(RankingQuery),
    responses(
        (status = 200, description = "Popular services retrieved successfully", body = ApiResponse<Vec<ServiceResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn popular_services(
    State(state): State<AppState>,
    Valid(Query(query)): Valid<Query<RankingQuery>>,
) -> Result<Json<ApiResponse<Vec<ServiceResponse>>>, AppError> {
    let mut finder = service::Entity::find().filter(service::Column::IsAvailable.eq(true));
    if let Some(category) = parse_optional_enum::<ServiceCategory>("category", query.category.as_deref())? {
        finder = finder.filter(service::Column::Category.eq(category));
    }

    let ranked: Vec<(i32, i64)> = finder
        .select_only()
        .column(service::Column::Id)
        .column_as(order::Column::Id.count(), "order_count")
        .join(JoinType::LeftJoin, service::Relation::Order.def())
        .group_by(service::Column::Id)
        .order_by_desc(order::Column::Id.count())
        .order_by_desc(service::Column::Rating)
        .order_by_asc(service::Column::Id)
        .limit(query.limit.unwrap_or(10))
        .into_tuple()
        .all(&state.db)
        .await?;
    debug!("Ranked {} services by order count", ranked.len());

    let ids: Vec<i32> = ranked.iter().map(|(id, _)| *id).collect();
    let mut by_id: HashMap<i32, service::Model> = service::Entity::find()
        .filter(service::Column::Id.is_in(ids.clone()))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|listing| (listing.id, listing))
        .collect();
    let services: Vec<service::Model> = ids.iter().filter_map(|id| by_id.remove(id)).collect();

    let data = service_responses(&state.db, services).await?;
    Ok(Json(ApiResponse::ok(data, "Popular services retrieved successfully")))
}

/// Add an item to a service (owner only)
#[utoipa::path(
    post,
    path = "/api/v1/services/{service_id}/items",
    tag = "services",
    params(("service_id" = i32, Path, description = "Service ID")),
    request_body = CreateServiceItemRequest,
    responses(
        (status = 201, description = "Item created successfully", body = ApiResponse<ServiceItemResponse>),
        (status = 400, description = "Invalid item data", body = ErrorResponse),
        (status = 403, description = "Not the service owner", body = ErrorResponse),
        (status = 404, description = "Service not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn add_service_item(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<CreateServiceItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceItemResponse>>), AppError> {
    let listing = owned_service(&state.db, service_id, &caller).await?;
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::field("name", "Item name is required."));
    }
    check_price("price", Some(request.price))?;
    let duplicate = service_item::Entity::find()
        .filter(service_item::Column::ServiceId.eq(listing.id))
        .filter(service_item::Column::Name.eq(name.as_str()))
        .count(&state.db)
        .await?;
    if duplicate > 0 {
        return Err(AppError::field("name", "This service already has an item with this name."));
    }

    let now = Utc::now();
    let item = service_item::ActiveModel {
        service_id: Set(listing.id),
        name: Set(name),
        description: Set(request.description),
        price: Set(request.price),
        image_url: Set(request.image_url),
        is_available: Set(request.is_available.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!("Item {} added to service {}", item.id, listing.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ServiceItemResponse::from(item), "Item created successfully")),
    ))
}

/// List a service's items
#[utoipa::path(
    get,
    path = "/api/v1/services/{service_id}/items",
    tag = "services",
    params(("service_id" = i32, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Items retrieved successfully", body = ApiResponse<Vec<ServiceItemResponse>>),
        (status = 404, description = "Service not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_service_items(
    Path(service_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ServiceItemResponse>>>, AppError> {
    let listing = find_service(&state.db, service_id).await?;
    let items = listing
        .find_related(service_item::Entity)
        .order_by_asc(service_item::Column::Name)
        .all(&state.db)
        .await?;
    Ok(Json(ApiResponse::ok(
        items.into_iter().map(ServiceItemResponse::from).collect(),
        "Items retrieved successfully",
    )))
}

async fn owned_item(
    state: &AppState,
    service_id: i32,
    item_id: i32,
    caller: &model::entities::user::Model,
) -> Result<service_item::Model, AppError> {
    owned_service(&state.db, service_id, caller).await?;
    service_item::Entity::find_by_id(item_id)
        .filter(service_item::Column::ServiceId.eq(service_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Service item"))
}

/// Update a service item (owner only)
#[utoipa::path(
    put,
    path = "/api/v1/services/{service_id}/items/{item_id}",
    tag = "services",
    params(
        ("service_id" = i32, Path, description = "Service ID"),
        ("item_id" = i32, Path, description = "Item ID"),
    ),
    request_body = UpdateServiceItemRequest,
    responses(
        (status = 200, description = "Item updated successfully", body = ApiResponse<ServiceItemResponse>),
        (status = 400, description = "Invalid item data", body = ErrorResponse),
        (status = 403, description = "Not the service owner", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_service_item(
    Path((service_id, item_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdateServiceItemRequest>,
) -> Result<Json<ApiResponse<ServiceItemResponse>>, AppError> {
    let item = owned_item(&state, service_id, item_id, &caller).await?;
    check_price("price", request.price)?;

    let mut active: service_item::ActiveModel = item.into();
    if let Some(name) = request.name {
        active.name = Set(name.trim().to_string());
    }
    if request.description.is_some() {
        active.description = Set(request.description);
    }
    if let Some(price) = request.price {
        active.price = Set(price);
    }
    if request.image_url.is_some() {
        active.image_url = Set(request.image_url);
    }
    if let Some(available) = request.is_available {
        active.is_available = Set(available);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;
    Ok(Json(ApiResponse::ok(ServiceItemResponse::from(updated), "Item updated successfully")))
}

/// Delete a service item (owner only)
#[utoipa::path(
    delete,
    path = "/api/v1/services/{service_id}/items/{item_id}",
    tag = "services",
    params(
        ("service_id" = i32, Path, description = "Service ID"),
        ("item_id" = i32, Path, description = "Item ID"),
    ),
    responses(
        (status = 200, description = "Item deleted successfully", body = ApiResponse<StatusMessage>),
        (status = 403, description = "Not the service owner", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn delete_service_item(
    Path((service_id, item_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<StatusMessage>>, AppError> {
    let item = owned_item(&state, service_id, item_id, &caller).await?;
    item.delete(&state.db).await?;
    info!("Item {} removed from service {}", item_id, service_id);
    Ok(Json(ApiResponse::ok(StatusMessage::new("Item deleted."), "Item deleted successfully")))
}

/// Ids of every service the vendor owns, for role-scoped listings.
pub async fn vendor_service_ids(db: &DatabaseConnection, vendor_id: i32) -> Result<Vec<i32>, AppError> {
    Ok(service::Entity::find()
        .select_only()
        .column(service::Column::Id)
        .filter(service::Column::VendorId.eq(vendor_id))
        .into_tuple()
        .all(db)
        .await?)
}
