use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::{notifier, NewNotification};
use model::entities::notification::{NotificationType, Priority};
use model::entities::order::{self, OrderStatus};
use model::entities::order_item::{self, line_total};
use model::entities::{service, service_item, user};
use model::money::{two_places, MAX_LINE_QUANTITY};
use model::StatusTransitions;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::{ensure_student, CurrentUser};
use crate::errors::AppError;
use crate::handlers::services::{find_service, vendor_service_ids};
use crate::helpers::converters::{page_window, parse_enum, parse_optional_enum};
use crate::schemas::{ApiResponse, AppState};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct OrderLineRequest {
    pub service_item_id: i32,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000."))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateOrderRequest {
    pub service_id: i32,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<OrderLineRequest>,
    /// Used when no items are given: the order is `quantity × base_price`
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000."))]
    pub quantity: Option<i32>,
    pub special_instructions: Option<String>,
    pub delivery_address: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Next status; must be allowed from the current one
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: i32,
    pub service_item_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            id: model.id,
            service_item_id: model.service_item_id,
            quantity: model.quantity,
            unit_price: two_places(model.unit_price),
            total_price: two_places(model.total_price),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i32,
    pub service_id: i32,
    pub customer_id: i32,
    pub order_status: String,
    pub total_amount: Decimal,
    pub special_instructions: Option<String>,
    pub delivery_address: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    fn build(model: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: model.id,
            service_id: model.service_id,
            customer_id: model.customer_id,
            order_status: model.order_status.to_value(),
            total_amount: two_places(model.total_amount),
            special_instructions: model.special_instructions,
            delivery_address: model.delivery_address,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

async fn order_responses(db: &DatabaseConnection, orders: Vec<order::Model>) -> Result<Vec<OrderResponse>, AppError> {
    let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let mut lines: HashMap<i32, Vec<order_item::Model>> = HashMap::new();
    for line in order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await?
    {
        lines.entry(line.order_id).or_default().push(line);
    }
    Ok(orders
        .into_iter()
        .map(|o| {
            let items = lines.remove(&o.id).unwrap_or_default();
            OrderResponse::build(o, items)
        })
        .collect())
}

async fn single_response(db: &DatabaseConnection, model: order::Model) -> Result<OrderResponse, AppError> {
    order_responses(db, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("order response missing".into()))
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct OrderQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub status: Option<String>,
}

async fn scoped(db: &DatabaseConnection, caller: &user::Model) -> Result<Select<order::Entity>, AppError> {
    let finder = order::Entity::find();
    Ok(if caller.is_admin() {
        finder
    } else if caller.is_vendor() {
        finder.filter(order::Column::ServiceId.is_in(vendor_service_ids(db, caller.id).await?))
    } else {
        finder.filter(order::Column::CustomerId.eq(caller.id))
    })
}

async fn load_order(state: &AppState, order_id: i32) -> Result<(order::Model, service::Model), AppError> {
    match order::Entity::find_by_id(order_id)
        .find_also_related(service::Entity)
        .one(&state.db)
        .await?
    {
        Some((found, Some(listing))) => Ok((found, listing)),
        Some((_, None)) => Err(AppError::not_found("Service")),
        None => Err(AppError::not_found("Order")),
    }
}

async fn set_status(state: &AppState, existing: order::Model, requested: OrderStatus) -> Result<order::Model, AppError> {
    let next = existing.order_status.transition_to(requested)?;
    let mut active: order::ActiveModel = existing.into();
    active.order_status = Set(next);
    active.updated_at = Set(Utc::now());
    Ok(active.update(&state.db).await?)
}

fn order_too_large() -> AppError {
    AppError::field("total_amount", "Order total is too large.")
}

/// Server-side line price; clients never supply prices.
fn priced(unit_price: Decimal, quantity: i32) -> Result<Decimal, AppError> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(AppError::field("quantity", format!("Quantity must be between 1 and {MAX_LINE_QUANTITY}.")));
    }
    line_total(unit_price, quantity).ok_or_else(order_too_large)
}

fn status_notification(status: OrderStatus) -> NotificationType {
    match status {
        OrderStatus::Confirmed => NotificationType::OrderConfirmed,
        OrderStatus::Cancelled => NotificationType::OrderCancelled,
        _ => NotificationType::OrderUpdate,
    }
}

async fn notify_customer(state: &AppState, listing: &service::Model, updated: &order::Model) {
    let status = updated.order_status.to_value();
    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            updated.customer_id,
            status_notification(updated.order_status),
            format!("Order #{} {}", updated.id, status.replace('_', " ")),
            format!("Your order from {} is now {}.", listing.service_name, status),
        )
        .related_service(listing.id)
        .related_order(updated.id)
        .metadata(json!({ "order_status": status })),
    )
    .await;
}

/// Place an order on an ordering-type service
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid items or service not orderable", body = ErrorResponse),
        (status = 403, description = "Only students can order", body = ErrorResponse),
        (status = 404, description = "Service not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), AppError> {
    trace!("Entering create_order function");
    ensure_student(&caller, "place orders")?;
    request.validate()?;
    let listing = find_service(&state.db, request.service_id).await?;
    if !listing.supports_ordering {
        return Err(AppError::field("service", "This service does not accept orders."));
    }
    if !listing.can_order() {
        return Err(AppError::field("service", "This service is currently unavailable."));
    }

    // (service_item_id, quantity, unit_price, total_price)
    let mut lines: Vec<(i32, i32, Decimal, Decimal)> = Vec::with_capacity(request.items.len());
    let total_amount = if request.items.is_empty() {
        let base_price = match listing.base_price {
            Some(price) if !listing.has_flexible_pricing => price,
            _ => return Err(AppError::field("items", "Select at least one item to order.")),
        };
        priced(base_price, request.quantity.unwrap_or(1))?
    } else {
        let ids: Vec<i32> = request.items.iter().map(|line| line.service_item_id).collect();
        let catalog: HashMap<i32, service_item::Model> = service_item::Entity::find()
            .filter(service_item::Column::Id.is_in(ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();
        for line in &request.items {
            let item = catalog
                .get(&line.service_item_id)
                .filter(|item| item.service_id == listing.id)
                .ok_or_else(|| AppError::field("items", format!("Item {} does not belong to this service.", line.service_item_id)))?;
            if !item.is_available {
                return Err(AppError::field("items", format!("{} is currently unavailable.", item.name)));
            }
            lines.push((item.id, line.quantity, item.price, priced(item.price, line.quantity)?));
        }
        lines
            .iter()
            .try_fold(Decimal::ZERO, |sum, (_, _, _, total)| sum.checked_add(*total))
            .ok_or_else(order_too_large)?
    };

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let created = order::ActiveModel {
        service_id: Set(listing.id),
        customer_id: Set(caller.id),
        special_instructions: Set(request.special_instructions),
        delivery_address: Set(request.delivery_address),
        order_status: Set(OrderStatus::Pending),
        total_amount: Set(total_amount),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let mut items = Vec::with_capacity(lines.len());
    for (service_item_id, quantity, unit_price, total_price) in lines {
        let line = order_item::ActiveModel {
            order_id: Set(created.id),
            service_item_id: Set(service_item_id),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
            total_price: Set(total_price),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        items.push(line);
    }
    txn.commit().await?;
    info!("Order {} created for service {} totalling {}", created.id, listing.id, created.total_amount);

    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            listing.vendor_id,
            NotificationType::OrderCreated,
            format!("New Order for {}", listing.service_name),
            format!("{} placed an order worth GHS {}.", caller.full_name(), two_places(created.total_amount)),
        )
        .priority(Priority::High)
        .related_service(listing.id)
        .related_order(created.id),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(OrderResponse::build(created, items), "Order created successfully")),
    ))
}

/// List orders visible to the caller, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "orders",
    params(OrderQuery),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Valid(Query(query)): Valid<Query<OrderQuery>>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, AppError> {
    let (page, limit) = page_window(query.page, query.limit, 20);
    let mut finder = scoped(&state.db, &caller).await?;
    if let Some(status) = parse_optional_enum::<OrderStatus>("status", query.status.as_deref())? {
        finder = finder.filter(order::Column::OrderStatus.eq(status));
    }
    let orders = finder
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .paginate(&state.db, limit)
        .fetch_page(page)
        .await?;
    debug!("Retrieved {} orders", orders.len());
    let data = order_responses(&state.db, orders).await?;
    Ok(Json(ApiResponse::ok(data, "Orders retrieved successfully")))
}

/// Get an order with its items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}",
    tag = "orders",
    params(("order_id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderResponse>),
        (status = 403, description = "Not a party to the order", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn get_order(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    let (found, listing) = load_order(&state, order_id).await?;
    if found.customer_id != caller.id && listing.vendor_id != caller.id && !caller.is_admin() {
        return Err(AppError::forbidden("You can only view your own orders."));
    }
    let response = single_response(&state.db, found).await?;
    Ok(Json(ApiResponse::ok(response, "Order retrieved successfully")))
}

/// Confirm a pending order (service vendor only)
#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/confirm",
    tag = "orders",
    params(("order_id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order confirmed successfully", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid status transition", body = ErrorResponse),
        (status = 403, description = "Not the service vendor", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn confirm_order(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    let (found, listing) = load_order(&state, order_id).await?;
    if listing.vendor_id != caller.id {
        warn!("User {} tried to confirm order {}", caller.id, order_id);
        return Err(AppError::forbidden("Only the service vendor can confirm this order."));
    }
    let updated = set_status(&state, found, OrderStatus::Confirmed).await?;
    info!("Order {} confirmed", updated.id);
    notify_customer(&state, &listing, &updated).await;
    let response = single_response(&state.db, updated).await?;
    Ok(Json(ApiResponse::ok(response, "Order confirmed successfully")))
}

/// Move an order along its fulfilment flow (service vendor only)
#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/status",
    tag = "orders",
    params(("order_id" = i32, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order status updated successfully", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid status transition", body = ErrorResponse),
        (status = 403, description = "Not the service vendor", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn update_order_status(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    let requested: OrderStatus = parse_enum("status", &request.status)?;
    let (found, listing) = load_order(&state, order_id).await?;
    if listing.vendor_id != caller.id {
        return Err(AppError::forbidden("Only the service vendor can update this order."));
    }
    let updated = set_status(&state, found, requested).await?;
    info!("Order {} moved to {}", updated.id, updated.order_status.to_value());
    notify_customer(&state, &listing, &updated).await;
    let response = single_response(&state.db, updated).await?;
    Ok(Json(ApiResponse::ok(response, "Order status updated successfully")))
}

/// Cancel an order
///
/// Customers can cancel while the order is pending; the vendor or an admin
/// can cancel any open order.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/cancel",
    tag = "orders",
    params(("order_id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled successfully", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order can no longer be cancelled", body = ErrorResponse),
        (status = 403, description = "Not a party to the order", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn cancel_order(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    let (found, listing) = load_order(&state, order_id).await?;
    let by_customer = found.customer_id == caller.id;
    let by_staff = listing.vendor_id == caller.id || caller.is_admin();
    if !by_customer && !by_staff {
        return Err(AppError::forbidden("You cannot cancel this order."));
    }
    if by_customer && !by_staff && found.order_status != OrderStatus::Pending {
        return Err(AppError::field("status", "Only pending orders can be cancelled."));
    }
    let updated = set_status(&state, found, OrderStatus::Cancelled).await?;
    info!("Order {} cancelled by user {}", updated.id, caller.id);

    if by_customer {
        notifier::notify(
            &state.db,
            state.hub.as_ref(),
            NewNotification::new(
                listing.vendor_id,
                NotificationType::OrderCancelled,
                format!("Order #{} cancelled", updated.id),
                format!("{} cancelled their order for {}.", caller.full_name(), listing.service_name),
            )
            .related_service(listing.id)
            .related_order(updated.id),
        )
        .await;
    } else {
        notify_customer(&state, &listing, &updated).await;
    }

    let response = single_response(&state.db, updated).await?;
    Ok(Json(ApiResponse::ok(response, "Order cancelled successfully")))
}
