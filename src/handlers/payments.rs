use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::{notifier, NewNotification};
use model::entities::booking::{self, BookingStatus};
use model::entities::notification::NotificationType;
use model::entities::order::{self, OrderStatus};
use model::entities::payment::{
    self, generate_momo_transaction_id, generate_transaction_id, validate_method_details, MobileMoneyProvider,
    PaymentMethod, PaymentStatus, PaymentTarget,
};
use model::entities::{service, user};
use model::money::two_places;
use model::StatusTransitions;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::handlers::services::vendor_service_ids;
use crate::helpers::converters::{page_window, parse_enum, parse_optional_enum};
use crate::schemas::{ApiResponse, AppState};

const DEFAULT_CURRENCY: &str = "GHS";
const MOMO_SUCCESS_RATE: f64 = 0.8;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub booking_id: Option<i32>,
    pub order_id: Option<i32>,
    /// cash, mobile_money, card or bank_transfer
    pub payment_method: String,
    /// mtn, vodafone, airtel or telecel (mobile money only)
    pub mobile_money_provider: Option<String>,
    pub phone_number: Option<String>,
    pub payment_notes: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct MomoInitiateRequest {
    pub amount: Decimal,
    pub phone_number: String,
    /// Defaults to mtn
    pub provider: Option<String>,
    pub booking_id: Option<i32>,
    pub order_id: Option<i32>,
}

/// Provider acknowledgement for a mobile money request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MomoInitiateResponse {
    pub payment_id: i32,
    pub transaction_id: String,
    pub reference: String,
    pub provider: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MomoVerifyResponse {
    pub payment_id: i32,
    pub reference: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: i32,
    pub payer_id: i32,
    pub booking_id: Option<i32>,
    pub order_id: Option<i32>,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub mobile_money_provider: Option<String>,
    pub transaction_id: String,
    pub status: String,
    pub phone_number: Option<String>,
    pub reference_number: Option<String>,
    pub payment_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<payment::Model> for PaymentResponse {
    fn from(model: payment::Model) -> Self {
        Self {
            id: model.id,
            payer_id: model.payer_id,
            booking_id: model.booking_id,
            order_id: model.order_id,
            amount: two_places(model.amount),
            currency: model.currency,
            payment_method: model.payment_method.to_value(),
            mobile_money_provider: model.mobile_money_provider.map(|p| p.to_value()),
            transaction_id: model.transaction_id,
            status: model.status.to_value(),
            phone_number: model.phone_number,
            reference_number: model.reference_number,
            payment_notes: model.payment_notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct PaymentQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub booking_id: Option<i32>,
    pub order_id: Option<i32>,
}

/// What is being paid for, resolved against the database.
struct ResolvedTarget {
    target: PaymentTarget,
    /// The student who booked or ordered.
    owner_id: i32,
    amount_due: Option<Decimal>,
    listing: service::Model,
}

async fn resolve_target(db: &DatabaseConnection, target: PaymentTarget) -> Result<ResolvedTarget, AppError> {
    match target {
        PaymentTarget::Booking(id) => {
            let (found, listing) = booking::Entity::find_by_id(id)
                .find_also_related(service::Entity)
                .one(db)
                .await?
                .ok_or_else(|| AppError::not_found("Booking"))?;
            let listing = listing.ok_or_else(|| AppError::not_found("Service"))?;
            Ok(ResolvedTarget {
                target,
                owner_id: found.student_id,
                amount_due: listing.base_price,
                listing,
            })
        }
        PaymentTarget::Order(id) => {
            let (found, listing) = order::Entity::find_by_id(id)
                .find_also_related(service::Entity)
                .one(db)
                .await?
                .ok_or_else(|| AppError::not_found("Order"))?;
            let listing = listing.ok_or_else(|| AppError::not_found("Service"))?;
            Ok(ResolvedTarget {
                target,
                owner_id: found.customer_id,
                amount_due: Some(found.total_amount),
                listing,
            })
        }
    }
}

fn target_filter(target: PaymentTarget) -> Condition {
    match target {
        PaymentTarget::Booking(id) => Condition::all().add(payment::Column::BookingId.eq(id)),
        PaymentTarget::Order(id) => Condition::all().add(payment::Column::OrderId.eq(id)),
    }
}

fn target_label(target: PaymentTarget) -> &'static str {
    match target {
        PaymentTarget::Booking(_) => "booking",
        PaymentTarget::Order(_) => "order",
    }
}

/// Resolves the target, checks the caller owns it and that it is not paid yet.
async fn payable_target(
    db: &DatabaseConnection,
    caller: &user::Model,
    booking_id: Option<i32>,
    order_id: Option<i32>,
) -> Result<ResolvedTarget, AppError> {
    let target = PaymentTarget::from_ids(booking_id, order_id).map_err(AppError::bad_request)?;
    let resolved = resolve_target(db, target).await?;
    if resolved.owner_id != caller.id {
        warn!("User {} tried to pay for a {} they do not own", caller.id, target_label(target));
        return Err(AppError::forbidden(format!("You can only pay for your own {}s.", target_label(target))));
    }
    let paid = payment::Entity::find()
        .filter(target_filter(target))
        .filter(payment::Column::Status.eq(PaymentStatus::Successful))
        .count(db)
        .await?;
    if paid > 0 {
        return Err(AppError::bad_request(format!("This {} has already been paid for.", target_label(target))));
    }
    Ok(resolved)
}

/// Payer, the vendor of the paid-for service, or an admin.
async fn ensure_can_view(db: &DatabaseConnection, caller: &user::Model, found: &payment::Model) -> Result<(), AppError> {
    if found.payer_id == caller.id || caller.is_admin() {
        return Ok(());
    }
    if caller.is_vendor() {
        if let Some(target) = found.target() {
            if resolve_target(db, target).await?.listing.vendor_id == caller.id {
                return Ok(());
            }
        }
    }
    Err(AppError::forbidden("You can only view your own payments."))
}

async fn find_payment(db: &DatabaseConnection, payment_id: i32) -> Result<payment::Model, AppError> {
    payment::Entity::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Payment"))
}

/// Marks the settled booking or order confirmed if it was still pending.
async fn confirm_target(db: &DatabaseConnection, target: PaymentTarget) -> Result<(), AppError> {
    match target {
        PaymentTarget::Booking(id) => {
            if let Some(found) = booking::Entity::find_by_id(id).one(db).await? {
                if found.booking_status == BookingStatus::Pending {
                    let mut active: booking::ActiveModel = found.into();
                    active.booking_status = Set(BookingStatus::Confirmed);
                    active.updated_at = Set(Utc::now());
                    active.update(db).await?;
                }
            }
        }
        PaymentTarget::Order(id) => {
            if let Some(found) = order::Entity::find_by_id(id).one(db).await? {
                if found.order_status == OrderStatus::Pending {
                    let mut active: order::ActiveModel = found.into();
                    active.order_status = Set(OrderStatus::Confirmed);
                    active.updated_at = Set(Utc::now());
                    active.update(db).await?;
                }
            }
        }
    }
    Ok(())
}

async fn announce_payment(state: &AppState, paid: &payment::Model, listing: &service::Model) {
    let what = paid.target().map(target_label).unwrap_or("purchase");
    for (recipient, title, message) in [
        (
            paid.payer_id,
            "Payment Successful".to_string(),
            format!("Your payment of {} {} for {} was successful.", paid.currency, two_places(paid.amount), listing.service_name),
        ),
        (
            listing.vendor_id,
            "Payment Received".to_string(),
            format!("You received {} {} for a {what} on {}.", paid.currency, two_places(paid.amount), listing.service_name),
        ),
    ] {
        let mut note = NewNotification::new(recipient, NotificationType::PaymentReceived, title, message)
            .related_service(listing.id)
            .related_object("payment", paid.id)
            .metadata(json!({ "transaction_id": paid.transaction_id }));
        if let Some(id) = paid.booking_id {
            note = note.related_booking(id);
        }
        if let Some(id) = paid.order_id {
            note = note.related_order(id);
        }
        notifier::notify(&state.db, state.hub.as_ref(), note).await;
    }
}

/// Draws the simulated provider outcome.
fn momo_succeeds() -> bool {
    rand::thread_rng().gen_bool(MOMO_SUCCESS_RATE)
}

/// Create a payment for a booking or an order
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    tag = "payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment created successfully", body = ApiResponse<PaymentResponse>),
        (status = 400, description = "Invalid target, method details or already paid", body = ErrorResponse),
        (status = 403, description = "Not the booking's student or the order's customer", body = ErrorResponse),
        (status = 404, description = "Booking or order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn create_payment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResponse>>), AppError> {
    trace!("Entering create_payment function");
    let method: PaymentMethod = parse_enum("payment_method", &request.payment_method)?;
    let provider = parse_optional_enum::<MobileMoneyProvider>(
        "mobile_money_provider",
        request.mobile_money_provider.as_deref(),
    )?;
    validate_method_details(method, provider, request.phone_number.as_deref())
        .map_err(|msg| AppError::field("payment_method", msg))?;

    let resolved = payable_target(&state.db, &caller, request.booking_id, request.order_id).await?;
    let amount = resolved
        .amount_due
        .filter(|amount| *amount > Decimal::ZERO)
        .ok_or_else(|| AppError::field("amount", "This service has no fixed price to pay."))?;

    let now = Utc::now();
    let created = payment::ActiveModel {
        payer_id: Set(caller.id),
        booking_id: Set(resolved.target.booking_id()),
        order_id: Set(resolved.target.order_id()),
        amount: Set(amount),
        currency: Set(DEFAULT_CURRENCY.to_string()),
        payment_method: Set(method),
        mobile_money_provider: Set(provider),
        transaction_id: Set(generate_transaction_id()),
        status: Set(PaymentStatus::Pending),
        phone_number: Set(request.phone_number),
        reference_number: Set(None),
        payment_notes: Set(request.payment_notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!("Payment {} created ({}) for {} {}", created.id, created.transaction_id, created.currency, created.amount);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(PaymentResponse::from(created), "Payment created successfully")),
    ))
}

/// List payments visible to the caller, newest first
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    tag = "payments",
    params(PaymentQuery),
    responses(
        (status = 200, description = "Payments retrieved successfully", body = ApiResponse<Vec<PaymentResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Valid(Query(query)): Valid<Query<PaymentQuery>>,
) -> Result<Json<ApiResponse<Vec<PaymentResponse>>>, AppError> {
    let (page, limit) = page_window(query.page, query.limit, 20);
    let mut finder = payment::Entity::find();
    if caller.is_vendor() {
        let service_ids = vendor_service_ids(&state.db, caller.id).await?;
        let booking_ids: Vec<i32> = booking::Entity::find()
            .select_only()
            .column(booking::Column::Id)
            .filter(booking::Column::ServiceId.is_in(service_ids.clone()))
            .into_tuple()
            .all(&state.db)
            .await?;
        let order_ids: Vec<i32> = order::Entity::find()
            .select_only()
            .column(order::Column::Id)
            .filter(order::Column::ServiceId.is_in(service_ids))
            .into_tuple()
            .all(&state.db)
            .await?;
        finder = finder.filter(
            Condition::any()
                .add(payment::Column::BookingId.is_in(booking_ids))
                .add(payment::Column::OrderId.is_in(order_ids)),
        );
    } else if !caller.is_admin() {
        finder = finder.filter(payment::Column::PayerId.eq(caller.id));
    }
    if let Some(status) = parse_optional_enum::<PaymentStatus>("status", query.status.as_deref())? {
        finder = finder.filter(payment::Column::Status.eq(status));
    }
    if let Some(booking_id) = query.booking_id {
        finder = finder.filter(payment::Column::BookingId.eq(booking_id));
    }
    if let Some(order_id) = query.order_id {
        finder = finder.filter(payment::Column::OrderId.eq(order_id));
    }

    let payments = finder
        .order_by_desc(payment::Column::CreatedAt)
        .order_by_desc(payment::Column::Id)
        .paginate(&state.db, limit)
        .fetch_page(page)
        .await?;
    debug!("Retrieved {} payments", payments.len());
    Ok(Json(ApiResponse::ok(
        payments.into_iter().map(PaymentResponse::from).collect(),
        "Payments retrieved successfully",
    )))
}

/// Get a payment
#[utoipa::path(
    get,
    path = "/api/v1/payments/{payment_id}",
    tag = "payments",
    params(("payment_id" = i32, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment retrieved successfully", body = ApiResponse<PaymentResponse>),
        (status = 403, description = "Not a party to the payment", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn get_payment(
    Path(payment_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<PaymentResponse>>, AppError> {
    let found = find_payment(&state.db, payment_id).await?;
    ensure_can_view(&state.db, &caller, &found).await?;
    Ok(Json(ApiResponse::ok(PaymentResponse::from(found), "Payment retrieved successfully")))
}

/// Settle a pending payment
///
/// Stands in for a card processor: the payment always succeeds and the
/// booking or order it settles is confirmed.
#[utoipa::path(
    post,
    path = "/api/v1/payments/{payment_id}/process",
    tag = "payments",
    params(("payment_id" = i32, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment processed successfully", body = ApiResponse<PaymentResponse>),
        (status = 400, description = "Payment already processed", body = ErrorResponse),
        (status = 403, description = "Not the payer", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn process_payment(
    Path(payment_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<PaymentResponse>>, AppError> {
    let found = find_payment(&state.db, payment_id).await?;
    if found.payer_id != caller.id {
        return Err(AppError::forbidden("You can only process your own payments."));
    }
    if found.status == PaymentStatus::Successful {
        return Err(AppError::bad_request("Payment has already been processed."));
    }
    let target = found
        .target()
        .ok_or_else(|| AppError::Internal(format!("payment {} has no target", found.id)))?;
    let next = found.status.transition_to(PaymentStatus::Successful)?;

    let mut active: payment::ActiveModel = found.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now());
    let paid = active.update(&state.db).await?;
    confirm_target(&state.db, target).await?;
    info!("Payment {} processed", paid.id);

    let listing = resolve_target(&state.db, target).await?.listing;
    announce_payment(&state, &paid, &listing).await;

    Ok(Json(ApiResponse::ok(PaymentResponse::from(paid), "Payment processed successfully")))
}

/// Start a mobile money collection
#[utoipa::path(
    post,
    path = "/api/v1/payments/momo/initiate",
    tag = "payments",
    request_body = MomoInitiateRequest,
    responses(
        (status = 201, description = "Mobile money payment initiated", body = ApiResponse<MomoInitiateResponse>),
        (status = 400, description = "Invalid amount, provider or target", body = ErrorResponse),
        (status = 403, description = "Not the booking's student or the order's customer", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn initiate_momo(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<MomoInitiateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MomoInitiateResponse>>), AppError> {
    if request.amount <= Decimal::ZERO {
        return Err(AppError::field("amount", "Amount must be greater than zero."));
    }
    let provider = match request.provider.as_deref() {
        Some(raw) => parse_enum::<MobileMoneyProvider>("provider", &raw.to_lowercase())?,
        None => MobileMoneyProvider::Mtn,
    };
    validate_method_details(PaymentMethod::MobileMoney, Some(provider), Some(&request.phone_number))
        .map_err(|msg| AppError::field("phone_number", msg))?;
    let resolved = payable_target(&state.db, &caller, request.booking_id, request.order_id).await?;

    let now = Utc::now();
    let reference = Uuid::new_v4().to_string();
    let created = payment::ActiveModel {
        payer_id: Set(caller.id),
        booking_id: Set(resolved.target.booking_id()),
        order_id: Set(resolved.target.order_id()),
        amount: Set(request.amount),
        currency: Set(DEFAULT_CURRENCY.to_string()),
        payment_method: Set(PaymentMethod::MobileMoney),
        mobile_money_provider: Set(Some(provider)),
        transaction_id: Set(generate_momo_transaction_id()),
        status: Set(PaymentStatus::Processing),
        phone_number: Set(Some(request.phone_number)),
        reference_number: Set(Some(reference.clone())),
        payment_notes: Set(Some(format!("MoMo payment initiated via {}", provider.display_name()))),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!("MoMo payment {} initiated with {}", created.id, provider.display_name());

    let response = MomoInitiateResponse {
        payment_id: created.id,
        transaction_id: created.transaction_id,
        reference,
        provider: provider.display_name().to_string(),
        amount: two_places(created.amount),
        currency: created.currency,
        status: "PENDING".to_string(),
        message: "Payment request sent. Approve the prompt on your phone.".to_string(),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response, "Mobile money payment initiated"))))
}

/// Check the outcome of a mobile money collection
#[utoipa::path(
    get,
    path = "/api/v1/payments/momo/verify/{reference}",
    tag = "payments",
    params(("reference" = String, Path, description = "Reference returned by initiate")),
    responses(
        (status = 200, description = "Payment status retrieved", body = ApiResponse<MomoVerifyResponse>),
        (status = 403, description = "Not a party to the payment", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn verify_momo(
    Path(reference): Path<String>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<MomoVerifyResponse>>, AppError> {
    let found = payment::Entity::find()
        .filter(payment::Column::ReferenceNumber.eq(reference.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Payment"))?;
    ensure_can_view(&state.db, &caller, &found).await?;

    let settled = if matches!(found.status, PaymentStatus::Processing | PaymentStatus::Pending) {
        let outcome = if momo_succeeds() { PaymentStatus::Successful } else { PaymentStatus::Failed };
        let target = found.target();
        let mut active: payment::ActiveModel = found.into();
        active.status = Set(outcome);
        active.updated_at = Set(Utc::now());
        let settled = active.update(&state.db).await?;
        info!("MoMo payment {} settled as {}", settled.id, outcome.to_value());
        if let (PaymentStatus::Successful, Some(target)) = (outcome, target) {
            confirm_target(&state.db, target).await?;
            let listing = resolve_target(&state.db, target).await?.listing;
            announce_payment(&state, &settled, &listing).await;
        }
        settled
    } else {
        found
    };

    Ok(Json(ApiResponse::ok(
        MomoVerifyResponse {
            payment_id: settled.id,
            reference,
            status: settled.status.to_value(),
        },
        "Payment status retrieved",
    )))
}
