use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::{notifier, NewNotification};
use model::entities::booking::{self, BookingStatus};
use model::entities::notification::{NotificationType, Priority};
use model::entities::{service, user};
use model::StatusTransitions;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::{ensure_student, CurrentUser};
use crate::errors::AppError;
use crate::handlers::services::{find_service, vendor_service_ids};
use crate::helpers::converters::{page_window, parse_optional_enum};
use crate::schemas::{ApiResponse, AppState};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateBookingRequest {
    pub service_id: i32,
    /// Must be in the future
    pub booking_date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    pub id: i32,
    pub service_id: i32,
    pub student_id: i32,
    pub booking_date: DateTime<Utc>,
    pub booking_status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<booking::Model> for BookingResponse {
    fn from(model: booking::Model) -> Self {
        Self {
            id: model.id,
            service_id: model.service_id,
            student_id: model.student_id,
            booking_date: model.booking_date,
            booking_status: model.booking_status.to_value(),
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct BookingQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// pending, confirmed, cancelled or completed
    pub status: Option<String>,
}

/// Students see their bookings, vendors the bookings for their services,
/// admins everything.
async fn scoped(db: &DatabaseConnection, caller: &user::Model) -> Result<Select<booking::Entity>, AppError> {
    let finder = booking::Entity::find();
    Ok(if caller.is_admin() {
        finder
    } else if caller.is_vendor() {
        finder.filter(booking::Column::ServiceId.is_in(vendor_service_ids(db, caller.id).await?))
    } else {
        finder.filter(booking::Column::StudentId.eq(caller.id))
    })
}

/// A booking together with the service it is for.
async fn load_booking(state: &AppState, booking_id: i32) -> Result<(booking::Model, service::Model), AppError> {
    let found = booking::Entity::find_by_id(booking_id)
        .find_also_related(service::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))?;
    match found {
        (booking, Some(listing)) => Ok((booking, listing)),
        (_, None) => Err(AppError::not_found("Service")),
    }
}

async fn set_status(
    state: &AppState,
    existing: booking::Model,
    requested: BookingStatus,
) -> Result<booking::Model, AppError> {
    let next = existing.booking_status.transition_to(requested)?;
    let mut active: booking::ActiveModel = existing.into();
    active.booking_status = Set(next);
    active.updated_at = Set(Utc::now());
    Ok(active.update(&state.db).await?)
}

/// Book a time slot on a booking-type service
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created successfully", body = ApiResponse<BookingResponse>),
        (status = 400, description = "Slot taken, past date or service not bookable", body = ErrorResponse),
        (status = 403, description = "Only students can book", body = ErrorResponse),
        (status = 404, description = "Service not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.id))]
pub async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BookingResponse>>), AppError> {
    trace!("Entering create_booking function");
    ensure_student(&caller, "make bookings")?;
    let now = Utc::now();
    if request.booking_date <= now {
        return Err(AppError::field("booking_date", "Booking date must be in the future."));
    }
    let listing = find_service(&state.db, request.service_id).await?;
    if !listing.supports_booking {
        return Err(AppError::field("service", "This service does not accept bookings."));
    }
    if !listing.can_book() {
        return Err(AppError::field("service", "This service is currently unavailable."));
    }

    let taken = booking::Entity::find()
        .filter(booking::Column::ServiceId.eq(listing.id))
        .filter(booking::Column::BookingDate.eq(request.booking_date))
        .count(&state.db)
        .await?;
    if taken > 0 {
        debug!("Slot {} on service {} already taken", request.booking_date, listing.id);
        return Err(AppError::bad_request("This time slot is already booked."));
    }

    let created = booking::ActiveModel {
        service_id: Set(listing.id),
        student_id: Set(caller.id),
        booking_date: Set(request.booking_date),
        booking_status: Set(BookingStatus::Pending),
        notes: Set(request.notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!("Booking {} created for service {}", created.id, listing.id);

    let when = created.booking_date.format("%Y-%m-%d %H:%M");
    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            listing.vendor_id,
            NotificationType::BookingCreated,
            format!("New Booking for {}", listing.service_name),
            format!("{} booked {} for {when}.", caller.full_name(), listing.service_name),
        )
        .priority(Priority::High)
        .related_service(listing.id)
        .related_booking(created.id),
    )
    .await;
    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            caller.id,
            NotificationType::BookingConfirmed,
            format!("Booking Confirmed: {}", listing.service_name),
            format!("Your booking for {} on {when} has been received.", listing.service_name),
        )
        .related_service(listing.id)
        .related_booking(created.id),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(BookingResponse::from(created), "Booking created successfully")),
    ))
}

/// List bookings visible to the caller, latest slot first
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "bookings",
    params(BookingQuery),
    responses(
        (status = 200, description = "Bookings retrieved successfully", body = ApiResponse<Vec<BookingResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn list_bookings(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Valid(Query(query)): Valid<Query<BookingQuery>>,
) -> Result<Json<ApiResponse<Vec<BookingResponse>>>, AppError> {
    let (page, limit) = page_window(query.page, query.limit, 20);
    let mut finder = scoped(&state.db, &caller).await?;
    if let Some(status) = parse_optional_enum::<BookingStatus>("status", query.status.as_deref())? {
        finder = finder.filter(booking::Column::BookingStatus.eq(status));
    }
    let bookings = finder
        .order_by_desc(booking::Column::BookingDate)
        .paginate(&state.db, limit)
        .fetch_page(page)
        .await?;
    debug!("Retrieved {} bookings", bookings.len());
    Ok(Json(ApiResponse::ok(
        bookings.into_iter().map(BookingResponse::from).collect(),
        "Bookings retrieved successfully",
    )))
}

/// Pending and confirmed bookings that have not happened yet, soonest first
#[utoipa::path(
    get,
    path = "/api/v1/bookings/upcoming",
    tag = "bookings",
    responses(
        (status = 200, description = "Upcoming bookings retrieved successfully", body = ApiResponse<Vec<BookingResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn upcoming_bookings(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<Vec<BookingResponse>>>, AppError> {
    let bookings = scoped(&state.db, &caller)
        .await?
        .filter(booking::Column::BookingDate.gte(Utc::now()))
        .filter(booking::Column::BookingStatus.is_in(BookingStatus::ACTIVE))
        .order_by_asc(booking::Column::BookingDate)
        .all(&state.db)
        .await?;
    Ok(Json(ApiResponse::ok(
        bookings.into_iter().map(BookingResponse::from).collect(),
        "Upcoming bookings retrieved successfully",
    )))
}

/// Get a booking
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{booking_id}",
    tag = "bookings",
    params(("booking_id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking retrieved successfully", body = ApiResponse<BookingResponse>),
        (status = 403, description = "Not a party to the booking", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn get_booking(
    Path(booking_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let (booking, listing) = load_booking(&state, booking_id).await?;
    if booking.student_id != caller.id && listing.vendor_id != caller.id && !caller.is_admin() {
        return Err(AppError::forbidden("You can only view your own bookings."));
    }
    Ok(Json(ApiResponse::ok(BookingResponse::from(booking), "Booking retrieved successfully")))
}

/// Confirm a pending booking (service vendor only)
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{booking_id}/confirm",
    tag = "bookings",
    params(("booking_id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking confirmed successfully", body = ApiResponse<BookingResponse>),
        (status = 400, description = "Invalid status transition", body = ErrorResponse),
        (status = 403, description = "Not the service vendor", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn confirm_booking(
    Path(booking_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let (booking, listing) = load_booking(&state, booking_id).await?;
    if listing.vendor_id != caller.id {
        warn!("User {} tried to confirm booking {}", caller.id, booking_id);
        return Err(AppError::forbidden("Only the service vendor can confirm this booking."));
    }
    let updated = set_status(&state, booking, BookingStatus::Confirmed).await?;
    info!("Booking {} confirmed", updated.id);

    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            updated.student_id,
            NotificationType::BookingConfirmed,
            format!("Booking Confirmed: {}", listing.service_name),
            format!(
                "{} confirmed your booking on {}.",
                listing.service_name,
                updated.booking_date.format("%Y-%m-%d %H:%M")
            ),
        )
        .related_service(listing.id)
        .related_booking(updated.id),
    )
    .await;

    Ok(Json(ApiResponse::ok(BookingResponse::from(updated), "Booking confirmed successfully")))
}

/// Cancel a booking (student, service vendor or admin)
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{booking_id}/cancel",
    tag = "bookings",
    params(("booking_id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking cancelled successfully", body = ApiResponse<BookingResponse>),
        (status = 400, description = "Invalid status transition", body = ErrorResponse),
        (status = 403, description = "Not a party to the booking", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn cancel_booking(
    Path(booking_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let (booking, listing) = load_booking(&state, booking_id).await?;
    let by_student = booking.student_id == caller.id;
    let by_vendor = listing.vendor_id == caller.id;
    if !by_student && !by_vendor && !caller.is_admin() {
        return Err(AppError::forbidden("You cannot cancel this booking."));
    }
    let updated = set_status(&state, booking, BookingStatus::Cancelled).await?;
    info!("Booking {} cancelled by user {}", updated.id, caller.id);

    let (recipient, message) = if by_student {
        (
            listing.vendor_id,
            format!("{} cancelled their booking for {}.", caller.full_name(), listing.service_name),
        )
    } else {
        (updated.student_id, format!("Your booking for {} has been cancelled.", listing.service_name))
    };
    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            recipient,
            NotificationType::BookingCancelled,
            format!("Booking Cancelled: {}", listing.service_name),
            message,
        )
        .related_service(listing.id)
        .related_booking(updated.id),
    )
    .await;

    Ok(Json(ApiResponse::ok(BookingResponse::from(updated), "Booking cancelled successfully")))
}

/// Mark a confirmed booking as completed (service vendor only)
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{booking_id}/complete",
    tag = "bookings",
    params(("booking_id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking completed successfully", body = ApiResponse<BookingResponse>),
        (status = 400, description = "Invalid status transition", body = ErrorResponse),
        (status = 403, description = "Not the service vendor", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn complete_booking(
    Path(booking_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let (booking, listing) = load_booking(&state, booking_id).await?;
    if listing.vendor_id != caller.id {
        return Err(AppError::forbidden("Only the service vendor can complete this booking."));
    }
    let updated = set_status(&state, booking, BookingStatus::Completed).await?;

    notifier::notify(
        &state.db,
        state.hub.as_ref(),
        NewNotification::new(
            updated.student_id,
            NotificationType::BookingCompleted,
            format!("Booking Completed: {}", listing.service_name),
            format!("Your booking for {} is complete. Consider leaving a review.", listing.service_name),
        )
        .priority(Priority::Low)
        .related_service(listing.id)
        .related_booking(updated.id),
    )
    .await;

    Ok(Json(ApiResponse::ok(BookingResponse::from(updated), "Booking completed successfully")))
}
