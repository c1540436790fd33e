//! HTTP handlers for the REST API.
//!
//! Each handler resolves the caller, reads the clock once and delegates to
//! the service layer.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::auth::AuthUser;
use super::dto::{
    AttendanceLog, AttendanceReceipt, AttendanceRequest, Availability, AvailabilityChanges,
    AvailabilityQuery, AvailabilityRequest, Booking, BookingFilter, BookingReceipt,
    BookingRequest, CancellationReceipt, DeleteBookingResponse, HealthResponse, NewPackage,
    Package, PackageOverride, SlotListResponse, SlotQuery, StudentStats, UpsertUserRequest, User,
};
use super::error::AppError;
use super::state::AppState;
use crate::models::{AvailabilityId, BookingId, PackageId, UserId};
use crate::services::{self, attendance, availability, booking, cancellation, packages, slots, users};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;
pub type CreatedResult<T> = Result<(StatusCode, Json<T>), AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };
    let calendar = if state.calendar.is_enabled() {
        "enabled"
    } else {
        "disabled"
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
        calendar: calendar.to_string(),
    }))
}

// =============================================================================
// Slots
// =============================================================================

/// GET /v1/slots?startDate=YYYY-MM-DD&endDate=YYYY-MM-DD&teacherId=
pub async fn list_slots(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Query(query): Query<SlotQuery>,
) -> HandlerResult<SlotListResponse> {
    let slots =
        slots::generate_slots(state.repository.as_ref(), &state.policy, &query, Utc::now()).await?;
    let total = slots.len();
    Ok(Json(SlotListResponse { slots, total }))
}

// =============================================================================
// Availability
// =============================================================================

/// GET /v1/availability?teacherId=&includeInactive=
pub async fn list_availability(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Query(query): Query<AvailabilityQuery>,
) -> HandlerResult<Vec<Availability>> {
    let windows = availability::list_availability(
        state.repository.as_ref(),
        query.teacher_id,
        query.include_inactive,
    )
    .await?;
    Ok(Json(windows))
}

/// POST /v1/availability
pub async fn create_availability(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(request): Json<AvailabilityRequest>,
) -> CreatedResult<Availability> {
    let window =
        availability::create_availability(state.repository.as_ref(), &actor, request).await?;
    Ok((StatusCode::CREATED, Json(window)))
}

/// PATCH /v1/availability/{id}
pub async fn update_availability(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(changes): Json<AvailabilityChanges>,
) -> HandlerResult<Availability> {
    let window = availability::update_availability(
        state.repository.as_ref(),
        &actor,
        AvailabilityId(id),
        changes,
    )
    .await?;
    Ok(Json(window))
}

/// DELETE /v1/availability/{id}
///
/// Soft delete: the window is deactivated and still listed with
/// `includeInactive=true`.
pub async fn deactivate_availability(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Availability> {
    let window =
        availability::deactivate_availability(state.repository.as_ref(), &actor, AvailabilityId(id))
            .await?;
    Ok(Json(window))
}

// =============================================================================
// Bookings
// =============================================================================

/// POST /v1/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(request): Json<BookingRequest>,
) -> CreatedResult<BookingReceipt> {
    let receipt = booking::create_booking(
        state.repository.as_ref(),
        &state.policy,
        state.calendar.as_ref(),
        state.lesson_minutes,
        &actor,
        request,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /v1/bookings?studentId=&teacherId=&status=
pub async fn list_bookings(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(filter): Query<BookingFilter>,
) -> HandlerResult<Vec<Booking>> {
    let bookings = booking::list_bookings(state.repository.as_ref(), &actor, filter).await?;
    Ok(Json(bookings))
}

/// GET /v1/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Booking> {
    let found = booking::get_booking(state.repository.as_ref(), &actor, BookingId(id)).await?;
    Ok(Json(found))
}

/// POST /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<CancellationReceipt> {
    let receipt = cancellation::cancel_booking(
        state.repository.as_ref(),
        &state.policy,
        state.calendar.as_ref(),
        &actor,
        BookingId(id),
        Utc::now(),
    )
    .await?;
    Ok(Json(receipt))
}

/// POST /v1/bookings/{id}/complete
pub async fn complete_booking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Booking> {
    let completed =
        booking::complete_booking(state.repository.as_ref(), &actor, BookingId(id), Utc::now())
            .await?;
    Ok(Json(completed))
}

/// DELETE /v1/bookings/{id}
pub async fn delete_booking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<DeleteBookingResponse> {
    let booking_id = BookingId(id);
    let warnings = booking::delete_booking(
        state.repository.as_ref(),
        state.calendar.as_ref(),
        &actor,
        booking_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(DeleteBookingResponse {
        booking_id,
        deleted: true,
        warnings,
    }))
}

// =============================================================================
// Attendance
// =============================================================================

/// POST /v1/attendance
pub async fn record_attendance(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(request): Json<AttendanceRequest>,
) -> CreatedResult<AttendanceReceipt> {
    let receipt =
        attendance::record_attendance(state.repository.as_ref(), &actor, request, Utc::now())
            .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /v1/bookings/{id}/attendance
pub async fn list_attendance(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Vec<AttendanceLog>> {
    let logs =
        attendance::list_attendance(state.repository.as_ref(), &actor, BookingId(id)).await?;
    Ok(Json(logs))
}

/// GET /v1/students/{id}/stats
pub async fn get_student_stats(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<StudentStats> {
    let stats =
        attendance::get_student_stats(state.repository.as_ref(), &actor, UserId(id), Utc::now())
            .await?;
    Ok(Json(stats))
}

/// POST /v1/students/{id}/stats/recompute
pub async fn recompute_student_stats(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<StudentStats> {
    let stats = attendance::recompute_student_stats(
        state.repository.as_ref(),
        &actor,
        UserId(id),
        Utc::now(),
    )
    .await?;
    Ok(Json(stats))
}

// =============================================================================
// Packages
// =============================================================================

/// POST /v1/packages
pub async fn create_package(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(package): Json<NewPackage>,
) -> CreatedResult<Package> {
    let created =
        packages::create_package(state.repository.as_ref(), &actor, package, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v1/users/{id}/packages
pub async fn list_packages(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Vec<Package>> {
    let found = packages::list_packages(state.repository.as_ref(), &actor, UserId(id)).await?;
    Ok(Json(found))
}

/// GET /v1/users/{id}/packages/active
///
/// `null` when the user has no package valid right now.
pub async fn active_package(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Option<Package>> {
    let found =
        packages::active_package(state.repository.as_ref(), &actor, UserId(id), Utc::now())
            .await?;
    Ok(Json(found))
}

/// PATCH /v1/packages/{id}
pub async fn override_package(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(changes): Json<PackageOverride>,
) -> HandlerResult<Package> {
    let package =
        packages::override_package(state.repository.as_ref(), &actor, PackageId(id), changes)
            .await?;
    Ok(Json(package))
}

// =============================================================================
// Users
// =============================================================================

/// PUT /v1/users/{id}
pub async fn upsert_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpsertUserRequest>,
) -> HandlerResult<User> {
    let user = users::upsert_user(
        state.repository.as_ref(),
        &actor,
        User {
            id: UserId(id),
            display_name: request.display_name,
            role: request.role,
        },
    )
    .await?;
    Ok(Json(user))
}

/// GET /v1/teachers
pub async fn list_teachers(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
) -> HandlerResult<Vec<User>> {
    Ok(Json(users::list_teachers(state.repository.as_ref()).await?))
}
