// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::filter::parse_optional;

use crate::models::{
    AppointmentSearchQuery, AvailabilityQuery, BookAppointmentRequest, RescheduleProposal,
    UpdateAppointmentRequest, APPOINTMENT_FILTER_FIELDS, DEFAULT_DURATION_MINUTES,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::lifecycle::Transition;

fn parse_appointment_id(appointment_id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(appointment_id)
        .map_err(|_| AppError::BadRequest(format!("Identificador de consulta inválido: {}", appointment_id)))
}

async fn run_transition(
    state: &AppConfig,
    user: &User,
    appointment_id: &str,
    transition: Transition,
    token: &str,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_appointment_id(appointment_id)?;

    let booking_service = AppointmentBookingService::new(state);
    let appointment = booking_service.transition(user, appointment_id, transition, token).await?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// BOOKING AND QUERIES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = parse_optional(query.filter.as_deref(), APPOINTMENT_FILTER_FIELDS)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service
        .list_appointments(&user, filter.as_ref(), query.limit, query.offset, auth.token())
        .await?;

    Ok(Json(json!({
        "total": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.book_appointment(&user, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let slots = booking_service
        .available_slots(query.doctor_id, query.date, query.duration_minutes, auth.token())
        .await?;

    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "date": query.date,
        "duration_minutes": query.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_for_user(&user, appointment_id, auth.token()).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .update_appointment(&user, appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_actions(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;

    let booking_service = AppointmentBookingService::new(&state);
    let actions = booking_service.actions_for(&user, appointment_id, auth.token()).await?;

    Ok(Json(json!(actions)))
}

// ==============================================================================
// STATUS TRANSITIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    run_transition(&state, &user, &appointment_id, Transition::Confirm, auth.token()).await
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    run_transition(&state, &user, &appointment_id, Transition::Cancel, auth.token()).await
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    run_transition(&state, &user, &appointment_id, Transition::Complete, auth.token()).await
}

#[axum::debug_handler]
pub async fn request_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(proposal): Json<RescheduleProposal>,
) -> Result<Json<Value>, AppError> {
    run_transition(
        &state,
        &user,
        &appointment_id,
        Transition::ProposeReschedule(proposal),
        auth.token(),
    ).await
}

#[axum::debug_handler]
pub async fn accept_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    run_transition(&state, &user, &appointment_id, Transition::AcceptReschedule, auth.token()).await
}

#[axum::debug_handler]
pub async fn reject_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    run_transition(&state, &user, &appointment_id, Transition::RejectReschedule, auth.token()).await
}
