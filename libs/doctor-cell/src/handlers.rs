use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, user_id};
use shared_utils::filter::parse_optional;

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorSearchQuery, DoctorView, UpdateDoctorRequest,
    WorkingHoursEntry, DOCTOR_FILTER_FIELDS,
};
use crate::services::{BusinessCalendar, DoctorService, InactivationService, ScheduleService};

/// Admins manage everyone; doctors and their assistants manage that doctor.
fn ensure_can_manage(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.is_admin() || user.agenda_doctor_id() == Some(doctor_id.to_string().as_str()) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Sem permissão para gerenciar este médico".to_string()))
    }
}

fn parse_doctor_id(doctor_id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(doctor_id)
        .map_err(|_| AppError::BadRequest(format!("Identificador de médico inválido: {}", doctor_id)))
}

fn view(calendar: &BusinessCalendar, doctor: Doctor) -> DoctorView {
    let status = calendar.status_of(&doctor, Utc::now());
    DoctorView { doctor, status }
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = parse_optional(query.filter.as_deref(), DOCTOR_FILTER_FIELDS)?;

    let doctor_service = DoctorService::new(&state);
    let doctors = doctor_service
        .list_doctors(filter.as_ref(), user.is_admin(), query.limit, query.offset, auth.token())
        .await?;

    let calendar = BusinessCalendar::from_config(&state);
    let views: Vec<DoctorView> = doctors.into_iter().map(|d| view(&calendar, d)).collect();

    Ok(Json(json!({
        "total": views.len(),
        "doctors": views
    })))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Administrador])?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.create_doctor(request, auth.token()).await?;

    Ok(Json(json!(view(&BusinessCalendar::from_config(&state), doctor))))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Medico])?;

    let doctor = DoctorService::new(&state).get_doctor(user_id(&user)?, auth.token()).await?;
    Ok(Json(json!(view(&BusinessCalendar::from_config(&state), doctor))))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Medico])?;

    let doctor = DoctorService::new(&state).update_doctor(user_id(&user)?, request, auth.token()).await?;
    Ok(Json(json!(view(&BusinessCalendar::from_config(&state), doctor))))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;

    let doctor = DoctorService::new(&state).get_doctor(id, auth.token()).await?;
    Ok(Json(json!(view(&BusinessCalendar::from_config(&state), doctor))))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;
    if !(user.is_admin() || (user.role == Role::Medico && user.id == id.to_string())) {
        return Err(AppError::Forbidden("Sem permissão para alterar este médico".to_string()));
    }

    let doctor = DoctorService::new(&state).update_doctor(id, request, auth.token()).await?;
    Ok(Json(json!(view(&BusinessCalendar::from_config(&state), doctor))))
}

#[axum::debug_handler]
pub async fn get_doctor_patients(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;
    ensure_can_manage(&user, id)?;

    let patients = DoctorService::new(&state)
        .list_doctor_patients(id, auth.token())
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "total": patients.len(),
        "patients": patients
    })))
}

#[axum::debug_handler]
pub async fn get_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;

    let hours = ScheduleService::new(&state).get_working_hours(id, auth.token()).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "working_hours": hours
    })))
}

#[axum::debug_handler]
pub async fn replace_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(entries): Json<Vec<WorkingHoursEntry>>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;
    ensure_can_manage(&user, id)?;

    let hours = ScheduleService::new(&state)
        .replace_working_hours(id, entries, auth.token())
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "working_hours": hours
    })))
}

#[axum::debug_handler]
pub async fn request_inactivation(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;
    require_role(&user, &[Role::Administrador])?;

    let doctor = DoctorService::new(&state).get_doctor(id, auth.token()).await?;
    let service = InactivationService::new(&state);
    let updated = service.request_inactivation(&doctor, Utc::now(), auth.token()).await?;

    Ok(Json(json!(view(service.calendar(), updated))))
}

#[axum::debug_handler]
pub async fn revert_inactivation(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;
    require_role(&user, &[Role::Administrador])?;

    let doctor = DoctorService::new(&state).get_doctor(id, auth.token()).await?;
    let service = InactivationService::new(&state);
    let updated = service.revert_inactivation(&doctor, Utc::now(), auth.token()).await?;

    Ok(Json(json!(view(service.calendar(), updated))))
}

#[axum::debug_handler]
pub async fn reactivate_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;
    require_role(&user, &[Role::Administrador])?;

    let doctor = DoctorService::new(&state).get_doctor(id, auth.token()).await?;
    let service = InactivationService::new(&state);
    let updated = service.reactivate(&doctor, Utc::now(), auth.token()).await?;

    Ok(Json(json!(view(service.calendar(), updated))))
}

#[axum::debug_handler]
pub async fn get_inactivation_status(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let id = parse_doctor_id(&doctor_id)?;

    let doctor = DoctorService::new(&state).get_doctor(id, auth.token()).await?;
    let calendar = BusinessCalendar::from_config(&state);

    Ok(Json(json!({
        "doctor_id": doctor.id,
        "status": calendar.status_of(&doctor, Utc::now())
    })))
}
