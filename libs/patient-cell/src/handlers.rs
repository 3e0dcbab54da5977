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
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, user_id};
use shared_utils::filter::parse_optional;

use crate::models::{
    CreatePatientRequest, PatientError, PatientSearchQuery, UpdatePatientRequest,
    PATIENT_FILTER_FIELDS,
};
use crate::services::PatientService;

fn parse_patient_id(patient_id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(patient_id)
        .map_err(|_| AppError::BadRequest(format!("Identificador de paciente inválido: {}", patient_id)))
}

/// Patients see themselves; clinic staff see everyone.
fn ensure_can_read(user: &User, patient_id: Uuid) -> Result<(), AppError> {
    match user.role {
        Role::Paciente if user.id != patient_id.to_string() => Err(PatientError::Unauthorized.into()),
        _ => Ok(()),
    }
}

#[axum::debug_handler]
pub async fn register_patient(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = PatientService::new(&config);
    let patient = service.register_patient(request).await?;

    Ok((StatusCode::CREATED, Json(json!(patient))))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Medico, Role::Auxiliar, Role::Administrador])?;
    let filter = parse_optional(query.filter.as_deref(), PATIENT_FILTER_FIELDS)?;

    let service = PatientService::new(&config);
    let patients = service
        .list_patients(filter.as_ref(), query.limit, query.offset, auth.token())
        .await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Paciente])?;

    let patient = PatientService::new(&config).get_patient(user_id(&user)?, auth.token()).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Paciente])?;

    let patient = PatientService::new(&config).update_patient(user_id(&user)?, request, auth.token()).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_patient_id(&patient_id)?;
    ensure_can_read(&user, id)?;

    let patient = PatientService::new(&config).get_patient(id, auth.token()).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let id = parse_patient_id(&patient_id)?;
    if !(user.is_admin() || (user.role == Role::Paciente && user.id == id.to_string())) {
        return Err(PatientError::Unauthorized.into());
    }

    let patient = PatientService::new(&config).update_patient(id, request, auth.token()).await?;
    Ok(Json(json!(patient)))
}
