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

use crate::models::{
    AssistantError, AssistantListQuery, CreateAssistantRequest, DeleteAssistantsRequest,
    UpdateAssistantRequest,
};
use crate::services::assistant::{can_manage, AssistantService};

fn parse_assistant_id(assistant_id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(assistant_id)
        .map_err(|_| AppError::BadRequest(format!("Identificador de auxiliar inválido: {}", assistant_id)))
}

/// Doctor whose assistants the caller may touch; `None` means all (admin).
fn management_scope(user: &User) -> Result<Option<Uuid>, AppError> {
    require_role(user, &[Role::Medico, Role::Administrador])?;
    match user.role {
        Role::Medico => user_id(user).map(Some),
        _ => Ok(None),
    }
}

#[axum::debug_handler]
pub async fn list_assistants(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AssistantListQuery>,
) -> Result<Json<Value>, AppError> {
    let scope = management_scope(&user)?.or(query.doctor_id);

    let assistants = AssistantService::new(&config).list_assistants(scope, auth.token()).await?;

    Ok(Json(json!({
        "assistants": assistants,
        "total": assistants.len()
    })))
}

#[axum::debug_handler]
pub async fn create_assistant(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAssistantRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = match management_scope(&user)? {
        Some(own) => own,
        None => request.doctor_id.ok_or(AssistantError::DoctorRequired)?,
    };

    let assistant = AssistantService::new(&config)
        .create_assistant(request, doctor_id, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(assistant))))
}

#[axum::debug_handler]
pub async fn delete_assistants(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DeleteAssistantsRequest>,
) -> Result<Json<Value>, AppError> {
    let scope = management_scope(&user)?;

    let deleted = AssistantService::new(&config)
        .delete_assistants(&request.ids, scope, auth.token())
        .await?;

    Ok(Json(json!({
        "deleted": deleted.iter().map(|a| a.id).collect::<Vec<_>>(),
        "total": deleted.len()
    })))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Auxiliar])?;

    let assistant = AssistantService::new(&config).get_assistant(user_id(&user)?, auth.token()).await?;
    Ok(Json(json!(assistant)))
}

#[axum::debug_handler]
pub async fn get_assistant(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(assistant_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_assistant_id(&assistant_id)?;
    let service = AssistantService::new(&config);
    let assistant = service.get_assistant(id, auth.token()).await?;

    if !(can_manage(&user, &assistant) || user.id == id.to_string()) {
        return Err(AssistantError::Unauthorized.into());
    }

    Ok(Json(json!(assistant)))
}

#[axum::debug_handler]
pub async fn update_assistant(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(assistant_id): Path<String>,
    Json(request): Json<UpdateAssistantRequest>,
) -> Result<Json<Value>, AppError> {
    let id = parse_assistant_id(&assistant_id)?;
    let service = AssistantService::new(&config);
    let current = service.get_assistant(id, auth.token()).await?;

    if !(can_manage(&user, &current) || user.id == id.to_string()) {
        return Err(AssistantError::Unauthorized.into());
    }

    let assistant = service.update_assistant(id, request, auth.token()).await?;
    Ok(Json(json!(assistant)))
}

#[axum::debug_handler]
pub async fn delete_assistant(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(assistant_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = AssistantService::new(&config);
    let current = service.get_assistant(assistant_id, auth.token()).await?;

    if !can_manage(&user, &current) {
        return Err(AssistantError::Unauthorized.into());
    }

    service.delete_assistants(&[assistant_id], None, auth.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}
