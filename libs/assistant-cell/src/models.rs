use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use shared_models::error::AppError;

/// Staff member acting on behalf of exactly one doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub doctor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssistantRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: Option<String>,
    /// Required when an administrator creates the assistant; doctors always
    /// link to themselves.
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAssistantRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAssistantsRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantListQuery {
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AssistantError {
    #[error("Auxiliar não encontrado")]
    NotFound,

    #[error("Já existe um usuário com o e-mail {email}")]
    EmailAlreadyExists { email: String },

    #[error("Informe o médico ao qual o auxiliar será vinculado")]
    DoctorRequired,

    #[error("Nenhum auxiliar selecionado")]
    EmptySelection,

    #[error("Sem permissão para gerenciar este auxiliar")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::NotFound => AppError::NotFound(err.to_string()),
            AssistantError::EmailAlreadyExists { .. } => AppError::Conflict(err.to_string()),
            AssistantError::DoctorRequired | AssistantError::EmptySelection => AppError::BadRequest(err.to_string()),
            AssistantError::Unauthorized => AppError::Forbidden(err.to_string()),
            AssistantError::ValidationError(msg) => AppError::ValidationError(msg),
            AssistantError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

impl From<anyhow::Error> for AssistantError {
    fn from(err: anyhow::Error) -> Self {
        AssistantError::DatabaseError(err.to_string())
    }
}

impl From<AppError> for AssistantError {
    fn from(err: AppError) -> Self {
        AssistantError::ValidationError(err.message().to_string())
    }
}
