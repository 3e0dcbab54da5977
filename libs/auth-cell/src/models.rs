use serde::{Deserialize, Serialize};

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Profile chosen on the profile-selection screen.
    pub profile: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    /// Recovery token from the link Supabase e-mailed.
    pub access_token: String,
    pub password: String,
    pub confirm_password: String,
}

/// Profile row as stored in any of the four profile tables.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Only assistants carry it.
    #[serde(default)]
    pub doctor_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Selecione um perfil antes de entrar")]
    ProfileNotSelected,

    #[error("E-mail ou senha inválidos")]
    InvalidCredentials,

    #[error("Usuário não possui o perfil '{0}'")]
    ProfileMismatch(Role),

    #[error("Auxiliar sem médico vinculado")]
    AssistantWithoutDoctor,

    #[error("Link de recuperação inválido ou expirado")]
    InvalidResetToken,

    #[error("Falha ao emitir token: {0}")]
    TokenIssue(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Serviço de autenticação indisponível: {0}")]
    Upstream(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ProfileNotSelected => AppError::BadRequest(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidResetToken => AppError::Auth(err.to_string()),
            AuthError::ProfileMismatch(_) | AuthError::AssistantWithoutDoctor => {
                AppError::Forbidden(err.to_string())
            }
            AuthError::TokenIssue(msg) => AppError::Internal(msg),
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::Upstream(msg) => AppError::ExternalService(msg),
        }
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::ValidationError(err.message().to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Upstream(err.to_string())
    }
}
