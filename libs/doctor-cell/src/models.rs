use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};

use shared_models::error::AppError;

/// Columns list endpoints accept in `filter`.
pub const DOCTOR_FILTER_FIELDS: &[&str] = &["name", "email", "crm", "specialty", "active"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub crm: String,
    pub specialty: String,
    pub phone: Option<String>,
    pub active: bool,
    #[serde(default, alias = "inativacaoSolicitadaEm")]
    pub inactivation_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Doctor profile plus its derived inactivation state.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorView {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub status: InactivationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub crm: String,
    pub specialty: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub crm: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorSearchQuery {
    pub filter: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// One weekly working interval, in clinic-local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub doctor_id: Uuid,
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHoursEntry {
    pub weekday: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Occupied stretch of a doctor's day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusyInterval {
    pub start: NaiveTime,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorPatient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingTime {
    pub text: String,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InactivationStatus {
    Active,
    PendingInactivation {
        requested_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
        remaining: RemainingTime,
    },
    Inactive,
}

impl InactivationStatus {
    pub fn accepts_bookings(&self) -> bool {
        !matches!(self, InactivationStatus::Inactive)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum DoctorError {
    #[error("Médico não encontrado")]
    NotFound,

    #[error("Já existe um médico com o e-mail {email}")]
    EmailAlreadyExists { email: String },

    #[error("Horário inválido: {0}")]
    InvalidWorkingHours(String),

    #[error("Já existe uma solicitação de inativação para este médico")]
    InactivationAlreadyRequested,

    #[error("Não há solicitação de inativação pendente")]
    NoPendingInactivation,

    #[error("O prazo para reverter a inativação expirou")]
    InactivationWindowExpired,

    #[error("Médico inativo")]
    DoctorInactive,

    #[error("Médico já está ativo")]
    AlreadyActive,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::EmailAlreadyExists { .. }
            | DoctorError::InactivationAlreadyRequested
            | DoctorError::AlreadyActive => AppError::Conflict(err.to_string()),
            DoctorError::InvalidWorkingHours(_)
            | DoctorError::NoPendingInactivation
            | DoctorError::InactivationWindowExpired
            | DoctorError::DoctorInactive => AppError::BadRequest(err.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

impl From<anyhow::Error> for DoctorError {
    fn from(err: anyhow::Error) -> Self {
        DoctorError::DatabaseError(err.to_string())
    }
}
