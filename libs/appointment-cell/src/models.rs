use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use shared_models::error::AppError;

/// Columns list endpoints accept in `filter`.
pub const APPOINTMENT_FILTER_FIELDS: &[&str] = &[
    "status", "date", "time", "patient_id", "patient_name", "doctor_id", "doctor_name",
];

pub const MIN_DURATION_MINUTES: i64 = 5;
pub const MAX_DURATION_MINUTES: i64 = 240;
pub const DEFAULT_DURATION_MINUTES: i64 = 30;

fn default_duration() -> i64 {
    DEFAULT_DURATION_MINUTES
}

// ==============================================================================
// STATUS
// ==============================================================================

/// Appointment status. The serialized form is the Portuguese text stored in
/// the `status` column and shown to users.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    #[serde(rename = "Aguardando Confirmação do Médico")]
    AwaitingDoctor,
    #[serde(rename = "Aguardando Confirmação do Paciente")]
    AwaitingPatient,
    #[serde(rename = "Confirmada")]
    Confirmed,
    #[serde(rename = "Remarcação Solicitada Pelo Paciente")]
    RescheduleByPatient,
    #[serde(rename = "Remarcação Solicitada Pelo Médico")]
    RescheduleByDoctor,
    #[serde(rename = "Concluída")]
    Completed,
    #[serde(rename = "Cancelada Pelo Paciente")]
    CancelledByPatient,
    #[serde(rename = "Cancelada Pelo Médico")]
    CancelledByDoctor,
    #[serde(rename = "Expirada")]
    Expired,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 9] = [
        AppointmentStatus::AwaitingDoctor,
        AppointmentStatus::AwaitingPatient,
        AppointmentStatus::Confirmed,
        AppointmentStatus::RescheduleByPatient,
        AppointmentStatus::RescheduleByDoctor,
        AppointmentStatus::Completed,
        AppointmentStatus::CancelledByPatient,
        AppointmentStatus::CancelledByDoctor,
        AppointmentStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::AwaitingDoctor => "Aguardando Confirmação do Médico",
            AppointmentStatus::AwaitingPatient => "Aguardando Confirmação do Paciente",
            AppointmentStatus::Confirmed => "Confirmada",
            AppointmentStatus::RescheduleByPatient => "Remarcação Solicitada Pelo Paciente",
            AppointmentStatus::RescheduleByDoctor => "Remarcação Solicitada Pelo Médico",
            AppointmentStatus::Completed => "Concluída",
            AppointmentStatus::CancelledByPatient => "Cancelada Pelo Paciente",
            AppointmentStatus::CancelledByDoctor => "Cancelada Pelo Médico",
            AppointmentStatus::Expired => "Expirada",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::CancelledByPatient
                | AppointmentStatus::CancelledByDoctor
                | AppointmentStatus::Expired
        )
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        matches!(self, AppointmentStatus::AwaitingDoctor | AppointmentStatus::AwaitingPatient)
    }

    pub fn is_reschedule_pending(&self) -> bool {
        matches!(self, AppointmentStatus::RescheduleByPatient | AppointmentStatus::RescheduleByDoctor)
    }

    /// PostgREST `in.(...)` list of the given statuses, URL-encoded.
    pub fn postgrest_list(statuses: &[AppointmentStatus]) -> String {
        let quoted: Vec<String> = statuses.iter().map(|s| format!("\"{}\"", s.as_str())).collect();
        urlencoding::encode(&format!("({})", quoted.join(","))).into_owned()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| AppointmentError::ValidationError(format!("Status desconhecido: {}", s)))
    }
}

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RescheduleProposal {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub proposed_date: Option<NaiveDate>,
    #[serde(default)]
    pub proposed_time: Option<NaiveTime>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn proposal(&self) -> Option<RescheduleProposal> {
        match (self.proposed_date, self.proposed_time) {
            (Some(date), Some(time)) => Some(RescheduleProposal { date, time }),
            _ => None,
        }
    }

    /// Scheduled start as an instant, given the clinic's UTC offset.
    pub fn start(&self, offset: FixedOffset) -> DateTime<Utc> {
        local_instant(self.date, self.time, offset)
    }
}

/// Clinic-local date and time as a UTC instant.
pub fn local_instant(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    // A fixed offset has no gaps or folds, so the local time always maps.
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(time)))
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    /// Required when a doctor or assistant books; ignored for patients.
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentSearchQuery {
    pub filter: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
}

pub fn validate_duration(duration_minutes: i64) -> Result<(), AppointmentError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        Ok(())
    } else {
        Err(AppointmentError::ValidationError(format!(
            "A duração deve estar entre {} e {} minutos",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )))
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Consulta não encontrada")]
    NotFound,

    #[error("Horário fora do expediente do médico")]
    SlotNotAvailable,

    #[error("O horário conflita com outra consulta do médico")]
    ConflictDetected,

    #[error("Médico inativo não pode receber agendamentos")]
    DoctorInactive,

    #[error("Médico não encontrado")]
    DoctorNotFound,

    #[error("Paciente não encontrado")]
    PatientNotFound,

    #[error("Horário inválido: {0}")]
    InvalidTime(String),

    #[error("Ação '{action}' não permitida para consulta com status '{status}'")]
    InvalidStatusTransition { status: AppointmentStatus, action: String },

    #[error("A consulta só pode ser concluída após o horário agendado")]
    CompletionTooEarly,

    #[error("O status da consulta foi alterado por outra pessoa. Atualize a página.")]
    StatusChanged,

    #[error("Sem permissão para esta consulta")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::ConflictDetected => AppError::Conflict(err.to_string()),
            AppointmentError::SlotNotAvailable
            | AppointmentError::DoctorInactive
            | AppointmentError::InvalidTime(_)
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::CompletionTooEarly
            | AppointmentError::StatusChanged => AppError::BadRequest(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::DoctorInactive => AppointmentError::DoctorInactive,
            DoctorError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
            other => AppointmentError::ValidationError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_text() {
        for status in AppointmentStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().to_string()));
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), status);
        }
        assert!("Pendente".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = AppointmentStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal.len(), 4);
        assert!(!AppointmentStatus::RescheduleByDoctor.is_terminal());
    }

    #[test]
    fn clinic_local_start() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let start = local_instant(
            NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            offset,
        );
        assert_eq!(start.to_rfc3339(), "2024-05-06T12:00:00+00:00");
    }

    #[test]
    fn duration_bounds() {
        assert!(validate_duration(5).is_ok());
        assert!(validate_duration(240).is_ok());
        assert!(validate_duration(4).is_err());
        assert!(validate_duration(241).is_err());
    }
}
