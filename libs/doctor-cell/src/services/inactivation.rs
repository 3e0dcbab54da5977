use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Utc, Weekday};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError, InactivationStatus, RemainingTime};

pub const EXPIRED_TEXT: &str = "Expirado";
pub const EXPIRES_TODAY_TEXT: &str = "Expira Hoje";
pub const UNAVAILABLE_TEXT: &str = "Indisponível";

/// Business-day arithmetic for the inactivation reversal window.
/// Saturdays and Sundays are skipped; there is no holiday calendar.
#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar {
    offset: FixedOffset,
    window_days: u32,
}

impl BusinessCalendar {
    pub fn new(offset_minutes: i32, window_days: u32) -> Self {
        let offset = FixedOffset::east_opt(offset_minutes * 60)
            .unwrap_or_else(|| {
                warn!("Invalid clinic UTC offset {} minutes, falling back to UTC", offset_minutes);
                Utc.fix()
            });
        Self { offset, window_days }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.clinic_utc_offset_minutes, config.inactivation_window_business_days)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// `requested_at` moved forward by the window, counting business days only
    /// and keeping the local time of day.
    pub fn deadline(&self, requested_at: DateTime<Utc>) -> DateTime<Utc> {
        let local = requested_at.with_timezone(&self.offset);
        let mut date = local.date_naive();
        let mut counted = 0;

        while counted < self.window_days {
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
            if is_business_day(date) {
                counted += 1;
            }
        }

        match self.offset.from_local_datetime(&date.and_time(local.time())).single() {
            Some(deadline) => deadline.with_timezone(&Utc),
            None => requested_at,
        }
    }

    /// Business days strictly after today's local date up to and including
    /// the deadline's local date.
    pub fn business_days_remaining(&self, deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let today = now.with_timezone(&self.offset).date_naive();
        let last = deadline.with_timezone(&self.offset).date_naive();

        let mut count = 0;
        let mut date = today;
        while date < last {
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
            if is_business_day(date) {
                count += 1;
            }
        }
        count
    }

    pub fn remaining_time(&self, requested_at: DateTime<Utc>, now: DateTime<Utc>) -> RemainingTime {
        let deadline = self.deadline(requested_at);

        if now > deadline {
            return RemainingTime { text: EXPIRED_TEXT.to_string(), expired: true };
        }

        let text = match self.business_days_remaining(deadline, now) {
            days if days <= 0 => EXPIRES_TODAY_TEXT.to_string(),
            1 => "1 dia útil".to_string(),
            days => format!("{} dias úteis", days),
        };

        RemainingTime { text, expired: false }
    }

    /// Same as [`remaining_time`](Self::remaining_time) for a raw timestamp.
    /// Missing or unparsable input is reported as expired.
    pub fn remaining_time_from_str(&self, raw: Option<&str>, now: DateTime<Utc>) -> RemainingTime {
        let parsed = raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok());

        match parsed {
            Some(requested_at) => self.remaining_time(requested_at.with_timezone(&Utc), now),
            None => {
                debug!("Unusable inactivation timestamp: {:?}", raw);
                RemainingTime { text: UNAVAILABLE_TEXT.to_string(), expired: true }
            }
        }
    }

    pub fn status_of(&self, doctor: &Doctor, now: DateTime<Utc>) -> InactivationStatus {
        if !doctor.active {
            return InactivationStatus::Inactive;
        }

        match doctor.inactivation_requested_at {
            None => InactivationStatus::Active,
            Some(requested_at) => {
                let remaining = self.remaining_time(requested_at, now);
                if remaining.expired {
                    InactivationStatus::Inactive
                } else {
                    InactivationStatus::PendingInactivation {
                        requested_at,
                        deadline: self.deadline(requested_at),
                        remaining,
                    }
                }
            }
        }
    }
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub struct InactivationService {
    supabase: SupabaseClient,
    calendar: BusinessCalendar,
}

impl InactivationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            calendar: BusinessCalendar::from_config(config),
        }
    }

    /// Service-role variant used by the maintenance loop.
    pub fn for_maintenance(config: &AppConfig) -> Option<Self> {
        SupabaseClient::with_service_role(config).map(|supabase| Self {
            supabase,
            calendar: BusinessCalendar::from_config(config),
        })
    }

    pub fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }

    pub async fn request_inactivation(
        &self,
        doctor: &Doctor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        match self.calendar.status_of(doctor, now) {
            InactivationStatus::Active => {}
            InactivationStatus::PendingInactivation { .. } => return Err(DoctorError::InactivationAlreadyRequested),
            InactivationStatus::Inactive => return Err(DoctorError::DoctorInactive),
        }

        let updated = self.patch_doctor(
            doctor.id,
            json!({
                "inactivation_requested_at": now.to_rfc3339(),
                "updated_at": now.to_rfc3339()
            }),
            Some(auth_token),
        ).await?;

        info!("Inactivation requested for doctor {}; deadline {}", doctor.id, self.calendar.deadline(now));
        Ok(updated)
    }

    pub async fn revert_inactivation(
        &self,
        doctor: &Doctor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        match self.calendar.status_of(doctor, now) {
            InactivationStatus::PendingInactivation { .. } => {}
            InactivationStatus::Active => return Err(DoctorError::NoPendingInactivation),
            InactivationStatus::Inactive if doctor.inactivation_requested_at.is_some() => return Err(DoctorError::InactivationWindowExpired),
            InactivationStatus::Inactive => return Err(DoctorError::DoctorInactive),
        }

        let updated = self.patch_doctor(
            doctor.id,
            json!({
                "inactivation_requested_at": null,
                "updated_at": now.to_rfc3339()
            }),
            Some(auth_token),
        ).await?;

        info!("Inactivation reverted for doctor {}", doctor.id);
        Ok(updated)
    }

    /// Brings an inactive doctor back, clearing any past request.
    pub async fn reactivate(
        &self,
        doctor: &Doctor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        if self.calendar.status_of(doctor, now) != InactivationStatus::Inactive {
            return Err(DoctorError::AlreadyActive);
        }

        let updated = self.patch_doctor(
            doctor.id,
            json!({
                "active": true,
                "inactivation_requested_at": null,
                "updated_at": now.to_rfc3339()
            }),
            Some(auth_token),
        ).await?;

        info!("Doctor {} reactivated", doctor.id);
        Ok(updated)
    }

    /// Persists `active = false` for every request whose window has passed.
    pub async fn finalize_expired(&self, now: DateTime<Utc>) -> Result<usize, DoctorError> {
        let pending: Vec<Doctor> = self.supabase.request(
            Method::GET,
            "/rest/v1/medicos?active=eq.true&inactivation_requested_at=not.is.null",
            None,
            None,
        ).await?;

        let mut finalized = 0;
        for doctor in pending {
            if self.calendar.status_of(&doctor, now) != InactivationStatus::Inactive {
                continue;
            }

            self.patch_doctor(
                doctor.id,
                json!({ "active": false, "updated_at": now.to_rfc3339() }),
                None,
            ).await?;
            finalized += 1;
        }

        if finalized > 0 {
            info!("Finalized {} expired doctor inactivation(s)", finalized);
        }
        Ok(finalized)
    }

    async fn patch_doctor(
        &self,
        doctor_id: Uuid,
        body: Value,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/medicos?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            auth_token,
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }
}
