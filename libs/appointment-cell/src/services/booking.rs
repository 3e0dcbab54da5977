// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::{AvailableSlot, BusyInterval, Doctor};
use doctor_cell::services::schedule::{fits_working_hours, free_slots, overlaps_busy};
use doctor_cell::services::{BusinessCalendar, DoctorService, ScheduleService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Party, User};
use shared_utils::filter::Filter;

use crate::models::{
    local_instant, validate_duration, Appointment, AppointmentError, AppointmentStatus,
    BookAppointmentRequest, UpdateAppointmentRequest, DEFAULT_DURATION_MINUTES,
};
use crate::services::actions::{event_style, resolve, AppointmentActions};
use crate::services::lifecycle::{Actor, AppointmentLifecycleService, Transition, TransitionOutcome};

/// Occupied stretches of `date` for a doctor. Terminal appointments free
/// their slot; a pending reschedule also holds its proposed slot.
pub fn busy_intervals(
    appointments: &[Appointment],
    date: NaiveDate,
    exclude: Option<Uuid>,
) -> Vec<BusyInterval> {
    let mut busy = Vec::new();

    for appointment in appointments {
        if appointment.status.is_terminal() || Some(appointment.id) == exclude {
            continue;
        }
        if appointment.date == date {
            busy.push(BusyInterval {
                start: appointment.time,
                duration_minutes: appointment.duration_minutes,
            });
        }
        if let Some(proposal) = appointment.proposal() {
            if appointment.status.is_reschedule_pending() && proposal.date == date {
                busy.push(BusyInterval {
                    start: proposal.time,
                    duration_minutes: appointment.duration_minutes,
                });
            }
        }
    }

    busy
}

/// Side of the appointment `user` is on, if they take part in it.
pub fn participant_party(user: &User, appointment: &Appointment) -> Option<Party> {
    match user.role.party()? {
        Party::Patient if appointment.patient_id.to_string() == user.id => Some(Party::Patient),
        Party::Doctor if user.agenda_doctor_id() == Some(appointment.doctor_id.to_string().as_str()) => {
            Some(Party::Doctor)
        }
        _ => None,
    }
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    doctor_service: DoctorService,
    schedule_service: ScheduleService,
    lifecycle_service: AppointmentLifecycleService,
    calendar: BusinessCalendar,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(config, SupabaseClient::new(config))
    }

    /// Service-role variant used by the maintenance loop.
    pub fn for_maintenance(config: &AppConfig) -> Option<Self> {
        SupabaseClient::with_service_role(config).map(|client| Self::with_client(config, client))
    }

    fn with_client(config: &AppConfig, supabase: SupabaseClient) -> Self {
        Self {
            supabase: Arc::new(supabase),
            doctor_service: DoctorService::new(config),
            schedule_service: ScheduleService::new(config),
            lifecycle_service: AppointmentLifecycleService::new(),
            calendar: BusinessCalendar::from_config(config),
        }
    }

    fn start_of(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        local_instant(date, time, self.calendar.offset())
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/consultas?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Appointment visible to `user`: its participants and administrators.
    pub async fn get_for_user(
        &self,
        user: &User,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if user.is_admin() || participant_party(user, &appointment).is_some() {
            Ok(appointment)
        } else {
            Err(AppointmentError::Unauthorized)
        }
    }

    /// Appointments of the caller's agenda, ordered by date and time.
    pub async fn list_appointments(
        &self,
        user: &User,
        filter: Option<&Filter>,
        limit: Option<i32>,
        offset: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec!["order=date.asc,time.asc".to_string()];

        match user.role.party() {
            Some(Party::Patient) => query_parts.push(format!("patient_id=eq.{}", user.id)),
            Some(Party::Doctor) => {
                let doctor_id = user.agenda_doctor_id().ok_or(AppointmentError::Unauthorized)?;
                query_parts.push(format!("doctor_id=eq.{}", doctor_id));
            }
            None => {}
        }
        if let Some(filter) = filter {
            query_parts.push(filter.to_postgrest());
        }
        if let Some(limit) = limit {
            query_parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = offset {
            query_parts.push(format!("offset={}", offset));
        }

        let path = format!("/rest/v1/consultas?{}", query_parts.join("&"));
        let appointments: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        debug!("Found {} appointments for {}", appointments.len(), user.id);
        Ok(appointments)
    }

    async fn day_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/consultas?doctor_id=eq.{}&or=(date.eq.{},proposed_date.eq.{})",
            doctor_id, date, date
        );
        let appointments: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(appointments)
    }

    async fn patient_name(&self, patient_id: Uuid, auth_token: &str) -> Result<String, AppointmentError> {
        let path = format!("/rest/v1/pacientes?id=eq.{}&select=id,name", patient_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.first()
            .and_then(|row| row.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(AppointmentError::PatientNotFound)
    }

    async fn doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, AppointmentError> {
        Ok(self.doctor_service.get_doctor(doctor_id, auth_token).await?)
    }

    /// Free slots of a doctor on `date`, skipping those already in the past.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i64>,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>, AppointmentError> {
        let duration = duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        validate_duration(duration)?;

        let (doctor, hours, appointments) = futures::try_join!(
            self.doctor(doctor_id, auth_token),
            async {
                self.schedule_service
                    .get_working_hours(doctor_id, auth_token)
                    .await
                    .map_err(AppointmentError::from)
            },
            self.day_appointments(doctor_id, date, auth_token),
        )?;

        let now = Utc::now();
        if !self.calendar.status_of(&doctor, now).accepts_bookings() {
            return Err(AppointmentError::DoctorInactive);
        }

        let busy = busy_intervals(&appointments, date, None);
        let slots = free_slots(&hours, date, &busy, duration)
            .into_iter()
            .filter(|slot| self.start_of(slot.date, slot.start) > now)
            .collect();

        Ok(slots)
    }

    pub async fn actions_for(
        &self,
        user: &User,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentActions, AppointmentError> {
        let appointment = self.get_for_user(user, appointment_id, auth_token).await?;
        let start = appointment.start(self.calendar.offset());

        Ok(AppointmentActions {
            appointment_id: appointment.id,
            set: resolve(appointment.status, user.role, Utc::now(), start),
            style: event_style(&appointment, user.role),
        })
    }

    // ==========================================================================
    // WRITES
    // ==========================================================================

    /// Start in the future, doctor accepting bookings, inside working hours,
    /// no overlap with the doctor's other live appointments.
    #[allow(clippy::too_many_arguments)]
    async fn ensure_slot_free(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i64,
        exclude: Option<Uuid>,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        if self.start_of(date, time) <= now {
            return Err(AppointmentError::InvalidTime("o horário deve estar no futuro".to_string()));
        }
        if !self.calendar.status_of(doctor, now).accepts_bookings() {
            return Err(AppointmentError::DoctorInactive);
        }

        let (hours, appointments) = futures::try_join!(
            async {
                self.schedule_service
                    .get_working_hours(doctor.id, auth_token)
                    .await
                    .map_err(AppointmentError::from)
            },
            self.day_appointments(doctor.id, date, auth_token),
        )?;

        if !fits_working_hours(&hours, date, time, duration_minutes) {
            return Err(AppointmentError::SlotNotAvailable);
        }
        if overlaps_busy(&busy_intervals(&appointments, date, exclude), time, duration_minutes) {
            return Err(AppointmentError::ConflictDetected);
        }

        Ok(())
    }

    /// Patients book for themselves and wait for the doctor; doctors and
    /// assistants book for a patient and wait for the patient.
    pub async fn book_appointment(
        &self,
        user: &User,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let party = user.role.party().ok_or(AppointmentError::Unauthorized)?;
        let duration = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        validate_duration(duration)?;

        let (patient_id, status) = match party {
            Party::Patient => {
                let id = Uuid::parse_str(&user.id).map_err(|_| AppointmentError::Unauthorized)?;
                (id, AppointmentStatus::AwaitingDoctor)
            }
            Party::Doctor => {
                if user.agenda_doctor_id() != Some(request.doctor_id.to_string().as_str()) {
                    return Err(AppointmentError::Unauthorized);
                }
                let id = request.patient_id.ok_or_else(|| {
                    AppointmentError::ValidationError("Informe o paciente da consulta".to_string())
                })?;
                (id, AppointmentStatus::AwaitingPatient)
            }
        };

        debug!("Booking {} {} with doctor {} for patient {}", request.date, request.time, request.doctor_id, patient_id);

        let (doctor, patient_name) = futures::try_join!(
            self.doctor(request.doctor_id, auth_token),
            self.patient_name(patient_id, auth_token),
        )?;

        let now = Utc::now();
        self.ensure_slot_free(&doctor, request.date, request.time, duration, None, now, auth_token).await?;

        let appointment_data = json!({
            "patient_id": patient_id,
            "patient_name": patient_name,
            "doctor_id": doctor.id,
            "doctor_name": doctor.name,
            "date": request.date.to_string(),
            "time": format_time(request.time),
            "duration_minutes": duration,
            "status": status,
            "proposed_date": null,
            "proposed_time": null,
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/consultas",
            Some(auth_token),
            Some(appointment_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let appointment = result.into_iter().next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;

        info!("Appointment {} booked with status '{}'", appointment.id, appointment.status);
        Ok(appointment)
    }

    /// Changes duration or notes of a live appointment.
    pub async fn update_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        participant_party(user, &current).ok_or(AppointmentError::Unauthorized)?;

        if current.status.is_terminal() {
            return Err(AppointmentError::InvalidStatusTransition {
                status: current.status,
                action: "alterar".to_string(),
            });
        }

        let mut update_data = serde_json::Map::new();
        let now = Utc::now();

        if let Some(duration) = request.duration_minutes {
            validate_duration(duration)?;
            if duration > current.duration_minutes && current.start(self.calendar.offset()) > now {
                let doctor = self.doctor(current.doctor_id, auth_token).await?;
                self.ensure_slot_free(&doctor, current.date, current.time, duration, Some(current.id), now, auth_token).await?;
            }
            update_data.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        update_data.insert("updated_at".to_string(), json!(now.to_rfc3339()));

        self.patch_guarded(&current, Value::Object(update_data), Some(auth_token)).await
    }

    /// Runs a status transition for `user` after re-reading the current state.
    pub async fn transition(
        &self,
        user: &User,
        appointment_id: Uuid,
        transition: Transition,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        let party = participant_party(user, &current).ok_or(AppointmentError::Unauthorized)?;

        let now = Utc::now();
        let start = current.start(self.calendar.offset());

        let outcome = self.lifecycle_service.apply(
            current.status,
            current.proposal(),
            transition,
            Actor::Party(party),
            now,
            start,
        )?;

        // Any slot the appointment is about to hold must be free.
        let target = match transition {
            Transition::ProposeReschedule(proposal) => Some(proposal),
            _ => outcome.moved_to,
        };
        if let Some(slot) = target {
            let doctor = self.doctor(current.doctor_id, auth_token).await?;
            self.ensure_slot_free(&doctor, slot.date, slot.time, current.duration_minutes, Some(current.id), now, auth_token).await?;
        }

        let updated = self.persist_outcome(&current, outcome, now, Some(auth_token)).await?;
        info!(
            "Appointment {} moved from '{}' to '{}' via {}",
            updated.id, current.status, updated.status, transition.name()
        );
        Ok(updated)
    }

    async fn persist_outcome(
        &self,
        current: &Appointment,
        outcome: TransitionOutcome,
        now: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let mut body = json!({
            "status": outcome.status,
            "proposed_date": outcome.proposal.map(|p| p.date.to_string()),
            "proposed_time": outcome.proposal.map(|p| format_time(p.time)),
            "updated_at": now.to_rfc3339()
        });
        if let Some(moved) = outcome.moved_to {
            body["date"] = json!(moved.date.to_string());
            body["time"] = json!(format_time(moved.time));
        }

        self.patch_guarded(current, body, auth_token).await
    }

    /// PATCH that only applies while the row still has the status we read.
    async fn patch_guarded(
        &self,
        current: &Appointment,
        body: Value,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/consultas?id=eq.{}&status=eq.{}",
            current.id,
            urlencoding::encode(current.status.as_str())
        );
        let result: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            auth_token,
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next().ok_or_else(|| {
            warn!("Appointment {} changed status concurrently", current.id);
            AppointmentError::StatusChanged
        })
    }

    /// Expires unconfirmed appointments whose start has passed. Returns how
    /// many were updated.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<usize, AppointmentError> {
        let today = now.with_timezone(&self.calendar.offset()).date_naive();
        let path = format!(
            "/rest/v1/consultas?status=in.{}&date=lte.{}",
            AppointmentStatus::postgrest_list(&[
                AppointmentStatus::AwaitingDoctor,
                AppointmentStatus::AwaitingPatient,
            ]),
            today
        );
        let candidates: Vec<Appointment> = self.supabase.request(Method::GET, &path, None, None).await?;

        let mut expired = 0;
        for appointment in candidates {
            let start = appointment.start(self.calendar.offset());
            let Some(next) = self.lifecycle_service.overdue_status(appointment.status, start, now) else {
                continue;
            };

            let outcome = TransitionOutcome { status: next, proposal: None, moved_to: None };
            match self.persist_outcome(&appointment, outcome, now, None).await {
                Ok(_) => expired += 1,
                Err(AppointmentError::StatusChanged) => continue,
                Err(e) => return Err(e),
            }
        }

        if expired > 0 {
            info!("Expired {} unconfirmed appointment(s)", expired);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::Role;
    use shared_utils::test_utils::TestUser;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn appointment(status: AppointmentStatus, date: NaiveDate, time: NaiveTime) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            patient_name: "Carla".to_string(),
            doctor_id: Uuid::new_v4(),
            doctor_name: "Dra. Ana".to_string(),
            date,
            time,
            duration_minutes: 30,
            status,
            proposed_date: None,
            proposed_time: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn terminal_and_excluded_appointments_do_not_block() {
        let live = appointment(AppointmentStatus::Confirmed, day(), t(9, 0));
        let cancelled = appointment(AppointmentStatus::CancelledByDoctor, day(), t(10, 0));
        let other_day = appointment(AppointmentStatus::Confirmed, day().succ_opt().unwrap(), t(11, 0));

        let all = vec![live.clone(), cancelled, other_day];
        assert_eq!(busy_intervals(&all, day(), None), vec![BusyInterval { start: t(9, 0), duration_minutes: 30 }]);
        assert!(busy_intervals(&all, day(), Some(live.id)).is_empty());
    }

    #[test]
    fn pending_proposal_holds_its_slot() {
        let mut pending = appointment(AppointmentStatus::RescheduleByPatient, day().pred_opt().unwrap(), t(9, 0));
        pending.proposed_date = Some(day());
        pending.proposed_time = Some(t(15, 0));

        assert_eq!(
            busy_intervals(&[pending], day(), None),
            vec![BusyInterval { start: t(15, 0), duration_minutes: 30 }]
        );
    }

    #[test]
    fn participants_by_role() {
        let patient = TestUser::patient("carla@example.com");
        let doctor = TestUser::doctor("ana@example.com");
        let assistant = TestUser::assistant("aux@example.com", &doctor.id);
        let admin = TestUser::admin("adm@example.com");

        let mut appt = appointment(AppointmentStatus::Confirmed, day(), t(9, 0));
        appt.patient_id = Uuid::parse_str(&patient.id).unwrap();
        appt.doctor_id = Uuid::parse_str(&doctor.id).unwrap();

        assert_eq!(participant_party(&patient.to_user(), &appt), Some(Party::Patient));
        assert_eq!(participant_party(&doctor.to_user(), &appt), Some(Party::Doctor));
        assert_eq!(participant_party(&assistant.to_user(), &appt), Some(Party::Doctor));
        assert_eq!(participant_party(&admin.to_user(), &appt), None);
        assert_eq!(participant_party(&TestUser::new("x@example.com", Role::Paciente).to_user(), &appt), None);
    }
}
