use chrono::{FixedOffset, Utc};
use tracing::debug;
use uuid::Uuid;

use appointment_cell::models::{Appointment, RescheduleProposal, UpdateAppointmentRequest};
use appointment_cell::services::actions::{event_style, resolve, ActionKind, ActionSet, EventStyle};
use shared_models::auth::Role;

use crate::api::ApiClient;
use crate::notice::Notice;

fn success_text(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Approve => "Consulta confirmada com sucesso.",
        ActionKind::Reject => "Consulta rejeitada.",
        ActionKind::Cancel => "Consulta cancelada.",
        ActionKind::Reschedule => "Solicitação de remarcação enviada.",
        ActionKind::AcceptProposal => "Remarcação aceita.",
        ActionKind::RejectProposal => "Remarcação rejeitada.",
        ActionKind::Complete => "Consulta marcada como concluída.",
    }
}

/// The caller's appointment list as last fetched from the server. It is
/// never edited locally: every action is followed by a full refetch.
pub struct AppointmentBoard {
    role: Role,
    offset: FixedOffset,
    appointments: Vec<Appointment>,
}

impl AppointmentBoard {
    pub fn new(role: Role, offset: FixedOffset) -> Self {
        Self {
            role,
            offset,
            appointments: Vec::new(),
        }
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub async fn refresh(&mut self, api: &ApiClient) -> Result<(), Notice> {
        match api.list_appointments().await {
            Ok(appointments) => {
                debug!("Board refreshed with {} appointments", appointments.len());
                self.appointments = appointments;
                Ok(())
            }
            Err(e) => Err(Notice::from(&e)),
        }
    }

    /// What the user can do with an appointment right now, by the local clock.
    pub fn actions_for(&self, appointment: &Appointment) -> ActionSet {
        resolve(appointment.status, self.role, Utc::now(), appointment.start(self.offset))
    }

    pub fn style_for(&self, appointment: &Appointment) -> EventStyle {
        event_style(appointment, self.role)
    }

    /// Sends one request for the action. On success the list is refetched in
    /// full; on failure the list is left as it was.
    pub async fn perform(
        &mut self,
        api: &ApiClient,
        appointment_id: Uuid,
        kind: ActionKind,
        proposal: Option<RescheduleProposal>,
    ) -> Notice {
        match api.perform_action(appointment_id, kind, proposal).await {
            Ok(_) => self.refetch_with(api, success_text(kind)).await,
            Err(e) => Notice::from(&e),
        }
    }

    /// Changes the duration of an appointment, same request-then-refetch flow.
    pub async fn update_duration(
        &mut self,
        api: &ApiClient,
        appointment_id: Uuid,
        duration_minutes: i64,
    ) -> Notice {
        let request = UpdateAppointmentRequest {
            duration_minutes: Some(duration_minutes),
            notes: None,
        };
        match api.update_appointment(appointment_id, &request).await {
            Ok(_) => self.refetch_with(api, "Duração da consulta atualizada.").await,
            Err(e) => Notice::from(&e),
        }
    }

    async fn refetch_with(&mut self, api: &ApiClient, success: &str) -> Notice {
        match self.refresh(api).await {
            Ok(()) => Notice::success(success),
            Err(notice) => notice,
        }
    }
}
