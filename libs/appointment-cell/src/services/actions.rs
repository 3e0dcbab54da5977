//! What a given user may do with an appointment, and how it is drawn on the
//! calendar. Pure functions of status, role and time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use shared_models::auth::{Party, Role};

use crate::models::{Appointment, AppointmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Approve,
    Reject,
    Cancel,
    Reschedule,
    AcceptProposal,
    RejectProposal,
    Complete,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Approve => "Aprovar",
            ActionKind::Reject => "Rejeitar",
            ActionKind::Cancel => "Cancelar",
            ActionKind::Reschedule => "Remarcar",
            ActionKind::AcceptProposal => "Aceitar Proposta",
            ActionKind::RejectProposal => "Rejeitar Proposta",
            ActionKind::Complete => "Marcar como Concluída",
        }
    }

    /// Route suffix under `/consultas/{id}/`. Rejecting a pending
    /// appointment is a cancellation by the rejecting party.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ActionKind::Approve => "confirmar",
            ActionKind::Reject | ActionKind::Cancel => "cancelar",
            ActionKind::Reschedule => "solicitar-remarcacao",
            ActionKind::AcceptProposal => "aceitar-remarcacao",
            ActionKind::RejectProposal => "rejeitar-remarcacao",
            ActionKind::Complete => "concluir",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableAction {
    pub kind: ActionKind,
    pub label: &'static str,
    pub endpoint: &'static str,
}

impl From<ActionKind> for AvailableAction {
    fn from(kind: ActionKind) -> Self {
        Self {
            kind,
            label: kind.label(),
            endpoint: kind.endpoint(),
        }
    }
}

/// Ordered actions for `role` on an appointment in `status` starting at `start`.
pub fn available_actions(
    status: AppointmentStatus,
    role: Role,
    now: DateTime<Utc>,
    start: DateTime<Utc>,
) -> Vec<AvailableAction> {
    use ActionKind::*;
    use AppointmentStatus as S;

    let Some(party) = role.party() else {
        return Vec::new();
    };

    if status.is_terminal() {
        return Vec::new();
    }

    if now > start {
        return match party {
            Party::Doctor => vec![Complete.into()],
            Party::Patient => Vec::new(),
        };
    }

    let kinds: &[ActionKind] = match (status, party) {
        (S::AwaitingDoctor, Party::Doctor) => &[Approve, Reject],
        (S::AwaitingDoctor, Party::Patient) => &[Cancel],
        (S::AwaitingPatient, Party::Doctor) => &[Cancel],
        (S::AwaitingPatient, Party::Patient) => &[Approve, Reject],
        (S::Confirmed, _) => &[Cancel, Reschedule],
        (S::RescheduleByPatient, Party::Doctor) | (S::RescheduleByDoctor, Party::Patient) => {
            &[AcceptProposal, RejectProposal]
        }
        (S::RescheduleByPatient, Party::Patient) | (S::RescheduleByDoctor, Party::Doctor) => &[],
        (S::Completed | S::CancelledByPatient | S::CancelledByDoctor | S::Expired, _) => &[],
    };

    kinds.iter().copied().map(AvailableAction::from).collect()
}

/// Informational text for when there is nothing to do.
pub fn status_notice(status: AppointmentStatus, role: Role) -> &'static str {
    use AppointmentStatus as S;

    match (status, role.party()) {
        (_, None) => "Administradores apenas visualizam as consultas.",
        (S::AwaitingDoctor, Some(Party::Patient)) => "Aguardando confirmação do médico.",
        (S::AwaitingDoctor, Some(Party::Doctor)) => "Aguardando sua confirmação.",
        (S::AwaitingPatient, Some(Party::Doctor)) => "Aguardando confirmação do paciente.",
        (S::AwaitingPatient, Some(Party::Patient)) => "Aguardando sua confirmação.",
        (S::Confirmed, _) => "Consulta confirmada.",
        (S::RescheduleByPatient, Some(Party::Patient)) => "Aguardando resposta do médico à sua proposta de remarcação.",
        (S::RescheduleByPatient, Some(Party::Doctor)) => "O paciente propôs um novo horário.",
        (S::RescheduleByDoctor, Some(Party::Doctor)) => "Aguardando resposta do paciente à proposta de remarcação.",
        (S::RescheduleByDoctor, Some(Party::Patient)) => "O médico propôs um novo horário.",
        (S::Completed, _) => "Consulta concluída.",
        (S::CancelledByPatient, _) => "Consulta cancelada pelo paciente.",
        (S::CancelledByDoctor, _) => "Consulta cancelada pelo médico.",
        (S::Expired, _) => "Consulta expirada sem confirmação.",
    }
}

/// Actions plus the notice to show when the list is empty.
#[derive(Debug, Clone, Serialize)]
pub struct ActionSet {
    pub status: AppointmentStatus,
    pub actions: Vec<AvailableAction>,
    pub notice: Option<&'static str>,
}

pub fn resolve(
    status: AppointmentStatus,
    role: Role,
    now: DateTime<Utc>,
    start: DateTime<Utc>,
) -> ActionSet {
    let actions = available_actions(status, role, now, start);
    let notice = if !actions.is_empty() {
        None
    } else if now > start && !status.is_terminal() && role.party() == Some(Party::Patient) {
        Some("Aguardando o médico concluir a consulta.")
    } else {
        Some(status_notice(status, role))
    };

    ActionSet { status, actions, notice }
}

/// Response of `GET /consultas/{id}/acoes`.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentActions {
    pub appointment_id: Uuid,
    #[serde(flatten)]
    pub set: ActionSet,
    pub style: EventStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventStyle {
    pub title: String,
    pub background_color: &'static str,
    pub border_color: &'static str,
    pub text_color: &'static str,
}

/// Calendar colours by status family; the title names the other party.
pub fn event_style(appointment: &Appointment, role: Role) -> EventStyle {
    use AppointmentStatus as S;

    let (background_color, border_color, text_color) = match appointment.status {
        S::AwaitingDoctor | S::AwaitingPatient => ("#fff3cd", "#f0ad4e", "#856404"),
        S::Confirmed => ("#d4edda", "#28a745", "#155724"),
        S::RescheduleByPatient | S::RescheduleByDoctor => ("#ffe5d0", "#fd7e14", "#8a4500"),
        S::Completed => ("#d1ecf1", "#17a2b8", "#0c5460"),
        S::CancelledByPatient | S::CancelledByDoctor => ("#f8d7da", "#dc3545", "#721c24"),
        S::Expired => ("#e2e3e5", "#6c757d", "#383d41"),
    };

    let counterpart = match role {
        Role::Paciente => &appointment.doctor_name,
        _ => &appointment.patient_name,
    };

    EventStyle {
        title: format!("{} - {}", counterpart, appointment.status),
        background_color,
        border_color,
        text_color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime};

    use AppointmentStatus as S;

    const STAFF: [Role; 2] = [Role::Medico, Role::Auxiliar];

    fn kinds(actions: &[AvailableAction]) -> Vec<ActionKind> {
        actions.iter().map(|a| a.kind).collect()
    }

    fn upcoming() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now, now + Duration::days(1))
    }

    #[test]
    fn doctor_approves_or_rejects_pending_request() {
        let (now, start) = upcoming();
        for role in STAFF {
            let actions = available_actions(S::AwaitingDoctor, role, now, start);
            assert_eq!(kinds(&actions), vec![ActionKind::Approve, ActionKind::Reject]);
            let labels: Vec<&str> = actions.iter().map(|a| a.label).collect();
            assert_eq!(labels, vec!["Aprovar", "Rejeitar"]);
        }
    }

    #[test]
    fn doctor_answers_patient_reschedule_proposal() {
        let (now, start) = upcoming();
        let actions = available_actions(S::RescheduleByPatient, Role::Medico, now, start);
        let labels: Vec<&str> = actions.iter().map(|a| a.label).collect();
        assert_eq!(labels, vec!["Aceitar Proposta", "Rejeitar Proposta"]);
    }

    #[test]
    fn full_table_for_upcoming_appointments() {
        use ActionKind::*;
        let (now, start) = upcoming();

        let expected: [(S, Vec<ActionKind>, Vec<ActionKind>); 9] = [
            (S::AwaitingDoctor, vec![Approve, Reject], vec![Cancel]),
            (S::AwaitingPatient, vec![Cancel], vec![Approve, Reject]),
            (S::Confirmed, vec![Cancel, Reschedule], vec![Cancel, Reschedule]),
            (S::RescheduleByPatient, vec![AcceptProposal, RejectProposal], vec![]),
            (S::RescheduleByDoctor, vec![], vec![AcceptProposal, RejectProposal]),
            (S::Completed, vec![], vec![]),
            (S::CancelledByPatient, vec![], vec![]),
            (S::CancelledByDoctor, vec![], vec![]),
            (S::Expired, vec![], vec![]),
        ];

        for (status, staff, patient) in expected {
            for role in STAFF {
                assert_eq!(kinds(&available_actions(status, role, now, start)), staff, "{status} / {role}");
            }
            assert_eq!(kinds(&available_actions(status, Role::Paciente, now, start)), patient, "{status} / paciente");
            assert!(available_actions(status, Role::Administrador, now, start).is_empty());
        }
    }

    #[test]
    fn past_non_terminal_offers_only_completion_to_staff() {
        let now = Utc::now();
        let start = now - Duration::minutes(1);

        for status in S::ALL {
            for role in STAFF {
                let actions = available_actions(status, role, now, start);
                if status.is_terminal() {
                    assert!(actions.is_empty());
                } else {
                    assert_eq!(kinds(&actions), vec![ActionKind::Complete]);
                    assert_eq!(actions[0].label, "Marcar como Concluída");
                }
            }
            assert!(available_actions(status, Role::Paciente, now, start).is_empty());
        }
    }

    #[test]
    fn every_action_maps_to_an_endpoint() {
        assert_eq!(ActionKind::Reject.endpoint(), "cancelar");
        assert_eq!(ActionKind::Approve.endpoint(), "confirmar");
        assert_eq!(ActionKind::Complete.endpoint(), "concluir");
        assert_eq!(ActionKind::Reschedule.endpoint(), "solicitar-remarcacao");
    }

    #[test]
    fn notice_only_when_nothing_to_do() {
        let (now, start) = upcoming();
        assert_eq!(resolve(S::AwaitingDoctor, Role::Medico, now, start).notice, None);
        assert_eq!(
            resolve(S::RescheduleByPatient, Role::Paciente, now, start).notice,
            Some("Aguardando resposta do médico à sua proposta de remarcação.")
        );
        assert_eq!(
            resolve(S::Confirmed, Role::Paciente, now, now - Duration::hours(1)).notice,
            Some("Aguardando o médico concluir a consulta.")
        );
    }

    #[test]
    fn event_title_names_the_counterpart() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            patient_name: "Carla".to_string(),
            doctor_id: Uuid::new_v4(),
            doctor_name: "Dra. Ana".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 30,
            status: S::Confirmed,
            proposed_date: None,
            proposed_time: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(event_style(&appointment, Role::Paciente).title, "Dra. Ana - Confirmada");
        let style = event_style(&appointment, Role::Auxiliar);
        assert_eq!(style.title, "Carla - Confirmada");
        assert_eq!(style.border_color, "#28a745");
    }
}
