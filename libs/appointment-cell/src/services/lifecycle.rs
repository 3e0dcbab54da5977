// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shared_models::auth::Party;

use crate::models::{AppointmentError, AppointmentStatus, RescheduleProposal};

/// A requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Cancel,
    ProposeReschedule(RescheduleProposal),
    AcceptReschedule,
    RejectReschedule,
    Complete,
    Expire,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Confirm => "confirmar",
            Transition::Cancel => "cancelar",
            Transition::ProposeReschedule(_) => "solicitar-remarcacao",
            Transition::AcceptReschedule => "aceitar-remarcacao",
            Transition::RejectReschedule => "rejeitar-remarcacao",
            Transition::Complete => "concluir",
            Transition::Expire => "expirar",
        }
    }
}

/// Who asks for a transition. Assistants act as `Party::Doctor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Party(Party),
    System,
}

impl From<Party> for Actor {
    fn from(party: Party) -> Self {
        Actor::Party(party)
    }
}

/// Result of a valid transition: the new status, the proposal to store
/// (`None` clears it) and, when a proposal was accepted, the new schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub status: AppointmentStatus,
    pub proposal: Option<RescheduleProposal>,
    pub moved_to: Option<RescheduleProposal>,
}

impl TransitionOutcome {
    fn to(status: AppointmentStatus) -> Self {
        Self { status, proposal: None, moved_to: None }
    }
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// The single transition table. Everything that changes an appointment's
    /// status goes through here.
    pub fn apply(
        &self,
        status: AppointmentStatus,
        proposal: Option<RescheduleProposal>,
        transition: Transition,
        actor: Actor,
        now: DateTime<Utc>,
        start: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        use AppointmentStatus as S;
        use Party::{Doctor, Patient};

        debug!("Applying {:?} by {:?} to appointment in {:?}", transition, actor, status);

        let outcome = match (status, transition, actor) {
            (s, _, _) if s.is_terminal() => None,

            (S::AwaitingDoctor, Transition::Confirm, Actor::Party(Doctor))
            | (S::AwaitingPatient, Transition::Confirm, Actor::Party(Patient)) => {
                Some(TransitionOutcome::to(S::Confirmed))
            }

            (_, Transition::Cancel, Actor::Party(Patient)) => Some(TransitionOutcome::to(S::CancelledByPatient)),
            (_, Transition::Cancel, Actor::Party(Doctor)) => Some(TransitionOutcome::to(S::CancelledByDoctor)),

            (S::Confirmed, Transition::ProposeReschedule(p), Actor::Party(party)) => Some(TransitionOutcome {
                status: match party {
                    Patient => S::RescheduleByPatient,
                    Doctor => S::RescheduleByDoctor,
                },
                proposal: Some(p),
                moved_to: None,
            }),

            (S::RescheduleByPatient, Transition::AcceptReschedule, Actor::Party(Doctor))
            | (S::RescheduleByDoctor, Transition::AcceptReschedule, Actor::Party(Patient)) => {
                let target = proposal.ok_or_else(|| {
                    AppointmentError::ValidationError("Consulta sem proposta de remarcação".to_string())
                })?;
                Some(TransitionOutcome { status: S::Confirmed, proposal: None, moved_to: Some(target) })
            }

            (S::RescheduleByPatient, Transition::RejectReschedule, Actor::Party(Doctor))
            | (S::RescheduleByDoctor, Transition::RejectReschedule, Actor::Party(Patient)) => {
                Some(TransitionOutcome::to(S::Confirmed))
            }

            (_, Transition::Complete, Actor::Party(Doctor)) => {
                if now <= start {
                    return Err(AppointmentError::CompletionTooEarly);
                }
                Some(TransitionOutcome::to(S::Completed))
            }

            (s, Transition::Expire, Actor::System) if s.is_awaiting_confirmation() && now > start => {
                Some(TransitionOutcome::to(S::Expired))
            }

            _ => None,
        };

        outcome.ok_or_else(|| {
            warn!("Rejected transition {} from {:?} by {:?}", transition.name(), status, actor);
            AppointmentError::InvalidStatusTransition {
                status,
                action: transition.name().to_string(),
            }
        })
    }

    /// Status the maintenance sweep should move an appointment to, if any.
    pub fn overdue_status(
        &self,
        status: AppointmentStatus,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<AppointmentStatus> {
        self.apply(status, None, Transition::Expire, Actor::System, now, start)
            .ok()
            .map(|outcome| outcome.status)
    }
}
