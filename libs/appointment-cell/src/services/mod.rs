pub mod actions;
pub mod booking;
pub mod lifecycle;

pub use actions::{resolve, ActionKind, ActionSet, AppointmentActions, AvailableAction, EventStyle};
pub use booking::AppointmentBookingService;
pub use lifecycle::{Actor, AppointmentLifecycleService, Transition, TransitionOutcome};
