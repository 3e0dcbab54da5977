pub mod doctor;
pub mod inactivation;
pub mod schedule;

pub use doctor::DoctorService;
pub use inactivation::{BusinessCalendar, InactivationService};
pub use schedule::ScheduleService;
