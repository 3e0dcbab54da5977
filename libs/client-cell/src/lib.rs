//! Client side of AgendaMed: the session, a thin API wrapper and the
//! appointment board that turns user actions into single requests.

pub mod api;
pub mod board;
pub mod error;
pub mod notice;
pub mod session;

pub use api::ApiClient;
pub use board::AppointmentBoard;
pub use error::ClientError;
pub use notice::Notice;
pub use session::Session;
