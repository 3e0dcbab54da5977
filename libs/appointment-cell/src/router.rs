// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::book_appointment))
        .route("/disponibilidade", get(handlers::get_availability))
        .route("/{appointment_id}", get(handlers::get_appointment).put(handlers::update_appointment))
        .route("/{appointment_id}/acoes", get(handlers::get_actions))

        // Status transitions
        .route("/{appointment_id}/confirmar", post(handlers::confirm_appointment))
        .route("/{appointment_id}/cancelar", post(handlers::cancel_appointment))
        .route("/{appointment_id}/concluir", post(handlers::complete_appointment))
        .route("/{appointment_id}/solicitar-remarcacao", post(handlers::request_reschedule))
        .route("/{appointment_id}/aceitar-remarcacao", post(handlers::accept_reschedule))
        .route("/{appointment_id}/rejeitar-remarcacao", post(handlers::reject_reschedule))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
