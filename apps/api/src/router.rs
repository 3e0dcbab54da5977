use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use assistant_cell::router::assistant_routes;
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "AgendaMed API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/medicos", doctor_routes(state.clone()))
        .nest("/pacientes", patient_routes(state.clone()))
        .nest("/auxiliares", assistant_routes(state.clone()))
        .nest("/consultas", appointment_routes(state))
}
