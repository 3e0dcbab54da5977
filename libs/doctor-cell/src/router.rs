use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors).post(handlers::create_doctor))
        .route("/me", get(handlers::get_my_profile).put(handlers::update_my_profile))
        .route("/{doctor_id}", get(handlers::get_doctor).put(handlers::update_doctor))
        .route("/{doctor_id}/pacientes", get(handlers::get_doctor_patients))
        .route(
            "/{doctor_id}/horarios",
            get(handlers::get_working_hours).put(handlers::replace_working_hours),
        )

        // Inactivation workflow
        .route("/{doctor_id}/solicitar-inativacao", post(handlers::request_inactivation))
        .route("/{doctor_id}/reverter-inativacao", post(handlers::revert_inactivation))
        .route("/{doctor_id}/reativar", post(handlers::reactivate_doctor))
        .route("/{doctor_id}/inativacao", get(handlers::get_inactivation_status))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
