use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn patient_routes(config: Arc<AppConfig>) -> Router {
    // Self-registration happens before the user has a token.
    let public_routes = Router::new()
        .route("/", post(register_patient));

    let protected_routes = Router::new()
        .route("/", get(list_patients))
        .route("/me", get(get_my_profile).put(update_my_profile))
        .route("/{id}", get(get_patient).put(update_patient))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(config)
}
