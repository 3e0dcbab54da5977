use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn assistant_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/",
            get(list_assistants).post(create_assistant).delete(delete_assistants),
        )
        .route("/me", get(get_my_profile))
        .route("/{id}", get(get_assistant).put(update_assistant).delete(delete_assistant))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
