use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::ScheduleState;

pub fn schedule_routes(state: Arc<ScheduleState>) -> Router {
    Router::new()
        .route("/{clinician_id}", get(handlers::get_template).put(handlers::put_template))
        .route("/{clinician_id}/{day}", patch(handlers::patch_day))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
