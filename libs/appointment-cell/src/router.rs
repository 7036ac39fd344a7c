use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    Router::new()
        .route("/available-slots/{clinician_id}/{date}", get(handlers::get_available_slots))
        .route("/", post(handlers::book_appointment))
        .route("/clinicians/{clinician_id}", get(handlers::list_clinician_appointments))
        .route("/patients/{patient_id}", get(handlers::list_patient_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/status", patch(handlers::set_appointment_status))
        .route("/{appointment_id}/start", post(handlers::start_appointment))
        .route("/{appointment_id}/notes", patch(handlers::update_notes))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
