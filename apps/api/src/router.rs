use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState};
use schedule_cell::{schedule_routes, ScheduleState};

pub fn create_router(schedule: Arc<ScheduleState>, appointments: Arc<AppointmentState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/schedule", schedule_routes(schedule))
        .nest("/appointments", appointment_routes(appointments))
}
