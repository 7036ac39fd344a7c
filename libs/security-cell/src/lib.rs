// Access rules for clinician templates and appointments.

pub mod models;
pub mod services;

pub use models::{AppointmentAction, AppointmentParties};
pub use services::AuthorizationGuard;
