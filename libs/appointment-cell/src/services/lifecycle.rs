use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Appointment status machine. `Rescheduled` re-enters `Scheduled` at a new
/// time and reaches the same statuses; `Completed` and `Cancelled` are final.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;

        match current {
            Scheduled | Rescheduled => &[InProgress, Rescheduled, Completed, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn validate_transition(
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if Self::valid_transitions(current).contains(&next) {
            debug!("Status transition validated: {} -> {}", current, next);
            Ok(())
        } else {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            Err(AppointmentError::InvalidTransition { from: current, to: next })
        }
    }
}
