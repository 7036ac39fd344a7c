use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something an appointment-level request wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentAction {
    View,
    Cancel,
    Reschedule,
    SetStatus,
    Start,
    UpdateNotes,
}

impl AppointmentAction {
    /// Actions a patient may take on their own appointment.
    pub fn is_patient_action(&self) -> bool {
        matches!(self, AppointmentAction::View | AppointmentAction::Cancel | AppointmentAction::Reschedule)
    }
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppointmentAction::View => "view",
            AppointmentAction::Cancel => "cancel",
            AppointmentAction::Reschedule => "reschedule",
            AppointmentAction::SetStatus => "set status of",
            AppointmentAction::Start => "start",
            AppointmentAction::UpdateNotes => "update notes of",
        };
        write!(f, "{}", name)
    }
}

/// The two people an appointment belongs to.
pub trait AppointmentParties {
    fn clinician_id(&self) -> Uuid;
    fn patient_id(&self) -> Uuid;
}
