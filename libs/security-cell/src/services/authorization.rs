use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::identity::{Caller, Role};

use crate::models::{AppointmentAction, AppointmentParties};

/// Decides who may read or change a template or an appointment.
///
/// Identities are compared as parsed UUIDs only. Callers whose token could
/// not be turned into a [`Caller`] never reach the guard.
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    /// The owning clinician, any admin and any patient may read a template.
    /// Other clinicians may not.
    pub fn can_read_template(caller: &Caller, clinician_id: Uuid) -> bool {
        let allowed = match caller.role {
            Role::Admin | Role::Patient => true,
            Role::Clinician => caller.is(clinician_id),
        };
        Self::log_decision("read template", caller, clinician_id, allowed);
        allowed
    }

    pub fn can_write_template(caller: &Caller, clinician_id: Uuid) -> bool {
        let allowed = match caller.role {
            Role::Admin => true,
            Role::Clinician => caller.is(clinician_id),
            Role::Patient => false,
        };
        Self::log_decision("write template", caller, clinician_id, allowed);
        allowed
    }

    /// Patients book for themselves, clinicians into their own calendar.
    pub fn can_book(caller: &Caller, clinician_id: Uuid, patient_id: Uuid) -> bool {
        let allowed = match caller.role {
            Role::Admin => true,
            Role::Clinician => caller.is(clinician_id),
            Role::Patient => caller.is(patient_id),
        };
        Self::log_decision("book", caller, clinician_id, allowed);
        allowed
    }

    /// Listing a clinician's calendar is limited to that clinician and admins.
    pub fn can_list_clinician_appointments(caller: &Caller, clinician_id: Uuid) -> bool {
        caller.is_admin() || (caller.is_clinician() && caller.is(clinician_id))
    }

    pub fn can_list_patient_appointments(caller: &Caller, patient_id: Uuid) -> bool {
        caller.is_admin() || (caller.is_patient() && caller.is(patient_id))
    }

    pub fn can_mutate_appointment<A: AppointmentParties>(
        caller: &Caller,
        appointment: &A,
        action: AppointmentAction,
    ) -> bool {
        let allowed = match (caller.role, action) {
            // Notes belong to the treating clinician alone.
            (Role::Clinician, AppointmentAction::UpdateNotes) => caller.is(appointment.clinician_id()),
            (_, AppointmentAction::UpdateNotes) => false,
            (Role::Admin, _) => true,
            (Role::Clinician, _) => caller.is(appointment.clinician_id()),
            (Role::Patient, action) => action.is_patient_action() && caller.is(appointment.patient_id()),
        };

        if allowed {
            debug!("{} {} may {} appointment", caller.role, caller.id, action);
        } else {
            warn!(
                "{} {} denied: cannot {} appointment of clinician {}",
                caller.role,
                caller.id,
                action,
                appointment.clinician_id()
            );
        }
        allowed
    }

    fn log_decision(what: &str, caller: &Caller, clinician_id: Uuid, allowed: bool) {
        if allowed {
            debug!("{} {} may {} for clinician {}", caller.role, caller.id, what, clinician_id);
        } else {
            warn!("{} {} denied: {} for clinician {}", caller.role, caller.id, what, clinician_id);
        }
    }
}
