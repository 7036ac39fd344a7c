use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Clinician,
    Admin,
}

impl Role {
    /// Maps a token role claim onto a known role. Unknown claims yield `None`.
    pub fn from_claim(claim: &str) -> Option<Self> {
        match claim {
            "patient" => Some(Role::Patient),
            "doctor" | "clinician" => Some(Role::Clinician),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Clinician => write!(f, "clinician"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Parses an identifier into its canonical UUID form.
///
/// Every identity comparison in the engine goes through this, so two ids
/// are equal only when they name the same UUID. Anything that is not a UUID
/// is rejected rather than compared as a string.
pub fn canonical_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// The identity and role of whoever issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(id, Role::Patient)
    }

    pub fn clinician(id: Uuid) -> Self {
        Self::new(id, Role::Clinician)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_clinician(&self) -> bool {
        self.role == Role::Clinician
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }

    /// True when the caller's own id is `id`.
    pub fn is(&self, id: Uuid) -> bool {
        self.id == id
    }
}

impl TryFrom<&User> for Caller {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = canonical_id(&user.id)
            .ok_or_else(|| AppError::Auth("Token subject is not a valid user id".to_string()))?;
        let role = user
            .role
            .as_deref()
            .and_then(Role::from_claim)
            .ok_or_else(|| AppError::Auth("Token carries no recognised role".to_string()))?;

        Ok(Caller { id, role })
    }
}
