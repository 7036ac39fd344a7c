use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schedule_cell::WallTime;
use security_cell::AppointmentParties;
use shared_database::StorageError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinician_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: WallTime,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentParties for Appointment {
    fn clinician_id(&self) -> Uuid {
        self.clinician_id
    }

    fn patient_id(&self) -> Uuid {
        self.patient_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Rescheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that occupy a slot.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled | AppointmentStatus::Rescheduled | AppointmentStatus::InProgress
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub clinician_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: WallTime,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_time: WallTime,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotesRequest {
    pub notes: String,
}

/// Optional inclusive date bounds for calendar listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Requested slot is not available")]
    SlotUnavailable,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for AppointmentError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => AppointmentError::NotFound(what),
            other => AppointmentError::Storage(other),
        }
    }
}

impl From<schedule_cell::ScheduleError> for AppointmentError {
    fn from(e: schedule_cell::ScheduleError) -> Self {
        match e {
            schedule_cell::ScheduleError::Validation(msg) => AppointmentError::Validation(msg),
            schedule_cell::ScheduleError::Unauthorized(msg) => AppointmentError::Unauthorized(msg),
            schedule_cell::ScheduleError::NotFound(msg) => AppointmentError::NotFound(msg),
            schedule_cell::ScheduleError::Storage(e) => e.into(),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            e @ (AppointmentError::SlotUnavailable | AppointmentError::InvalidTransition { .. }) => {
                AppError::Conflict(e.to_string())
            }
            AppointmentError::Storage(e @ StorageError::Malformed(_)) => AppError::Internal(e.to_string()),
            AppointmentError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_statuses_occupy_slots() {
        assert!(AppointmentStatus::Scheduled.is_active());
        assert!(AppointmentStatus::Rescheduled.is_active());
        assert!(AppointmentStatus::InProgress.is_active());
        assert!(!AppointmentStatus::Completed.is_active());
        assert!(!AppointmentStatus::Cancelled.is_active());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_string(&AppointmentStatus::InProgress).unwrap(), "\"in_progress\"");
        let parsed: AppointmentStatus = serde_json::from_str("\"rescheduled\"").unwrap();
        assert_eq!(parsed, AppointmentStatus::Rescheduled);
    }

    #[test]
    fn conflicts_map_to_409() {
        let slot: AppError = AppointmentError::SlotUnavailable.into();
        assert_eq!(slot.status_code(), axum::http::StatusCode::CONFLICT);

        let transition: AppError = AppointmentError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Cancelled,
        }
        .into();
        assert_eq!(transition.status_code(), axum::http::StatusCode::CONFLICT);
    }
}
