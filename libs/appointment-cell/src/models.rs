use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{Record, Table};

pub const CONFIRMATION_TASK: &str = "appointment.confirmation";
pub const CANCELLATION_TASK: &str = "appointment.cancellation";
pub const REMINDER_TASK: &str = "appointment.reminder";
pub const NO_SHOW_TASK: &str = "appointment.no_show";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Scheduled or confirmed: still waiting for the visit.
    pub fn is_pending(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentPriority {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

impl AppointmentPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentPriority::Normal => "normal",
            AppointmentPriority::Urgent => "urgent",
            AppointmentPriority::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot_id: Uuid,
    pub status: AppointmentStatus,
    pub priority: AppointmentPriority,
    pub reason: String,
    pub symptoms: String,
    pub notes: String,
    pub prescription: String,
    pub follow_up_date: Option<NaiveDate>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// One live booking per doctor, date and slot. Cancelled rows drop out of
    /// the constraint so the slot can be booked again.
    pub fn table() -> Table<Appointment> {
        Table::new("appointments").unique("appointments_slot", |a: &Appointment| {
            (a.status != AppointmentStatus::Cancelled)
                .then(|| format!("{}|{}|{}", a.doctor_id, a.appointment_date, a.time_slot_id))
        })
    }

    pub fn holds_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

impl Record for Appointment {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Appointment joined with participant names and slot times.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
    /// `None` once the slot itself has been removed.
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    /// Defaults to the caller's own patient profile.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot_id: Uuid,
    pub reason: String,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub priority: AppointmentPriority,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub reason: Option<String>,
    pub symptoms: Option<String>,
    pub priority: Option<AppointmentPriority>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub cancellation_reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub notes: Option<String>,
    pub prescription: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: Option<NaiveDate>,
    pub new_time_slot: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    pub priority: Option<AppointmentPriority>,
    pub doctor: Option<Uuid>,
    pub patient: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// Raw strings so a missing or malformed value gets a field error instead of
/// a generic extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableSlotsQuery {
    pub doctor: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: AppointmentStatus,
    pub priority: AppointmentPriority,
    pub doctor_name: String,
    pub patient_name: String,
}

/// Payload of every appointment notification task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentNotice {
    pub appointment_id: Uuid,
}
