use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{Record, Table};

pub const DEFAULT_MAX_APPOINTMENTS_PER_DAY: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialization {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Specialization {
    pub fn table() -> Table<Specialization> {
        Table::new("specializations")
            .unique("specializations_name", |s: &Specialization| Some(s.name.to_lowercase()))
    }
}

impl Record for Specialization {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization_ids: Vec<Uuid>,
    pub license_number: String,
    pub qualification: String,
    pub experience_years: u32,
    pub consultation_fee: f64,
    /// Full weekday names, e.g. `Monday`.
    pub available_days: Vec<String>,
    pub available_time_start: NaiveTime,
    pub available_time_end: NaiveTime,
    pub max_appointments_per_day: u32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn table() -> Table<Doctor> {
        Table::new("doctors")
            .unique("doctors_user", |d: &Doctor| Some(d.user_id.to_string()))
            .unique("doctors_license", |d: &Doctor| Some(d.license_number.to_uppercase()))
    }

    pub fn is_available_on_day(&self, day: Weekday) -> bool {
        let name = weekday_name(day);
        self.available_days.iter().any(|d| d == name)
    }

    pub fn works_on(&self, date: NaiveDate) -> bool {
        self.is_available_on_day(date.weekday())
    }

    pub fn covers(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start >= self.available_time_start && end <= self.available_time_end
    }
}

impl Record for Doctor {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn table() -> Table<TimeSlot> {
        Table::new("time_slots").unique("time_slots_window", |s: &TimeSlot| {
            Some(format!("{}|{}|{}", s.doctor_id, s.start_time, s.end_time))
        })
    }
}

impl Record for TimeSlot {
    fn id(&self) -> Uuid {
        self.id
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Accepts full or abbreviated names in any case.
pub fn parse_weekday(value: &str) -> Option<Weekday> {
    value.trim().parse::<Weekday>().ok()
}

/// Doctor profile joined with account and specialization details.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorView {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub full_name: String,
    pub email: String,
    pub specializations: Vec<Specialization>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSpecializationRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub specialization_ids: Vec<Uuid>,
    pub license_number: String,
    pub qualification: String,
    #[serde(default)]
    pub experience_years: u32,
    #[serde(default)]
    pub consultation_fee: f64,
    pub available_days: Vec<String>,
    pub available_time_start: NaiveTime,
    pub available_time_end: NaiveTime,
    pub max_appointments_per_day: Option<u32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub specialization_ids: Option<Vec<Uuid>>,
    pub license_number: Option<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<u32>,
    pub consultation_fee: Option<f64>,
    pub available_days: Option<Vec<String>>,
    pub available_time_start: Option<NaiveTime>,
    pub available_time_end: Option<NaiveTime>,
    pub max_appointments_per_day: Option<u32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorQuery {
    pub specialization: Option<Uuid>,
    pub available_on: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTimeSlotRequest {
    pub doctor_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// `is_available` is read-only here; the booking lifecycle owns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTimeSlotRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateSlotsRequest {
    pub doctor_id: Uuid,
    pub slot_minutes: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSlotQuery {
    pub doctor: Option<Uuid>,
    pub is_available: Option<bool>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorAvailabilityResponse {
    pub doctor_id: Uuid,
    pub is_available: bool,
    pub available_days: Vec<String>,
    pub available_time_start: NaiveTime,
    pub available_time_end: NaiveTime,
    pub max_appointments_per_day: u32,
    pub date: Option<NaiveDate>,
    pub works_on_date: Option<bool>,
    pub slots: Vec<TimeSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_names_parse_both_ways() {
        assert_eq!(parse_weekday("monday"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("Fri"), Some(Weekday::Fri));
        assert_eq!(parse_weekday("Someday"), None);
        assert_eq!(weekday_name(Weekday::Sun), "Sunday");
    }
}
