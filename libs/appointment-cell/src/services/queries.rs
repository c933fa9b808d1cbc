use std::cmp::Ordering;

use chrono::{Duration, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use doctor_cell::TimeSlot;
use shared_models::auth::{Role, User};

use crate::services::booking::AppointmentService;
use crate::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentView, AvailableSlotsQuery, CalendarEvent,
    CalendarQuery,
};

const CALENDAR_DEFAULT_DAYS: i64 = 30;

/// Which appointments a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    All,
    Doctor(Uuid),
    Patient(Uuid),
    Nothing,
}

impl Scope {
    fn admits(&self, appointment: &Appointment) -> bool {
        match self {
            Scope::All => true,
            Scope::Doctor(id) => appointment.doctor_id == *id,
            Scope::Patient(id) => appointment.patient_id == *id,
            Scope::Nothing => false,
        }
    }
}

impl AppointmentService {
    async fn scope_for(&self, user: &User) -> Scope {
        match user.role {
            Role::Admin | Role::Staff => Scope::All,
            Role::Doctor => self
                .doctors
                .find_by_user(user.id)
                .await
                .map_or(Scope::Nothing, |d| Scope::Doctor(d.id)),
            Role::Patient => self
                .patients
                .find_by_user(user.id)
                .await
                .map_or(Scope::Nothing, |p| Scope::Patient(p.id)),
        }
    }

    pub async fn list(&self, user: &User, query: &AppointmentQuery) -> Result<Vec<AppointmentView>, AppointmentError> {
        let scope = self.scope_for(user).await;
        let appointments = self
            .appointments
            .filter(|a| {
                scope.admits(a)
                    && query.status.map_or(true, |s| a.status == s)
                    && query.priority.map_or(true, |p| a.priority == p)
                    && query.doctor.map_or(true, |d| a.doctor_id == d)
                    && query.patient.map_or(true, |p| a.patient_id == p)
                    && query.appointment_date.map_or(true, |d| a.appointment_date == d)
            })
            .await;

        let needle = query.search.as_deref().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());

        let mut views = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let view = self.view(appointment).await?;
            if let Some(needle) = &needle {
                let haystack = format!(
                    "{} {} {} {}",
                    view.patient_name, view.doctor_name, view.appointment.reason, view.appointment.symptoms
                )
                .to_lowercase();
                if !haystack.contains(needle.as_str()) {
                    continue;
                }
            }
            views.push(view);
        }

        sort_views(&mut views, query.ordering.as_deref())?;
        debug!("Appointment listing for {} returned {} rows", user.id, views.len());
        Ok(views)
    }

    /// Scheduled or confirmed appointments from today on, soonest first.
    pub async fn upcoming(&self, user: &User) -> Result<Vec<AppointmentView>, AppointmentError> {
        let today = Utc::now().date_naive();
        let scope = self.scope_for(user).await;
        let appointments = self
            .appointments
            .filter(|a| scope.admits(a) && a.appointment_date >= today && a.status.is_pending())
            .await;

        let mut views = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            views.push(self.view(appointment).await?);
        }
        views.sort_by(|a, b| {
            a.appointment
                .appointment_date
                .cmp(&b.appointment.appointment_date)
                .then(a.start_time.cmp(&b.start_time))
        });
        Ok(views)
    }

    pub async fn for_doctor(&self, user: &User, doctor_id: Uuid) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.doctors.get(doctor_id).await?;
        self.list(
            user,
            &AppointmentQuery {
                doctor: Some(doctor_id),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn for_patient(&self, user: &User, patient_id: Uuid) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.patients.get_for(user, patient_id).await?;
        self.list(
            user,
            &AppointmentQuery {
                patient: Some(patient_id),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn available_slots(&self, query: &AvailableSlotsQuery) -> Result<Vec<TimeSlot>, AppointmentError> {
        let doctor = query
            .doctor
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppointmentError::invalid("doctor", "doctor parameter is required."))?;
        let doctor_id = Uuid::parse_str(doctor)
            .map_err(|_| AppointmentError::invalid("doctor", format!("'{}' is not a valid doctor id.", doctor)))?;

        let date = query
            .date
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppointmentError::invalid("date", "date parameter is required."))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| AppointmentError::invalid("date", "Invalid date format. Use YYYY-MM-DD."))?;

        Ok(self.doctors.available_slots(doctor_id, date).await?)
    }

    pub async fn calendar(&self, user: &User, query: &CalendarQuery) -> Result<Vec<CalendarEvent>, AppointmentError> {
        let from = query.from.unwrap_or_else(|| Utc::now().date_naive());
        let to = match query.to {
            Some(to) => to,
            None => from
                .checked_add_signed(Duration::days(CALENDAR_DEFAULT_DAYS))
                .ok_or_else(|| AppointmentError::invalid("from", "Start date is out of range."))?,
        };
        if to < from {
            return Err(AppointmentError::invalid("to", "End date must not be before start date."));
        }

        let scope = self.scope_for(user).await;
        let appointments = self
            .appointments
            .filter(|a| scope.admits(a) && a.holds_slot() && a.appointment_date >= from && a.appointment_date <= to)
            .await;

        let mut events = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let view = self.view(appointment).await?;
            let (Some(start), Some(end)) = (view.start_time, view.end_time) else {
                continue;
            };
            let date = view.appointment.appointment_date;
            events.push(CalendarEvent {
                id: view.appointment.id,
                title: format!("{} with Dr. {}", view.patient_name, view.doctor_name),
                start: date.and_time(start),
                end: date.and_time(end),
                status: view.appointment.status,
                priority: view.appointment.priority,
                doctor_name: view.doctor_name,
                patient_name: view.patient_name,
            });
        }

        events.sort_by_key(|e| e.start);
        Ok(events)
    }
}

/// Applies an `ordering` parameter such as `-created_at`. The default is
/// newest date first, then slot start time.
fn sort_views(views: &mut [AppointmentView], ordering: Option<&str>) -> Result<(), AppointmentError> {
    let ordering = ordering.map(str::trim).filter(|o| !o.is_empty()).unwrap_or("-appointment_date");
    let (descending, key) = match ordering.strip_prefix('-') {
        Some(key) => (true, key),
        None => (false, ordering),
    };

    let compare: fn(&AppointmentView, &AppointmentView) -> Ordering = match key {
        "appointment_date" => |a, b| a.appointment.appointment_date.cmp(&b.appointment.appointment_date),
        "created_at" => |a, b| a.appointment.created_at.cmp(&b.appointment.created_at),
        "status" => |a, b| a.appointment.status.as_str().cmp(b.appointment.status.as_str()),
        other => {
            return Err(AppointmentError::invalid(
                "ordering",
                format!("Cannot order by '{}'.", other),
            ))
        }
    };

    views.sort_by(|a, b| {
        let primary = if descending { compare(b, a) } else { compare(a, b) };
        primary.then(a.start_time.cmp(&b.start_time))
    });
    Ok(())
}
