use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth_cell::AccountService;
use doctor_cell::{weekday_name, Doctor, DoctorService, TimeSlot};
use notification_cell::TaskProducer;
use patient_cell::{Patient, PatientService};
use shared_config::AppConfig;
use shared_database::Table;
use shared_models::auth::{Role, User};

use crate::services::lifecycle::AppointmentLifecycleService;
use crate::{
    Appointment, AppointmentError, AppointmentNotice, AppointmentStatus, AppointmentView, CreateAppointmentRequest,
    UpdateAppointmentRequest, CONFIRMATION_TASK,
};

/// Names used when a booking check fails. Creation and rescheduling
/// report against different request fields.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BookingFields {
    pub date: &'static str,
    pub slot: &'static str,
}

pub(crate) const CREATE_FIELDS: BookingFields = BookingFields {
    date: "appointment_date",
    slot: "time_slot",
};

/// Everything a notification needs to address both sides of an appointment.
#[derive(Debug, Clone)]
pub struct Participants {
    pub patient_name: String,
    pub patient_email: String,
    pub doctor_name: String,
    pub doctor_email: String,
    pub start_time: Option<NaiveTime>,
}

pub struct AppointmentService {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) appointments: Arc<Table<Appointment>>,
    pub(crate) doctors: Arc<DoctorService>,
    pub(crate) patients: Arc<PatientService>,
    pub(crate) accounts: Arc<AccountService>,
    pub(crate) producer: TaskProducer,
    pub(crate) lifecycle: AppointmentLifecycleService,
}

impl AppointmentService {
    pub fn new(
        config: Arc<AppConfig>,
        appointments: Arc<Table<Appointment>>,
        doctors: Arc<DoctorService>,
        patients: Arc<PatientService>,
        accounts: Arc<AccountService>,
        producer: TaskProducer,
    ) -> Self {
        Self {
            config,
            appointments,
            doctors,
            patients,
            accounts,
            producer,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub fn accounts(&self) -> &Arc<AccountService> {
        &self.accounts
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments.get(id).await.ok_or(AppointmentError::NotFound(id))
    }

    /// Admins and staff see every appointment, doctors and patients only
    /// the ones their own profile takes part in.
    pub async fn ensure_can_access(&self, user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
        let allowed = match user.role {
            Role::Admin | Role::Staff => true,
            Role::Doctor => self
                .doctors
                .find_by_user(user.id)
                .await
                .is_some_and(|d| d.id == appointment.doctor_id),
            Role::Patient => self
                .patients
                .find_by_user(user.id)
                .await
                .is_some_and(|p| p.id == appointment.patient_id),
        };

        if allowed {
            Ok(())
        } else {
            warn!("User {} denied access to appointment {}", user.id, appointment.id);
            Err(AppointmentError::Forbidden(
                "You do not have permission to access this appointment".to_string(),
            ))
        }
    }

    pub async fn get_for(&self, user: &User, id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.get(id).await?;
        self.ensure_can_access(user, &appointment).await?;
        Ok(appointment)
    }

    pub async fn participants(&self, appointment: &Appointment) -> Result<Participants, AppointmentError> {
        let patient = self.patients.get(appointment.patient_id).await?;
        let patient_account = self.accounts.get(patient.user_id).await?;
        let doctor = self.doctors.get(appointment.doctor_id).await?;
        let doctor_account = self.doctors.account_for(&doctor).await?;
        let start_time = self.doctors.get_slot(appointment.time_slot_id).await.ok().map(|s| s.start_time);

        Ok(Participants {
            patient_name: patient_account.full_name(),
            patient_email: patient_account.email,
            doctor_name: doctor_account.full_name(),
            doctor_email: doctor_account.email,
            start_time,
        })
    }

    pub async fn view(&self, appointment: Appointment) -> Result<AppointmentView, AppointmentError> {
        let participants = self.participants(&appointment).await?;
        let slot = self.doctors.get_slot(appointment.time_slot_id).await.ok();

        Ok(AppointmentView {
            patient_name: participants.patient_name,
            doctor_name: participants.doctor_name,
            start_time: slot.as_ref().map(|s| s.start_time),
            end_time: slot.as_ref().map(|s| s.end_time),
            appointment,
        })
    }

    pub async fn create(&self, user: &User, request: CreateAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let patient = self.resolve_patient(user, request.patient_id).await?;
        let doctor = self.doctors.get(request.doctor_id).await.map_err(|_| {
            AppointmentError::invalid("doctor", format!("Doctor {} does not exist", request.doctor_id))
        })?;
        let slot = self.doctors.get_slot(request.time_slot_id).await.map_err(|_| {
            AppointmentError::invalid("time_slot", format!("Time slot {} does not exist", request.time_slot_id))
        })?;

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::invalid("reason", "Reason is required."));
        }

        let today = Utc::now().date_naive();
        self.check_booking(&doctor, &slot, request.appointment_date, today, None, CREATE_FIELDS)
            .await?;

        let now = Utc::now();
        let appointment = self
            .appointments
            .insert(Appointment {
                id: Uuid::new_v4(),
                patient_id: patient.id,
                doctor_id: doctor.id,
                appointment_date: request.appointment_date,
                time_slot_id: slot.id,
                status: AppointmentStatus::Scheduled,
                priority: request.priority,
                reason: reason.to_string(),
                symptoms: request.symptoms,
                notes: String::new(),
                prescription: String::new(),
                follow_up_date: None,
                cancelled_by: None,
                cancellation_reason: String::new(),
                created_at: now,
                updated_at: now,
            })
            .await
            .inspect_err(|e| warn!("Booking of slot {} on {} rejected: {}", slot.id, request.appointment_date, e))?;

        self.doctors.set_slot_availability(slot.id, false).await?;
        info!(
            "Booked appointment {} for patient {} with doctor {} on {}",
            appointment.id, patient.id, doctor.id, appointment.appointment_date
        );

        self.producer
            .dispatch(CONFIRMATION_TASK, &AppointmentNotice { appointment_id: appointment.id })
            .await;
        Ok(appointment)
    }

    /// Checks run in a fixed order so the first failing rule names the field.
    pub(crate) async fn check_booking(
        &self,
        doctor: &Doctor,
        slot: &TimeSlot,
        date: NaiveDate,
        today: NaiveDate,
        rebooking: Option<&Appointment>,
        fields: BookingFields,
    ) -> Result<(), AppointmentError> {
        if date < today {
            return Err(AppointmentError::invalid(fields.date, "Cannot schedule appointments in the past."));
        }

        if !doctor.works_on(date) {
            return Err(AppointmentError::invalid(
                fields.date,
                format!("Doctor is not available on {}s.", weekday_name(date.weekday())),
            ));
        }

        let exclude = rebooking.map(|a| a.id);
        let booked = self
            .appointments
            .count(|a| {
                a.doctor_id == doctor.id && a.appointment_date == date && a.holds_slot() && Some(a.id) != exclude
            })
            .await;
        if booked >= doctor.max_appointments_per_day as usize {
            return Err(AppointmentError::invalid(
                "doctor",
                "Doctor has reached maximum appointments for this date.",
            ));
        }

        if slot.doctor_id != doctor.id {
            return Err(AppointmentError::invalid(fields.slot, "Invalid time slot for this doctor."));
        }

        let held_by_self = rebooking.is_some_and(|a| a.time_slot_id == slot.id);
        if !slot.is_available && !held_by_self {
            return Err(AppointmentError::invalid(fields.slot, "This time slot is not available."));
        }

        debug!("Slot {} on {} passes booking checks", slot.id, date);
        Ok(())
    }

    async fn resolve_patient(&self, user: &User, requested: Option<Uuid>) -> Result<Patient, AppointmentError> {
        if user.role == Role::Patient {
            let own = self.patients.find_by_user(user.id).await.ok_or_else(|| {
                AppointmentError::invalid("patient", "Create your patient profile before booking.")
            })?;
            if requested.is_some_and(|id| id != own.id) {
                return Err(AppointmentError::Forbidden(
                    "Patients can only book appointments for themselves".to_string(),
                ));
            }
            return Ok(own);
        }

        let id = requested.ok_or_else(|| AppointmentError::invalid("patient", "patient_id is required."))?;
        self.patients
            .get(id)
            .await
            .map_err(|_| AppointmentError::invalid("patient", format!("Patient {} does not exist", id)))
    }

    pub async fn update(
        &self,
        user: &User,
        id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.get_for(user, id).await?;
        if user.role == Role::Patient && request.notes.is_some() {
            return Err(AppointmentError::Forbidden("Patients cannot edit appointment notes".to_string()));
        }
        if request.reason.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(AppointmentError::invalid("reason", "Reason is required."));
        }

        let appointment = self
            .appointments
            .update(id, |a| {
                if let Some(reason) = request.reason {
                    a.reason = reason.trim().to_string();
                }
                if let Some(symptoms) = request.symptoms {
                    a.symptoms = symptoms;
                }
                if let Some(priority) = request.priority {
                    a.priority = priority;
                }
                if let Some(notes) = request.notes {
                    a.notes = notes;
                }
                a.updated_at = Utc::now();
            })
            .await?;

        info!("Updated appointment {}", id);
        Ok(appointment)
    }

    /// Removes the appointment and releases its slot when still held.
    pub async fn delete(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.delete(id).await?;
        if appointment.holds_slot() {
            self.release_slot(appointment.time_slot_id).await;
        }
        info!("Deleted appointment {}", id);
        Ok(appointment)
    }

    /// The slot may already be gone if its doctor profile was removed.
    pub(crate) async fn release_slot(&self, slot_id: Uuid) {
        if let Err(e) = self.doctors.set_slot_availability(slot_id, true).await {
            warn!("Could not release time slot {}: {}", slot_id, e);
        }
    }
}
