use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use doctor_cell::SlotBookings;
use patient_cell::PatientAppointments;
use shared_database::Table;

use crate::Appointment;

/// Answers booking questions for the doctor and patient cells straight
/// from the appointments table.
pub struct AppointmentBookings {
    appointments: Arc<Table<Appointment>>,
}

impl AppointmentBookings {
    pub fn new(appointments: Arc<Table<Appointment>>) -> Self {
        Self { appointments }
    }
}

#[async_trait]
impl SlotBookings for AppointmentBookings {
    async fn booked_on(&self, date: NaiveDate) -> HashSet<Uuid> {
        self.appointments
            .filter(|a| a.appointment_date == date && a.status.is_pending())
            .await
            .into_iter()
            .map(|a| a.time_slot_id)
            .collect()
    }

    async fn is_slot_held(&self, slot_id: Uuid) -> bool {
        self.appointments
            .find(|a| a.time_slot_id == slot_id && a.holds_slot())
            .await
            .is_some()
    }

    async fn doctor_has_appointments(&self, doctor_id: Uuid) -> bool {
        self.appointments.find(|a| a.doctor_id == doctor_id).await.is_some()
    }
}

#[async_trait]
impl PatientAppointments for AppointmentBookings {
    async fn has_appointments(&self, patient_id: Uuid) -> bool {
        self.appointments.find(|a| a.patient_id == patient_id).await.is_some()
    }
}
