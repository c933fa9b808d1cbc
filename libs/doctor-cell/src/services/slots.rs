use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::User;

use crate::services::doctor::DoctorService;
use crate::{
    CreateTimeSlotRequest, Doctor, DoctorAvailabilityResponse, DoctorError, GenerateSlotsRequest, TimeSlot,
    TimeSlotQuery, UpdateTimeSlotRequest,
};

const MIN_SLOT_MINUTES: u32 = 5;
const MAX_SLOT_MINUTES: u32 = 480;

impl DoctorService {
    pub async fn get_slot(&self, id: Uuid) -> Result<TimeSlot, DoctorError> {
        self.slots.get(id).await.ok_or(DoctorError::NotFound("Time slot", id))
    }

    pub async fn list_slots(&self, query: &TimeSlotQuery) -> Vec<TimeSlot> {
        let booked = match query.date {
            Some(date) => self.bookings.booked_on(date).await,
            None => Default::default(),
        };

        let mut slots = self
            .slots
            .filter(|s| {
                query.doctor.map_or(true, |d| s.doctor_id == d)
                    && query.is_available.map_or(true, |a| s.is_available == a)
                    && !booked.contains(&s.id)
            })
            .await;
        slots.sort_by_key(|s| (s.start_time, s.end_time));
        slots
    }

    /// Open slots of a doctor that no scheduled or confirmed appointment
    /// holds on `date`.
    pub async fn available_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<TimeSlot>, DoctorError> {
        self.get(doctor_id).await?;
        Ok(self
            .list_slots(&TimeSlotQuery {
                doctor: Some(doctor_id),
                is_available: Some(true),
                date: Some(date),
            })
            .await)
    }

    pub async fn doctor_availability(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<DoctorAvailabilityResponse, DoctorError> {
        let doctor = self.get(doctor_id).await?;
        let slots = self
            .list_slots(&TimeSlotQuery {
                doctor: Some(doctor_id),
                is_available: Some(true),
                date,
            })
            .await;

        Ok(DoctorAvailabilityResponse {
            doctor_id,
            is_available: doctor.is_available,
            works_on_date: date.map(|d| doctor.works_on(d)),
            date,
            available_days: doctor.available_days,
            available_time_start: doctor.available_time_start,
            available_time_end: doctor.available_time_end,
            max_appointments_per_day: doctor.max_appointments_per_day,
            slots,
        })
    }

    /// Admins and staff manage every doctor's slots; a doctor only their own.
    pub fn ensure_can_manage(&self, user: &User, doctor: &Doctor) -> Result<(), DoctorError> {
        if user.is_privileged() || doctor.user_id == user.id {
            return Ok(());
        }
        warn!("User {} tried to manage slots of doctor {}", user.id, doctor.id);
        Err(DoctorError::Forbidden(
            "You can only manage your own time slots".to_string(),
        ))
    }

    pub async fn create_slot(&self, user: &User, request: CreateTimeSlotRequest) -> Result<TimeSlot, DoctorError> {
        let doctor = self
            .get(request.doctor_id)
            .await
            .map_err(|_| DoctorError::invalid("doctor_id", format!("Doctor {} does not exist", request.doctor_id)))?;
        self.ensure_can_manage(user, &doctor)?;
        check_window(&doctor, request.start_time, request.end_time)?;

        let slot = self
            .slots
            .insert(TimeSlot {
                id: Uuid::new_v4(),
                doctor_id: doctor.id,
                start_time: request.start_time,
                end_time: request.end_time,
                is_available: true,
                created_at: Utc::now(),
            })
            .await?;
        info!("Created time slot {} for doctor {}", slot.id, doctor.id);
        Ok(slot)
    }

    /// Fills the doctor's daily window with consecutive slots of
    /// `slot_minutes`. Windows that already have a slot are left alone.
    pub async fn generate_slots(&self, user: &User, request: GenerateSlotsRequest) -> Result<Vec<TimeSlot>, DoctorError> {
        let doctor = self
            .get(request.doctor_id)
            .await
            .map_err(|_| DoctorError::invalid("doctor_id", format!("Doctor {} does not exist", request.doctor_id)))?;
        self.ensure_can_manage(user, &doctor)?;

        if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&request.slot_minutes) {
            return Err(DoctorError::invalid(
                "slot_minutes",
                format!("Slot length must be between {} and {} minutes", MIN_SLOT_MINUTES, MAX_SLOT_MINUTES),
            ));
        }

        let mut created = Vec::new();
        for (start, end) in windows(doctor.available_time_start, doctor.available_time_end, request.slot_minutes) {
            let exists = self
                .slots
                .find(|s| s.doctor_id == doctor.id && s.start_time == start && s.end_time == end)
                .await
                .is_some();
            if exists {
                continue;
            }

            let slot = self
                .slots
                .insert(TimeSlot {
                    id: Uuid::new_v4(),
                    doctor_id: doctor.id,
                    start_time: start,
                    end_time: end,
                    is_available: true,
                    created_at: Utc::now(),
                })
                .await?;
            created.push(slot);
        }

        info!("Generated {} time slots for doctor {}", created.len(), doctor.id);
        Ok(created)
    }

    pub async fn update_slot(&self, user: &User, id: Uuid, request: UpdateTimeSlotRequest) -> Result<TimeSlot, DoctorError> {
        let slot = self.get_slot(id).await?;
        let doctor = self.get(slot.doctor_id).await?;
        self.ensure_can_manage(user, &doctor)?;

        if self.bookings.is_slot_held(id).await {
            return Err(DoctorError::SlotInUse(id));
        }

        let start = request.start_time.unwrap_or(slot.start_time);
        let end = request.end_time.unwrap_or(slot.end_time);
        check_window(&doctor, start, end)?;

        let slot = self
            .slots
            .update(id, |s| {
                s.start_time = start;
                s.end_time = end;
            })
            .await?;
        info!("Updated time slot {}", id);
        Ok(slot)
    }

    pub async fn delete_slot(&self, user: &User, id: Uuid) -> Result<TimeSlot, DoctorError> {
        let slot = self.get_slot(id).await?;
        let doctor = self.get(slot.doctor_id).await?;
        self.ensure_can_manage(user, &doctor)?;

        if self.bookings.is_slot_held(id).await {
            return Err(DoctorError::SlotInUse(id));
        }

        let slot = self.slots.delete(id).await?;
        info!("Deleted time slot {}", id);
        Ok(slot)
    }

    /// Moves the booking flag. Only the appointment lifecycle calls this.
    pub async fn set_slot_availability(&self, id: Uuid, available: bool) -> Result<TimeSlot, DoctorError> {
        let slot = self.slots.update(id, |s| s.is_available = available).await?;
        debug!("Time slot {} is_available = {}", id, available);
        Ok(slot)
    }
}

fn check_window(doctor: &Doctor, start: NaiveTime, end: NaiveTime) -> Result<(), DoctorError> {
    if start >= end {
        return Err(DoctorError::invalid("end_time", "End time must be after start time"));
    }
    if !doctor.covers(start, end) {
        return Err(DoctorError::invalid(
            "start_time",
            format!(
                "Time slot must fall within the doctor's hours ({} - {})",
                doctor.available_time_start.format("%H:%M"),
                doctor.available_time_end.format("%H:%M")
            ),
        ));
    }
    Ok(())
}

fn windows(start: NaiveTime, end: NaiveTime, minutes: u32) -> Vec<(NaiveTime, NaiveTime)> {
    let step = Duration::minutes(i64::from(minutes));
    let mut out = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let (next, wrapped) = cursor.overflowing_add_signed(step);
        if wrapped != 0 || next > end {
            break;
        }
        out.push((cursor, next));
        cursor = next;
    }
    out
}
