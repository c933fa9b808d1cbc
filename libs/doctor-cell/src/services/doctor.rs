use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use auth_cell::{Account, AccountService};
use shared_config::AppConfig;
use shared_database::{DbError, Table};
use shared_models::auth::Role;

use crate::{
    parse_weekday, weekday_name, CreateDoctorRequest, CreateSpecializationRequest, Doctor, DoctorError,
    DoctorQuery, DoctorView, Specialization, TimeSlot, UpdateDoctorRequest, DEFAULT_MAX_APPOINTMENTS_PER_DAY,
};

/// What the doctor cell needs to know about bookings without owning them.
#[async_trait]
pub trait SlotBookings: Send + Sync {
    /// Slot ids held by scheduled or confirmed appointments on `date`.
    async fn booked_on(&self, date: NaiveDate) -> HashSet<Uuid>;

    /// Whether any non-cancelled appointment references the slot.
    async fn is_slot_held(&self, slot_id: Uuid) -> bool;

    /// Whether any appointment, in any status, references the doctor.
    async fn doctor_has_appointments(&self, doctor_id: Uuid) -> bool;
}

pub struct DoctorTables {
    pub specializations: Arc<Table<Specialization>>,
    pub doctors: Arc<Table<Doctor>>,
    pub slots: Arc<Table<TimeSlot>>,
}

impl DoctorTables {
    pub async fn open(dir: Option<&Path>) -> Result<Self, DbError> {
        Ok(Self {
            specializations: Arc::new(Specialization::table().persisted(dir).await?),
            doctors: Arc::new(Doctor::table().persisted(dir).await?),
            slots: Arc::new(TimeSlot::table().persisted(dir).await?),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            specializations: Arc::new(Specialization::table()),
            doctors: Arc::new(Doctor::table()),
            slots: Arc::new(TimeSlot::table()),
        }
    }
}

pub struct DoctorService {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) accounts: Arc<AccountService>,
    pub(crate) specializations: Arc<Table<Specialization>>,
    pub(crate) doctors: Arc<Table<Doctor>>,
    pub(crate) slots: Arc<Table<TimeSlot>>,
    pub(crate) bookings: Arc<dyn SlotBookings>,
}

impl DoctorService {
    pub fn new(
        config: Arc<AppConfig>,
        accounts: Arc<AccountService>,
        tables: DoctorTables,
        bookings: Arc<dyn SlotBookings>,
    ) -> Self {
        Self {
            config,
            accounts,
            specializations: tables.specializations,
            doctors: tables.doctors,
            slots: tables.slots,
            bookings,
        }
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub async fn list_specializations(&self) -> Vec<Specialization> {
        let mut all = self.specializations.all().await;
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub async fn create_specialization(
        &self,
        request: CreateSpecializationRequest,
    ) -> Result<Specialization, DoctorError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(DoctorError::invalid("name", "Name is required"));
        }

        let specialization = self
            .specializations
            .insert(Specialization {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: request.description,
                created_at: Utc::now(),
            })
            .await?;
        info!("Created specialization {}", specialization.name);
        Ok(specialization)
    }

    pub async fn get(&self, id: Uuid) -> Result<Doctor, DoctorError> {
        self.doctors.get(id).await.ok_or(DoctorError::NotFound("Doctor", id))
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Option<Doctor> {
        self.doctors.find(|d| d.user_id == user_id).await
    }

    pub async fn account_for(&self, doctor: &Doctor) -> Result<Account, DoctorError> {
        Ok(self.accounts.get(doctor.user_id).await?)
    }

    pub async fn view(&self, doctor: Doctor) -> Result<DoctorView, DoctorError> {
        let account = self.account_for(&doctor).await?;
        let wanted: HashSet<Uuid> = doctor.specialization_ids.iter().copied().collect();
        let mut specializations = self.specializations.filter(|s| wanted.contains(&s.id)).await;
        specializations.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(DoctorView {
            full_name: account.full_name(),
            email: account.email,
            specializations,
            doctor,
        })
    }

    pub async fn list(&self, query: &DoctorQuery) -> Result<Vec<DoctorView>, DoctorError> {
        let weekday = match query.available_on.as_deref() {
            Some(day) => Some(
                parse_weekday(day).ok_or_else(|| DoctorError::invalid("available_on", format!("Unknown weekday: {}", day)))?,
            ),
            None => None,
        };

        let doctors = self
            .doctors
            .filter(|d| {
                query.specialization.map_or(true, |s| d.specialization_ids.contains(&s))
                    && weekday.map_or(true, |w| d.is_available_on_day(w))
            })
            .await;

        let needle = query.search.as_deref().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());

        let mut views = Vec::with_capacity(doctors.len());
        for doctor in doctors {
            let view = self.view(doctor).await?;
            if let Some(needle) = &needle {
                let haystack = format!(
                    "{} {} {} {}",
                    view.full_name,
                    view.email,
                    view.doctor.qualification,
                    view.specializations.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(" ")
                )
                .to_lowercase();
                if !haystack.contains(needle.as_str()) {
                    continue;
                }
            }
            views.push(view);
        }

        views.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        debug!("Doctor listing returned {} rows", views.len());
        Ok(views)
    }

    pub async fn create(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        let account = self.accounts.get(request.user_id).await.map_err(|_| {
            DoctorError::invalid("user_id", format!("User {} does not exist", request.user_id))
        })?;
        if account.role != Role::Doctor {
            return Err(DoctorError::invalid("user_id", "Doctor profiles require a user with the doctor role"));
        }

        let license_number = request.license_number.trim().to_string();
        if license_number.is_empty() {
            return Err(DoctorError::invalid("license_number", "License number is required"));
        }
        if request.available_time_start >= request.available_time_end {
            return Err(DoctorError::invalid(
                "available_time_end",
                "Available time end must be after available time start",
            ));
        }

        let available_days = normalize_days(&request.available_days)?;
        self.check_specializations(&request.specialization_ids).await?;
        let max_appointments_per_day = check_capacity(request.max_appointments_per_day)?;

        let now = Utc::now();
        let doctor = self
            .doctors
            .insert(Doctor {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                specialization_ids: request.specialization_ids,
                license_number,
                qualification: request.qualification,
                experience_years: request.experience_years,
                consultation_fee: request.consultation_fee,
                available_days,
                available_time_start: request.available_time_start,
                available_time_end: request.available_time_end,
                max_appointments_per_day,
                is_available: request.is_available.unwrap_or(true),
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Created doctor profile {} for user {}", doctor.id, doctor.user_id);
        Ok(doctor)
    }

    pub async fn update(&self, id: Uuid, request: UpdateDoctorRequest) -> Result<Doctor, DoctorError> {
        if let Some(ids) = &request.specialization_ids {
            self.check_specializations(ids).await?;
        }
        let days = request.available_days.as_deref().map(normalize_days).transpose()?;
        let capacity = request.max_appointments_per_day.map(|m| check_capacity(Some(m))).transpose()?;

        let doctor = self
            .doctors
            .modify(id, |d: &mut Doctor| {
                if let Some(ids) = request.specialization_ids {
                    d.specialization_ids = ids;
                }
                if let Some(license) = request.license_number {
                    d.license_number = license.trim().to_string();
                }
                if let Some(qualification) = request.qualification {
                    d.qualification = qualification;
                }
                if let Some(years) = request.experience_years {
                    d.experience_years = years;
                }
                if let Some(fee) = request.consultation_fee {
                    d.consultation_fee = fee;
                }
                if let Some(days) = days {
                    d.available_days = days;
                }
                if let Some(start) = request.available_time_start {
                    d.available_time_start = start;
                }
                if let Some(end) = request.available_time_end {
                    d.available_time_end = end;
                }
                if let Some(max) = capacity {
                    d.max_appointments_per_day = max;
                }
                if let Some(available) = request.is_available {
                    d.is_available = available;
                }
                if d.available_time_start >= d.available_time_end {
                    return Err(DoctorError::invalid(
                        "available_time_end",
                        "Available time end must be after available time start",
                    ));
                }
                d.updated_at = Utc::now();
                Ok(())
            })
            .await?;

        info!("Updated doctor profile {}", id);
        Ok(doctor)
    }

    /// Removes the profile and its slots. Refused while any slot is booked
    /// or any appointment still references the doctor.
    pub async fn delete(&self, id: Uuid) -> Result<Doctor, DoctorError> {
        let doctor = self.get(id).await?;

        for slot in self.slots.filter(|s| s.doctor_id == id).await {
            if self.bookings.is_slot_held(slot.id).await {
                return Err(DoctorError::SlotInUse(slot.id));
            }
        }
        if self.bookings.doctor_has_appointments(id).await {
            return Err(DoctorError::HasAppointments(id));
        }

        self.slots.delete_where(|s| s.doctor_id == id).await?;
        self.doctors.delete(id).await?;
        info!("Deleted doctor profile {}", id);
        Ok(doctor)
    }

    async fn check_specializations(&self, ids: &[Uuid]) -> Result<(), DoctorError> {
        for id in ids {
            if self.specializations.get(*id).await.is_none() {
                return Err(DoctorError::invalid(
                    "specialization_ids",
                    format!("Specialization {} does not exist", id),
                ));
            }
        }
        Ok(())
    }
}

fn normalize_days(days: &[String]) -> Result<Vec<String>, DoctorError> {
    let mut normalized: Vec<String> = Vec::new();
    for day in days {
        let weekday = parse_weekday(day)
            .ok_or_else(|| DoctorError::invalid("available_days", format!("Unknown weekday: {}", day)))?;
        let name = weekday_name(weekday).to_string();
        if !normalized.contains(&name) {
            normalized.push(name);
        }
    }

    if normalized.is_empty() {
        return Err(DoctorError::invalid("available_days", "At least one available day is required"));
    }
    Ok(normalized)
}

fn check_capacity(requested: Option<u32>) -> Result<u32, DoctorError> {
    match requested {
        Some(0) => Err(DoctorError::invalid(
            "max_appointments_per_day",
            "Maximum appointments per day must be positive",
        )),
        Some(max) => Ok(max),
        None => Ok(DEFAULT_MAX_APPOINTMENTS_PER_DAY),
    }
}
