use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth_cell::AccountService;
use shared_config::AppConfig;
use shared_database::Table;
use shared_models::auth::{Role, User};

use crate::{
    age_on, CreatePatientRequest, MedicalSummary, Patient, PatientError, PatientQuery, PatientView,
    UpdatePatientRequest,
};

/// Appointment lookups the patient cell needs without owning appointments.
#[async_trait]
pub trait PatientAppointments: Send + Sync {
    /// Whether any appointment, in any status, references the patient.
    async fn has_appointments(&self, patient_id: Uuid) -> bool;
}

pub struct PatientService {
    config: Arc<AppConfig>,
    accounts: Arc<AccountService>,
    patients: Arc<Table<Patient>>,
    appointments: Arc<dyn PatientAppointments>,
}

impl PatientService {
    pub fn new(
        config: Arc<AppConfig>,
        accounts: Arc<AccountService>,
        patients: Arc<Table<Patient>>,
        appointments: Arc<dyn PatientAppointments>,
    ) -> Self {
        Self {
            config,
            accounts,
            patients,
            appointments,
        }
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub async fn get(&self, id: Uuid) -> Result<Patient, PatientError> {
        self.patients.get(id).await.ok_or(PatientError::NotFound(id))
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Option<Patient> {
        self.patients.find(|p| p.user_id == user_id).await
    }

    pub async fn view(&self, patient: Patient) -> Result<PatientView, PatientError> {
        let account = self.accounts.get(patient.user_id).await?;
        let today = Utc::now().date_naive();

        Ok(PatientView {
            full_name: account.full_name(),
            email: account.email,
            phone: account.phone,
            age: account.date_of_birth.map(|dob| age_on(dob, today)),
            date_of_birth: account.date_of_birth,
            patient,
        })
    }

    /// Staff, admins and doctors may read any profile; a patient only their own.
    pub fn ensure_can_view(&self, user: &User, patient: &Patient) -> Result<(), PatientError> {
        if user.is_privileged() || user.role == Role::Doctor || patient.user_id == user.id {
            return Ok(());
        }
        warn!("User {} denied access to patient {}", user.id, patient.id);
        Err(PatientError::Forbidden("You can only access your own patient profile".to_string()))
    }

    pub async fn get_for(&self, user: &User, id: Uuid) -> Result<Patient, PatientError> {
        let patient = self.get(id).await?;
        self.ensure_can_view(user, &patient)?;
        Ok(patient)
    }

    pub async fn list(&self, user: &User, query: &PatientQuery) -> Result<Vec<PatientView>, PatientError> {
        let sees_all = user.is_privileged() || user.role == Role::Doctor;
        let patients = self
            .patients
            .filter(|p| {
                (sees_all || p.user_id == user.id)
                    && query.blood_group.map_or(true, |b| p.blood_group == b)
                    && query.gender.map_or(true, |g| p.gender == g)
            })
            .await;

        let needle = query.search.as_deref().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());

        let mut views = Vec::with_capacity(patients.len());
        for patient in patients {
            let view = self.view(patient).await?;
            if let Some(needle) = &needle {
                let haystack = format!("{} {}", view.full_name, view.email).to_lowercase();
                if !haystack.contains(needle.as_str()) {
                    continue;
                }
            }
            views.push(view);
        }

        views.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        debug!("Patient listing for {} returned {} rows", user.id, views.len());
        Ok(views)
    }

    pub async fn create(&self, user: &User, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        let user_id = match (user.role, request.user_id) {
            (Role::Admin | Role::Staff, Some(id)) => id,
            (Role::Admin | Role::Staff, None) => {
                return Err(PatientError::invalid("user_id", "user_id is required"));
            }
            (Role::Patient, None) => user.id,
            (Role::Patient, Some(id)) if id == user.id => id,
            _ => {
                return Err(PatientError::Forbidden(
                    "Only staff can create profiles for other users".to_string(),
                ));
            }
        };

        let account = self
            .accounts
            .get(user_id)
            .await
            .map_err(|_| PatientError::invalid("user_id", format!("User {} does not exist", user_id)))?;
        if account.role != Role::Patient {
            return Err(PatientError::invalid("user_id", "Patient profiles require a user with the patient role"));
        }

        let contact = &request.emergency_contact;
        if contact.name.trim().is_empty() || contact.phone.trim().is_empty() {
            return Err(PatientError::invalid(
                "emergency_contact",
                "Emergency contact name and phone are required",
            ));
        }

        let now = Utc::now();
        let patient = self
            .patients
            .insert(Patient {
                id: Uuid::new_v4(),
                user_id,
                blood_group: request.blood_group,
                gender: request.gender,
                emergency_contact: request.emergency_contact,
                allergies: request.allergies,
                medical_conditions: request.medical_conditions,
                current_medications: request.current_medications,
                insurance_provider: request.insurance_provider,
                insurance_id: request.insurance_id,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Created patient profile {} for user {}", patient.id, user_id);
        Ok(patient)
    }

    pub async fn update(&self, user: &User, id: Uuid, request: UpdatePatientRequest) -> Result<Patient, PatientError> {
        let patient = self.get(id).await?;
        if !user.is_privileged() && patient.user_id != user.id {
            return Err(PatientError::Forbidden("You can only update your own patient profile".to_string()));
        }

        let patient = self
            .patients
            .update(id, |p| {
                if let Some(blood_group) = request.blood_group {
                    p.blood_group = blood_group;
                }
                if let Some(gender) = request.gender {
                    p.gender = gender;
                }
                if let Some(contact) = request.emergency_contact {
                    p.emergency_contact = contact;
                }
                if let Some(allergies) = request.allergies {
                    p.allergies = allergies;
                }
                if let Some(conditions) = request.medical_conditions {
                    p.medical_conditions = conditions;
                }
                if let Some(medications) = request.current_medications {
                    p.current_medications = medications;
                }
                if let Some(provider) = request.insurance_provider {
                    p.insurance_provider = provider;
                }
                if let Some(insurance_id) = request.insurance_id {
                    p.insurance_id = insurance_id;
                }
                p.updated_at = Utc::now();
            })
            .await?;

        info!("Updated patient profile {}", id);
        Ok(patient)
    }

    /// Refused while any appointment references the profile.
    pub async fn delete(&self, id: Uuid) -> Result<Patient, PatientError> {
        self.get(id).await?;
        if self.appointments.has_appointments(id).await {
            warn!("Refusing to delete patient {} with appointments", id);
            return Err(PatientError::HasAppointments(id));
        }

        let patient = self.patients.delete(id).await?;
        info!("Deleted patient profile {}", id);
        Ok(patient)
    }

    pub async fn medical_summary(&self, user: &User, id: Uuid) -> Result<MedicalSummary, PatientError> {
        Ok(self.get_for(user, id).await?.medical_summary())
    }
}
