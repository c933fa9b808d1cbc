use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::AppointmentService;
use doctor_cell::DoctorService;
use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_database::{DbError, Table};
use shared_models::auth::{Role, User};

use crate::{
    AddLabResultRequest, AddPrescriptionRequest, AddVaccinationRequest, CreateRecordRequest, LabResult,
    MedicalRecord, MedicalRecordView, Prescription, RecordError, RecordQuery, Vaccination,
};

pub struct RecordTables {
    pub records: Arc<Table<MedicalRecord>>,
    pub prescriptions: Arc<Table<Prescription>>,
    pub lab_results: Arc<Table<LabResult>>,
    pub vaccinations: Arc<Table<Vaccination>>,
}

impl RecordTables {
    pub async fn open(dir: Option<&Path>) -> Result<Self, DbError> {
        Ok(Self {
            records: Arc::new(MedicalRecord::table().persisted(dir).await?),
            prescriptions: Arc::new(Prescription::table().persisted(dir).await?),
            lab_results: Arc::new(LabResult::table().persisted(dir).await?),
            vaccinations: Arc::new(Vaccination::table().persisted(dir).await?),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(MedicalRecord::table()),
            prescriptions: Arc::new(Prescription::table()),
            lab_results: Arc::new(LabResult::table()),
            vaccinations: Arc::new(Vaccination::table()),
        }
    }
}

/// Who is asking, resolved to their clinical profile.
#[derive(Debug, Clone, Copy)]
enum Viewer {
    Admin,
    Staff,
    Doctor(Option<Uuid>),
    Patient(Option<Uuid>),
}

impl Viewer {
    /// Admins see everything. Confidential records are otherwise limited to
    /// the doctor who wrote them, and patients only see their own records.
    fn can_see(&self, user: &User, record: &MedicalRecord) -> bool {
        match self {
            Viewer::Admin => true,
            Viewer::Staff => !record.is_confidential,
            Viewer::Doctor(own) => {
                !record.is_confidential || record.created_by == user.id || *own == Some(record.doctor_id)
            }
            Viewer::Patient(own) => *own == Some(record.patient_id) && !record.is_confidential,
        }
    }
}

pub struct RecordService {
    config: Arc<AppConfig>,
    records: Arc<Table<MedicalRecord>>,
    prescriptions: Arc<Table<Prescription>>,
    lab_results: Arc<Table<LabResult>>,
    vaccinations: Arc<Table<Vaccination>>,
    doctors: Arc<DoctorService>,
    patients: Arc<PatientService>,
    appointments: Arc<AppointmentService>,
}

impl RecordService {
    pub fn new(
        config: Arc<AppConfig>,
        tables: RecordTables,
        doctors: Arc<DoctorService>,
        patients: Arc<PatientService>,
        appointments: Arc<AppointmentService>,
    ) -> Self {
        Self {
            config,
            records: tables.records,
            prescriptions: tables.prescriptions,
            lab_results: tables.lab_results,
            vaccinations: tables.vaccinations,
            doctors,
            patients,
            appointments,
        }
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    async fn viewer(&self, user: &User) -> Viewer {
        match user.role {
            Role::Admin => Viewer::Admin,
            Role::Staff => Viewer::Staff,
            Role::Doctor => Viewer::Doctor(self.doctors.find_by_user(user.id).await.map(|d| d.id)),
            Role::Patient => Viewer::Patient(self.patients.find_by_user(user.id).await.map(|p| p.id)),
        }
    }

    pub async fn view(&self, record: MedicalRecord) -> MedicalRecordView {
        let id = record.id;
        let mut prescriptions = self.prescriptions.filter(|p| p.record_id == id).await;
        prescriptions.sort_by_key(|p| p.created_at);
        let mut lab_results = self.lab_results.filter(|l| l.record_id == id).await;
        lab_results.sort_by_key(|l| l.test_date);
        let mut vaccinations = self.vaccinations.filter(|v| v.record_id == id).await;
        vaccinations.sort_by_key(|v| v.dose_number);

        MedicalRecordView {
            record,
            prescriptions,
            lab_results,
            vaccinations,
        }
    }

    /// Hidden records answer 404 so their existence does not leak.
    pub async fn get_for(&self, user: &User, id: Uuid) -> Result<MedicalRecord, RecordError> {
        let record = self.records.get(id).await.ok_or(RecordError::NotFound(id))?;
        if !self.viewer(user).await.can_see(user, &record) {
            debug!("Medical record {} hidden from {}", id, user.id);
            return Err(RecordError::NotFound(id));
        }
        Ok(record)
    }

    pub async fn list(&self, user: &User, query: &RecordQuery) -> Vec<MedicalRecordView> {
        let viewer = self.viewer(user).await;
        let mut records = self
            .records
            .filter(|r| {
                viewer.can_see(user, r)
                    && query.patient.map_or(true, |p| r.patient_id == p)
                    && query.record_type.map_or(true, |t| r.record_type == t)
            })
            .await;
        records.sort_by(|a, b| b.record_date.cmp(&a.record_date));

        let mut views = Vec::with_capacity(records.len());
        for record in records {
            views.push(self.view(record).await);
        }
        views
    }

    pub async fn create(&self, user: &User, request: CreateRecordRequest) -> Result<MedicalRecord, RecordError> {
        let doctor_id = match (self.viewer(user).await, request.doctor_id) {
            (Viewer::Admin, Some(id)) => id,
            (Viewer::Admin, None) => return Err(RecordError::invalid("doctor_id", "doctor_id is required")),
            (Viewer::Doctor(Some(own)), None) => own,
            (Viewer::Doctor(Some(own)), Some(id)) if id == own => own,
            (Viewer::Doctor(Some(_)), Some(_)) => {
                return Err(RecordError::Forbidden(
                    "Doctors can only write records under their own profile".to_string(),
                ))
            }
            (Viewer::Doctor(None), _) => {
                return Err(RecordError::invalid("doctor_id", "Create your doctor profile first"))
            }
            _ => {
                warn!("User {} attempted to create a medical record", user.id);
                return Err(RecordError::Forbidden(
                    "Only doctors and admins can create medical records".to_string(),
                ));
            }
        };

        self.doctors
            .get(doctor_id)
            .await
            .map_err(|_| RecordError::invalid("doctor_id", format!("Doctor {} does not exist", doctor_id)))?;
        self.patients.get(request.patient_id).await.map_err(|_| {
            RecordError::invalid("patient_id", format!("Patient {} does not exist", request.patient_id))
        })?;

        if let Some(appointment_id) = request.appointment_id {
            let appointment = self.appointments.get(appointment_id).await.map_err(|_| {
                RecordError::invalid("appointment_id", format!("Appointment {} does not exist", appointment_id))
            })?;
            if appointment.patient_id != request.patient_id {
                return Err(RecordError::invalid(
                    "appointment_id",
                    "The appointment belongs to a different patient",
                ));
            }
        }

        let now = Utc::now();
        let record = self
            .records
            .insert(MedicalRecord {
                id: Uuid::new_v4(),
                patient_id: request.patient_id,
                doctor_id,
                appointment_id: request.appointment_id,
                record_type: request.record_type,
                record_date: request.record_date.unwrap_or(now),
                diagnosis: request.diagnosis,
                treatment: request.treatment,
                prescription: request.prescription,
                notes: request.notes,
                is_confidential: request.is_confidential,
                created_by: user.id,
                created_at: now,
            })
            .await?;

        info!(
            "Created {:?} record {} for patient {}",
            record.record_type, record.id, record.patient_id
        );
        Ok(record)
    }

    /// Admins may append to any record, doctors only to records they wrote.
    async fn writable(&self, user: &User, id: Uuid) -> Result<MedicalRecord, RecordError> {
        let record = self.get_for(user, id).await?;
        let allowed = match self.viewer(user).await {
            Viewer::Admin => true,
            Viewer::Doctor(own) => record.created_by == user.id || own == Some(record.doctor_id),
            _ => false,
        };
        if !allowed {
            return Err(RecordError::Forbidden(
                "Only the authoring doctor or an admin can add to this record".to_string(),
            ));
        }
        Ok(record)
    }

    pub async fn add_prescription(
        &self,
        user: &User,
        id: Uuid,
        request: AddPrescriptionRequest,
    ) -> Result<Prescription, RecordError> {
        let record = self.writable(user, id).await?;
        required("medicine_name", &request.medicine_name)?;
        required("dosage", &request.dosage)?;
        required("frequency", &request.frequency)?;
        required("duration", &request.duration)?;

        let prescription = self
            .prescriptions
            .insert(Prescription {
                id: Uuid::new_v4(),
                record_id: record.id,
                medicine_name: request.medicine_name.trim().to_string(),
                dosage: request.dosage,
                frequency: request.frequency,
                duration: request.duration,
                instructions: request.instructions,
                is_active: request.is_active.unwrap_or(true),
                created_at: Utc::now(),
            })
            .await?;
        info!("Added prescription {} to record {}", prescription.id, record.id);
        Ok(prescription)
    }

    pub async fn add_lab_result(
        &self,
        user: &User,
        id: Uuid,
        request: AddLabResultRequest,
    ) -> Result<LabResult, RecordError> {
        let record = self.writable(user, id).await?;
        required("test_name", &request.test_name)?;
        required("result_value", &request.result_value)?;

        let result = self
            .lab_results
            .insert(LabResult {
                id: Uuid::new_v4(),
                record_id: record.id,
                test_name: request.test_name.trim().to_string(),
                test_date: request.test_date,
                result_value: request.result_value,
                normal_range: request.normal_range,
                unit: request.unit,
                is_abnormal: request.is_abnormal,
                notes: request.notes,
                created_at: Utc::now(),
            })
            .await?;
        info!("Added lab result {} to record {}", result.id, record.id);
        Ok(result)
    }

    pub async fn add_vaccination(
        &self,
        user: &User,
        id: Uuid,
        request: AddVaccinationRequest,
    ) -> Result<Vaccination, RecordError> {
        let record = self.writable(user, id).await?;
        required("vaccine_name", &request.vaccine_name)?;
        required("administered_by", &request.administered_by)?;
        required("batch_number", &request.batch_number)?;
        if request.dose_number == 0 {
            return Err(RecordError::invalid("dose_number", "Dose number starts at 1"));
        }
        if request
            .next_due_date
            .is_some_and(|due| due < request.date_administered.date_naive())
        {
            return Err(RecordError::invalid(
                "next_due_date",
                "Next due date cannot be before the administration date",
            ));
        }

        let vaccination = self
            .vaccinations
            .insert(Vaccination {
                id: Uuid::new_v4(),
                record_id: record.id,
                vaccine_name: request.vaccine_name.trim().to_string(),
                dose_number: request.dose_number,
                date_administered: request.date_administered,
                administered_by: request.administered_by,
                batch_number: request.batch_number,
                next_due_date: request.next_due_date,
                notes: request.notes,
                created_at: Utc::now(),
            })
            .await?;
        info!("Added vaccination {} to record {}", vaccination.id, record.id);
        Ok(vaccination)
    }
}

fn required(field: &'static str, value: &str) -> Result<(), RecordError> {
    if value.trim().is_empty() {
        return Err(RecordError::invalid(field, format!("{} is required", field)));
    }
    Ok(())
}
