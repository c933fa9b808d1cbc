use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{Record, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Diagnosis,
    Treatment,
    LabResult,
    Prescription,
    Surgery,
    Vaccination,
    Allergy,
    Other,
}

/// A clinical entry. Never edited after creation; children are appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub record_type: RecordType,
    pub record_date: DateTime<Utc>,
    pub diagnosis: String,
    pub treatment: String,
    pub prescription: String,
    pub notes: String,
    pub is_confidential: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub record_id: Uuid,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResult {
    pub id: Uuid,
    pub record_id: Uuid,
    pub test_name: String,
    pub test_date: DateTime<Utc>,
    pub result_value: String,
    pub normal_range: String,
    pub unit: String,
    pub is_abnormal: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vaccination {
    pub id: Uuid,
    pub record_id: Uuid,
    pub vaccine_name: String,
    pub dose_number: u32,
    pub date_administered: DateTime<Utc>,
    pub administered_by: String,
    pub batch_number: String,
    pub next_due_date: Option<NaiveDate>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl MedicalRecord {
    pub fn table() -> Table<MedicalRecord> {
        Table::new("medical_records")
    }
}

impl Record for MedicalRecord {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Prescription {
    pub fn table() -> Table<Prescription> {
        Table::new("prescriptions")
    }
}

impl Record for Prescription {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl LabResult {
    pub fn table() -> Table<LabResult> {
        Table::new("lab_results")
    }
}

impl Record for LabResult {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Vaccination {
    pub fn table() -> Table<Vaccination> {
        Table::new("vaccinations")
    }
}

impl Record for Vaccination {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A record with everything appended to it.
#[derive(Debug, Clone, Serialize)]
pub struct MedicalRecordView {
    #[serde(flatten)]
    pub record: MedicalRecord,
    pub prescriptions: Vec<Prescription>,
    pub lab_results: Vec<LabResult>,
    pub vaccinations: Vec<Vaccination>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecordRequest {
    pub patient_id: Uuid,
    /// Defaults to the calling doctor's profile.
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub record_type: RecordType,
    pub record_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub prescription: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_confidential: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddPrescriptionRequest {
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddLabResultRequest {
    pub test_name: String,
    pub test_date: DateTime<Utc>,
    pub result_value: String,
    #[serde(default)]
    pub normal_range: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub is_abnormal: bool,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddVaccinationRequest {
    pub vaccine_name: String,
    pub dose_number: u32,
    pub date_administered: DateTime<Utc>,
    pub administered_by: String,
    pub batch_number: String,
    pub next_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQuery {
    pub patient: Option<Uuid>,
    pub record_type: Option<RecordType>,
}
