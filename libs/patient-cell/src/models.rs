use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{Record, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "O")]
    Other,
}

impl Gender {
    pub fn display_name(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blood_group: BloodGroup,
    pub gender: Gender,
    pub emergency_contact: EmergencyContact,
    /// Comma-separated free text.
    pub allergies: String,
    pub medical_conditions: String,
    pub current_medications: String,
    pub insurance_provider: String,
    pub insurance_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn table() -> Table<Patient> {
        Table::new("patients").unique("patients_user", |p: &Patient| Some(p.user_id.to_string()))
    }

    pub fn medical_summary(&self) -> MedicalSummary {
        MedicalSummary {
            blood_group: self.blood_group,
            allergies: split_list(&self.allergies),
            medical_conditions: split_list(&self.medical_conditions),
            current_medications: split_list(&self.current_medications),
        }
    }
}

impl Record for Patient {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Whole years between `date_of_birth` and `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicalSummary {
    pub blood_group: BloodGroup,
    pub allergies: Vec<String>,
    pub medical_conditions: Vec<String>,
    pub current_medications: Vec<String>,
}

/// Patient profile joined with its account.
#[derive(Debug, Clone, Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub patient: Patient,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatientRequest {
    /// Defaults to the caller when a patient creates their own profile.
    pub user_id: Option<Uuid>,
    pub blood_group: BloodGroup,
    pub gender: Gender,
    pub emergency_contact: EmergencyContact,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub medical_conditions: String,
    #[serde(default)]
    pub current_medications: String,
    #[serde(default)]
    pub insurance_provider: String,
    #[serde(default)]
    pub insurance_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub blood_group: Option<BloodGroup>,
    pub gender: Option<Gender>,
    pub emergency_contact: Option<EmergencyContact>,
    pub allergies: Option<String>,
    pub medical_conditions: Option<String>,
    pub current_medications: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientQuery {
    pub blood_group: Option<BloodGroup>,
    pub gender: Option<Gender>,
    pub search: Option<String>,
}
