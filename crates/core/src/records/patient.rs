use chrono::{DateTime, NaiveDate, Utc};
use osler_types::NonEmptyText;
use osler_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: ShardableUuid,
    pub first_name: NonEmptyText,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: NonEmptyText,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub ethnicities: Vec<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub pcp_preferred_zip: Option<String>,
    #[serde(default)]
    pub preferred_contact_method: Option<String>,
    #[serde(default)]
    pub patient_comfortable_with_english: bool,
    /// The active flag: the patient still needs to be seen.
    pub needs_workup: bool,
    /// Provider ids.
    #[serde(default)]
    pub case_managers: Vec<ShardableUuid>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Patient {
    /// "Last, First Middle", as patient lists display names.
    pub fn name(&self) -> String {
        match self.middle_name.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(middle) => format!("{}, {} {}", self.last_name, self.first_name, middle),
            None => format!("{}, {}", self.last_name, self.first_name),
        }
    }
}

/// Editable patient fields submitted by the intake and update forms.
#[derive(Clone, Debug)]
pub struct PatientInput {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: NaiveDate,
    pub languages: Vec<String>,
    pub ethnicities: Vec<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub pcp_preferred_zip: Option<String>,
    pub preferred_contact_method: Option<String>,
    pub patient_comfortable_with_english: bool,
    pub case_managers: Vec<ShardableUuid>,
}

/// Social and medical background collected once per patient, after intake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub patient: ShardableUuid,
    pub creation_date: NaiveDate,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub has_insurance: Option<bool>,
    #[serde(default)]
    pub er_visit_last_year: Option<bool>,
    #[serde(default)]
    pub last_date_physician_visit: Option<NaiveDate>,
    #[serde(default)]
    pub resource_access: Vec<String>,
    #[serde(default)]
    pub lives_alone: Option<bool>,
    #[serde(default)]
    pub dependents: Option<u32>,
    #[serde(default)]
    pub currently_employed: Option<bool>,
    #[serde(default)]
    pub work_status: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub annual_income: Option<String>,
    #[serde(default)]
    pub transportation: Option<String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct DemographicsInput {
    pub chronic_conditions: Vec<String>,
    pub has_insurance: Option<bool>,
    pub er_visit_last_year: Option<bool>,
    pub last_date_physician_visit: Option<NaiveDate>,
    pub resource_access: Vec<String>,
    pub lives_alone: Option<bool>,
    pub dependents: Option<u32>,
    pub currently_employed: Option<bool>,
    pub work_status: Option<String>,
    pub education_level: Option<String>,
    pub annual_income: Option<String>,
    pub transportation: Option<String>,
}
