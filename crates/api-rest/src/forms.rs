//! Form bodies and their conversion into core inputs.
//!
//! Forms are `application/x-www-form-urlencoded`. Multi-valued fields (languages, ethnicities,
//! clinical roles, ...) are submitted as one comma-separated value. Checkboxes are present
//! when ticked. Blank optional fields are `None`.

use crate::error::{ApiError, ApiResult};
use chrono::{NaiveDate, NaiveTime};
use osler_core::records::{
    ActionItemFollowupInput, ActionItemInput, AppointmentInput, AppointmentType,
    DemographicsInput, DocumentInput, FollowupRequestInput, PatientContactInput, PatientInput,
    ProviderInput, ReferralInput, ReferralKind, VaccineActionItemInput, VaccineFollowupInput,
};
use osler_core::ShardableUuid;
use serde::Deserialize;

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn uuid_list(value: Option<String>, field: &str) -> ApiResult<Vec<ShardableUuid>> {
    list(value)
        .iter()
        .map(|v| {
            ShardableUuid::parse(v)
                .map_err(|_| ApiError::BadRequest(format!("{field}: invalid id {v}")))
        })
        .collect()
}

fn checkbox(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "on" | "true" | "yes" | "1"))
        .unwrap_or(false)
}

/// A yes/no select with an unanswered option.
fn yes_no(value: Option<String>, field: &str) -> ApiResult<Option<bool>> {
    match optional(value).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(None),
        Some("true" | "yes" | "on" | "1") => Ok(Some(true)),
        Some("false" | "no" | "off" | "0") => Ok(Some(false)),
        Some(other) => Err(ApiError::BadRequest(format!("{field}: expected yes or no, got {other}"))),
    }
}

fn date(value: &str, field: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{field}: expected a date as YYYY-MM-DD")))
}

fn optional_date(value: Option<String>, field: &str) -> ApiResult<Option<NaiveDate>> {
    optional(value).map(|v| date(&v, field)).transpose()
}

fn time(value: &str, field: &str) -> ApiResult<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ApiError::BadRequest(format!("{field}: expected a time as HH:MM")))
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    #[serde(rename = "radio-roles")]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderForm {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub languages: Option<String>,
    pub clinical_roles: Option<String>,
}

impl ProviderForm {
    pub fn into_input(self) -> ApiResult<ProviderInput> {
        Ok(ProviderInput {
            first_name: self.first_name,
            middle_name: optional(self.middle_name),
            last_name: self.last_name,
            phone: optional(self.phone),
            gender: optional(self.gender),
            languages: list(self.languages),
            clinical_roles: uuid_list(self.clinical_roles, "clinical_roles")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PatientForm {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: String,
    pub languages: Option<String>,
    pub ethnicities: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub pcp_preferred_zip: Option<String>,
    pub preferred_contact_method: Option<String>,
    pub patient_comfortable_with_english: Option<String>,
    pub case_managers: Option<String>,
}

impl PatientForm {
    pub fn into_input(self) -> ApiResult<PatientInput> {
        Ok(PatientInput {
            date_of_birth: date(&self.date_of_birth, "date_of_birth")?,
            patient_comfortable_with_english: checkbox(&self.patient_comfortable_with_english),
            case_managers: uuid_list(self.case_managers, "case_managers")?,
            first_name: self.first_name,
            middle_name: optional(self.middle_name),
            last_name: self.last_name,
            phone: optional(self.phone),
            gender: optional(self.gender),
            languages: list(self.languages),
            ethnicities: list(self.ethnicities),
            address: optional(self.address),
            city: optional(self.city),
            state: optional(self.state),
            zip_code: optional(self.zip_code),
            country: optional(self.country),
            pcp_preferred_zip: optional(self.pcp_preferred_zip),
            preferred_contact_method: optional(self.preferred_contact_method),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DemographicsForm {
    pub chronic_conditions: Option<String>,
    pub has_insurance: Option<String>,
    pub er_visit_last_year: Option<String>,
    pub last_date_physician_visit: Option<String>,
    pub resource_access: Option<String>,
    pub lives_alone: Option<String>,
    pub dependents: Option<String>,
    pub currently_employed: Option<String>,
    pub work_status: Option<String>,
    pub education_level: Option<String>,
    pub annual_income: Option<String>,
    pub transportation: Option<String>,
}

impl DemographicsForm {
    pub fn into_input(self) -> ApiResult<DemographicsInput> {
        let dependents = optional(self.dependents)
            .map(|v| {
                v.parse::<u32>().map_err(|_| {
                    ApiError::BadRequest("dependents: expected a whole number".into())
                })
            })
            .transpose()?;

        Ok(DemographicsInput {
            chronic_conditions: list(self.chronic_conditions),
            has_insurance: yes_no(self.has_insurance, "has_insurance")?,
            er_visit_last_year: yes_no(self.er_visit_last_year, "er_visit_last_year")?,
            last_date_physician_visit: optional_date(
                self.last_date_physician_visit,
                "last_date_physician_visit",
            )?,
            resource_access: list(self.resource_access),
            lives_alone: yes_no(self.lives_alone, "lives_alone")?,
            dependents,
            currently_employed: yes_no(self.currently_employed, "currently_employed")?,
            work_status: optional(self.work_status),
            education_level: optional(self.education_level),
            annual_income: optional(self.annual_income),
            transportation: optional(self.transportation),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionItemForm {
    pub due_date: String,
    pub instruction: String,
    #[serde(default)]
    pub comments: String,
    pub priority: Option<String>,
}

impl ActionItemForm {
    pub fn into_input(self) -> ApiResult<ActionItemInput> {
        Ok(ActionItemInput {
            due_date: date(&self.due_date, "due_date")?,
            priority: checkbox(&self.priority),
            instruction: self.instruction,
            comments: self.comments,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionItemFollowupForm {
    pub contact_method: String,
    pub contact_resolution: String,
    #[serde(default)]
    pub comments: String,
}

impl From<ActionItemFollowupForm> for ActionItemFollowupInput {
    fn from(form: ActionItemFollowupForm) -> Self {
        Self {
            contact_method: form.contact_method,
            contact_resolution: form.contact_resolution,
            comments: form.comments,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppointmentForm {
    pub clindate: String,
    pub clintime: String,
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub comment: String,
}

impl AppointmentForm {
    pub fn into_input(self) -> ApiResult<AppointmentInput> {
        Ok(AppointmentInput {
            clindate: date(&self.clindate, "clindate")?,
            clintime: time(&self.clintime, "clintime")?,
            appointment_type: self.appointment_type,
            comment: self.comment,
        })
    }
}

/// A referral together with its first follow-up request.
#[derive(Debug, Deserialize)]
pub struct ReferralForm {
    pub kind: String,
    pub is_fqhc: Option<String>,
    pub locations: Option<String>,
    #[serde(default)]
    pub comments: String,
    pub due_date: String,
    #[serde(default)]
    pub contact_instructions: String,
}

impl ReferralForm {
    pub fn into_inputs(self) -> ApiResult<(ReferralInput, FollowupRequestInput)> {
        let name = self.kind.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("kind is required".into()));
        }
        let referral = ReferralInput {
            kind: ReferralKind {
                name,
                is_fqhc: checkbox(&self.is_fqhc),
            },
            locations: list(self.locations),
            comments: self.comments,
        };
        let followup = FollowupRequestInput {
            due_date: date(&self.due_date, "due_date")?,
            contact_instructions: self.contact_instructions,
        };
        Ok((referral, followup))
    }
}

#[derive(Debug, Deserialize)]
pub struct PatientContactForm {
    pub contact_method: String,
    pub patient_reached: Option<String>,
    pub has_appointment: Option<String>,
    pub appointment_location: Option<String>,
    pub pt_showed: Option<String>,
    pub no_apt_reason: Option<String>,
    pub no_show_reason: Option<String>,
}

impl PatientContactForm {
    pub fn into_input(self) -> ApiResult<PatientContactInput> {
        Ok(PatientContactInput {
            patient_reached: checkbox(&self.patient_reached),
            has_appointment: yes_no(self.has_appointment, "has_appointment")?,
            appointment_location: list(self.appointment_location),
            pt_showed: yes_no(self.pt_showed, "pt_showed")?,
            no_apt_reason: optional(self.no_apt_reason),
            no_show_reason: optional(self.no_show_reason),
            contact_method: self.contact_method,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VaccineFollowupForm {
    pub subsequent_dose: Option<String>,
    pub dose_date: Option<String>,
    #[serde(default)]
    pub comments: String,
}

impl VaccineFollowupForm {
    pub fn into_input(self) -> ApiResult<VaccineFollowupInput> {
        Ok(VaccineFollowupInput {
            subsequent_dose: checkbox(&self.subsequent_dose),
            dose_date: optional_date(self.dose_date, "dose_date")?,
            comments: self.comments,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VaccineActionItemForm {
    pub vaccine: String,
    pub due_date: String,
    #[serde(default)]
    pub comments: String,
}

impl VaccineActionItemForm {
    pub fn into_input(self) -> ApiResult<VaccineActionItemInput> {
        Ok(VaccineActionItemInput {
            due_date: date(&self.due_date, "due_date")?,
            vaccine: self.vaccine,
            comments: self.comments,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub comments: String,
}

impl From<DocumentForm> for DocumentInput {
    fn from(form: DocumentForm) -> Self {
        Self {
            title: form.title,
            document_type: form.document_type,
            comments: form.comments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_listed_values() {
        assert_eq!(optional(Some("  ".into())), None);
        assert_eq!(optional(Some(" x ".into())).as_deref(), Some("x"));
        assert_eq!(list(Some("Spanish, English,,".into())), vec!["Spanish", "English"]);
        assert!(list(None).is_empty());
    }

    #[test]
    fn checkboxes_and_yes_no() {
        assert!(checkbox(&Some("on".into())));
        assert!(!checkbox(&None));
        assert_eq!(yes_no(Some("".into()), "f").unwrap(), None);
        assert_eq!(yes_no(Some("No".into()), "f").unwrap(), Some(false));
        assert!(yes_no(Some("maybe".into()), "f").is_err());
    }

    #[test]
    fn appointment_times_accept_minutes_or_seconds() {
        assert_eq!(time("09:30", "t").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(time("14:05:10", "t").unwrap(), NaiveTime::from_hms_opt(14, 5, 10).unwrap());
        assert!(time("9.30am", "t").is_err());
    }

    #[test]
    fn patient_form_rejects_malformed_case_manager_ids() {
        let form = PatientForm {
            first_name: "Ana".into(),
            middle_name: Some("".into()),
            last_name: "Lopez".into(),
            phone: None,
            gender: Some("Female".into()),
            date_of_birth: "1980-02-29".into(),
            languages: Some("Spanish,English".into()),
            ethnicities: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
            pcp_preferred_zip: None,
            preferred_contact_method: None,
            patient_comfortable_with_english: Some("on".into()),
            case_managers: Some("not-a-uuid".into()),
        };
        assert!(matches!(form.into_input(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn referral_form_requires_a_kind() {
        let form = ReferralForm {
            kind: " ".into(),
            is_fqhc: None,
            locations: None,
            comments: String::new(),
            due_date: "2024-05-01".into(),
            contact_instructions: String::new(),
        };
        assert!(form.into_inputs().is_err());
    }
}
