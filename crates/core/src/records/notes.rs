//! Notes written about a patient by a provider acting in a clinical role.

use super::PatientRecord;
use crate::todo::{TodoEntry, TodoItem, TodoKind};
use crate::versioned_files::RecordDomain;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use osler_files::FileMetadata;
use osler_types::NonEmptyText;
use osler_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};

/// Fields every note carries: which patient, who wrote it, acting as which ProviderType, and
/// when.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteMeta {
    pub id: ShardableUuid,
    pub patient: ShardableUuid,
    /// Provider id.
    pub author: ShardableUuid,
    /// ProviderType id selected in the author's session.
    pub author_type: ShardableUuid,
    pub written_datetime: DateTime<Utc>,
}

macro_rules! patient_record {
    ($ty:ty, $folder:literal, $domain:expr, $kind:literal) => {
        impl PatientRecord for $ty {
            const FOLDER: &'static str = $folder;
            const DOMAIN: RecordDomain = $domain;
            const KIND: &'static str = $kind;

            fn meta(&self) -> &NoteMeta {
                &self.meta
            }
        }
    };
}

// ----------------------------------------------------------------------------
// Action items
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub last_modified: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub instruction: NonEmptyText,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub priority: bool,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
    /// Provider id.
    #[serde(default)]
    pub completion_author: Option<ShardableUuid>,
}

patient_record!(ActionItem, "action_items", RecordDomain::ActionItem, "action item");

impl TodoItem for ActionItem {
    fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    fn is_priority(&self) -> bool {
        self.priority
    }

    fn to_entry(&self) -> TodoEntry {
        TodoEntry {
            kind: TodoKind::ActionItem,
            id: self.meta.id,
            description: self.instruction.to_string(),
            due_date: self.due_date,
            priority: self.priority,
            completion_date: self.completion_date,
            completion_author: self.completion_author,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ActionItemInput {
    pub due_date: NaiveDate,
    pub instruction: String,
    pub comments: String,
    pub priority: bool,
}

/// The outcome of contacting a patient about a completed action item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionItemFollowup {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub action_item: ShardableUuid,
    pub contact_method: String,
    pub contact_resolution: String,
    #[serde(default)]
    pub comments: String,
}

patient_record!(
    ActionItemFollowup,
    "action_item_followups",
    RecordDomain::ActionItem,
    "action item followup"
);

#[derive(Clone, Debug)]
pub struct ActionItemFollowupInput {
    pub contact_method: String,
    pub contact_resolution: String,
    pub comments: String,
}

// ----------------------------------------------------------------------------
// Appointments
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    ChronicCare,
    AcuteFollowup,
    PsychNight,
    Vaccine,
}

impl AppointmentType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ChronicCare => "Chronic Care",
            Self::AcuteFollowup => "Acute Follow-up",
            Self::PsychNight => "Psych Night",
            Self::Vaccine => "Vaccine Follow-up",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub last_modified: DateTime<Utc>,
    pub clindate: NaiveDate,
    pub clintime: NaiveTime,
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub comment: String,
    /// `None` until the patient arrives or is marked as a no-show.
    #[serde(default)]
    pub pt_showed: Option<bool>,
}

patient_record!(Appointment, "appointments", RecordDomain::Appointment, "appointment");

#[derive(Clone, Debug)]
pub struct AppointmentInput {
    pub clindate: NaiveDate,
    pub clintime: NaiveTime,
    pub appointment_type: AppointmentType,
    pub comment: String,
}

// ----------------------------------------------------------------------------
// Referrals
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Successful,
    Pending,
    Unsuccessful,
}

impl ReferralStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Successful => "Successful",
            Self::Pending => "Pending",
            Self::Unsuccessful => "Unsuccessful",
        }
    }
}

/// Where a referral sends the patient; FQHC referrals drive the patient's referral status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferralKind {
    pub name: String,
    pub is_fqhc: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub kind: ReferralKind,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub comments: String,
    pub status: ReferralStatus,
}

patient_record!(Referral, "referrals", RecordDomain::Referral, "referral");

#[derive(Clone, Debug)]
pub struct ReferralInput {
    pub kind: ReferralKind,
    pub locations: Vec<String>,
    pub comments: String,
}

/// A request to contact the patient about a referral by a due date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowupRequest {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub referral: ShardableUuid,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub contact_instructions: String,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_author: Option<ShardableUuid>,
}

patient_record!(
    FollowupRequest,
    "followup_requests",
    RecordDomain::Referral,
    "followup request"
);

impl TodoItem for FollowupRequest {
    fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    fn to_entry(&self) -> TodoEntry {
        TodoEntry {
            kind: TodoKind::FollowupRequest,
            id: self.meta.id,
            description: self.contact_instructions.clone(),
            due_date: self.due_date,
            priority: false,
            completion_date: self.completion_date,
            completion_author: self.completion_author,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FollowupRequestInput {
    pub due_date: NaiveDate,
    pub contact_instructions: String,
}

/// The record of an attempt to reach the patient about a referral.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatientContact {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub referral: ShardableUuid,
    pub followup_request: ShardableUuid,
    pub contact_method: String,
    pub patient_reached: bool,
    #[serde(default)]
    pub has_appointment: Option<bool>,
    #[serde(default)]
    pub appointment_location: Vec<String>,
    #[serde(default)]
    pub pt_showed: Option<bool>,
    #[serde(default)]
    pub no_apt_reason: Option<String>,
    #[serde(default)]
    pub no_show_reason: Option<String>,
}

patient_record!(
    PatientContact,
    "patient_contacts",
    RecordDomain::Referral,
    "patient contact"
);

impl PatientContact {
    /// The referral status this contact implies, if it settles the referral.
    pub fn resulting_referral_status(&self) -> Option<ReferralStatus> {
        match self.pt_showed {
            Some(true) => Some(ReferralStatus::Successful),
            Some(false) => Some(ReferralStatus::Unsuccessful),
            None if self.patient_reached && self.has_appointment == Some(false) => {
                Some(ReferralStatus::Unsuccessful)
            }
            None => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PatientContactInput {
    pub contact_method: String,
    pub patient_reached: bool,
    pub has_appointment: Option<bool>,
    pub appointment_location: Vec<String>,
    pub pt_showed: Option<bool>,
    pub no_apt_reason: Option<String>,
    pub no_show_reason: Option<String>,
}

// ----------------------------------------------------------------------------
// Vaccines
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaccineFollowup {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub subsequent_dose: bool,
    #[serde(default)]
    pub dose_date: Option<NaiveDate>,
    #[serde(default)]
    pub comments: String,
}

patient_record!(
    VaccineFollowup,
    "vaccine_followups",
    RecordDomain::Vaccine,
    "vaccine followup"
);

#[derive(Clone, Debug)]
pub struct VaccineFollowupInput {
    pub subsequent_dose: bool,
    pub dose_date: Option<NaiveDate>,
    pub comments: String,
}

/// A reminder to give a patient a vaccine dose by a due date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaccineActionItem {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub vaccine: NonEmptyText,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_author: Option<ShardableUuid>,
}

patient_record!(
    VaccineActionItem,
    "vaccine_action_items",
    RecordDomain::Vaccine,
    "vaccine action item"
);

impl TodoItem for VaccineActionItem {
    fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    fn to_entry(&self) -> TodoEntry {
        TodoEntry {
            kind: TodoKind::VaccineActionItem,
            id: self.meta.id,
            description: self.vaccine.to_string(),
            due_date: self.due_date,
            priority: false,
            completion_date: self.completion_date,
            completion_author: self.completion_author,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VaccineActionItemInput {
    pub vaccine: String,
    pub due_date: NaiveDate,
    pub comments: String,
}

// ----------------------------------------------------------------------------
// Documents
// ----------------------------------------------------------------------------

/// An uploaded document; the bytes live in the patient's file store, not in git.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    pub meta: NoteMeta,
    pub last_modified: DateTime<Utc>,
    pub title: NonEmptyText,
    pub document_type: String,
    #[serde(default)]
    pub comments: String,
    pub image: FileMetadata,
}

patient_record!(Document, "documents", RecordDomain::Document, "document");

#[derive(Clone, Debug)]
pub struct DocumentInput {
    pub title: String,
    pub document_type: String,
    pub comments: String,
}
