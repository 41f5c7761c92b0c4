//! Clinic record types as stored on disk.
//!
//! Records are serialised to YAML. Staff records live in the staff repository; everything
//! else lives in the repository of the patient it belongs to.

mod notes;
mod patient;
mod staff;

pub use notes::{
    ActionItem, ActionItemFollowup, ActionItemFollowupInput, ActionItemInput, Appointment,
    AppointmentInput, AppointmentType, Document, DocumentInput, FollowupRequest,
    FollowupRequestInput, NoteMeta, PatientContact, PatientContactInput, Referral,
    ReferralInput, ReferralKind, ReferralStatus, VaccineActionItem, VaccineActionItemInput,
    VaccineFollowup, VaccineFollowupInput,
};
pub use patient::{Demographics, DemographicsInput, Patient, PatientInput};
pub use staff::{Provider, ProviderInput, ProviderType, ProviderTypeInput, User};

use crate::versioned_files::RecordDomain;
use osler_uuid::ShardableUuid;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record stored as `<FOLDER>/<id>.yaml` inside a patient repository.
pub trait PatientRecord: Serialize + DeserializeOwned {
    /// Folder inside the patient repository.
    const FOLDER: &'static str;

    /// Commit message domain for writes of this record.
    const DOMAIN: RecordDomain;

    /// Human-readable kind used in messages, e.g. "action item".
    const KIND: &'static str;

    fn meta(&self) -> &NoteMeta;

    fn id(&self) -> ShardableUuid {
        self.meta().id
    }
}
