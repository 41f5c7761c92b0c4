//! Repository services.
//!
//! - [`PatientService`]: patient and demographics records, one git repository per patient
//! - [`NotesService`]: action items, appointments, referrals, vaccines and documents
//! - [`DetailService`]: read views aggregating several note kinds
//! - [`StaffService`]: users, providers and provider types in the staff repository

mod detail;
mod notes;
mod patients;
mod shared;
mod staff;

pub use detail::{
    aggregate_referral_status, group_by_date, split_appointments, AppointmentDay,
    AppointmentSection, DetailService, PatientDetail, PatientFilter,
};
pub use notes::NotesService;
pub use patients::PatientService;
pub use shared::Storage;
pub use staff::{RoleSelection, StaffService};

use crate::config::CoreConfig;
use crate::error::OslerResult;
use std::sync::Arc;

/// All repository services over one data directory, sharing one write lock.
#[derive(Clone, Debug)]
pub struct Clinic {
    pub patients: PatientService,
    pub notes: NotesService,
    pub detail: DetailService,
    pub staff: StaffService,
}

impl Clinic {
    /// Open the clinic's data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory does not exist or its subdirectories cannot be
    /// created.
    pub fn open(cfg: Arc<CoreConfig>) -> OslerResult<Self> {
        let storage = Storage::new(cfg)?;
        let patients = PatientService::new(storage.clone());
        let notes = NotesService::new(patients.clone());
        Ok(Self {
            detail: DetailService::new(patients.clone(), notes.clone()),
            staff: StaffService::new(storage),
            patients,
            notes,
        })
    }

    pub fn cfg(&self) -> &CoreConfig {
        self.patients.storage().cfg()
    }
}
