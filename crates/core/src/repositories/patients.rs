//! Patient repositories.
//!
//! Each patient has their own git repository under the sharded `patients/` directory:
//!
//! ```text
//! patients/
//!   <s1>/
//!     <s2>/
//!       <uuid>/
//!         .gitignore          # files/
//!         patient.yaml
//!         demographics.yaml
//!         action_items/<uuid>.yaml
//!         ...
//!         files/              # uploaded document bytes, not versioned
//!         .git/
//! ```
//!
//! `PatientService` owns the patient and demographics records and the generic load, list
//! and save operations used for every other note kind.

use super::shared::{
    create_uuid_and_shard_dir, list_yaml, load_yaml, read_existing, to_yaml, Storage,
};
use crate::author::Author;
use crate::constants::{DEFAULT_GITIGNORE, DEMOGRAPHICS_FILENAME, GITIGNORE_FILENAME, PATIENT_FILENAME};
use crate::error::{OslerError, OslerResult};
use crate::records::{Demographics, DemographicsInput, Patient, PatientInput, PatientRecord};
use crate::versioned_files::{
    CommitAction, CommitEntry, FileToWrite, OslerCommitMessage, RecordDomain,
    VersionedFileService,
};
use chrono::{NaiveDate, Utc};
use osler_types::NonEmptyText;
use osler_uuid::ShardableUuid;
use std::fs;
use std::path::{Path, PathBuf};

/// A pending write of one file in a patient repository.
#[derive(Debug)]
pub(crate) struct RecordWrite {
    relative_path: PathBuf,
    content: String,
    old_content: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PatientService {
    storage: Storage,
}

impl PatientService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The repository directory of an existing patient.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the patient has no repository.
    pub(crate) fn existing_patient_dir(&self, patient: &ShardableUuid) -> OslerResult<PathBuf> {
        let dir = self.storage.patient_dir(patient);
        if !dir.join(PATIENT_FILENAME).is_file() {
            return Err(OslerError::not_found("patient", patient));
        }
        Ok(dir)
    }

    // ------------------------------------------------------------------------
    // Patients
    // ------------------------------------------------------------------------

    /// Create a new patient and their repository.
    ///
    /// New patients need a workup. The repository is created atomically: on failure the
    /// patient directory is removed.
    pub fn create(&self, author: &Author, input: PatientInput) -> OslerResult<Patient> {
        author.validate_commit_author()?;
        let (first_name, last_name) = names(&input)?;
        let msg = self.message(RecordDomain::Patient, CommitAction::Create, "Patient record created")?;

        let _guard = self.storage.lock();
        let (id, patient_dir) =
            create_uuid_and_shard_dir(&self.storage.cfg().patients_dir(), ShardableUuid::new)?;

        let now = Utc::now();
        let patient = Patient {
            id,
            first_name,
            middle_name: input.middle_name,
            last_name,
            phone: input.phone,
            gender: input.gender,
            date_of_birth: input.date_of_birth,
            languages: input.languages,
            ethnicities: input.ethnicities,
            address: input.address,
            city: input.city,
            state: input.state,
            zip_code: input.zip_code,
            country: input.country,
            pcp_preferred_zip: input.pcp_preferred_zip,
            preferred_contact_method: input.preferred_contact_method,
            patient_comfortable_with_english: input.patient_comfortable_with_english,
            needs_workup: true,
            case_managers: input.case_managers,
            created_at: now,
            last_modified: now,
        };
        let patient_yaml = to_yaml(&patient)?;

        let files = [
            FileToWrite {
                relative_path: Path::new(GITIGNORE_FILENAME),
                content: DEFAULT_GITIGNORE,
                old_content: None,
            },
            FileToWrite {
                relative_path: Path::new(PATIENT_FILENAME),
                content: &patient_yaml,
                old_content: None,
            },
        ];
        VersionedFileService::init_and_commit(&patient_dir, author, &msg, &files)?;

        tracing::info!(patient = %id, "patient created");
        Ok(patient)
    }

    pub fn get(&self, patient: &ShardableUuid) -> OslerResult<Patient> {
        let dir = self.storage.patient_dir(patient);
        load_yaml(&dir.join(PATIENT_FILENAME), "patient", patient)
    }

    pub fn update(
        &self,
        author: &Author,
        patient: &ShardableUuid,
        input: PatientInput,
    ) -> OslerResult<Patient> {
        let (first_name, last_name) = names(&input)?;
        let _guard = self.storage.lock();
        let mut record = self.get(patient)?;

        record.first_name = first_name;
        record.middle_name = input.middle_name;
        record.last_name = last_name;
        record.phone = input.phone;
        record.gender = input.gender;
        record.date_of_birth = input.date_of_birth;
        record.languages = input.languages;
        record.ethnicities = input.ethnicities;
        record.address = input.address;
        record.city = input.city;
        record.state = input.state;
        record.zip_code = input.zip_code;
        record.country = input.country;
        record.pcp_preferred_zip = input.pcp_preferred_zip;
        record.preferred_contact_method = input.preferred_contact_method;
        record.patient_comfortable_with_english = input.patient_comfortable_with_english;
        record.case_managers = input.case_managers;
        record.last_modified = Utc::now();

        self.write_patient(author, &record, "Patient record updated")?;
        Ok(record)
    }

    /// Flip the patient's active (`needs_workup`) flag.
    pub fn toggle_active(&self, author: &Author, patient: &ShardableUuid) -> OslerResult<Patient> {
        let _guard = self.storage.lock();
        let mut record = self.get(patient)?;
        record.needs_workup = !record.needs_workup;
        record.last_modified = Utc::now();

        let summary = if record.needs_workup {
            "Patient activated"
        } else {
            "Patient deactivated"
        };
        self.write_patient(author, &record, summary)?;
        Ok(record)
    }

    /// Every patient, ordered by last name then first name, ignoring case.
    ///
    /// Traverses `patients/<s1>/<s2>/<uuid>/patient.yaml`; unreadable patient files are
    /// logged and skipped.
    pub fn list(&self) -> Vec<Patient> {
        let mut patients: Vec<Patient> = Vec::new();

        let patients_dir = self.storage.cfg().patients_dir();
        let s1_iter = match fs::read_dir(&patients_dir) {
            Ok(it) => it,
            Err(_) => return patients,
        };
        for s1 in s1_iter.flatten() {
            let s2_iter = match fs::read_dir(s1.path()) {
                Ok(it) => it,
                Err(_) => continue,
            };
            for s2 in s2_iter.flatten() {
                let id_iter = match fs::read_dir(s2.path()) {
                    Ok(it) => it,
                    Err(_) => continue,
                };
                for id_ent in id_iter.flatten() {
                    let patient_path = id_ent.path().join(PATIENT_FILENAME);
                    if !patient_path.is_file() {
                        continue;
                    }
                    let parsed = fs::read_to_string(&patient_path)
                        .map_err(|e| e.to_string())
                        .and_then(|c| {
                            serde_yaml::from_str::<Patient>(&c).map_err(|e| e.to_string())
                        });
                    match parsed {
                        Ok(p) => patients.push(p),
                        Err(e) => tracing::warn!(
                            "failed to load patient.yaml: {} - {}",
                            patient_path.display(),
                            e
                        ),
                    }
                }
            }
        }

        patients.sort_by_cached_key(|p| {
            (
                p.last_name.as_str().to_lowercase(),
                p.first_name.as_str().to_lowercase(),
            )
        });
        patients
    }

    /// Patients who may be the person being registered.
    ///
    /// A patient matches when both names are equal ignoring case, or when one name is equal
    /// ignoring case and the other starts with the same letter. Ordered by last then first
    /// name.
    pub fn duplicates(&self, first_name: &str, last_name: &str) -> Vec<Patient> {
        self.list()
            .into_iter()
            .filter(|p| is_possible_duplicate(p, first_name, last_name))
            .collect()
    }

    /// The patient's audit trail, newest first.
    pub fn history(
        &self,
        patient: &ShardableUuid,
        limit: Option<usize>,
    ) -> OslerResult<Vec<CommitEntry>> {
        let dir = self.existing_patient_dir(patient)?;
        VersionedFileService::open(&dir)?.history(limit)
    }

    fn write_patient(&self, author: &Author, patient: &Patient, summary: &str) -> OslerResult<()> {
        let dir = self.existing_patient_dir(&patient.id)?;
        let write = RecordWrite::new(&dir, PathBuf::from(PATIENT_FILENAME), to_yaml(patient)?)?;
        self.commit_writes(author, &patient.id, RecordDomain::Patient, CommitAction::Update, summary, &[write])
    }

    // ------------------------------------------------------------------------
    // Demographics
    // ------------------------------------------------------------------------

    /// Create the patient's demographics record.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the patient already has demographics.
    pub fn create_demographics(
        &self,
        author: &Author,
        patient: &ShardableUuid,
        input: DemographicsInput,
        today: NaiveDate,
    ) -> OslerResult<Demographics> {
        let _guard = self.storage.lock();
        let dir = self.existing_patient_dir(patient)?;
        if dir.join(DEMOGRAPHICS_FILENAME).exists() {
            return Err(OslerError::Conflict(format!(
                "patient {patient} already has demographics"
            )));
        }

        let demographics = apply_demographics(*patient, today, input);
        let write = RecordWrite::new(&dir, PathBuf::from(DEMOGRAPHICS_FILENAME), to_yaml(&demographics)?)?;
        self.commit_writes(
            author,
            patient,
            RecordDomain::Demographics,
            CommitAction::Create,
            "Demographics recorded",
            &[write],
        )?;
        Ok(demographics)
    }

    pub fn update_demographics(
        &self,
        author: &Author,
        patient: &ShardableUuid,
        input: DemographicsInput,
    ) -> OslerResult<Demographics> {
        let _guard = self.storage.lock();
        let dir = self.existing_patient_dir(patient)?;
        let existing = self.demographics(patient)?;

        let demographics = apply_demographics(*patient, existing.creation_date, input);
        let write = RecordWrite::new(&dir, PathBuf::from(DEMOGRAPHICS_FILENAME), to_yaml(&demographics)?)?;
        self.commit_writes(
            author,
            patient,
            RecordDomain::Demographics,
            CommitAction::Update,
            "Demographics updated",
            &[write],
        )?;
        Ok(demographics)
    }

    pub fn demographics(&self, patient: &ShardableUuid) -> OslerResult<Demographics> {
        let dir = self.storage.patient_dir(patient);
        load_yaml(&dir.join(DEMOGRAPHICS_FILENAME), "demographics", patient)
    }

    /// The patient's demographics if they have been recorded yet.
    pub fn find_demographics(&self, patient: &ShardableUuid) -> OslerResult<Option<Demographics>> {
        match self.demographics(patient) {
            Ok(d) => Ok(Some(d)),
            Err(OslerError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------------

    pub(crate) fn load_record<R: PatientRecord>(
        &self,
        patient: &ShardableUuid,
        id: &ShardableUuid,
    ) -> OslerResult<R> {
        let dir = self.existing_patient_dir(patient)?;
        load_yaml(&dir.join(record_path::<R>(id)), R::KIND, id)
    }

    /// Every record of one kind for a patient.
    pub(crate) fn list_records<R: PatientRecord>(
        &self,
        patient: &ShardableUuid,
    ) -> OslerResult<Vec<R>> {
        let dir = self.existing_patient_dir(patient)?;
        Ok(list_yaml(&dir.join(R::FOLDER)))
    }

    pub(crate) fn record_write<R: PatientRecord>(
        &self,
        patient: &ShardableUuid,
        record: &R,
    ) -> OslerResult<RecordWrite> {
        let dir = self.existing_patient_dir(patient)?;
        RecordWrite::new(&dir, record_path::<R>(&record.id()), to_yaml(record)?)
    }

    /// Write one record in its own commit. Callers hold the write lock.
    pub(crate) fn save_record<R: PatientRecord>(
        &self,
        author: &Author,
        record: &R,
        action: CommitAction,
        summary: &str,
    ) -> OslerResult<()> {
        let patient = record.meta().patient;
        let write = self.record_write(&patient, record)?;
        self.commit_writes(author, &patient, R::DOMAIN, action, summary, &[write])
    }

    /// Commit several file writes to a patient repository at once. Callers hold the write lock.
    pub(crate) fn commit_writes(
        &self,
        author: &Author,
        patient: &ShardableUuid,
        domain: RecordDomain,
        action: CommitAction,
        summary: &str,
        writes: &[RecordWrite],
    ) -> OslerResult<()> {
        let dir = self.existing_patient_dir(patient)?;
        let msg = self.message(domain, action, summary)?;
        let files: Vec<FileToWrite> = writes
            .iter()
            .map(|w| FileToWrite {
                relative_path: &w.relative_path,
                content: &w.content,
                old_content: w.old_content.as_deref(),
            })
            .collect();

        VersionedFileService::write_and_commit_files(&dir, author, &msg, &files)?;
        tracing::debug!(patient = %patient, %domain, %action, "committed {} file(s)", files.len());
        Ok(())
    }

    fn message(
        &self,
        domain: RecordDomain,
        action: CommitAction,
        summary: &str,
    ) -> OslerResult<OslerCommitMessage> {
        OslerCommitMessage::new(domain, action, summary, self.storage.cfg().clinic_name())
    }
}

impl RecordWrite {
    fn new(patient_dir: &Path, relative_path: PathBuf, content: String) -> OslerResult<Self> {
        let old_content = read_existing(&patient_dir.join(&relative_path))?;
        Ok(Self {
            relative_path,
            content,
            old_content,
        })
    }
}

fn record_path<R: PatientRecord>(id: &ShardableUuid) -> PathBuf {
    Path::new(R::FOLDER).join(format!("{id}.yaml"))
}

fn names(input: &PatientInput) -> OslerResult<(NonEmptyText, NonEmptyText)> {
    let first = NonEmptyText::single_line(&input.first_name)
        .map_err(|_| OslerError::InvalidInput("first_name is required".into()))?;
    let last = NonEmptyText::single_line(&input.last_name)
        .map_err(|_| OslerError::InvalidInput("last_name is required".into()))?;
    Ok((first, last))
}

fn apply_demographics(
    patient: ShardableUuid,
    creation_date: NaiveDate,
    input: DemographicsInput,
) -> Demographics {
    Demographics {
        patient,
        creation_date,
        chronic_conditions: input.chronic_conditions,
        has_insurance: input.has_insurance,
        er_visit_last_year: input.er_visit_last_year,
        last_date_physician_visit: input.last_date_physician_visit,
        resource_access: input.resource_access,
        lives_alone: input.lives_alone,
        dependents: input.dependents,
        currently_employed: input.currently_employed,
        work_status: input.work_status,
        education_level: input.education_level,
        annual_income: input.annual_income,
        transportation: input.transportation,
        last_modified: Utc::now(),
    }
}

fn is_possible_duplicate(patient: &Patient, first_name: &str, last_name: &str) -> bool {
    fn same(a: &str, b: &str) -> bool {
        a.trim().to_lowercase() == b.trim().to_lowercase()
    }
    fn same_initial(a: &str, b: &str) -> bool {
        let initial = |s: &str| s.trim().chars().next().map(|c| c.to_lowercase().to_string());
        matches!((initial(a), initial(b)), (Some(x), Some(y)) if x == y)
    }

    let first = patient.first_name.as_str();
    let last = patient.last_name.as_str();

    let first_eq = same(first, first_name);
    let last_eq = same(last, last_name);

    (first_eq && last_eq)
        || (first_eq && same_initial(last, last_name))
        || (last_eq && same_initial(first, first_name))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::todo::TodoKind;
    use std::sync::Arc;
    use tempfile::TempDir;

    pub(crate) fn test_storage(dir: &Path) -> Storage {
        let cfg = CoreConfig::new(
            dir.to_path_buf(),
            NonEmptyText::new("Test Clinic").unwrap(),
            None,
            TodoKind::ALL.to_vec(),
        )
        .expect("CoreConfig::new should succeed");
        Storage::new(Arc::new(cfg)).expect("Storage::new should succeed")
    }

    pub(crate) fn test_author() -> Author {
        Author {
            name: "Test Author".into(),
            role: "Attending".into(),
            email: "test@example.com".into(),
        }
    }

    pub(crate) fn patient_input(first: &str, last: &str) -> PatientInput {
        PatientInput {
            first_name: first.into(),
            middle_name: None,
            last_name: last.into(),
            phone: Some("555-0100".into()),
            gender: Some("Female".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 2).unwrap(),
            languages: vec!["English".into()],
            ethnicities: vec![],
            address: None,
            city: Some("St. Louis".into()),
            state: Some("MO".into()),
            zip_code: Some("63110".into()),
            country: None,
            pcp_preferred_zip: None,
            preferred_contact_method: None,
            patient_comfortable_with_english: true,
            case_managers: vec![],
        }
    }

    #[test]
    fn create_writes_repository_and_commits() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = PatientService::new(test_storage(temp.path()));

        let patient = svc
            .create(&test_author(), patient_input("Ada", "Lovelace"))
            .expect("create should succeed");
        assert!(patient.needs_workup);

        let dir = svc.storage().patient_dir(&patient.id);
        assert!(dir.join(".git").is_dir());
        assert_eq!(
            fs::read_to_string(dir.join(".gitignore")).unwrap(),
            DEFAULT_GITIGNORE
        );
        assert_eq!(svc.get(&patient.id).unwrap(), patient);

        let history = svc.history(&patient.id, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].subject, "patient:create: Patient record created");
        assert_eq!(history[0].clinic.as_deref(), Some("Test Clinic"));
    }

    #[test]
    fn create_rejects_blank_names_without_leaving_directories() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = PatientService::new(test_storage(temp.path()));

        let err = svc
            .create(&test_author(), patient_input("  ", "Lovelace"))
            .unwrap_err();
        assert!(matches!(err, OslerError::InvalidInput(_)));
        assert!(svc.list().is_empty());
    }

    #[test]
    fn invalid_author_allocates_no_patient_directory() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = PatientService::new(test_storage(temp.path()));
        let author = Author {
            email: String::new(),
            ..test_author()
        };

        assert!(svc.create(&author, patient_input("Ada", "Lovelace")).is_err());

        let patients_dir = svc.storage().cfg().patients_dir();
        let leftover = fs::read_dir(&patients_dir).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn update_and_toggle_are_versioned() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = PatientService::new(test_storage(temp.path()));
        let patient = svc
            .create(&test_author(), patient_input("Ada", "Lovelace"))
            .unwrap();

        let updated = svc
            .update(&test_author(), &patient.id, patient_input("Ada", "King"))
            .unwrap();
        assert_eq!(updated.last_name.as_str(), "King");

        let toggled = svc.toggle_active(&test_author(), &patient.id).unwrap();
        assert!(!toggled.needs_workup);
        let toggled = svc.toggle_active(&test_author(), &patient.id).unwrap();
        assert!(toggled.needs_workup);

        let subjects: Vec<_> = svc
            .history(&patient.id, None)
            .unwrap()
            .into_iter()
            .map(|c| c.subject)
            .collect();
        assert_eq!(
            subjects,
            vec![
                "patient:update: Patient activated",
                "patient:update: Patient deactivated",
                "patient:update: Patient record updated",
                "patient:create: Patient record created",
            ]
        );
    }

    #[test]
    fn missing_patient_is_not_found() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = PatientService::new(test_storage(temp.path()));
        let id = ShardableUuid::new();

        assert!(matches!(
            svc.get(&id).unwrap_err(),
            OslerError::NotFound { kind: "patient", .. }
        ));
        assert!(matches!(
            svc.toggle_active(&test_author(), &id).unwrap_err(),
            OslerError::NotFound { .. }
        ));
    }

    #[test]
    fn list_orders_by_last_name() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = PatientService::new(test_storage(temp.path()));
        for (f, l) in [
            ("Grace", "Hopper"),
            ("Ada", "Lovelace"),
            ("Alan", "Babbage"),
            ("Maria", "de la Cruz"),
        ] {
            svc.create(&test_author(), patient_input(f, l)).unwrap();
        }

        let last: Vec<_> = svc
            .list()
            .into_iter()
            .map(|p| p.last_name.into_string())
            .collect();
        assert_eq!(last, vec!["Babbage", "de la Cruz", "Hopper", "Lovelace"]);
    }

    #[test]
    fn duplicates_match_names_and_initials() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = PatientService::new(test_storage(temp.path()));
        for (f, l) in [
            ("John", "Smith"),
            ("Jonathan", "Smith"),
            ("John", "Smyth"),
            ("Jane", "Doe"),
            ("Bob", "Smith"),
        ] {
            svc.create(&test_author(), patient_input(f, l)).unwrap();
        }

        let found: Vec<_> = svc
            .duplicates("john", "SMITH")
            .into_iter()
            .map(|p| format!("{} {}", p.first_name, p.last_name))
            .collect();
        assert_eq!(found, vec!["John Smith", "Jonathan Smith", "John Smyth"]);

        assert!(svc.duplicates("Zed", "Zulu").is_empty());
    }

    #[test]
    fn demographics_are_created_once() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = PatientService::new(test_storage(temp.path()));
        let patient = svc
            .create(&test_author(), patient_input("Ada", "Lovelace"))
            .unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        assert!(svc.find_demographics(&patient.id).unwrap().is_none());

        let created = svc
            .create_demographics(
                &test_author(),
                &patient.id,
                DemographicsInput {
                    has_insurance: Some(false),
                    ..Default::default()
                },
                today,
            )
            .unwrap();
        assert_eq!(created.creation_date, today);

        let err = svc
            .create_demographics(&test_author(), &patient.id, DemographicsInput::default(), today)
            .unwrap_err();
        assert!(matches!(err, OslerError::Conflict(_)));

        let updated = svc
            .update_demographics(
                &test_author(),
                &patient.id,
                DemographicsInput {
                    has_insurance: Some(true),
                    dependents: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.creation_date, today);
        assert_eq!(svc.demographics(&patient.id).unwrap().dependents, Some(2));
    }
}
