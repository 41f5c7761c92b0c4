//! Shared repository utilities.
//!
//! - **Storage**: the configured data directory plus the process-wide write lock
//! - **Directory allocation**: `create_uuid_and_shard_dir` for new patient repositories
//! - **YAML helpers**: loading one record, listing a folder of records, rendering records

use crate::config::CoreConfig;
use crate::error::{OslerError, OslerResult};
use osler_uuid::ShardableUuid;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle on the clinic's data directory.
///
/// Cloning is cheap; every clone shares the same write lock, so git indexes are never written
/// concurrently.
#[derive(Clone, Debug)]
pub struct Storage {
    cfg: Arc<CoreConfig>,
    write_lock: Arc<Mutex<()>>,
}

impl Storage {
    /// Bind to the configured data directory, creating the `patients/` and `staff/`
    /// directories inside it if needed.
    ///
    /// # Errors
    ///
    /// Returns `OslerError::InvalidInput` if the data directory does not exist and
    /// [`OslerError::StorageDirCreation`] if a subdirectory cannot be created.
    pub fn new(cfg: Arc<CoreConfig>) -> OslerResult<Self> {
        if !cfg.data_dir().is_dir() {
            return Err(OslerError::InvalidInput(format!(
                "data directory does not exist: {}",
                cfg.data_dir().display()
            )));
        }
        for dir in [cfg.patients_dir(), cfg.staff_dir()] {
            fs::create_dir_all(&dir).map_err(OslerError::StorageDirCreation)?;
        }

        Ok(Self {
            cfg,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn cfg(&self) -> &CoreConfig {
        &self.cfg
    }

    pub(crate) fn patient_dir(&self, patient: &ShardableUuid) -> PathBuf {
        patient.sharded_dir(&self.cfg.patients_dir())
    }

    /// Take the write lock. A poisoned lock is still usable: writes roll back on failure.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates a unique sharded directory within `base_dir`.
///
/// Retries up to 5 times with fresh identifiers if a directory already exists.
///
/// # Errors
///
/// Returns [`OslerError::PatientDirCreation`] if directory creation fails or no unique
/// directory can be allocated.
pub(crate) fn create_uuid_and_shard_dir(
    base_dir: &Path,
    mut uuid_source: impl FnMut() -> ShardableUuid,
) -> OslerResult<(ShardableUuid, PathBuf)> {
    for _attempt in 0..5 {
        let uuid = uuid_source();
        let candidate = uuid.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(OslerError::PatientDirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((uuid, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(OslerError::PatientDirCreation(e)),
        }
    }

    Err(OslerError::PatientDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate a unique patient directory after 5 attempts",
    )))
}

pub(crate) fn to_yaml<T: Serialize>(value: &T) -> OslerResult<String> {
    serde_yaml::to_string(value).map_err(OslerError::YamlSerialization)
}

/// Read a file's current contents, `None` if it does not exist yet.
pub(crate) fn read_existing(path: &Path) -> OslerResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(OslerError::FileRead(e)),
    }
}

/// Load one YAML record, mapping a missing file to `NotFound`.
pub(crate) fn load_yaml<T: DeserializeOwned>(
    path: &Path,
    kind: &'static str,
    id: impl ToString,
) -> OslerResult<T> {
    let contents = read_existing(path)?.ok_or_else(|| OslerError::not_found(kind, id))?;
    serde_yaml::from_str(&contents).map_err(OslerError::YamlDeserialization)
}

/// Load every `*.yaml` file in `dir`.
///
/// A missing directory has no records. Files that cannot be read or parsed are logged and
/// skipped.
pub(crate) fn list_yaml<T: DeserializeOwned>(dir: &Path) -> Vec<T> {
    let mut records = Vec::new();

    let entries = match fs::read_dir(dir) {
        Ok(it) => it,
        Err(_) => return records,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("failed to read {}: {}", path.display(), e);
                continue;
            }
        };

        match serde_yaml::from_str(&contents) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("failed to parse {}: {}", path.display(), e);
            }
        }
    }

    records
}
