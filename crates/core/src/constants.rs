//! Path and filename constants shared across the core crate.

/// Default directory for clinic data when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "osler_data";

/// Directory (under the data dir) holding one git repository per patient.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// Directory (under the data dir) holding the staff repository.
pub const STAFF_DIR_NAME: &str = "staff";

/// Default clinic name used in commit trailers.
pub const DEFAULT_CLINIC_NAME: &str = "Osler Clinic";

/// Default location the home page redirects to.
pub const DEFAULT_DASHBOARD: &str = "/patients";

pub const PATIENT_FILENAME: &str = "patient.yaml";

pub const DEMOGRAPHICS_FILENAME: &str = "demographics.yaml";

pub const GITIGNORE_FILENAME: &str = ".gitignore";

/// `.gitignore` written into every repository: uploaded bytes are not versioned.
pub const DEFAULT_GITIGNORE: &str = "files/\n";

pub const USERS_DIR_NAME: &str = "users";

pub const PROVIDERS_DIR_NAME: &str = "providers";

pub const PROVIDER_TYPES_DIR_NAME: &str = "provider_types";
