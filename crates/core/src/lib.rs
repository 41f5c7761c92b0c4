//! # Osler Core
//!
//! Core business logic for the Osler clinic records system.
//!
//! This crate contains pure data operations over the clinic's data directory:
//! - one git repository per patient holding YAML records, under sharded directories
//! - a staff repository holding users, providers and provider types
//! - todo-list, referral and appointment aggregation for the patient detail page
//!
//! **No API concerns**: HTTP handling, sessions and role selection cookies belong in
//! `api-rest`.

pub mod author;
pub mod config;
pub mod constants;
pub mod error;
pub mod records;
pub mod repositories;
pub mod todo;
pub mod validation;
pub mod versioned_files;

pub use author::{ActingProvider, Author};
pub use config::{todo_list_managers_from_env_value, CoreConfig};
pub use error::{OslerError, OslerResult};
pub use repositories::{
    Clinic, DetailService, NotesService, PatientDetail, PatientFilter, PatientService,
    RoleSelection, StaffService, Storage,
};
pub use todo::TodoKind;
pub use versioned_files::CommitEntry;

pub use osler_types::NonEmptyText;
pub use osler_uuid::ShardableUuid;
