//! Identifier and sharded-path utilities.
//!
//! Osler stores every record under an identifier in one canonical form: **32 lowercase
//! hexadecimal characters**, no hyphens. Patient repositories live in sharded directories
//! derived from that identifier:
//!
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! e.g. `osler_data/patients/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! Uploaded document bytes are addressed by their SHA-256 digest, see [`Sha256Hash`].

mod service;

pub use service::{Sha256Hash, ShardableUuid, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
