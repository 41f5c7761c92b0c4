//! Osler file storage
//!
//! Stores uploaded document bytes (scans, photos of paperwork) beside a patient's
//! versioned records.
//!
//! - Binary files are not tracked in Git; the document record that references a file is.
//! - Files are immutable and addressed by their SHA-256 digest, so identical uploads are
//!   stored once.
//! - Each patient repository owns its files; there is no cross-repository namespace.
//!
//! ```text
//! patients/<s1>/<s2>/<uuid>/
//!     ├── .gitignore        # contains files/
//!     ├── documents/
//!     └── files/
//!         └── sha256/
//!             └── ab/
//!                 └── 3f/
//!                     └── ab3f9e…
//! ```

mod constants;
mod files;

pub use constants::FILES_FOLDER_NAME;
pub use files::{FileMetadata, FilesService};
pub use osler_uuid::Sha256Hash;

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Repository directory does not exist
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    /// The requested hash is not present in storage
    #[error("File not found for hash: {0}")]
    NotFound(String),

    /// Uploaded content was empty
    #[error("Cannot store an empty file")]
    EmptyContent,

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Hash failed validation (potential path traversal)
    #[error("Invalid hash: {0}")]
    InvalidHash(#[from] osler_uuid::UuidError),
}
