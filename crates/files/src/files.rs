//! Repository-scoped, content-addressed file storage.

use crate::constants::HASH_ALGORITHM;
use crate::{FilesError, FILES_FOLDER_NAME};
use chrono::{DateTime, Utc};
use osler_types::NonEmptyText;
use osler_uuid::Sha256Hash;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata for a stored file.
///
/// Serialised into the document record that references the file, so it must not carry
/// anything beyond what is needed to find and describe the bytes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    /// Hashing algorithm used (always "sha256")
    pub hash_algorithm: String,

    /// Hexadecimal digest of the file content
    pub hash: Sha256Hash,

    /// Path relative to the repository root where the file is stored
    pub relative_path: String,

    pub size_bytes: u64,

    /// Best-effort media type detected from the content, not authoritative.
    pub media_type: Option<String>,

    /// Filename supplied by the uploader, if any
    pub original_filename: Option<NonEmptyText>,

    pub stored_at: DateTime<Utc>,
}

/// Stores and retrieves files for one repository.
#[derive(Debug)]
pub struct FilesService {
    repository_root: PathBuf,
}

impl FilesService {
    /// Creates a service bound to an existing repository directory.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::RepositoryNotFound`] if `repository_root` is not a directory.
    pub fn new(repository_root: &Path) -> Result<Self, FilesError> {
        if !repository_root.is_dir() {
            return Err(FilesError::RepositoryNotFound(format!(
                "Repository directory does not exist: {}",
                repository_root.display()
            )));
        }

        Ok(Self {
            repository_root: repository_root.to_path_buf(),
        })
    }

    /// Stores `content` and returns its metadata.
    ///
    /// Content that is already stored is not written again; the existing file is reused.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the content is empty or the file cannot be written.
    pub fn add_bytes(
        &self,
        content: &[u8],
        original_filename: Option<&str>,
    ) -> Result<FileMetadata, FilesError> {
        if content.is_empty() {
            return Err(FilesError::EmptyContent);
        }

        let digest = Sha256::digest(content);
        let hash = Sha256Hash::parse(&hex::encode(digest))?;

        let relative_path = Self::relative_path(&hash);
        let storage_path = self.repository_root.join(&relative_path);

        if storage_path.is_file() {
            tracing::debug!("file {} already stored, reusing", hash);
        } else {
            if let Some(parent) = storage_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&storage_path, content)?;
        }

        let media_type = infer::get(content).map(|kind| kind.mime_type().to_string());
        let original_filename = original_filename
            .map(|name| {
                Path::new(name)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(name)
                    .to_string()
            })
            .and_then(|name| NonEmptyText::new(name).ok());

        Ok(FileMetadata {
            hash_algorithm: HASH_ALGORITHM.to_string(),
            hash,
            relative_path,
            size_bytes: content.len() as u64,
            media_type,
            original_filename,
            stored_at: Utc::now(),
        })
    }

    /// Reads a stored file by its hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidHash`] for malformed digests and
    /// [`FilesError::NotFound`] if nothing is stored under the digest.
    pub fn read(&self, hash: &str) -> Result<Vec<u8>, FilesError> {
        let hash = Sha256Hash::parse(hash)?;
        let storage_path = self.repository_root.join(Self::relative_path(&hash));

        if !storage_path.is_file() {
            return Err(FilesError::NotFound(hash.to_string()));
        }

        Ok(fs::read(&storage_path)?)
    }

    /// `files/sha256/<h[0..2]>/<h[2..4]>/<h>`
    fn relative_path(hash: &Sha256Hash) -> String {
        let hex = hash.as_str();
        format!(
            "{}/{}/{}/{}/{}",
            FILES_FOLDER_NAME,
            HASH_ALGORITHM,
            &hex[0..2],
            &hex[2..4],
            hex
        )
    }
}
