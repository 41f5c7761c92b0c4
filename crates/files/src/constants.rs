/// Folder (relative to a repository root) holding content-addressed files.
///
/// It is gitignored: bytes are stored beside the versioned records, not in them.
pub const FILES_FOLDER_NAME: &str = "files";

/// Hash algorithm folder under [`FILES_FOLDER_NAME`].
pub(crate) const HASH_ALGORITHM: &str = "sha256";
