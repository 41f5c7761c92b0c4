//! Versioned file operations with Git-based version control.
//!
//! Clinic data is stored as YAML files on disk. Each patient directory (and the staff
//! directory) is a local Git repository (`git2`/libgit2), so every change to a record is a
//! commit and the full audit trail of who changed what, acting in which role, is kept.
//!
//! - **Atomic multi-file writes**: files are written and committed in a single commit, with
//!   rollback of written files and created directories if anything fails.
//! - **Atomic initialisation**: a repository is either created with its first commit, or its
//!   directory is removed.
//! - **Structured messages**: `<domain>:<action>: <summary>` followed by `Author-Name`,
//!   `Author-Role` and `Clinic` trailers.
//!
//! ## Branch Policy
//!
//! All repositories use `refs/heads/main`.

use crate::author::Author;
use crate::error::{OslerError, OslerResult};
use chrono::{DateTime, Utc};
use osler_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(test)]
use std::collections::HashSet;
#[cfg(test)]
use std::sync::{LazyLock, Mutex};

const MAIN_REF: &str = "refs/heads/main";

const AUTHOR_NAME_TRAILER: &str = "Author-Name";
const AUTHOR_ROLE_TRAILER: &str = "Author-Role";
const CLINIC_TRAILER: &str = "Clinic";

/// Controlled vocabulary for commit message domains.
///
/// Safety/intent: do not include patient names or clinical text in commit messages.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordDomain {
    Patient,
    Demographics,
    ActionItem,
    Appointment,
    Document,
    Referral,
    Vaccine,
    Staff,
}

impl RecordDomain {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Demographics => "demographics",
            Self::ActionItem => "action_item",
            Self::Appointment => "appointment",
            Self::Document => "document",
            Self::Referral => "referral",
            Self::Vaccine => "vaccine",
            Self::Staff => "staff",
        }
    }
}

impl fmt::Display for RecordDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controlled vocabulary for commit message actions.
///
/// Records are never deleted; state changes such as completing an action item are updates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitAction {
    Create,
    Update,
}

impl CommitAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, predictable commit message.
///
/// Rendering rules:
///
/// - Subject line: `<domain>:<action>: <summary>`
/// - A blank line, then `Author-Name`, `Author-Role` and `Clinic` trailers in that order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OslerCommitMessage {
    domain: RecordDomain,
    action: CommitAction,
    summary: NonEmptyText,
    clinic: NonEmptyText,
}

impl OslerCommitMessage {
    /// Create a new commit message.
    ///
    /// # Errors
    ///
    /// Returns `OslerError::InvalidInput` if the summary is empty or spans several lines.
    pub fn new(
        domain: RecordDomain,
        action: CommitAction,
        summary: impl AsRef<str>,
        clinic: &NonEmptyText,
    ) -> OslerResult<Self> {
        let summary = NonEmptyText::single_line(summary.as_ref()).map_err(|_| {
            OslerError::InvalidInput("commit summary must be non-empty and single-line".into())
        })?;

        Ok(Self {
            domain,
            action,
            summary,
            clinic: clinic.clone(),
        })
    }

    pub fn domain(&self) -> RecordDomain {
        self.domain
    }

    pub fn action(&self) -> CommitAction {
        self.action
    }

    pub fn summary(&self) -> &str {
        self.summary.as_str()
    }

    /// Render the commit message including the author and clinic trailers.
    ///
    /// # Errors
    ///
    /// Returns an error if the author metadata cannot be rendered as trailers.
    pub fn render_with_author(&self, author: &Author) -> OslerResult<String> {
        author.validate_commit_author()?;
        if self.clinic.as_str().contains(['\n', '\r']) {
            return Err(OslerError::InvalidInput(
                "clinic name must be single-line".into(),
            ));
        }

        Ok(format!(
            "{}:{}: {}\n\n{AUTHOR_NAME_TRAILER}: {}\n{AUTHOR_ROLE_TRAILER}: {}\n{CLINIC_TRAILER}: {}",
            self.domain,
            self.action,
            self.summary.as_str(),
            author.name.trim(),
            author.role.trim(),
            self.clinic.as_str(),
        ))
    }
}

/// One commit in a repository's history, newest first when listed.
#[derive(Clone, Debug, Serialize)]
pub struct CommitEntry {
    pub id: String,
    /// The subject line, e.g. `action_item:update: Action item completed`.
    pub subject: String,
    pub author_name: Option<String>,
    pub author_role: Option<String>,
    pub clinic: Option<String>,
    pub time: DateTime<Utc>,
}

impl CommitEntry {
    fn from_commit(commit: &git2::Commit<'_>) -> Self {
        let message = commit.message().unwrap_or_default();
        let subject = message.lines().next().unwrap_or_default().to_string();

        let trailer = |key: &str| {
            message.lines().skip(1).find_map(|line| {
                line.strip_prefix(key)
                    .and_then(|rest| rest.strip_prefix(": "))
                    .map(|v| v.trim().to_string())
            })
        };

        Self {
            id: commit.id().to_string(),
            subject,
            author_name: trailer(AUTHOR_NAME_TRAILER),
            author_role: trailer(AUTHOR_ROLE_TRAILER),
            clinic: trailer(CLINIC_TRAILER),
            time: DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
        }
    }
}

/// Represents a file to be written and committed.
///
/// Used with [`VersionedFileService::write_and_commit_files`] to write several files in one
/// commit.
#[derive(Debug, Clone)]
pub struct FileToWrite<'a> {
    /// The path of the file relative to the repository directory.
    pub relative_path: &'a Path,
    /// The new content to write to the file.
    pub content: &'a str,
    /// The previous file content for rollback. `None` if this is a new file.
    pub old_content: Option<&'a str>,
}

/// Service for managing versioned files in a Git repository rooted at `workdir`.
pub struct VersionedFileService {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl VersionedFileService {
    /// Create a new Git repository at the specified working directory.
    ///
    /// # Errors
    ///
    /// Returns [`OslerError::GitInit`] if initialisation fails or the repository is bare.
    pub(crate) fn init(workdir: &Path) -> OslerResult<Self> {
        let repo = git2::Repository::init(workdir).map_err(OslerError::GitInit)?;
        // git2 may canonicalise the path; strip prefixes against what it reports.
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                OslerError::GitInit(git2::Error::from_str("repository has no working directory"))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    /// Open an existing Git repository at exactly `workdir`.
    ///
    /// Parent directories are never searched, so a patient directory without its own
    /// repository cannot silently commit into an enclosing one.
    ///
    /// # Errors
    ///
    /// Returns [`OslerError::GitOpen`] if there is no repository at `workdir`.
    pub(crate) fn open(workdir: &Path) -> OslerResult<Self> {
        let repo = git2::Repository::open_ext(
            workdir,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
        .map_err(OslerError::GitOpen)?;
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                OslerError::GitOpen(git2::Error::from_str("repository has no working directory"))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    /// Ensure `HEAD` points at `refs/heads/main`.
    ///
    /// For a new repository this creates an unborn `main` branch that is born with the first
    /// commit.
    fn ensure_main_head(&self) -> OslerResult<()> {
        self.repo
            .set_head(MAIN_REF)
            .map_err(OslerError::GitSetHead)?;
        Ok(())
    }

    /// Create a commit including only the provided paths (relative to the repo workdir).
    pub(crate) fn commit_paths(
        &self,
        author: &Author,
        message: &OslerCommitMessage,
        relative_paths: &[PathBuf],
    ) -> OslerResult<git2::Oid> {
        let rendered = message.render_with_author(author)?;
        self.commit_paths_rendered(author, &rendered, relative_paths)
    }

    /// Writes multiple files and commits them with rollback on failure.
    ///
    /// On error, files that previously existed are restored, new files are removed and any
    /// directories created during this call are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be opened, a directory or file cannot be
    /// written, or the commit fails.
    pub(crate) fn write_and_commit_files(
        repo_path: &Path,
        author: &Author,
        msg: &OslerCommitMessage,
        files: &[FileToWrite],
    ) -> OslerResult<()> {
        let repo = Self::open(repo_path)?;

        let mut created_dirs: Vec<PathBuf> = Vec::new();
        let mut written_files: Vec<(PathBuf, Option<String>)> = Vec::new();

        let result: OslerResult<()> = (|| {
            let mut dirs_needed = std::collections::HashSet::new();
            for file in files {
                let full_path = repo.workdir.join(file.relative_path);
                if let Some(parent) = full_path.parent() {
                    let mut current = parent;
                    while current != repo.workdir && !current.exists() {
                        dirs_needed.insert(current.to_path_buf());
                        match current.parent() {
                            Some(p) => current = p,
                            None => break,
                        }
                    }
                }
            }

            // Shallowest first.
            let mut dirs_to_create: Vec<PathBuf> = dirs_needed.into_iter().collect();
            dirs_to_create.sort_by_key(|p| p.components().count());

            for dir in &dirs_to_create {
                std::fs::create_dir(dir).map_err(OslerError::FileWrite)?;
                created_dirs.push(dir.clone());
            }

            for file in files {
                let full_path = repo.workdir.join(file.relative_path);
                let old_content = file.old_content.map(|s| s.to_string());

                std::fs::write(&full_path, file.content).map_err(OslerError::FileWrite)?;
                written_files.push((full_path, old_content));
            }

            let paths: Vec<PathBuf> = files
                .iter()
                .map(|f| f.relative_path.to_path_buf())
                .collect();
            repo.commit_paths(author, msg, &paths)?;

            Ok(())
        })();

        match result {
            Ok(()) => Ok(()),
            Err(write_error) => {
                tracing::warn!(
                    repo = %repo_path.display(),
                    error = %write_error,
                    "write failed, rolling back files"
                );
                if let Err(e) = repo.reset_index_to_head() {
                    tracing::error!(
                        repo = %repo_path.display(),
                        error = %e,
                        "failed to reset git index after rollback"
                    );
                }
                for (full_path, old_content) in written_files.iter().rev() {
                    match old_content {
                        Some(contents) => {
                            let _ = std::fs::write(full_path, contents);
                        }
                        None => {
                            let _ = std::fs::remove_file(full_path);
                        }
                    }
                }

                for dir in created_dirs.iter().rev() {
                    let _ = std::fs::remove_dir(dir);
                }

                Err(write_error)
            }
        }
    }

    /// Reset the index to the `HEAD` tree, or empty it before the first commit.
    ///
    /// Paths staged by a failed commit must not leak into the next one.
    fn reset_index_to_head(&self) -> OslerResult<()> {
        let mut index = self.repo.index().map_err(OslerError::GitIndex)?;
        match self.repo.head() {
            Ok(head) => {
                let tree = head.peel_to_tree().map_err(OslerError::GitPeel)?;
                index.read_tree(&tree).map_err(OslerError::GitIndex)?;
            }
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                index.clear().map_err(OslerError::GitIndex)?;
            }
            Err(e) => return Err(OslerError::GitHead(e)),
        }
        index.write().map_err(OslerError::GitIndex)
    }

    /// Initialise a Git repository, commit initial files, and remove the directory on failure.
    ///
    /// # Errors
    ///
    /// Returns the initialisation error. If removing `repo_dir` also fails, returns
    /// [`OslerError::CleanupAfterInitialiseFailed`] carrying both errors.
    pub(crate) fn init_and_commit(
        repo_dir: &Path,
        author: &Author,
        message: &OslerCommitMessage,
        files: &[FileToWrite],
    ) -> OslerResult<()> {
        let result: OslerResult<()> = (|| {
            let _repo = Self::init(repo_dir)?;
            Self::write_and_commit_files(repo_dir, author, message, files)?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(()),
            Err(init_error) => {
                if let Err(cleanup_err) = cleanup_repo_dir(repo_dir) {
                    return Err(OslerError::CleanupAfterInitialiseFailed {
                        path: repo_dir.to_path_buf(),
                        init_error: Box::new(init_error),
                        cleanup_error: cleanup_err,
                    });
                }
                Err(init_error)
            }
        }
    }

    /// List commits reachable from `HEAD`, newest first.
    ///
    /// A repository without commits has an empty history.
    pub(crate) fn history(&self, limit: Option<usize>) -> OslerResult<Vec<CommitEntry>> {
        match self.repo.head() {
            Ok(_) => {}
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(OslerError::GitHead(e)),
        }

        let mut walk = self.repo.revwalk().map_err(OslerError::GitRevwalk)?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
            .map_err(OslerError::GitRevwalk)?;
        walk.push_head().map_err(OslerError::GitRevwalk)?;

        let mut entries = Vec::new();
        for oid in walk.take(limit.unwrap_or(usize::MAX)) {
            let oid = oid.map_err(OslerError::GitRevwalk)?;
            let commit = self.repo.find_commit(oid).map_err(OslerError::GitRevwalk)?;
            entries.push(CommitEntry::from_commit(&commit));
        }
        Ok(entries)
    }

    /// Create a commit with a rendered message for the specified paths.
    ///
    /// Absolute paths under the workdir are normalised to relative ones. Paths outside the
    /// workdir or containing `..` are rejected.
    fn commit_paths_rendered(
        &self,
        author: &Author,
        message: &str,
        relative_paths: &[PathBuf],
    ) -> OslerResult<git2::Oid> {
        self.ensure_main_head()?;
        let mut index = self.repo.index().map_err(OslerError::GitIndex)?;

        for path in relative_paths {
            let rel = if path.is_absolute() {
                path.strip_prefix(&self.workdir)
                    .map_err(|_| {
                        OslerError::InvalidInput(
                            "path is outside the repository working directory".into(),
                        )
                    })?
                    .to_path_buf()
            } else {
                path.to_path_buf()
            };

            if rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(OslerError::InvalidInput(
                    "path must not contain parent directory references (..)".into(),
                ));
            }

            index.add_path(&rel).map_err(OslerError::GitAdd)?;
        }
        index.write().map_err(OslerError::GitIndex)?;

        self.commit_from_index(author, message, &mut index)
    }

    fn commit_from_index(
        &self,
        author: &Author,
        message: &str,
        index: &mut git2::Index,
    ) -> OslerResult<git2::Oid> {
        author.validate_commit_author()?;

        #[cfg(test)]
        {
            let current_id = std::thread::current().id();
            let mut guard = FORCE_COMMIT_ERROR_FOR_THREADS
                .lock()
                .expect("FORCE_COMMIT_ERROR_FOR_THREADS mutex poisoned");
            if guard.remove(&current_id) {
                return Err(OslerError::GitCommit(git2::Error::from_str(
                    "forced commit failure (test hook)",
                )));
            }
        }

        let tree_id = index.write_tree().map_err(OslerError::GitWriteTree)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(OslerError::GitFindTree)?;

        let sig = git2::Signature::now(author.name.trim(), author.email.trim())
            .map_err(OslerError::GitSignature)?;

        let parents = self.resolve_head_parents()?;
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .map_err(OslerError::GitCommit)
    }

    /// Parents for a new commit: the `HEAD` commit, or none for the first commit.
    fn resolve_head_parents(&self) -> OslerResult<Vec<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit().map_err(OslerError::GitPeel)?;
                Ok(vec![commit])
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(vec![]),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(vec![]),
            Err(e) => Err(OslerError::GitHead(e)),
        }
    }
}

#[cfg(test)]
static FORCE_CLEANUP_ERROR_FOR_THREADS: LazyLock<Mutex<HashSet<std::thread::ThreadId>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

#[cfg(test)]
static FORCE_COMMIT_ERROR_FOR_THREADS: LazyLock<Mutex<HashSet<std::thread::ThreadId>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

fn cleanup_repo_dir(repo_dir: &Path) -> std::io::Result<()> {
    #[cfg(test)]
    {
        let current_id = std::thread::current().id();
        let mut guard = FORCE_CLEANUP_ERROR_FOR_THREADS
            .lock()
            .expect("FORCE_CLEANUP_ERROR_FOR_THREADS mutex poisoned");

        if guard.remove(&current_id) {
            return Err(std::io::Error::other("forced cleanup failure (test hook)"));
        }
    }

    std::fs::remove_dir_all(repo_dir)
}
