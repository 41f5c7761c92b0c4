//! Clinic staff: users, providers and provider types.
//!
//! Staff records live in a single git repository under `staff/`:
//!
//! ```text
//! staff/
//!   users/<username>.yaml
//!   providers/<uuid>.yaml
//!   provider_types/<uuid>.yaml
//! ```
//!
//! The repository is initialised on first write.

use super::shared::{list_yaml, load_yaml, read_existing, to_yaml, Storage};
use crate::author::Author;
use crate::constants::{
    DEFAULT_GITIGNORE, GITIGNORE_FILENAME, PROVIDERS_DIR_NAME, PROVIDER_TYPES_DIR_NAME,
    USERS_DIR_NAME,
};
use crate::error::{OslerError, OslerResult};
use crate::records::{Provider, ProviderInput, ProviderType, ProviderTypeInput, User};
use crate::validation::validate_username;
use crate::versioned_files::{
    CommitAction, FileToWrite, OslerCommitMessage, RecordDomain, VersionedFileService,
};
use chrono::Utc;
use osler_types::NonEmptyText;
use osler_uuid::ShardableUuid;
use std::path::{Path, PathBuf};

/// Outcome of looking at which clinical roles a provider may act in.
#[derive(Clone, Debug, PartialEq)]
pub enum RoleSelection {
    /// Exactly one role: it is selected without asking.
    Selected(ProviderType),
    /// Several roles: the provider must choose.
    Choose(Vec<ProviderType>),
}

#[derive(Clone, Debug)]
pub struct StaffService {
    storage: Storage,
}

impl StaffService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn staff_dir(&self) -> PathBuf {
        self.storage.cfg().staff_dir()
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    /// Register a user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unusable username or email and `Conflict` if the user
    /// already exists.
    pub fn add_user(&self, author: &Author, username: &str, email: &str) -> OslerResult<User> {
        validate_username(username)?;
        let email = email.trim();
        if email.is_empty() || email.contains(['<', '>', '\n', '\r', ' ']) {
            return Err(OslerError::InvalidInput(format!("invalid email address: {email}")));
        }

        let _guard = self.storage.lock();
        if self.staff_dir().join(user_path(username)).exists() {
            return Err(OslerError::Conflict(format!("user {username} already exists")));
        }

        let user = User {
            username: username.to_string(),
            email: email.to_string(),
            display_name: None,
            created_at: Utc::now(),
        };
        self.commit(
            author,
            CommitAction::Create,
            "User added",
            vec![(user_path(username), to_yaml(&user)?)],
        )?;

        tracing::info!(username, "user added");
        Ok(user)
    }

    pub fn user(&self, username: &str) -> OslerResult<User> {
        validate_username(username)?;
        load_yaml(&self.staff_dir().join(user_path(username)), "user", username)
    }

    // ------------------------------------------------------------------------
    // Provider types
    // ------------------------------------------------------------------------

    pub fn create_provider_type(
        &self,
        author: &Author,
        input: ProviderTypeInput,
    ) -> OslerResult<ProviderType> {
        let long_name = NonEmptyText::single_line(&input.long_name)
            .map_err(|_| OslerError::InvalidInput("long_name is required".into()))?;
        let short_name = NonEmptyText::single_line(&input.short_name)
            .map_err(|_| OslerError::InvalidInput("short_name is required".into()))?;

        let provider_type = ProviderType {
            id: ShardableUuid::new(),
            long_name,
            short_name,
            signs_charts: input.signs_charts,
            staff_view: input.staff_view,
        };

        let _guard = self.storage.lock();
        self.commit(
            author,
            CommitAction::Create,
            "Provider type added",
            vec![(
                provider_type_path(&provider_type.id),
                to_yaml(&provider_type)?,
            )],
        )?;
        Ok(provider_type)
    }

    /// Every provider type, ordered by long name.
    pub fn provider_types(&self) -> Vec<ProviderType> {
        let mut types: Vec<ProviderType> = list_yaml(&self.staff_dir().join(PROVIDER_TYPES_DIR_NAME));
        types.sort_by(|a, b| a.long_name.cmp(&b.long_name));
        types
    }

    pub fn provider_type(&self, id: &ShardableUuid) -> OslerResult<ProviderType> {
        load_yaml(
            &self.staff_dir().join(provider_type_path(id)),
            "provider type",
            id,
        )
    }

    // ------------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------------

    pub fn providers(&self) -> Vec<Provider> {
        list_yaml(&self.staff_dir().join(PROVIDERS_DIR_NAME))
    }

    pub fn provider(&self, id: &ShardableUuid) -> OslerResult<Provider> {
        load_yaml(&self.staff_dir().join(provider_path(id)), "provider", id)
    }

    /// The provider profile belonging to `username`, if one has been created.
    pub fn provider_for_user(&self, username: &str) -> Option<Provider> {
        self.providers()
            .into_iter()
            .find(|p| p.associated_user == username)
    }

    /// Create the user's provider profile, unless they already have one.
    ///
    /// The provider's display name is copied onto the user.
    pub fn create_provider(&self, user: &User, input: ProviderInput) -> OslerResult<Provider> {
        let _guard = self.storage.lock();
        if let Some(existing) = self.provider_for_user(&user.username) {
            tracing::info!(username = %user.username, "user already has a provider");
            return Ok(existing);
        }

        let (first_name, last_name) = provider_names(&input)?;
        self.check_roles(&input.clinical_roles)?;
        let provider = Provider {
            id: ShardableUuid::new(),
            associated_user: user.username.clone(),
            first_name,
            middle_name: input.middle_name,
            last_name,
            phone: input.phone,
            gender: input.gender,
            languages: input.languages,
            clinical_roles: input.clinical_roles,
            needs_updating: false,
        };

        self.write_provider(user, &provider, CommitAction::Create, "Provider added")?;
        Ok(provider)
    }

    /// Update the user's provider profile and clear `needs_updating`.
    pub fn update_provider(&self, user: &User, input: ProviderInput) -> OslerResult<Provider> {
        let _guard = self.storage.lock();
        let existing = self
            .provider_for_user(&user.username)
            .ok_or_else(|| OslerError::not_found("provider", &user.username))?;

        let (first_name, last_name) = provider_names(&input)?;
        self.check_roles(&input.clinical_roles)?;
        let provider = Provider {
            first_name,
            middle_name: input.middle_name,
            last_name,
            phone: input.phone,
            gender: input.gender,
            languages: input.languages,
            clinical_roles: input.clinical_roles,
            needs_updating: false,
            ..existing
        };

        self.write_provider(user, &provider, CommitAction::Update, "Provider updated")?;
        Ok(provider)
    }

    /// Mark every provider as needing to update their profile. Returns how many were marked.
    pub fn require_providers_update(&self, author: &Author) -> OslerResult<usize> {
        let _guard = self.storage.lock();
        let mut writes = Vec::new();
        for mut provider in self.providers() {
            if provider.needs_updating {
                continue;
            }
            provider.needs_updating = true;
            writes.push((provider_path(&provider.id), to_yaml(&provider)?));
        }

        let count = writes.len();
        if count > 0 {
            self.commit(
                author,
                CommitAction::Update,
                "Providers required to update their profiles",
                writes,
            )?;
        }
        tracing::info!(count, "providers marked as needing an update");
        Ok(count)
    }

    /// The provider types the provider may act as, in the provider's order.
    ///
    /// Roles that no longer exist are logged and skipped.
    pub fn roles_for(&self, provider: &Provider) -> Vec<ProviderType> {
        provider
            .clinical_roles
            .iter()
            .filter_map(|id| match self.provider_type(id) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::warn!(provider = %provider.id, role = %id, "skipping clinical role: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Decide whether a role can be selected for the provider without asking.
    ///
    /// # Errors
    ///
    /// Returns [`OslerError::ProviderWithoutRoles`] if the provider has no usable roles.
    pub fn role_selection(&self, provider: &Provider) -> OslerResult<RoleSelection> {
        let mut roles = self.roles_for(provider);
        match roles.len() {
            0 => Err(OslerError::ProviderWithoutRoles(provider.id)),
            1 => Ok(RoleSelection::Selected(roles.remove(0))),
            _ => Ok(RoleSelection::Choose(roles)),
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Every clinical role must name an existing provider type.
    fn check_roles(&self, roles: &[ShardableUuid]) -> OslerResult<()> {
        if roles.is_empty() {
            return Err(OslerError::InvalidInput(
                "at least one clinical role is required".into(),
            ));
        }
        for role in roles {
            self.provider_type(role).map_err(|e| match e {
                OslerError::NotFound { .. } => {
                    OslerError::InvalidInput(format!("unknown clinical role: {role}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Write the provider and copy its display name onto the user, in one commit.
    fn write_provider(
        &self,
        user: &User,
        provider: &Provider,
        action: CommitAction,
        summary: &str,
    ) -> OslerResult<()> {
        let mut user = user.clone();
        user.display_name = Some(provider.display_name());

        let author = Author::for_profile(&user, provider.display_name());
        self.commit(
            &author,
            action,
            summary,
            vec![
                (provider_path(&provider.id), to_yaml(provider)?),
                (user_path(&user.username), to_yaml(&user)?),
            ],
        )
    }

    /// Commit files to the staff repository, initialising it first if needed. Callers hold the
    /// write lock.
    fn commit(
        &self,
        author: &Author,
        action: CommitAction,
        summary: &str,
        writes: Vec<(PathBuf, String)>,
    ) -> OslerResult<()> {
        let staff_dir = self.staff_dir();
        let msg = OslerCommitMessage::new(
            RecordDomain::Staff,
            action,
            summary,
            self.storage.cfg().clinic_name(),
        )?;

        if !staff_dir.join(".git").exists() {
            let init_msg = OslerCommitMessage::new(
                RecordDomain::Staff,
                CommitAction::Create,
                "Staff repository created",
                self.storage.cfg().clinic_name(),
            )?;
            VersionedFileService::init_and_commit(
                &staff_dir,
                &Author::system(),
                &init_msg,
                &[FileToWrite {
                    relative_path: Path::new(GITIGNORE_FILENAME),
                    content: DEFAULT_GITIGNORE,
                    old_content: None,
                }],
            )?;
        }

        let mut old_contents = Vec::with_capacity(writes.len());
        for (path, _) in &writes {
            old_contents.push(read_existing(&staff_dir.join(path))?);
        }
        let files: Vec<FileToWrite> = writes
            .iter()
            .zip(&old_contents)
            .map(|((path, content), old)| FileToWrite {
                relative_path: path,
                content,
                old_content: old.as_deref(),
            })
            .collect();

        VersionedFileService::write_and_commit_files(&staff_dir, author, &msg, &files)
    }
}

fn provider_names(input: &ProviderInput) -> OslerResult<(NonEmptyText, NonEmptyText)> {
    let first = NonEmptyText::single_line(&input.first_name)
        .map_err(|_| OslerError::InvalidInput("first_name is required".into()))?;
    let last = NonEmptyText::single_line(&input.last_name)
        .map_err(|_| OslerError::InvalidInput("last_name is required".into()))?;
    Ok((first, last))
}

fn user_path(username: &str) -> PathBuf {
    Path::new(USERS_DIR_NAME).join(format!("{username}.yaml"))
}

fn provider_path(id: &ShardableUuid) -> PathBuf {
    Path::new(PROVIDERS_DIR_NAME).join(format!("{id}.yaml"))
}

fn provider_type_path(id: &ShardableUuid) -> PathBuf {
    Path::new(PROVIDER_TYPES_DIR_NAME).join(format!("{id}.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::patients::tests::test_storage;
    use tempfile::TempDir;

    fn role(svc: &StaffService, long: &str, short: &str) -> ProviderType {
        svc.create_provider_type(
            &Author::system(),
            ProviderTypeInput {
                long_name: long.into(),
                short_name: short.into(),
                signs_charts: long.starts_with("Attending"),
                staff_view: false,
            },
        )
        .expect("create_provider_type should succeed")
    }

    fn provider_input(roles: Vec<ShardableUuid>) -> ProviderInput {
        ProviderInput {
            first_name: "Grace".into(),
            middle_name: None,
            last_name: "Hopper".into(),
            phone: None,
            gender: None,
            languages: vec!["English".into()],
            clinical_roles: roles,
        }
    }

    #[test]
    fn users_are_unique_and_validated() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = StaffService::new(test_storage(temp.path()));

        let user = svc
            .add_user(&Author::system(), "ghopper", "grace@example.com")
            .unwrap();
        assert_eq!(svc.user("ghopper").unwrap(), user);
        assert!(temp.path().join("staff/.git").is_dir());

        assert!(matches!(
            svc.add_user(&Author::system(), "ghopper", "g@example.com")
                .unwrap_err(),
            OslerError::Conflict(_)
        ));
        assert!(matches!(
            svc.add_user(&Author::system(), "../x", "g@example.com")
                .unwrap_err(),
            OslerError::InvalidInput(_)
        ));
        assert!(matches!(
            svc.user("nobody").unwrap_err(),
            OslerError::NotFound { kind: "user", .. }
        ));
    }

    #[test]
    fn provider_types_are_listed_by_long_name() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = StaffService::new(test_storage(temp.path()));
        role(&svc, "Preclinical", "Preclin");
        let attending = role(&svc, "Attending Physician", "Attending");

        let names: Vec<_> = svc
            .provider_types()
            .into_iter()
            .map(|t| t.long_name.into_string())
            .collect();
        assert_eq!(names, vec!["Attending Physician", "Preclinical"]);
        assert_eq!(svc.provider_type(&attending.id).unwrap(), attending);
    }

    #[test]
    fn create_provider_copies_name_and_is_idempotent() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = StaffService::new(test_storage(temp.path()));
        let attending = role(&svc, "Attending Physician", "Attending");
        let user = svc
            .add_user(&Author::system(), "ghopper", "grace@example.com")
            .unwrap();

        let provider = svc
            .create_provider(&user, provider_input(vec![attending.id]))
            .unwrap();
        assert_eq!(
            svc.user("ghopper").unwrap().display_name.as_deref(),
            Some("Grace Hopper")
        );

        let again = svc
            .create_provider(&user, provider_input(vec![attending.id]))
            .unwrap();
        assert_eq!(again.id, provider.id);
        assert_eq!(svc.providers().len(), 1);
    }

    #[test]
    fn provider_roles_must_exist() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = StaffService::new(test_storage(temp.path()));
        let user = svc
            .add_user(&Author::system(), "ghopper", "grace@example.com")
            .unwrap();

        let err = svc
            .create_provider(&user, provider_input(vec![ShardableUuid::new()]))
            .unwrap_err();
        assert!(matches!(err, OslerError::InvalidInput(_)));

        let err = svc.create_provider(&user, provider_input(vec![])).unwrap_err();
        assert!(matches!(err, OslerError::InvalidInput(_)));
    }

    #[test]
    fn update_clears_needs_updating() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = StaffService::new(test_storage(temp.path()));
        let attending = role(&svc, "Attending Physician", "Attending");
        let user = svc
            .add_user(&Author::system(), "ghopper", "grace@example.com")
            .unwrap();
        svc.create_provider(&user, provider_input(vec![attending.id]))
            .unwrap();

        assert_eq!(svc.require_providers_update(&Author::system()).unwrap(), 1);
        assert!(svc.provider_for_user("ghopper").unwrap().needs_updating);
        assert_eq!(svc.require_providers_update(&Author::system()).unwrap(), 0);

        let mut input = provider_input(vec![attending.id]);
        input.first_name = "Amazing Grace".into();
        let updated = svc.update_provider(&user, input).unwrap();
        assert!(!updated.needs_updating);
        assert_eq!(
            svc.user("ghopper").unwrap().display_name.as_deref(),
            Some("Amazing Grace Hopper")
        );
    }

    #[test]
    fn update_without_provider_is_not_found() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = StaffService::new(test_storage(temp.path()));
        let user = svc
            .add_user(&Author::system(), "ghopper", "grace@example.com")
            .unwrap();
        assert!(matches!(
            svc.update_provider(&user, provider_input(vec![]))
                .unwrap_err(),
            OslerError::NotFound { kind: "provider", .. }
        ));
    }

    #[test]
    fn role_selection_depends_on_role_count() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let svc = StaffService::new(test_storage(temp.path()));
        let attending = role(&svc, "Attending Physician", "Attending");
        let clinical = role(&svc, "Clinical Student", "Clinical");
        let user = svc
            .add_user(&Author::system(), "ghopper", "grace@example.com")
            .unwrap();

        let mut provider = svc
            .create_provider(&user, provider_input(vec![attending.id]))
            .unwrap();
        assert_eq!(
            svc.role_selection(&provider).unwrap(),
            RoleSelection::Selected(attending.clone())
        );

        provider.clinical_roles = vec![attending.id, clinical.id];
        assert_eq!(
            svc.role_selection(&provider).unwrap(),
            RoleSelection::Choose(vec![attending, clinical])
        );

        provider.clinical_roles = vec![];
        assert!(matches!(
            svc.role_selection(&provider).unwrap_err(),
            OslerError::ProviderWithoutRoles(_)
        ));
    }
}
