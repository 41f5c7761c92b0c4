//! Who a write is attributed to.
//!
//! Every commit records the acting provider's name and the clinical role they selected for the
//! session. This is the audit trail answering "who changed this record, acting as what".

use crate::error::{OslerError, OslerResult};
use crate::records::{Provider, ProviderType, User};
use osler_uuid::ShardableUuid;

/// Represents the author of a record operation.
#[derive(Clone, Debug)]
pub struct Author {
    /// Display name of the author.
    pub name: String,

    /// The role the author acted in (a provider type's short name, or "System").
    pub role: String,

    /// Email address recorded on the commit signature.
    pub email: String,
}

impl Author {
    /// The author for a provider acting in a selected clinical role.
    pub fn for_provider(user: &User, provider: &Provider, role: &ProviderType) -> Self {
        Self {
            name: provider.display_name(),
            role: role.short_name.to_string(),
            email: user.email.clone(),
        }
    }

    /// The author for changes a user makes to their own provider profile, before they have
    /// chosen a clinical role.
    pub fn for_profile(user: &User, provider_name: String) -> Self {
        Self {
            name: provider_name,
            role: "Provider".into(),
            email: user.email.clone(),
        }
    }

    /// The author for writes made by administrative tooling rather than a provider.
    pub fn system() -> Self {
        Self {
            name: "Osler".into(),
            role: "System".into(),
            email: "osler@localhost".into(),
        }
    }

    /// Validate that author metadata can be rendered into commit trailers.
    ///
    /// # Errors
    ///
    /// Returns [`OslerError::MissingAuthorName`] or [`OslerError::MissingAuthorRole`] when a
    /// value is blank or spans several lines, and `InvalidInput` for angle brackets in the name
    /// or an unusable email.
    pub fn validate_commit_author(&self) -> OslerResult<()> {
        if self.name.trim().is_empty() || self.name.contains(['\n', '\r']) {
            return Err(OslerError::MissingAuthorName);
        }
        if self.name.contains(['<', '>']) {
            return Err(OslerError::InvalidInput(
                "author name must not contain '<' or '>'".into(),
            ));
        }
        if self.role.trim().is_empty() || self.role.contains(['\n', '\r']) {
            return Err(OslerError::MissingAuthorRole);
        }
        if self.email.trim().is_empty() || self.email.contains(['<', '>', '\n', '\r']) {
            return Err(OslerError::InvalidInput(
                "author email must be non-empty and must not contain '<', '>' or newlines".into(),
            ));
        }
        Ok(())
    }
}

/// A provider acting in the clinical role selected for their session.
///
/// Notes record both ids; commits record the rendered [`Author`].
#[derive(Clone, Debug)]
pub struct ActingProvider {
    pub provider: ShardableUuid,
    pub provider_type: ShardableUuid,
    pub author: Author,
}

impl ActingProvider {
    pub fn new(user: &User, provider: &Provider, role: &ProviderType) -> Self {
        Self {
            provider: provider.id,
            provider_type: role.id,
            author: Author::for_provider(user, provider, role),
        }
    }
}
