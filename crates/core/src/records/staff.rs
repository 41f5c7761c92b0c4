use chrono::{DateTime, Utc};
use osler_types::NonEmptyText;
use osler_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};

/// An account known to the clinic, identified by the username the front proxy supplies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    /// Copied from the user's Provider whenever it is created or updated.
    #[serde(default)]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A clinical role a provider can act in, e.g. "Attending Physician" / "Attending".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderType {
    pub id: ShardableUuid,
    pub long_name: NonEmptyText,
    pub short_name: NonEmptyText,
    pub signs_charts: bool,
    pub staff_view: bool,
}

#[derive(Clone, Debug)]
pub struct ProviderTypeInput {
    pub long_name: String,
    pub short_name: String,
    pub signs_charts: bool,
    pub staff_view: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ShardableUuid,
    pub associated_user: String,
    pub first_name: NonEmptyText,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: NonEmptyText,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    /// Ids of the ProviderTypes this provider may act as.
    pub clinical_roles: Vec<ShardableUuid>,
    /// Set for everyone at the start of a school year; cleared by the provider's next update.
    #[serde(default)]
    pub needs_updating: bool,
}

impl Provider {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Editable provider fields submitted by the provider create and update forms.
#[derive(Clone, Debug)]
pub struct ProviderInput {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub languages: Vec<String>,
    pub clinical_roles: Vec<ShardableUuid>,
}
