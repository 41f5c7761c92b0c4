//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into core services, so that
//! request handling never reads process-wide environment variables.

use crate::constants::{DEFAULT_DASHBOARD, PATIENTS_DIR_NAME, STAFF_DIR_NAME};
use crate::todo::TodoKind;
use crate::{OslerError, OslerResult};
use osler_types::NonEmptyText;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    clinic_name: NonEmptyText,
    default_dashboard: String,
    todo_list_managers: Vec<TodoKind>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `OslerError::InvalidInput` if the clinic name spans several lines, the
    /// dashboard is not a site-relative path, or no todo-list manager is enabled.
    pub fn new(
        data_dir: PathBuf,
        clinic_name: NonEmptyText,
        default_dashboard: Option<String>,
        todo_list_managers: Vec<TodoKind>,
    ) -> OslerResult<Self> {
        let clinic_name = NonEmptyText::single_line(clinic_name.as_str())
            .map_err(|_| OslerError::InvalidInput("clinic name must be a single line".into()))?;

        let default_dashboard = default_dashboard
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DASHBOARD.to_string());
        if !default_dashboard.starts_with('/') || default_dashboard.starts_with("//") {
            return Err(OslerError::InvalidInput(
                "default dashboard must be a site-relative path such as /patients".into(),
            ));
        }

        if todo_list_managers.is_empty() {
            return Err(OslerError::InvalidInput(
                "at least one todo list manager must be enabled".into(),
            ));
        }

        Ok(Self {
            data_dir,
            clinic_name,
            default_dashboard,
            todo_list_managers,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.data_dir.join(PATIENTS_DIR_NAME)
    }

    pub fn staff_dir(&self) -> PathBuf {
        self.data_dir.join(STAFF_DIR_NAME)
    }

    /// Clinic name recorded in the `Clinic` trailer of every commit.
    pub fn clinic_name(&self) -> &NonEmptyText {
        &self.clinic_name
    }

    /// Where the home page redirects.
    pub fn default_dashboard(&self) -> &str {
        &self.default_dashboard
    }

    /// Todo-list kinds aggregated on the patient detail page, in display order.
    pub fn todo_list_managers(&self) -> &[TodoKind] {
        &self.todo_list_managers
    }
}

/// Parse the enabled todo-list managers from an optional comma-separated value.
///
/// `None` or a blank value enables every kind.
pub fn todo_list_managers_from_env_value(value: Option<String>) -> OslerResult<Vec<TodoKind>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let Some(value) = value else {
        return Ok(TodoKind::ALL.to_vec());
    };

    let mut kinds = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let kind = part.parse::<TodoKind>()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}
