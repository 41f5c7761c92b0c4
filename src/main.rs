use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use osler_core::constants::{DEFAULT_CLINIC_NAME, DEFAULT_DATA_DIR};
use osler_core::{todo_list_managers_from_env_value, Clinic, CoreConfig, NonEmptyText};

/// Main entry point for the Osler clinic server
///
/// Resolves configuration from the environment (and `.env`), opens the clinic's data directory
/// and serves the REST API.
///
/// # Environment Variables
/// - `OSLER_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `OSLER_DATA_DIR`: Data directory, which must exist (default: "osler_data")
/// - `OSLER_CLINIC_NAME`: Clinic name recorded on every commit (default: "Osler Clinic")
/// - `OSLER_DEFAULT_DASHBOARD`: Where the home page redirects (default: "/patients")
/// - `OSLER_TODO_LIST_MANAGERS`: Comma-separated todo kinds shown on the patient page
///   (default: all of `action_item,followup_request,vaccine_action_item`)
///
/// # Errors
/// Returns an error if:
/// - the configuration is invalid or the data directory is missing,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("osler_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("osler_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("OSLER_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let data_dir = PathBuf::from(
        std::env::var("OSLER_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into()),
    );
    if !data_dir.is_dir() {
        anyhow::bail!("Data directory does not exist: {}", data_dir.display());
    }

    let clinic_name = std::env::var("OSLER_CLINIC_NAME")
        .unwrap_or_else(|_| DEFAULT_CLINIC_NAME.into());
    let clinic_name = NonEmptyText::new(&clinic_name)
        .map_err(|_| anyhow::anyhow!("OSLER_CLINIC_NAME must not be blank"))?;

    let cfg = CoreConfig::new(
        data_dir,
        clinic_name,
        std::env::var("OSLER_DEFAULT_DASHBOARD").ok(),
        todo_list_managers_from_env_value(std::env::var("OSLER_TODO_LIST_MANAGERS").ok())?,
    )?;

    tracing::info!(
        "++ Starting Osler for {} on {}",
        cfg.clinic_name(),
        rest_addr
    );
    let clinic = Clinic::open(Arc::new(cfg))?;
    api_rest::serve(&rest_addr, clinic).await
}
