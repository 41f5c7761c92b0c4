use clap::{Parser, Subcommand};
use osler_core::constants::{DEFAULT_CLINIC_NAME, DEFAULT_DATA_DIR};
use osler_core::records::ProviderTypeInput;
use osler_core::{
    todo_list_managers_from_env_value, Author, Clinic, CoreConfig, NonEmptyText, PatientFilter,
    ShardableUuid,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "osler")]
#[command(about = "Osler clinic records administration")]
struct Cli {
    /// Data directory (defaults to OSLER_DATA_DIR, then "osler_data")
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user who may sign in through the front proxy
    AddUser {
        /// Username as sent by the proxy in x-osler-user
        username: String,
        email: String,
    },
    /// Add a clinical role providers can act in
    AddProviderType {
        /// e.g. "Attending Physician"
        long_name: String,
        /// e.g. "Attending"; recorded as the Author-Role on commits
        short_name: String,
        #[arg(long)]
        signs_charts: bool,
        #[arg(long)]
        staff_view: bool,
    },
    /// List provider types
    ListProviderTypes,
    /// List patients
    ListPatients {
        /// One of: all, active, ai_active, ai_inactive, ai_priority
        #[arg(long, default_value = "all")]
        filter: String,
    },
    /// Show a patient's change history
    History {
        /// Patient UUID
        patient: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mark every provider as needing to update their profile
    RequireProviderUpdate,
}

fn open_clinic(data_dir: Option<PathBuf>) -> anyhow::Result<Clinic> {
    let data_dir = data_dir.unwrap_or_else(|| {
        PathBuf::from(std::env::var("OSLER_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into()))
    });
    if !data_dir.is_dir() {
        anyhow::bail!("Data directory does not exist: {}", data_dir.display());
    }

    let clinic_name =
        std::env::var("OSLER_CLINIC_NAME").unwrap_or_else(|_| DEFAULT_CLINIC_NAME.into());
    let clinic_name = NonEmptyText::new(&clinic_name)
        .map_err(|_| anyhow::anyhow!("OSLER_CLINIC_NAME must not be blank"))?;

    let cfg = CoreConfig::new(
        data_dir,
        clinic_name,
        std::env::var("OSLER_DEFAULT_DASHBOARD").ok(),
        todo_list_managers_from_env_value(std::env::var("OSLER_TODO_LIST_MANAGERS").ok())?,
    )?;
    Ok(Clinic::open(Arc::new(cfg))?)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'osler --help' for commands");
        return Ok(());
    };
    let clinic = open_clinic(cli.data_dir)?;
    let author = Author::system();

    match command {
        Commands::AddUser { username, email } => {
            let user = clinic.staff.add_user(&author, &username, &email)?;
            println!("Added user {} <{}>", user.username, user.email);
        }
        Commands::AddProviderType {
            long_name,
            short_name,
            signs_charts,
            staff_view,
        } => {
            let provider_type = clinic.staff.create_provider_type(
                &author,
                ProviderTypeInput {
                    long_name,
                    short_name,
                    signs_charts,
                    staff_view,
                },
            )?;
            println!(
                "Added provider type {} ({}) with ID: {}",
                provider_type.long_name, provider_type.short_name, provider_type.id
            );
        }
        Commands::ListProviderTypes => {
            for t in clinic.staff.provider_types() {
                println!(
                    "ID: {}, Name: {} ({}), Signs charts: {}, Staff view: {}",
                    t.id, t.long_name, t.short_name, t.signs_charts, t.staff_view
                );
            }
        }
        Commands::ListPatients { filter } => {
            let filter: PatientFilter = filter.parse()?;
            let today = chrono::Local::now().date_naive();
            let patients = clinic.detail.list_patients(filter, None, today)?;
            if patients.is_empty() {
                println!("No patients found.");
            }
            for patient in patients {
                println!(
                    "ID: {}, Name: {}, Active: {}, Created: {}",
                    patient.id,
                    patient.name(),
                    patient.needs_workup,
                    patient.created_at
                );
            }
        }
        Commands::History { patient, limit } => {
            let patient = ShardableUuid::parse(&patient)?;
            for entry in clinic.patients.history(&patient, limit)? {
                println!(
                    "{} {} ({}, {}) {}",
                    entry.time.format("%Y-%m-%d %H:%M"),
                    entry.id,
                    entry.author_name.as_deref().unwrap_or("unknown"),
                    entry.author_role.as_deref().unwrap_or("unknown"),
                    entry.subject
                );
            }
        }
        Commands::RequireProviderUpdate => {
            let count = clinic.staff.require_providers_update(&author)?;
            println!("{count} provider(s) must now update their profile");
        }
    }

    Ok(())
}
