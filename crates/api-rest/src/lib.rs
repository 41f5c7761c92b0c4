//! # API REST
//!
//! REST API for the Osler clinic records system.
//!
//! Handles:
//! - HTTP endpoints with axum; read views answer with their context as JSON
//! - form submissions answering `303 See Other` redirects
//! - the session-held clinical role selection
//! - REST-specific concerns (CORS, request tracing)
//!
//! Business logic lives in `osler-core`.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod error;
pub mod forms;
mod handlers;
pub mod session;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use osler_core::Clinic;
use session::SessionStore;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted document upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub clinic: Clinic,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(clinic: Clinic) -> Self {
        Self {
            clinic,
            sessions: SessionStore::new(),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    use handlers::{documents, notes, patients, staff};

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(patients::home))
        .route("/choose-role", get(staff::choose_role).post(staff::choose_role_submit))
        .route("/providers/new", get(staff::provider_create_form).post(staff::provider_create))
        .route("/providers/me", get(staff::provider_update_form).post(staff::provider_update))
        .route("/provider-types", get(staff::provider_types))
        .route("/patients", get(patients::all_patients))
        .route("/patients/list", get(patients::filtered_patients))
        .route("/pre-intake", get(patients::pre_intake_form).post(patients::pre_intake))
        .route("/pre-intake-select", get(patients::pre_intake_select))
        .route("/intake", get(patients::intake_form).post(patients::intake))
        .route("/appointments", get(notes::upcoming_appointments))
        .route("/patients/:id", get(patients::patient_detail))
        .route("/patients/:id/update", post(patients::patient_update))
        .route("/patients/:id/activate", post(patients::activate_detail))
        .route("/patients/:id/activate-home", post(patients::activate_home))
        .route("/patients/:id/history", get(patients::history))
        .route(
            "/patients/:id/demographics",
            get(patients::demographics).post(patients::demographics_update),
        )
        .route("/patients/:id/demographics/new", post(patients::demographics_create))
        .route("/patients/:id/action-items/new", post(notes::action_item_create))
        .route("/patients/:id/action-items/:ai", post(notes::action_item_update))
        .route("/patients/:id/action-items/:ai/done", post(notes::action_item_done))
        .route("/patients/:id/action-items/:ai/reset", post(notes::action_item_reset))
        .route(
            "/patients/:id/action-items/:ai/followups/new",
            get(notes::action_item_followup_form).post(notes::action_item_followup_create),
        )
        .route("/patients/:id/appointments/new", post(notes::appointment_create))
        .route("/patients/:id/appointments/:apt", post(notes::appointment_update))
        .route("/patients/:id/appointments/:apt/no-show", post(notes::appointment_no_show))
        .route("/patients/:id/appointments/:apt/arrived", post(notes::appointment_arrived))
        .route(
            "/patients/:id/documents/new",
            post(documents::document_create).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/patients/:id/documents/:doc",
            get(documents::document_detail).post(documents::document_update),
        )
        .route("/patients/:id/documents/:doc/file", get(documents::document_file))
        .route("/patients/:id/referrals/new", post(notes::referral_create))
        .route(
            "/patients/:id/referrals/:r/followup-requests/:fr/contacts/new",
            post(notes::patient_contact_create),
        )
        .route("/patients/:id/vaccine-followups/new", post(notes::vaccine_followup_create))
        .route(
            "/patients/:id/vaccine-action-items/new",
            post(notes::vaccine_action_item_create),
        )
        .route(
            "/patients/:id/vaccine-action-items/:v/done",
            post(notes::vaccine_action_item_done),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve the API on `addr` until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, clinic: Clinic) -> anyhow::Result<()> {
    let app = router(AppState::new(clinic));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Osler REST API listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
