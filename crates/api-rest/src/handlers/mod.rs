//! Request handlers, one module per area of the clinic.

pub(crate) mod documents;
pub(crate) mod notes;
pub(crate) mod patients;
pub(crate) mod staff;

use axum::response::Json;
use chrono::{Local, NaiveDate};
use osler_core::ShardableUuid;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct HealthRes {
    ok: bool,
    message: String,
}

/// Health check used by monitoring and load balancers.
#[axum::debug_handler]
pub(crate) async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Osler REST API is alive".into(),
    })
}

/// The clinic's calendar date.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn patient_url(patient: &ShardableUuid) -> String {
    format!("/patients/{patient}")
}
