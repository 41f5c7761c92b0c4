//! Action items, appointments, referrals and vaccine records.

use super::{patient_url, today};
use crate::auth::{ActiveRole, CurrentUser};
use crate::error::ApiResult;
use crate::forms::{
    ActionItemFollowupForm, ActionItemForm, AppointmentForm, PatientContactForm, ReferralForm,
    VaccineActionItemForm, VaccineFollowupForm,
};
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::{Json, Redirect};
use axum::Form;
use osler_core::records::{ActionItem, Patient};
use osler_core::repositories::AppointmentDay;
use osler_core::ShardableUuid;
use serde::Serialize;

/// Appointments from today onwards across all patients, grouped by date.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn upcoming_appointments(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<AppointmentDay>>> {
    Ok(Json(state.clinic.detail.upcoming_appointments(today())?))
}

// ----------------------------------------------------------------------------
// Action items
// ----------------------------------------------------------------------------

#[axum::debug_handler(state = AppState)]
pub(crate) async fn action_item_create(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    Form(form): Form<ActionItemForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .create_action_item(&active.acting(), &id, form.into_input()?)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn action_item_update(
    State(state): State<AppState>,
    Path((id, ai)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
    Form(form): Form<ActionItemForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .update_action_item(&active.acting(), &id, &ai, form.into_input()?)?;
    Ok(Redirect::to(&patient_url(&id)))
}

/// Mark an action item done, then ask how it was followed up.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn action_item_done(
    State(state): State<AppState>,
    Path((id, ai)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .mark_action_item_done(&active.acting(), &id, &ai)?;
    Ok(Redirect::to(&format!(
        "{}/action-items/{ai}/followups/new",
        patient_url(&id)
    )))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn action_item_reset(
    State(state): State<AppState>,
    Path((id, ai)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .reset_action_item(&active.acting(), &id, &ai)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[derive(Debug, Serialize)]
pub(crate) struct ActionItemFollowupContext {
    patient: Patient,
    action_item: ActionItem,
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn action_item_followup_form(
    State(state): State<AppState>,
    Path((id, ai)): Path<(ShardableUuid, ShardableUuid)>,
    _user: CurrentUser,
) -> ApiResult<Json<ActionItemFollowupContext>> {
    Ok(Json(ActionItemFollowupContext {
        patient: state.clinic.patients.get(&id)?,
        action_item: state.clinic.notes.action_item(&id, &ai)?,
    }))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn action_item_followup_create(
    State(state): State<AppState>,
    Path((id, ai)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
    Form(form): Form<ActionItemFollowupForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .create_action_item_followup(&active.acting(), &id, &ai, form.into())?;
    Ok(Redirect::to(&patient_url(&id)))
}

// ----------------------------------------------------------------------------
// Appointments
// ----------------------------------------------------------------------------

#[axum::debug_handler(state = AppState)]
pub(crate) async fn appointment_create(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    Form(form): Form<AppointmentForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .create_appointment(&active.acting(), &id, form.into_input()?)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn appointment_update(
    State(state): State<AppState>,
    Path((id, apt)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
    Form(form): Form<AppointmentForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .update_appointment(&active.acting(), &id, &apt, form.into_input()?)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn appointment_no_show(
    State(state): State<AppState>,
    Path((id, apt)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .mark_appointment_showed(&active.acting(), &id, &apt, false)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn appointment_arrived(
    State(state): State<AppState>,
    Path((id, apt)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .mark_appointment_showed(&active.acting(), &id, &apt, true)?;
    Ok(Redirect::to(&patient_url(&id)))
}

// ----------------------------------------------------------------------------
// Referrals
// ----------------------------------------------------------------------------

/// Create a referral with its first follow-up request.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn referral_create(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    Form(form): Form<ReferralForm>,
) -> ApiResult<Redirect> {
    let (referral, followup) = form.into_inputs()?;
    state
        .clinic
        .notes
        .create_referral(&active.acting(), &id, referral, followup)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn patient_contact_create(
    State(state): State<AppState>,
    Path((id, referral, request)): Path<(ShardableUuid, ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
    Form(form): Form<PatientContactForm>,
) -> ApiResult<Redirect> {
    state.clinic.notes.create_patient_contact(
        &active.acting(),
        &id,
        &referral,
        &request,
        form.into_input()?,
    )?;
    Ok(Redirect::to(&patient_url(&id)))
}

// ----------------------------------------------------------------------------
// Vaccines
// ----------------------------------------------------------------------------

#[axum::debug_handler(state = AppState)]
pub(crate) async fn vaccine_followup_create(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    Form(form): Form<VaccineFollowupForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .create_vaccine_followup(&active.acting(), &id, form.into_input()?)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn vaccine_action_item_create(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    Form(form): Form<VaccineActionItemForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .create_vaccine_action_item(&active.acting(), &id, form.into_input()?)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn vaccine_action_item_done(
    State(state): State<AppState>,
    Path((id, item)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .mark_vaccine_action_item_done(&active.acting(), &id, &item)?;
    Ok(Redirect::to(&patient_url(&id)))
}
