//! Patient registration, lists, the detail page and demographics.

use super::{patient_url, today};
use crate::auth::{with_query, ActiveRole, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::forms::{DemographicsForm, NameQuery, PatientForm};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{Json, Redirect};
use axum::Form;
use osler_core::records::{Demographics, Patient};
use osler_core::validation::capitalize;
use osler_core::{CommitEntry, PatientDetail, PatientFilter, ShardableUuid};
use serde::{Deserialize, Serialize};

#[axum::debug_handler]
pub(crate) async fn home(State(state): State<AppState>) -> Redirect {
    Redirect::to(state.clinic.cfg().default_dashboard())
}

#[derive(Debug, Serialize)]
pub(crate) struct PatientList {
    filter: String,
    patients: Vec<Patient>,
}

/// Every patient, ordered by last name.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn all_patients(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Json<PatientList> {
    Json(PatientList {
        filter: "all".into(),
        patients: state.clinic.patients.list(),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct FilterQuery {
    #[serde(default)]
    filter: String,
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn filtered_patients(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<PatientList>> {
    let filter: PatientFilter = query.filter.trim().parse()?;
    let provider = state.clinic.staff.provider_for_user(&user.username);
    let patients =
        state
            .clinic
            .detail
            .list_patients(filter, provider.as_ref().map(|p| &p.id), today())?;
    Ok(Json(PatientList {
        filter: query.filter,
        patients,
    }))
}

// ----------------------------------------------------------------------------
// Intake
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
pub(crate) struct Names {
    first_name: String,
    last_name: String,
}

impl From<NameQuery> for Names {
    fn from(q: NameQuery) -> Self {
        Self {
            first_name: q.first_name.map(|n| n.trim().to_string()).unwrap_or_default(),
            last_name: q.last_name.map(|n| n.trim().to_string()).unwrap_or_default(),
        }
    }
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn pre_intake_form(_user: CurrentUser) -> Json<Names> {
    Json(Names::default())
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreIntakeForm {
    first_name: String,
    last_name: String,
}

/// Check a new patient's names against existing patients before intake.
///
/// Both names are capitalised. With possible duplicates the user is sent to pick from them,
/// otherwise straight to intake.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn pre_intake(
    State(state): State<AppState>,
    _user: CurrentUser,
    Form(form): Form<PreIntakeForm>,
) -> ApiResult<Redirect> {
    let first_name = capitalize(&form.first_name);
    let last_name = capitalize(&form.last_name);
    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::BadRequest(
            "first_name and last_name are required".into(),
        ));
    }

    let names = [("first_name", first_name.as_str()), ("last_name", last_name.as_str())];
    let duplicates = state.clinic.patients.duplicates(&first_name, &last_name);
    let target = if duplicates.is_empty() {
        with_query("/intake", &names)
    } else {
        tracing::info!(count = duplicates.len(), "possible duplicate patients found");
        with_query("/pre-intake-select", &names)
    };
    Ok(Redirect::to(&target))
}

#[derive(Debug, Serialize)]
pub(crate) struct PreIntakeSelect {
    first_name: String,
    last_name: String,
    object_list: Vec<Patient>,
    new_pt_url: String,
    home: &'static str,
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn pre_intake_select(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
    _user: CurrentUser,
) -> Json<PreIntakeSelect> {
    let Names {
        first_name,
        last_name,
    } = query.into();

    let object_list = if first_name.is_empty() || last_name.is_empty() {
        Vec::new()
    } else {
        state.clinic.patients.duplicates(&first_name, &last_name)
    };
    let new_pt_url = with_query(
        "/intake",
        &[("first_name", first_name.as_str()), ("last_name", last_name.as_str())],
    );

    Json(PreIntakeSelect {
        first_name,
        last_name,
        object_list,
        new_pt_url,
        home: "/",
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct IntakeForm {
    initial: Names,
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn intake_form(
    Query(query): Query<NameQuery>,
    _user: CurrentUser,
) -> Json<IntakeForm> {
    Json(IntakeForm {
        initial: query.into(),
    })
}

/// Register a patient, then continue to their demographics.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn intake(
    State(state): State<AppState>,
    active: ActiveRole,
    Form(form): Form<PatientForm>,
) -> ApiResult<Redirect> {
    let patient = state
        .clinic
        .patients
        .create(&active.acting().author, form.into_input()?)?;
    tracing::info!(patient = %patient.id, "patient registered");
    Ok(Redirect::to(&format!("{}/demographics", patient_url(&patient.id))))
}

// ----------------------------------------------------------------------------
// One patient
// ----------------------------------------------------------------------------

#[axum::debug_handler(state = AppState)]
pub(crate) async fn patient_detail(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    _user: CurrentUser,
) -> ApiResult<Json<PatientDetail>> {
    Ok(Json(state.clinic.detail.patient_detail(&id, today())?))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn patient_update(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    Form(form): Form<PatientForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .patients
        .update(&active.acting().author, &id, form.into_input()?)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn activate_detail(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
) -> ApiResult<Redirect> {
    state.clinic.patients.toggle_active(&active.acting().author, &id)?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn activate_home(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
) -> ApiResult<Redirect> {
    state.clinic.patients.toggle_active(&active.acting().author, &id)?;
    Ok(Redirect::to("/"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<usize>,
}

/// The patient's audit trail, newest first.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn history(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    Query(query): Query<HistoryQuery>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<CommitEntry>>> {
    Ok(Json(state.clinic.patients.history(&id, query.limit)?))
}

// ----------------------------------------------------------------------------
// Demographics
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct DemographicsContext {
    patient: Patient,
    demographics: Option<Demographics>,
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn demographics(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    _user: CurrentUser,
) -> ApiResult<Json<DemographicsContext>> {
    Ok(Json(DemographicsContext {
        patient: state.clinic.patients.get(&id)?,
        demographics: state.clinic.patients.find_demographics(&id)?,
    }))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn demographics_create(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    Form(form): Form<DemographicsForm>,
) -> ApiResult<Redirect> {
    state.clinic.patients.create_demographics(
        &active.acting().author,
        &id,
        form.into_input()?,
        today(),
    )?;
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn demographics_update(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    Form(form): Form<DemographicsForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .patients
        .update_demographics(&active.acting().author, &id, form.into_input()?)?;
    Ok(Redirect::to(&patient_url(&id)))
}
