//! Provider profiles and clinical role selection.

use crate::auth::{safe_next, CurrentProvider, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::forms::{NextQuery, ProviderForm, RoleForm};
use crate::session::Session;
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Form;
use osler_core::records::{Provider, ProviderType, User};
use osler_core::{OslerError, RoleSelection, ShardableUuid};
use serde::Serialize;

/// Form field carrying the chosen role.
const CHOICE_KEY: &str = "radio-roles";

#[derive(Debug, Serialize)]
pub(crate) struct RoleChoice {
    roles: Vec<ProviderType>,
    choice_key: &'static str,
    next: String,
}

/// Select the provider's clinical role for this session.
///
/// A provider with a single role has it selected straight away.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn choose_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    session: Session,
    current: CurrentProvider,
) -> ApiResult<Response> {
    let next = safe_next(query.next.as_deref(), &headers);
    match state.clinic.staff.role_selection(&current.provider)? {
        RoleSelection::Selected(role) => {
            session.select_role(&current.user.username, &role);
            Ok(Redirect::to(&next).into_response())
        }
        RoleSelection::Choose(roles) => Ok(Json(RoleChoice {
            roles,
            choice_key: CHOICE_KEY,
            next,
        })
        .into_response()),
    }
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn choose_role_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    session: Session,
    current: CurrentProvider,
    Form(form): Form<RoleForm>,
) -> ApiResult<Redirect> {
    let next = safe_next(query.next.as_deref(), &headers);
    let role_id = ShardableUuid::parse(form.role.trim())
        .map_err(|_| ApiError::BadRequest(format!("{CHOICE_KEY}: invalid role id")))?;
    if !current.provider.clinical_roles.contains(&role_id) {
        return Err(ApiError::BadRequest(format!(
            "{CHOICE_KEY}: not one of your clinical roles"
        )));
    }

    let role = state.clinic.staff.provider_type(&role_id)?;
    session.select_role(&current.user.username, &role);
    Ok(Redirect::to(&next))
}

#[derive(Debug, Serialize)]
pub(crate) struct ProviderFormContext {
    user: User,
    provider: Option<Provider>,
    provider_types: Vec<ProviderType>,
    next: String,
}

/// The provider creation form, or straight on to `next` if the user already has a profile.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn provider_create_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    CurrentUser(user): CurrentUser,
) -> Response {
    let next = safe_next(query.next.as_deref(), &headers);
    if state.clinic.staff.provider_for_user(&user.username).is_some() {
        return Redirect::to(&next).into_response();
    }

    Json(ProviderFormContext {
        user,
        provider: None,
        provider_types: state.clinic.staff.provider_types(),
        next,
    })
    .into_response()
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn provider_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ProviderForm>,
) -> ApiResult<Redirect> {
    let provider = state.clinic.staff.create_provider(&user, form.into_input()?)?;
    tracing::info!(username = %user.username, provider = %provider.id, "provider created");
    Ok(Redirect::to(&safe_next(query.next.as_deref(), &headers)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn provider_update_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<ProviderFormContext>> {
    let provider = state
        .clinic
        .staff
        .provider_for_user(&user.username)
        .ok_or_else(|| OslerError::NotFound {
            kind: "provider",
            id: user.username.clone(),
        })?;

    Ok(Json(ProviderFormContext {
        user,
        provider: Some(provider),
        provider_types: state.clinic.staff.provider_types(),
        next: safe_next(query.next.as_deref(), &headers),
    }))
}

/// Update the user's provider profile; this also clears `needs_updating`.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn provider_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ProviderForm>,
) -> ApiResult<Redirect> {
    state.clinic.staff.update_provider(&user, form.into_input()?)?;
    Ok(Redirect::to(&safe_next(query.next.as_deref(), &headers)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn provider_types(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Json<Vec<ProviderType>> {
    Json(state.clinic.staff.provider_types())
}
