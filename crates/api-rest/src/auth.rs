//! Who is making the request, and in which clinical role.
//!
//! Authentication happens in the front proxy, which sets `x-osler-user`. The extractors here
//! resolve that user against the staff store and, for views that write notes, make sure the
//! user has a provider profile and has selected a role for the session.

use crate::error::ApiError;
use crate::session::Session;
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use osler_core::records::{Provider, ProviderType, User};
use osler_core::{ActingProvider, OslerError};
use url::Url;

pub const USER_HEADER: &str = "x-osler-user";

/// The authenticated user.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let username = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        match state.clinic.staff.user(username) {
            Ok(user) => Ok(Self(user)),
            Err(OslerError::NotFound { .. }) | Err(OslerError::InvalidInput(_)) => {
                Err(ApiError::UnknownUser(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The authenticated user's provider profile.
///
/// Users without a profile are sent to create one, then back to the requested page.
#[derive(Clone, Debug)]
pub struct CurrentProvider {
    pub user: User,
    pub provider: Provider,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentProvider {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Response> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match state.clinic.staff.provider_for_user(&user.username) {
            Some(provider) => Ok(Self { user, provider }),
            None => Err(redirect_with_next("/providers/new", parts)),
        }
    }
}

/// A provider acting in the clinical role held in their session.
///
/// Without a selected role the request is redirected to the role choice; a provider whose
/// profile must be updated is sent to their profile first. The session's role must have been
/// selected by this user and still be one of the provider's roles.
#[derive(Clone, Debug)]
pub struct ActiveRole {
    pub user: User,
    pub provider: Provider,
    pub role: ProviderType,
}

impl ActiveRole {
    pub fn acting(&self) -> ActingProvider {
        ActingProvider::new(&self.user, &self.provider, &self.role)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ActiveRole {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Response> {
        let CurrentProvider { user, provider } =
            CurrentProvider::from_request_parts(parts, state).await?;
        if provider.needs_updating {
            return Err(redirect_with_next("/providers/me", parts));
        }

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let data = session.data();
        let Some(role_id) = data.clintype_id else {
            return Err(redirect_with_next("/choose-role", parts));
        };
        if data.username.as_deref() != Some(user.username.as_str())
            || !provider.clinical_roles.contains(&role_id)
        {
            tracing::info!(username = %user.username, "session role no longer valid");
            return Err(redirect_with_next("/choose-role", parts));
        }

        let role = state
            .clinic
            .staff
            .provider_type(&role_id)
            .map_err(|e| ApiError::from(e).into_response())?;
        Ok(Self {
            user,
            provider,
            role,
        })
    }
}

/// `path?next=<requested path and query>`.
fn redirect_with_next(path: &str, parts: &Parts) -> Response {
    let requested = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&with_query(path, &[("next", requested)])).into_response()
}

/// Append url-encoded query pairs to a path.
pub fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{path}?{query}")
}

/// Whether redirecting to `target` keeps the user on this site.
///
/// Relative URLs are safe. Absolute URLs must use http or https and name `host`, the host the
/// request was made to.
pub fn is_safe_redirect(target: &str, host: Option<&str>) -> bool {
    let target = target.trim();
    if target.is_empty()
        || target.starts_with("//")
        || target.contains('\\')
        || target.chars().any(char::is_control)
    {
        return false;
    }

    match Url::parse(target) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                return false;
            }
            let Some(url_host) = url.host_str() else {
                return false;
            };
            let authority = match url.port() {
                Some(port) => format!("{url_host}:{port}"),
                None => url_host.to_string(),
            };
            host.is_some_and(|h| h.eq_ignore_ascii_case(&authority))
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

/// The `next` target if it is safe, otherwise home.
pub fn safe_next(next: Option<&str>, headers: &HeaderMap) -> String {
    let host = headers.get(HOST).and_then(|h| h.to_str().ok());
    match next {
        Some(next) if is_safe_redirect(next, host) => next.trim().to_string(),
        _ => "/".to_string(),
    }
}
