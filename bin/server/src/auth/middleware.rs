//! Request guard and authentication extractors for Axum.
//!
//! `link_guard` wraps every route. It creates the request's
//! [`RequestContext`], authenticates the session user if there is one, and
//! resolves the user's provider link on the way in. On the way out it
//! resolves again, which only does work if a handler authenticated a user
//! itself; the context guarantees the provider is consulted at most once.
//! Handlers that authenticate the caller with the provider's own token use
//! [`RequestContext::authenticate_via_provider`], and the exit check then
//! leaves them alone.
//!
//! A broken link becomes `401 {"error": "Invalid access token used"}` for
//! API paths, and a forced logout plus redirect for everything else.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use provider_link_platform_access::{LocalUser, RequestContext, SessionId, StoreError};
use serde_json::json;
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::{debug, error, warn};

use super::AppState;

/// Session cookie name.
pub(crate) const SESSION_COOKIE: &str = "session";

/// Error body returned to API callers whose link is broken.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid access token used";

/// The provider client ID, attached to every request by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderClientId(pub String);

/// Extractor for requiring an authenticated user.
///
/// Reads the user the guard placed on the request context, so it only
/// works on routes behind `link_guard`.
pub struct RequireAuth(pub LocalUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<RequestContext>>()
            .and_then(|ctx| ctx.user().cloned())
            .map(RequireAuth)
            .ok_or(AuthRejection::NotAuthenticated)
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated").into_response(),
            Self::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Middleware that keeps the session user's provider link valid.
pub async fn link_guard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = Arc::new(RequestContext::new());
    let session_id = match session_user(&state, &jar).await {
        Ok(Some((session_id, user))) => {
            ctx.authenticate(user);
            Some(session_id)
        }
        Ok(None) => None,
        Err(report) => {
            error!(error = %report, "session lookup failed");
            return AuthRejection::InternalError.into_response();
        }
    };

    let is_api = state.guard.is_api_path(request.uri().path());
    request.extensions_mut().insert(ctx.clone());
    request
        .extensions_mut()
        .insert(ProviderClientId(state.client_id.clone()));

    // A link already known to be broken never reaches the handler, so its
    // side effects do not happen for a request whose response is replaced.
    match ctx.resolve_once(&state.lifecycle).await {
        Ok(Some(outcome)) if outcome.is_broken() => {
            return broken_link_response(&state, jar, session_id, is_api).await;
        }
        Ok(_) => {}
        Err(report) => {
            error!(error = %report, "provider link check failed");
            return AuthRejection::InternalError.into_response();
        }
    }

    let response = next.run(request).await;

    match ctx.resolve_once(&state.lifecycle).await {
        Ok(Some(outcome)) if outcome.is_broken() => {
            broken_link_response(&state, jar, session_id, is_api).await
        }
        Ok(_) => response,
        Err(report) => {
            error!(error = %report, "provider link check failed");
            AuthRejection::InternalError.into_response()
        }
    }
}

/// Finds the live session behind the cookie and its user.
async fn session_user(
    state: &AppState,
    jar: &CookieJar,
) -> provider_link_core::Result<Option<(SessionId, LocalUser)>, StoreError> {
    let Some(session_cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let session_id = SessionId::new(session_cookie.value().to_string());

    let Some(session) = state.sessions.find_session(&session_id).await? else {
        return Ok(None);
    };
    if session.is_expired() {
        debug!(%session_id, "session expired");
        state.sessions.delete_session(&session_id).await?;
        return Ok(None);
    }

    let user = state.users.find_user(session.user_id()).await?;
    Ok(user.map(|user| (session_id, user)))
}

async fn broken_link_response(
    state: &AppState,
    jar: CookieJar,
    session_id: Option<SessionId>,
    is_api: bool,
) -> Response {
    if is_api {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": INVALID_TOKEN_MESSAGE })),
        )
            .into_response();
    }

    if let Some(session_id) = session_id {
        warn!(%session_id, "provider link broken; ending session");
        if let Err(report) = state.sessions.delete_session(&session_id).await {
            error!(%session_id, error = %report, "failed to delete session");
        }
    }

    (
        jar.add(removal_cookie()),
        Redirect::to(&state.guard.logout_redirect_url),
    )
        .into_response()
}

/// Cookie that clears the session cookie.
pub(crate) fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO)
        .build()
}
