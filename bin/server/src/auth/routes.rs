//! Routes for logout, account disconnection and link status.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use provider_link_core::AccountId;
use provider_link_platform_access::{
    PROTECTED_ACCOUNT_MESSAGE, RequestContext, SessionId, TokenValidationOutcome,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{
    AppState,
    middleware::{AuthRejection, ProviderClientId, RequireAuth, SESSION_COOKIE, removal_cookie},
};

/// Cookie carrying a one-shot message for the next page.
pub const FLASH_COOKIE: &str = "flash";

/// Logs out the user by deleting their session.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        let session_id = SessionId::new(session_cookie.value().to_string());
        if let Err(report) = state.sessions.delete_session(&session_id).await {
            error!(%session_id, error = %report, "failed to delete session on logout");
        }
    }

    (
        jar.add(removal_cookie()),
        Redirect::to(&state.guard.logout_redirect_url),
    )
}

/// Disconnects one of the user's external accounts.
///
/// The provider account is protected: the request is refused with a flash
/// message. Any other account, or an ID that matches nothing, goes through
/// the normal delete.
pub async fn disconnect_account(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(account_id): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthRejection> {
    let redirect = Redirect::to(&state.guard.disconnect_redirect_url);

    let Ok(account_id) = AccountId::from_str(&account_id) else {
        debug!(%account_id, "malformed account id");
        return Ok((jar, redirect));
    };

    if state.protection.is_protected(account_id, user.id()).await {
        info!(%account_id, user_id = %user.id(), "refused to disconnect provider account");
        let flash = Cookie::build((FLASH_COOKIE, PROTECTED_ACCOUNT_MESSAGE))
            .path("/")
            .http_only(true)
            .secure(state.session_config.secure_cookies)
            .same_site(SameSite::Lax);
        return Ok((jar.add(flash), redirect));
    }

    let deleted = state
        .tokens
        .delete_account(account_id, user.id())
        .await
        .map_err(|report| {
            error!(%account_id, error = %report, "failed to disconnect account");
            AuthRejection::InternalError
        })?;
    if deleted {
        info!(%account_id, user_id = %user.id(), "account disconnected");
    }

    Ok((jar, redirect))
}

/// Body of `GET /api/link`.
#[derive(Debug, Serialize)]
pub struct LinkStatus {
    client_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    member_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    member_email: Option<String>,
}

/// Reports the state of the caller's provider link for this request.
///
/// A broken link never reaches this handler's response; the guard replaces
/// it with a 401.
pub async fn link_status(
    RequireAuth(_user): RequireAuth,
    Extension(ctx): Extension<Arc<RequestContext>>,
    Extension(ProviderClientId(client_id)): Extension<ProviderClientId>,
) -> Json<LinkStatus> {
    let outcome = ctx.outcome();
    let status = match outcome {
        Some(TokenValidationOutcome::Valid(_)) => "valid",
        Some(TokenValidationOutcome::Refreshed(_)) => "refreshed",
        Some(TokenValidationOutcome::Broken) => "broken",
        Some(TokenValidationOutcome::NotApplicable) | None => "not_applicable",
    };
    let link = outcome.and_then(TokenValidationOutcome::link);

    Json(LinkStatus {
        client_id,
        status,
        member_name: link.and_then(|link| link.member_name()).map(str::to_string),
        member_email: link.and_then(|link| link.member_email()).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use crate::auth::testing::{harness, set_cookies};
    use crate::router::build_router;
    use axum::http::{HeaderValue, StatusCode, header};
    use axum_test::TestServer;
    use provider_link_platform_access::{
        ExternalAccountLink, PROTECTED_ACCOUNT_MESSAGE, ProviderProfile,
    };
    use serde_json::json;

    fn location(response: &axum_test::TestResponse) -> Option<&HeaderValue> {
        response.headers().get(header::LOCATION)
    }

    #[tokio::test]
    async fn provider_account_cannot_be_disconnected() {
        let h = harness();
        let link = h.link();
        h.tokens.insert(link.clone());
        h.provider
            .set_validate(Ok(ProviderProfile::with_member_name("Alice")));
        let server = TestServer::new(build_router(h.state.clone())).expect("test server");

        let response = server
            .post(&format!("/accounts/{}/disconnect", link.id()))
            .add_header(header::COOKIE, h.session_cookie())
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            Some(&HeaderValue::from_static("/profile"))
        );
        let flash = format!("flash={};", PROTECTED_ACCOUNT_MESSAGE.replace(' ', "%20"));
        assert_eq!(
            flash,
            "flash=The%20provider%20account%20cannot%20be%20disconnected.;"
        );
        assert!(
            set_cookies(&response)
                .iter()
                .any(|cookie| cookie.starts_with(&flash))
        );
        assert!(h.tokens.link(link.id()).is_some());
    }

    #[tokio::test]
    async fn other_account_is_disconnected() {
        let h = harness();
        h.tokens.insert(h.link());
        let github = ExternalAccountLink::new(h.user.id(), "github", "gh-token");
        h.tokens.insert(github.clone());
        h.provider
            .set_validate(Ok(ProviderProfile::with_member_name("Alice")));
        let server = TestServer::new(build_router(h.state.clone())).expect("test server");

        let response = server
            .post(&format!("/accounts/{}/disconnect", github.id()))
            .add_header(header::COOKIE, h.session_cookie())
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            Some(&HeaderValue::from_static("/profile"))
        );
        assert!(
            !set_cookies(&response)
                .iter()
                .any(|cookie| cookie.starts_with("flash="))
        );
        assert!(h.tokens.link(github.id()).is_none());
    }

    #[tokio::test]
    async fn malformed_account_id_changes_nothing() {
        let h = harness();
        let link = h.link();
        h.tokens.insert(link.clone());
        h.provider
            .set_validate(Ok(ProviderProfile::with_member_name("Alice")));
        let server = TestServer::new(build_router(h.state.clone())).expect("test server");

        let response = server
            .post("/accounts/not-an-id/disconnect")
            .add_header(header::COOKIE, h.session_cookie())
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert!(h.tokens.link(link.id()).is_some());
    }

    #[tokio::test]
    async fn disconnect_requires_session() {
        let h = harness();
        let link = h.link();
        h.tokens.insert(link.clone());
        let server = TestServer::new(build_router(h.state.clone())).expect("test server");

        let response = server
            .post(&format!("/accounts/{}/disconnect", link.id()))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(h.tokens.link(link.id()).is_some());
    }

    #[tokio::test]
    async fn logout_ends_session() {
        let h = harness();
        let server = TestServer::new(build_router(h.state.clone())).expect("test server");

        let response = server
            .get("/auth/logout")
            .add_header(header::COOKIE, h.session_cookie())
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some(&HeaderValue::from_static("/")));
        assert!(
            set_cookies(&response)
                .iter()
                .any(|cookie| cookie.starts_with("session=;"))
        );
        assert!(!h.sessions.contains(&h.session_id));
    }

    #[tokio::test]
    async fn link_status_reports_valid_link() {
        let h = harness();
        h.tokens.insert(h.link());
        h.provider
            .set_validate(Ok(ProviderProfile::with_member_name("Alice")));
        h.provider.set_notify_email(Some("alice@city.example.org"));
        let server = TestServer::new(build_router(h.state.clone())).expect("test server");

        let response = server
            .get("/api/link")
            .add_header(header::COOKIE, h.session_cookie())
            .await;

        response.assert_status(StatusCode::OK);
        assert_eq!(
            response.json::<serde_json::Value>(),
            json!({
                "client_id": "client-1",
                "status": "valid",
                "member_name": "Alice",
                "member_email": "alice@city.example.org"
            })
        );
    }

    #[tokio::test]
    async fn link_status_without_link() {
        let h = harness();
        let server = TestServer::new(build_router(h.state.clone())).expect("test server");

        let response = server
            .get("/api/link")
            .add_header(header::COOKIE, h.session_cookie())
            .await;

        response.assert_status(StatusCode::OK);
        assert_eq!(
            response.json::<serde_json::Value>(),
            json!({"client_id": "client-1", "status": "not_applicable"})
        );
    }
}
