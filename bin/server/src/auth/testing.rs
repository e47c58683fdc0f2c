//! Fixture for router tests: in-memory stores, a scripted provider, and one
//! signed-in user ("Alice") with a live session.

use axum::http::{HeaderValue, header};
use axum_test::TestResponse;
use chrono::Duration;
use provider_link_platform_access::{
    ExternalAccountLink, LocalUser, ProviderConfig, Session, SessionId,
    memory::{InMemorySessionStore, InMemoryTokenStore, InMemoryUserDirectory, ScriptedProvider},
};
use std::sync::Arc;

use super::AppState;
use crate::config::{GuardConfig, SessionConfig};

pub(crate) struct Harness {
    pub state: Arc<AppState>,
    pub tokens: Arc<InMemoryTokenStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub sessions: Arc<InMemorySessionStore>,
    pub provider: Arc<ScriptedProvider>,
    pub user: LocalUser,
    pub session_id: SessionId,
}

pub(crate) fn harness() -> Harness {
    let tokens = Arc::new(InMemoryTokenStore::new());
    let users = Arc::new(InMemoryUserDirectory::new("example.org"));
    let sessions = Arc::new(InMemorySessionStore::new());
    let provider = Arc::new(ScriptedProvider::new());

    let user = LocalUser::new("Alice", "alice@user.example.org");
    users.insert(user.clone());
    let session_id = SessionId::new("sess-alice");
    sessions.insert(Session::new(
        session_id.clone(),
        user.id(),
        Duration::minutes(5),
    ));

    let provider_config =
        ProviderConfig::builder("client-1", "secret", "https://sso.example.org/token").build();
    let guard = GuardConfig {
        email_domain: "example.org".to_string(),
        ..GuardConfig::default()
    };
    let state = Arc::new(AppState::new(
        &provider_config,
        provider.clone(),
        tokens.clone(),
        users.clone(),
        sessions.clone(),
        SessionConfig::default(),
        guard,
    ));

    Harness {
        state,
        tokens,
        users,
        sessions,
        provider,
        user,
        session_id,
    }
}

impl Harness {
    /// A provider link for Alice with no expiry.
    pub fn link(&self) -> ExternalAccountLink {
        ExternalAccountLink::new(self.user.id(), "sso", "token-1")
            .with_refresh_secret("refresh-1")
            .with_member("Alice", "alice@example.org")
    }

    /// `Cookie` header carrying Alice's session.
    pub fn session_cookie(&self) -> HeaderValue {
        cookie_header(&self.session_id)
    }

    pub fn add_user(&self, name: &str) -> LocalUser {
        let user = LocalUser::new(name, format!("{}@user.example.org", name.to_lowercase()));
        self.users.insert(user.clone());
        user
    }

    /// Stores an already expired session for Alice and returns its ID.
    pub fn expired_session(&self) -> SessionId {
        let session_id = SessionId::new("sess-expired");
        self.sessions.insert(Session::new(
            session_id.clone(),
            self.user.id(),
            Duration::seconds(-1),
        ));
        session_id
    }
}

pub(crate) fn cookie_header(session_id: &SessionId) -> HeaderValue {
    HeaderValue::from_str(&format!("session={session_id}")).expect("cookie header")
}

/// Every `Set-Cookie` header on the response.
pub(crate) fn set_cookies(response: &TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}
