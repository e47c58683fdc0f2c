//! In-memory implementations of the host and provider seams.
//!
//! Used by tests here and in the server (via the `testing` feature). The
//! stores count writes and the provider records every call so tests can
//! assert on ordering and idempotence.

use async_trait::async_trait;
use provider_link_core::{AccountId, Result, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ProviderError, StoreError};
use crate::link::ExternalAccountLink;
use crate::naming;
use crate::provider::{ProviderClient, ProviderProfile, RefreshedToken};
use crate::session::{Session, SessionId};
use crate::store::{SessionStore, TokenStore, UserDirectory};
use crate::user::LocalUser;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Links kept in insertion order; later entries are newer.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    links: Mutex<Vec<ExternalAccountLink>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a link without counting it as a write.
    pub fn insert(&self, link: ExternalAccountLink) {
        lock(&self.links).push(link);
    }

    /// Returns the stored copy of a link.
    #[must_use]
    pub fn link(&self, account_id: AccountId) -> Option<ExternalAccountLink> {
        lock(&self.links)
            .iter()
            .find(|link| link.id() == account_id)
            .cloned()
    }

    /// Number of `save_link` calls so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent read fail.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database {
                details: "simulated read failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn find_link(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<ExternalAccountLink>, StoreError> {
        self.check_reads()?;
        Ok(lock(&self.links)
            .iter()
            .rev()
            .find(|link| link.user_id() == user_id && link.provider() == provider)
            .cloned())
    }

    async fn save_link(&self, link: &ExternalAccountLink) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut links = lock(&self.links);
        match links.iter_mut().find(|stored| stored.id() == link.id()) {
            Some(stored) => *stored = link.clone(),
            None => links.push(link.clone()),
        }
        Ok(())
    }

    async fn find_account(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Option<ExternalAccountLink>, StoreError> {
        self.check_reads()?;
        Ok(lock(&self.links)
            .iter()
            .find(|link| link.id() == account_id && link.user_id() == user_id)
            .cloned())
    }

    async fn delete_account(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let mut links = lock(&self.links);
        let before = links.len();
        links.retain(|link| !(link.id() == account_id && link.user_id() == user_id));
        Ok(links.len() != before)
    }
}

/// Users keyed by ID, with synthetic emails under `user.{email_domain}`.
#[derive(Debug)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<UserId, LocalUser>>,
    email_domain: String,
    writes: AtomicUsize,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new(email_domain: impl Into<String>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            email_domain: email_domain.into(),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seeds a user without counting it as a write.
    pub fn insert(&self, user: LocalUser) {
        lock(&self.users).insert(user.id(), user);
    }

    #[must_use]
    pub fn user(&self, user_id: UserId) -> Option<LocalUser> {
        lock(&self.users).get(&user_id).cloned()
    }

    /// Number of `save_user` calls so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, user_id: UserId) -> Result<Option<LocalUser>, StoreError> {
        Ok(self.user(user_id))
    }

    async fn save_user(&self, user: &LocalUser) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        lock(&self.users).insert(user.id(), user.clone());
        Ok(())
    }

    async fn generate_unique_display_name(&self, raw: &str) -> Result<String, StoreError> {
        let users = lock(&self.users);
        let taken = |name: &str| users.values().any(|user| user.display_name() == name);
        naming::display_name_candidates(raw)
            .find(|name| !taken(name))
            .ok_or_else(|| {
                StoreError::NotFound {
                    what: format!("free display name for {raw}"),
                }
                .into()
            })
    }

    async fn generate_unique_email(&self, raw: &str) -> Result<String, StoreError> {
        let users = lock(&self.users);
        let taken = |email: &str| users.values().any(|user| user.contact_email() == email);
        naming::email_candidates(raw, &self.email_domain)
            .find(|email| !taken(email))
            .ok_or_else(|| {
                StoreError::NotFound {
                    what: format!("free email for {raw}"),
                }
                .into()
            })
    }
}

/// Sessions keyed by ID.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        lock(&self.sessions).insert(session.id().clone(), session);
    }

    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        lock(&self.sessions).contains_key(id)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(lock(&self.sessions).get(id).cloned())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StoreError> {
        lock(&self.sessions).remove(id);
        Ok(())
    }
}

/// One recorded provider interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Validate(String),
    Refresh(String),
    FetchNotifyEmail(String),
}

/// Provider double with scripted answers.
///
/// By default validation is rejected (401), refresh is rejected (400) and
/// no notify email is known.
#[derive(Debug)]
pub struct ScriptedProvider {
    validate: Mutex<std::result::Result<ProviderProfile, ProviderError>>,
    refresh: Mutex<std::result::Result<RefreshedToken, ProviderError>>,
    notify_email: Mutex<std::result::Result<Option<String>, ProviderError>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            validate: Mutex::new(Err(ProviderError::Rejected { status: 401 })),
            refresh: Mutex::new(Err(ProviderError::Rejected { status: 400 })),
            notify_email: Mutex::new(Ok(None)),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_validate(&self, answer: std::result::Result<ProviderProfile, ProviderError>) {
        *lock(&self.validate) = answer;
    }

    pub fn set_refresh(&self, answer: std::result::Result<RefreshedToken, ProviderError>) {
        *lock(&self.refresh) = answer;
    }

    pub fn set_notify_email(&self, email: Option<&str>) {
        *lock(&self.notify_email) = Ok(email.map(str::to_string));
    }

    pub fn fail_notify_email(&self) {
        *lock(&self.notify_email) = Err(ProviderError::Transport {
            reason: "simulated timeout".to_string(),
        });
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: ProviderCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn validate(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        self.record(ProviderCall::Validate(access_token.to_string()));
        Ok(lock(&self.validate).clone()?)
    }

    async fn refresh(&self, refresh_secret: &str) -> Result<RefreshedToken, ProviderError> {
        self.record(ProviderCall::Refresh(refresh_secret.to_string()));
        Ok(lock(&self.refresh).clone()?)
    }

    async fn fetch_notify_email(
        &self,
        access_token: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.record(ProviderCall::FetchNotifyEmail(access_token.to_string()));
        Ok(lock(&self.notify_email).clone()?)
    }
}
