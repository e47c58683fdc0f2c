//! Postgres-backed implementations of the host seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use provider_link_core::{AccountId, Result, UserId};
use provider_link_platform_access::{
    ExternalAccountLink, LocalUser, Session, SessionId, SessionStore, StoreError, TokenStore,
    UserDirectory, naming,
};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

fn database(e: sqlx::Error) -> StoreError {
    StoreError::Database {
        details: e.to_string(),
    }
}

fn parse_id<T>(value: &str, what: &str) -> std::result::Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    T::from_str(value).map_err(|e| StoreError::Corrupt {
        details: format!("invalid {what} '{value}': {e}"),
    })
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    display_name: String,
    contact_email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> std::result::Result<LocalUser, StoreError> {
        Ok(LocalUser::with_all_fields(
            parse_id(&self.id, "user id")?,
            self.display_name,
            self.contact_email,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> std::result::Result<Session, StoreError> {
        Ok(Session::with_all_fields(
            SessionId::new(self.id),
            parse_id(&self.user_id, "user id")?,
            self.created_at,
            self.expires_at,
        ))
    }
}

/// Row type for external account queries.
#[derive(FromRow)]
struct AccountRow {
    id: String,
    user_id: String,
    provider: String,
    access_token: String,
    refresh_secret: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    extra_data: Value,
}

impl AccountRow {
    fn try_into_link(self) -> std::result::Result<ExternalAccountLink, StoreError> {
        let extra_data = match self.extra_data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(StoreError::Corrupt {
                    details: format!("extra_data of account {} is not an object: {other}", self.id),
                });
            }
        };
        Ok(ExternalAccountLink::with_all_fields(
            parse_id(&self.id, "account id")?,
            parse_id(&self.user_id, "user id")?,
            self.provider,
            self.access_token,
            self.refresh_secret,
            self.expires_at,
            extra_data,
        ))
    }
}

/// External account links in the `external_accounts` table.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn find_link(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<ExternalAccountLink>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, provider, access_token, refresh_secret, expires_at, extra_data
            FROM external_accounts
            WHERE user_id = $1 AND provider = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.to_string())
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        Ok(row.map(AccountRow::try_into_link).transpose()?)
    }

    async fn save_link(&self, link: &ExternalAccountLink) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO external_accounts
                (id, user_id, provider, access_token, refresh_secret, expires_at, extra_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                refresh_secret = EXCLUDED.refresh_secret,
                expires_at = EXCLUDED.expires_at,
                extra_data = EXCLUDED.extra_data
            "#,
        )
        .bind(link.id().to_string())
        .bind(link.user_id().to_string())
        .bind(link.provider())
        .bind(link.access_token())
        .bind(link.refresh_secret())
        .bind(link.expires_at())
        .bind(Value::Object(link.extra_data().clone()))
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(())
    }

    async fn find_account(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Option<ExternalAccountLink>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, provider, access_token, refresh_secret, expires_at, extra_data
            FROM external_accounts
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(account_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        Ok(row.map(AccountRow::try_into_link).transpose()?)
    }

    async fn delete_account(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM external_accounts
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(account_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(result.rows_affected() > 0)
    }
}

/// Users in the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
    email_domain: String,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool, email_domain: impl Into<String>) -> Self {
        Self {
            pool,
            email_domain: email_domain.into(),
        }
    }

    async fn is_taken(&self, column_query: &str, value: &str) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(column_query)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(database)?;
        Ok(taken)
    }
}

const DISPLAY_NAME_TAKEN: &str = "SELECT EXISTS (SELECT 1 FROM users WHERE display_name = $1)";
const EMAIL_TAKEN: &str = "SELECT EXISTS (SELECT 1 FROM users WHERE contact_email = $1)";

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_user(&self, user_id: UserId) -> Result<Option<LocalUser>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, contact_email, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        Ok(row.map(UserRow::try_into_user).transpose()?)
    }

    async fn save_user(&self, user: &LocalUser) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET display_name = $2, contact_email = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.display_name())
        .bind(user.contact_email())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(())
    }

    async fn generate_unique_display_name(&self, raw: &str) -> Result<String, StoreError> {
        for candidate in naming::display_name_candidates(raw) {
            if !self.is_taken(DISPLAY_NAME_TAKEN, &candidate).await? {
                return Ok(candidate);
            }
        }
        Err(StoreError::NotFound {
            what: format!("free display name for {raw}"),
        }
        .into())
    }

    async fn generate_unique_email(&self, raw: &str) -> Result<String, StoreError> {
        for candidate in naming::email_candidates(raw, &self.email_domain) {
            if !self.is_taken(EMAIL_TAKEN, &candidate).await? {
                return Ok(candidate);
            }
        }
        Err(StoreError::NotFound {
            what: format!("free email for {raw}"),
        }
        .into())
    }
}

/// Sessions in the `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, created_at, expires_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        Ok(row.map(SessionRow::try_into_session).transpose()?)
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(())
    }
}
