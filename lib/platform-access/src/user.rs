//! Local user record as seen by the token lifecycle.
//!
//! The host owns users; the lifecycle only ever rewrites the display name
//! and the contact email. Both are unique across the host. The contact
//! email is always synthetic; the member's real address is kept on the
//! external account link instead.

use chrono::{DateTime, Utc};
use provider_link_core::UserId;
use serde::{Deserialize, Serialize};

/// A local user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    /// Internal user ID.
    id: UserId,
    /// Unique display name. May carry a disambiguating suffix ("Ben 2").
    display_name: String,
    /// Unique, synthetic contact address.
    contact_email: String,
    /// When the user record was created.
    created_at: DateTime<Utc>,
    /// When the user record was last updated.
    updated_at: DateTime<Utc>,
}

impl LocalUser {
    /// Creates a new user with a fresh ID.
    #[must_use]
    pub fn new(display_name: impl Into<String>, contact_email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            display_name: display_name.into(),
            contact_email: contact_email.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes a user from storage.
    #[must_use]
    pub fn with_all_fields(
        id: UserId,
        display_name: String,
        contact_email: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            display_name,
            contact_email,
            created_at,
            updated_at,
        }
    }

    /// Returns the user's ID.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the synthetic contact email.
    #[must_use]
    pub fn contact_email(&self) -> &str {
        &self.contact_email
    }

    /// Returns when the user was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the user was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces the display name.
    pub fn set_display_name(&mut self, display_name: String) {
        self.display_name = display_name;
        self.updated_at = Utc::now();
    }

    /// Replaces the synthetic contact email.
    pub fn set_contact_email(&mut self, contact_email: String) {
        self.contact_email = contact_email;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_has_timestamps() {
        let before = Utc::now();
        let user = LocalUser::new("Alice", "alice@user.localhost");
        let after = Utc::now();

        assert!(user.id().to_string().starts_with("usr_"));
        assert!(user.created_at() >= before);
        assert!(user.created_at() <= after);
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn set_display_name_updates_timestamp() {
        let mut user = LocalUser::new("Alice", "alice@user.localhost");
        let original_updated_at = user.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(1));
        user.set_display_name("Alicia".to_string());

        assert_eq!(user.display_name(), "Alicia");
        assert!(user.updated_at() > original_updated_at);
    }

    #[test]
    fn with_all_fields_preserves_values() {
        let id = UserId::new();
        let created = Utc::now() - chrono::Duration::days(30);
        let updated = Utc::now() - chrono::Duration::days(1);

        let user = LocalUser::with_all_fields(
            id,
            "Ben 2".to_string(),
            "ben-2@user.localhost".to_string(),
            created,
            updated,
        );

        assert_eq!(user.id(), id);
        assert_eq!(user.display_name(), "Ben 2");
        assert_eq!(user.contact_email(), "ben-2@user.localhost");
        assert_eq!(user.created_at(), created);
        assert_eq!(user.updated_at(), updated);
    }
}
