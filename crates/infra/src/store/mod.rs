//! Credential store: the only owner of persisted `User` records.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use usergate_core::{Email, PageWindow, User, UserFilter, UserId};

pub use in_memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;

/// Store operation error.
///
/// These are **infrastructure errors**. `Duplicate` is the only one callers
/// are expected to act on (it becomes a conflict); everything else is an
/// unexpected backend failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Duplicate(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Field changes for a partial update. `None` leaves the column untouched.
#[derive(Clone)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub password_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserChanges {
    /// Apply the changes to an in-memory record.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        user.updated_at = self.updated_at;
    }
}

impl core::fmt::Debug for UserChanges {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserChanges")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Persistence contract for users.
///
/// Implementations must enforce email uniqueness on `insert` and `update`
/// (reporting `StoreError::Duplicate`), order `list` by name then id, and
/// apply the same filter semantics in `count` and `list`.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn insert(&self, user: User) -> Result<(), StoreError>;

    /// Returns the updated record, or `None` if no record has that id.
    async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>, StoreError>;

    /// Returns whether a record was deleted.
    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;

    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError>;

    async fn list(&self, filter: &UserFilter, window: PageWindow) -> Result<Vec<User>, StoreError>;
}

#[async_trait::async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        (**self).insert(user).await
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>, StoreError> {
        (**self).update(id, changes).await
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        (**self).count(filter).await
    }

    async fn list(&self, filter: &UserFilter, window: PageWindow) -> Result<Vec<User>, StoreError> {
        (**self).list(filter, window).await
    }
}
