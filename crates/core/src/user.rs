//! The `User` entity and the shapes derived from it.
//!
//! `User` is the full persisted record and intentionally does not implement
//! `Serialize`: the only outward shape is [`PublicUser`], which has no
//! password hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::email::Email;
use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Persisted user record.
///
/// # Invariants
/// - `id` is immutable after creation.
/// - `name` is non-empty (trimmed).
/// - `email` is unique across all users (enforced by the store).
/// - `password_hash` never leaves the directory boundary.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Sanitized copy of this record.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn into_public(self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name,
            email: self.email,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// User as seen by API callers and embedded in session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating a user. Holds the plaintext password until
/// the directory hashes it.
#[derive(Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password: String,
}

impl NewUser {
    pub fn new(name: &str, email: &str, password: impl Into<String>) -> DomainResult<Self> {
        let password = password.into();
        validate_password(&password)?;

        Ok(Self {
            name: validate_name(name)?,
            email: Email::parse(email)?,
            password,
        })
    }
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Partial update: only `Some` fields change.
#[derive(Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub password: Option<String>,
}

impl UserPatch {
    /// Validate each supplied field with the same rules as [`NewUser`].
    pub fn new(
        name: Option<&str>,
        email: Option<&str>,
        password: Option<String>,
    ) -> DomainResult<Self> {
        if let Some(password) = password.as_deref() {
            validate_password(password)?;
        }

        Ok(Self {
            name: name.map(validate_name).transpose()?,
            email: email.map(Email::parse).transpose()?,
            password,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

impl core::fmt::Debug for UserPatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserPatch")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn validate_name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Name should not be empty"));
    }
    Ok(name.to_string())
}

fn validate_password(password: &str) -> DomainResult<()> {
    if password.is_empty() {
        return Err(DomainError::validation("Password should not be empty"));
    }
    Ok(())
}
