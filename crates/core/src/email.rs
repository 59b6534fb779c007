//! Email address value object.
//!
//! Addresses are trimmed and lower-cased on construction so that lookups and
//! the uniqueness rule do not depend on how a client capitalised its input.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A syntactically valid, normalised email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parse and normalise an email address.
    ///
    /// This is a structural check (one `@`, non-empty local part, dotted
    /// domain), not an RFC 5322 parser.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let normalised = raw.trim().to_lowercase();

        if normalised.is_empty() {
            return Err(DomainError::validation("email must not be empty"));
        }
        if normalised.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("email must not contain whitespace"));
        }

        let mut parts = normalised.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DomainError::validation("email must contain exactly one '@'"));
        };

        if local.is_empty() {
            return Err(DomainError::validation("email local part must not be empty"));
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(DomainError::validation("email domain is invalid"));
        }

        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
