//! One-way salted password hashing.

use thiserror::Error;

/// bcrypt work factor used unless configured otherwise.
///
/// Tuned for interactive sign-in latency rather than maximum resistance.
pub const DEFAULT_COST: u32 = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid bcrypt cost {0} (expected 4..=31)")]
    InvalidCost(u32),
}

/// Hash and verify passwords.
///
/// Implementations are CPU-bound; async callers should run them on the
/// blocking pool.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError>;

    /// `false` on mismatch and on a malformed hash; never an error.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// bcrypt-backed hasher (random per-hash salt embedded in the output).
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        if !(4..=31).contains(&cost) {
            return Err(PasswordError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        match bcrypt::verify(plaintext, hash) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::debug!(error = %e, "stored password hash could not be parsed");
                false
            }
        }
    }
}

impl<H> PasswordHasher for std::sync::Arc<H>
where
    H: PasswordHasher + ?Sized,
{
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        (**self).hash(plaintext)
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        (**self).verify(plaintext, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_and_never_equals_plaintext() {
        let hasher = BcryptHasher::default();
        let hash = hasher.hash("password123").unwrap();

        assert_ne!(hash, "password123");
        assert!(hash.starts_with("$2b$08$"));
        assert!(hasher.verify("password123", &hash));
        assert!(!hasher.verify("password124", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = BcryptHasher::default();
        let a = hasher.hash("secret").unwrap();
        let b = hasher.hash("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_verifies_false() {
        let hasher = BcryptHasher::default();
        assert!(!hasher.verify("secret", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("secret", ""));
    }

    #[test]
    fn cost_is_range_checked() {
        assert_eq!(BcryptHasher::new(3).unwrap_err(), PasswordError::InvalidCost(3));
        assert_eq!(BcryptHasher::new(12).unwrap().cost(), 12);
    }
}
