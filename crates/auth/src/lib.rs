//! `usergate-auth`: password hashing and session tokens.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod password;
pub mod token;

pub use claims::{IssuedToken, SessionClaims, TokenError};
pub use password::{BcryptHasher, PasswordError, PasswordHasher, DEFAULT_COST};
pub use token::{Hs256TokenService, SigningSecret, TokenService};
