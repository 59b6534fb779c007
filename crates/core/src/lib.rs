//! `usergate-core`: user directory domain primitives.
//!
//! This crate contains **pure domain** types (no IO, no HTTP, no storage).

pub mod email;
pub mod error;
pub mod id;
pub mod pagination;
pub mod user;

pub use email::Email;
pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use pagination::{Page, PageRequest, PageWindow, UserFilter};
pub use user::{NewUser, PublicUser, User, UserPatch};
