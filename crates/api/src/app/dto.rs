//! Request/response DTOs and their conversion into domain input.
//!
//! Field-level validation (non-empty name, well-formed email, non-empty
//! password) happens in the conversion, so a DTO that converts cleanly is safe
//! to hand to the services.

use serde::{Deserialize, Serialize};

use usergate_core::{DomainResult, NewUser, PublicUser, UserFilter, UserPatch};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl CreateUserRequest {
    pub fn into_new_user(self) -> DomainResult<NewUser> {
        NewUser::new(&self.name, &self.email, self.password)
    }
}

#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn into_patch(self) -> DomainResult<UserPatch> {
        UserPatch::new(self.name.as_deref(), self.email.as_deref(), self.password)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListUsersQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListUsersQuery {
    pub fn filter(&self) -> UserFilter {
        UserFilter::new(self.name.clone(), self.email.clone())
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: PublicUser,
}
