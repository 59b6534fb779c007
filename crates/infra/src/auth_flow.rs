//! Sign-in and token-to-identity resolution.
//!
//! Every way a sign-in can fail (bad email syntax, unknown email, wrong
//! password, store or signing trouble) ends in the same
//! [`AuthError::Unauthorized`]. The specific cause only reaches `debug` logs.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use usergate_auth::{IssuedToken, PasswordHasher, TokenError, TokenService};
use usergate_core::{Email, PublicUser, User};

use crate::directory::{DirectoryError, UserDirectory};
use crate::log_forwarder::LogForwarder;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials.")]
    Unauthorized,
}

/// Internal reasons a sign-in was rejected. Never leaves this module.
#[derive(Debug, Error)]
enum SignInFailure {
    #[error("email is not well-formed")]
    InvalidEmail,

    #[error("no user with that email")]
    UnknownEmail,

    #[error("password does not match")]
    PasswordMismatch,

    #[error("user lookup failed: {0}")]
    Lookup(DirectoryError),

    #[error("password verification did not complete: {0}")]
    Verify(String),

    #[error("token issuance failed: {0}")]
    Token(TokenError),
}

pub struct AuthFlow {
    directory: Arc<UserDirectory>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenService>,
    logs: LogForwarder,
}

impl AuthFlow {
    pub fn new(
        directory: Arc<UserDirectory>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenService>,
        logs: LogForwarder,
    ) -> Self {
        Self {
            directory,
            hasher,
            tokens,
            logs,
        }
    }

    /// Exchange email + password for a signed session token.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        match self.try_sign_in(email, password).await {
            Ok((user, issued)) => {
                tracing::info!(user_id = %user.id, "sign-in succeeded");
                self.logs
                    .forward("auth.sign_in.succeeded", json!({ "id": user.id }));
                Ok(issued)
            }
            Err(failure) => {
                tracing::debug!(reason = %failure, "sign-in rejected");
                let email = Email::parse(email).ok().map(Email::into_inner);
                self.logs
                    .forward("auth.sign_in.failed", json!({ "email": email }));
                Err(AuthError::Unauthorized)
            }
        }
    }

    /// Verify a bearer token and return the identity it carries.
    pub fn resolve_identity(&self, token: &str) -> Result<PublicUser, AuthError> {
        self.tokens
            .verify(token)
            .map(|claims| claims.sub)
            .map_err(|e| {
                tracing::debug!(reason = %e, "token rejected");
                AuthError::Unauthorized
            })
    }

    async fn try_sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(PublicUser, IssuedToken), SignInFailure> {
        let email = Email::parse(email).map_err(|_| SignInFailure::InvalidEmail)?;

        let user = self
            .directory
            .find_by_email(&email)
            .await
            .map_err(SignInFailure::Lookup)?
            .ok_or(SignInFailure::UnknownEmail)?;

        if !self.verify_password(password, &user).await? {
            return Err(SignInFailure::PasswordMismatch);
        }

        let public = user.into_public();
        let issued = self.tokens.issue(&public).map_err(SignInFailure::Token)?;
        Ok((public, issued))
    }

    async fn verify_password(&self, password: &str, user: &User) -> Result<bool, SignInFailure> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let hash = user.password_hash.clone();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| SignInFailure::Verify(e.to_string()))
    }
}

impl core::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthFlow")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Utc};
    use usergate_auth::{BcryptHasher, Hs256TokenService, SigningSecret};
    use usergate_core::{NewUser, UserPatch};
    use usergate_events::{InMemoryEventBus, LogEvent, Subscription};

    use crate::store::InMemoryUserStore;

    struct Fixture {
        auth: AuthFlow,
        directory: Arc<UserDirectory>,
        tokens: Arc<Hs256TokenService>,
        events: Subscription<LogEvent>,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(InMemoryEventBus::<LogEvent>::new());
        let events = bus.subscribe();
        let logs = LogForwarder::new(bus).unwrap();

        let hasher = Arc::new(BcryptHasher::new(4).unwrap());
        let tokens = Arc::new(Hs256TokenService::new(
            &SigningSecret::new("test-secret"),
            Duration::hours(1),
        ));
        let directory = Arc::new(UserDirectory::new(
            Arc::new(InMemoryUserStore::new()),
            hasher.clone(),
            logs.clone(),
        ));

        let auth = AuthFlow::new(directory.clone(), hasher, tokens.clone(), logs);
        Fixture {
            auth,
            directory,
            tokens,
            events,
        }
    }

    async fn register(fx: &Fixture) -> PublicUser {
        fx.directory
            .create(NewUser::new("John Doe", "john@test.com", "password").unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sign_in_then_resolve_identity_round_trips() {
        let fx = fixture();
        let user = register(&fx).await;

        let issued = fx.auth.sign_in("John@Test.com", "password").await.unwrap();
        let identity = fx.auth.resolve_identity(&issued.token).unwrap();

        assert_eq!(identity.id, user.id);
        assert_eq!(identity.email, user.email);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let fx = fixture();
        register(&fx).await;

        let wrong_password = fx.auth.sign_in("john@test.com", "nope").await.unwrap_err();
        let unknown_email = fx.auth.sign_in("ghost@test.com", "password").await.unwrap_err();
        let bad_syntax = fx.auth.sign_in("not-an-email", "password").await.unwrap_err();

        assert_eq!(wrong_password, AuthError::Unauthorized);
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(unknown_email, bad_syntax);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.to_string(), "Invalid credentials.");
    }

    #[tokio::test]
    async fn password_change_takes_effect_on_next_sign_in() {
        let fx = fixture();
        let user = register(&fx).await;

        let patch = UserPatch::new(None, None, Some("new".to_string())).unwrap();
        fx.directory.update(user.id, patch).await.unwrap();

        assert!(fx.directory.find_by_id(user.id).await.is_ok());
        assert!(fx.auth.sign_in("john@test.com", "new").await.is_ok());
        assert_eq!(
            fx.auth.sign_in("john@test.com", "password").await.unwrap_err(),
            AuthError::Unauthorized
        );
    }

    #[tokio::test]
    async fn expired_or_foreign_tokens_are_rejected() {
        let fx = fixture();
        let user = register(&fx).await;

        let expired = fx
            .tokens
            .issue_at(&user, Utc::now() - Duration::hours(2))
            .unwrap();
        assert_eq!(
            fx.auth.resolve_identity(&expired.token).unwrap_err(),
            AuthError::Unauthorized
        );

        let foreign = Hs256TokenService::new(&SigningSecret::new("other"), Duration::hours(1))
            .issue(&user)
            .unwrap();
        assert_eq!(
            fx.auth.resolve_identity(&foreign.token).unwrap_err(),
            AuthError::Unauthorized
        );
        assert!(fx.auth.resolve_identity("garbage").is_err());
    }

    #[tokio::test]
    async fn failed_sign_in_event_carries_no_reason() {
        let fx = fixture();
        register(&fx).await;
        let _ = fx.auth.sign_in("JOHN@test.com", "nope").await;

        // user.created and the failure; arrival order is not fixed.
        let timeout = StdDuration::from_secs(5);
        let events = [
            fx.events.recv_timeout(timeout).unwrap(),
            fx.events.recv_timeout(timeout).unwrap(),
        ];
        let failed = events
            .iter()
            .find(|e| e.pattern() == "auth.sign_in.failed")
            .unwrap();
        assert_eq!(failed.payload(), &json!({ "email": "john@test.com" }));
    }
}
