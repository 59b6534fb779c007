//! HS256 session token issuance and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use usergate_core::PublicUser;

use crate::claims::{IssuedToken, SessionClaims, TokenError};

/// Sign and verify bearer tokens carrying a [`SessionClaims`] payload.
pub trait TokenService: Send + Sync {
    fn issue(&self, user: &PublicUser) -> Result<IssuedToken, TokenError>;

    /// Fails on a bad signature, an expired token, or anything that does not
    /// decode into [`SessionClaims`]. No other checks are made.
    fn verify(&self, token: &str) -> Result<SessionClaims, TokenError>;
}

/// Process-wide signing secret.
///
/// Built once from configuration at startup and handed to the token service;
/// there is no runtime rotation.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// [`TokenService`] using a shared HMAC-SHA256 secret.
#[derive(Clone)]
pub struct Hs256TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl Hs256TokenService {
    pub fn new(secret: &SigningSecret, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, user: &PublicUser, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.ttl;
        let claims = SessionClaims::new(user.clone(), now, expires_at);

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }
}

impl TokenService for Hs256TokenService {
    fn issue(&self, user: &PublicUser) -> Result<IssuedToken, TokenError> {
        self.issue_at(user, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })
    }
}

impl core::fmt::Debug for Hs256TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenService")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<T> TokenService for std::sync::Arc<T>
where
    T: TokenService + ?Sized,
{
    fn issue(&self, user: &PublicUser) -> Result<IssuedToken, TokenError> {
        (**self).issue(user)
    }

    fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        (**self).verify(token)
    }
}
