use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use usergate_infra::AuthFlow;

use crate::app::errors::ApiError;
use crate::context::CurrentUser;

#[derive(Clone)]
pub struct GateState {
    pub auth: Arc<AuthFlow>,
}

/// Request gate: reject with 401 unless the bearer token resolves to an
/// identity, then expose it to handlers as [`CurrentUser`].
pub async fn require_identity(
    State(state): State<GateState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers()).ok_or(ApiError::Unauthorized)?;

    let user = state.auth.resolve_identity(token)?;

    req.extensions_mut().insert(CurrentUser::new(user));

    Ok(next.run(req).await)
}

/// `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;

    let (scheme, token) = header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(token)
}
