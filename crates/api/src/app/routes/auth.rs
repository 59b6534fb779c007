use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::IntoResponse,
    Json,
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub async fn sign_in(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::SignInRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;

    let issued = services.auth.sign_in(&body.email, &body.password).await?;

    Ok(Json(dto::TokenResponse {
        token: issued.token,
    }))
}

/// Identity carried by the token; no store lookup.
pub async fn me(Extension(current): Extension<CurrentUser>) -> impl IntoResponse {
    Json(dto::UserEnvelope {
        user: current.into_inner(),
    })
}
