use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use usergate_core::UserId;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = payload?;
    let input = body.into_new_user()?;

    services.directory.create(input).await?;

    Ok(StatusCode::CREATED)
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListUsersQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;

    let page = services
        .directory
        .find_all(query.filter(), query.page, query.limit)
        .await?;

    Ok(Json(page))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: UserId = id.parse()?;

    let user = services.directory.find_by_id(id).await?;

    Ok(Json(dto::UserEnvelope { user }))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<dto::UpdateUserRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id: UserId = id.parse()?;
    let Json(body) = payload?;
    let patch = body.into_patch()?;

    services.directory.update(id, patch).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: UserId = id.parse()?;

    services.directory.remove(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
