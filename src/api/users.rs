use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiResult;
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::user_service::{self, CreateUserInput, UpdateUserInput};

#[derive(Deserialize)]
pub struct RoleChange {
    role: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users"),
        (status = 403, description = "Managers only")
    ),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let users = user_service::list(state.db()).await?;
    Ok(Json(json!({ "data": users })))
}

pub async fn create_user(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<CreateUserInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let user = user_service::create(state.db(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Kullanıcı oluşturuldu.", "data": user })),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let user = user_service::update(state.db(), id, payload).await?;
    Ok(Json(json!({ "message": "Kullanıcı başarıyla güncellendi", "data": user })))
}

pub async fn update_role(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<RoleChange>,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let user = user_service::update_role(state.db(), id, payload.role.as_deref()).await?;
    Ok(Json(json!({ "message": "Kullanıcı rolü güncellendi.", "data": user })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    user_service::delete(state.db(), claims.uid, id).await?;
    Ok(Json(json!({ "message": "Kullanıcı silindi." })))
}

pub async fn list_roles(State(state): State<AppState>, _claims: Claims) -> ApiResult<impl IntoResponse> {
    let roles = user_service::list_roles(state.db()).await?;
    Ok(Json(json!({ "data": roles })))
}
