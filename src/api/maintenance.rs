use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use super::error::ApiResult;
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::maintenance_service::{
    self, AssignInput, CreateInput, MaintenanceFilter, ResolveInput, UpdateInput,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaintenanceQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub maintenance_type: Option<String>,
    pub assigned_to: Option<i32>,
    pub item_id: Option<i32>,
}

#[utoipa::path(
    post,
    path = "/api/maintenance-requests",
    responses(
        (status = 201, description = "Request created with SLA deadlines"),
        (status = 422, description = "Validation failed")
    ),
    tag = "maintenance"
)]
pub async fn create_request(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<CreateInput>,
) -> ApiResult<impl IntoResponse> {
    let (request, item) = maintenance_service::create(state.db(), claims.actor(), payload).await?;
    state.ai.invalidate_cache_in_background("maintenance");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Bakım talebi oluşturuldu.",
            "data": maintenance_service::to_json(&request, Some(&item), Utc::now()),
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/api/maintenance-requests",
    params(MaintenanceQuery),
    responses((status = 200, description = "Requests ordered by priority")),
    tag = "maintenance"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<MaintenanceQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = MaintenanceFilter {
        status: params.status,
        priority: params.priority,
        maintenance_type: params.maintenance_type,
        assigned_to: params.assigned_to,
        item_id: params.item_id,
    };
    let rows = maintenance_service::list(state.db(), claims.actor(), filter).await?;
    Ok(Json(json!({ "data": rows, "total": rows.len() })))
}

pub async fn get_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let data = maintenance_service::show(state.db(), claims.actor(), id).await?;
    Ok(Json(json!({ "data": data })))
}

pub async fn update_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let request = maintenance_service::update(state.db(), id, payload).await?;
    Ok(Json(json!({ "message": "Bakım talebi güncellendi.", "data": request })))
}

pub async fn assign_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<AssignInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let request = maintenance_service::assign(state.db(), id, payload).await?;
    Ok(Json(json!({ "message": "Bakım talebi atandı.", "data": request })))
}

pub async fn complete_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<ResolveInput>,
) -> ApiResult<impl IntoResponse> {
    let request = maintenance_service::complete(state.db(), claims.actor(), id, payload).await?;
    state.ai.invalidate_cache_in_background("maintenance");
    Ok(Json(json!({ "message": "Bakım talebi tamamlandı.", "data": request })))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<ResolveInput>,
) -> ApiResult<impl IntoResponse> {
    let request = maintenance_service::cancel(state.db(), claims.actor(), id, payload).await?;
    Ok(Json(json!({ "message": "Bakım talebi iptal edildi.", "data": request })))
}

pub async fn delete_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    maintenance_service::soft_delete(state.db(), id).await?;
    Ok(Json(json!({ "message": "Bakım talebi silindi." })))
}

pub async fn statistics(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    let stats = maintenance_service::statistics(state.db(), claims.actor()).await?;
    Ok(Json(json!({ "data": stats })))
}
