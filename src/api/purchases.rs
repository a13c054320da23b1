use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiResult;
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::purchase_service::{
    self, ApproveInput, OrderInput, PurchaseFilter, PurchaseInput, ReceiveInput, RejectInput,
};

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub mine: bool,
}

pub async fn list_requests(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<PurchaseQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = PurchaseFilter {
        status: params.status,
        priority: params.priority,
        mine_only: params.mine,
    };
    let rows = purchase_service::list(state.db(), claims.actor(), filter).await?;
    Ok(Json(json!({ "data": rows, "total": rows.len() })))
}

pub async fn get_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let request = purchase_service::show(state.db(), claims.actor(), id).await?;
    Ok(Json(json!({ "data": request })))
}

#[utoipa::path(
    post,
    path = "/api/purchase-requests",
    responses(
        (status = 201, description = "Request submitted"),
        (status = 422, description = "Validation failed")
    ),
    tag = "purchases"
)]
pub async fn create_request(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<PurchaseInput>,
) -> ApiResult<impl IntoResponse> {
    let request = purchase_service::create(state.db(), claims.actor(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Satın alma talebi oluşturuldu.", "data": request })),
    ))
}

pub async fn update_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<PurchaseInput>,
) -> ApiResult<impl IntoResponse> {
    let request = purchase_service::update(state.db(), claims.actor(), id, payload).await?;
    Ok(Json(json!({ "message": "Satın alma talebi güncellendi.", "data": request })))
}

#[utoipa::path(
    post,
    path = "/api/purchase-requests/{id}/approve",
    params(("id" = i32, Path, description = "Purchase request id")),
    responses(
        (status = 200, description = "Request approved"),
        (status = 422, description = "Request is not pending")
    ),
    tag = "purchases"
)]
pub async fn approve(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    payload: Option<Json<ApproveInput>>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    let request = purchase_service::approve(state.db(), claims.actor(), id, input).await?;
    Ok(Json(json!({ "message": "Satın alma talebi onaylandı.", "data": request })))
}

pub async fn reject(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<RejectInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let request = purchase_service::reject(state.db(), claims.actor(), id, payload).await?;
    Ok(Json(json!({ "message": "Satın alma talebi reddedildi.", "data": request })))
}

pub async fn order(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    payload: Option<Json<OrderInput>>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    let request = purchase_service::order(state.db(), id, input).await?;
    Ok(Json(json!({ "message": "Sipariş verildi.", "data": request })))
}

pub async fn receive(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<ReceiveInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let request = purchase_service::receive(state.db(), id, payload).await?;
    Ok(Json(json!({ "message": "Sipariş teslim alındı.", "data": request })))
}

pub async fn cancel(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let request = purchase_service::cancel(state.db(), claims.actor(), id).await?;
    Ok(Json(json!({ "message": "Satın alma talebi iptal edildi.", "data": request })))
}

pub async fn delete_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    purchase_service::soft_delete(state.db(), claims.actor(), id).await?;
    Ok(Json(json!({ "message": "Satın alma talebi silindi." })))
}

pub async fn statistics(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    let stats = purchase_service::statistics(state.db(), claims.actor()).await?;
    Ok(Json(json!({ "data": stats })))
}
