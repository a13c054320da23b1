use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiResult;
use super::pagination::{self, PageParams};
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::notification_service::{self as notify, ReadFilter};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    /// all, unread or read
    pub filter: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    responses((status = 200, description = "The caller's notifications, newest first")),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<NotificationQuery>,
) -> ApiResult<impl IntoResponse> {
    let paging = PageParams {
        page: params.page,
        per_page: params.per_page,
    };
    let (page, per_page) = (paging.page(), paging.per_page());
    let result = notify::list_for_user(
        state.db(),
        claims.uid,
        ReadFilter::parse(params.filter.as_deref()),
        page,
        per_page,
    )
    .await?;

    Ok(Json(json!({
        "data": result.notifications,
        "meta": pagination::meta(result.total, page, per_page),
        "unread_count": result.unread_count,
    })))
}

pub async fn unread_count(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    let count = notify::unread_count(state.db(), claims.uid).await?;
    Ok(Json(json!({ "unread_count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let notification = notify::mark_read(state.db(), claims.uid, &id).await?;
    Ok(Json(json!({ "message": "Bildirim okundu olarak işaretlendi.", "data": notification })))
}

pub async fn mark_all_read(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    let updated = notify::mark_all_read(state.db(), claims.uid).await?;
    Ok(Json(json!({
        "message": "Tüm bildirimler okundu olarak işaretlendi.",
        "updated_count": updated,
    })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    notify::delete(state.db(), claims.uid, &id).await?;
    Ok(Json(json!({ "message": "Bildirim silindi." })))
}

pub async fn delete_read(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    let deleted = notify::delete_read(state.db(), claims.uid).await?;
    Ok(Json(json!({
        "message": "Okunmuş bildirimler silindi.",
        "deleted_count": deleted,
    })))
}
