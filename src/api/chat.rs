use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::error::ApiResult;
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::chat_service::{self, FeedbackInput};

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub query: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/chat/ask",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "AI answer with tables and query metadata, or a canned fallback answer"),
        (status = 400, description = "Query contains forbidden characters"),
        (status = 422, description = "Query too short or too long"),
        (status = 503, description = "AI service unavailable")
    ),
    tag = "chat"
)]
pub async fn ask(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<ChatRequest>,
) -> ApiResult<Json<Value>> {
    let answer = chat_service::ask(state.db(), &state.ai, claims.uid, payload.query.as_deref()).await?;
    Ok(Json(answer))
}

pub async fn feedback(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<FeedbackInput>,
) -> ApiResult<impl IntoResponse> {
    let (created, saved) = chat_service::submit_feedback(state.db(), claims.uid, payload).await?;
    let (status, message) = if created {
        (StatusCode::CREATED, "Geri bildiriminiz kaydedildi. Teşekkür ederiz!")
    } else {
        (StatusCode::OK, "Geri bildiriminiz güncellendi.")
    };
    Ok((status, Json(json!({ "message": message, "feedback": saved }))))
}

pub async fn health(State(state): State<AppState>, _claims: Claims) -> impl IntoResponse {
    Json(json!({
        "ai_service": state.ai.health().await,
        "url": state.ai.base_url(),
    }))
}

pub async fn history(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<HistoryQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = chat_service::history(state.db(), claims.uid, params.limit, params.offset).await?;
    Ok(Json(json!({ "data": page.rows, "meta": page.meta() })))
}

pub async fn analytics(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<AnalyticsQuery>,
) -> ApiResult<impl IntoResponse> {
    claims.require_admin()?;
    let data = chat_service::analytics(state.db(), params.days.unwrap_or(30)).await?;
    Ok(Json(json!({ "data": data })))
}
