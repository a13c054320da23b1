use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use utoipa::IntoParams;

use super::error::ApiResult;
use super::pagination::{self, PageParams};
use crate::auth::Claims;
use crate::domain::status::ItemStatus;
use crate::domain::{DomainError, ItemFilter};
use crate::infrastructure::AppState;
use crate::models::item;
use crate::models::transaction::{self, Entity as Transaction};
use crate::services::inventory_service::{self, ItemInput};

const DEFAULT_ITEMS_PER_PAGE: u64 = 50;
const RECENT_TRANSACTIONS: u64 = 10;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemQuery {
    /// Matches name, inventory number or location
    pub search: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    #[serde(default)]
    pub item_ids: Vec<i32>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkCategoryRequest {
    #[serde(default)]
    pub item_ids: Vec<i32>,
    pub category_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub item_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<i32>,
    pub search: Option<String>,
}

/// Loads an active item; staff may only see what they currently hold.
async fn visible_item(state: &AppState, claims: &Claims, id: i32) -> Result<item::Model, DomainError> {
    let item = state
        .item_repo
        .find_by_id(id)
        .await?
        .filter(|i| i.is_active)
        .ok_or_else(|| DomainError::not_found("Eşya bulunamadı"))?;

    if !claims.is_manager() && item.current_holder_id != Some(claims.uid) {
        return Err(DomainError::forbidden("Bu eşyayı görüntüleme yetkiniz yok"));
    }
    Ok(item)
}

async fn category_name(state: &AppState, category_id: i32) -> Result<Option<String>, DomainError> {
    Ok(state
        .category_repo
        .find_by_id(category_id)
        .await?
        .map(|c| c.category_name))
}

#[utoipa::path(
    get,
    path = "/api/items",
    params(ItemQuery),
    responses((status = 200, description = "Paginated items")),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<ItemQuery>,
) -> ApiResult<impl IntoResponse> {
    let paging = PageParams {
        page: params.page,
        per_page: params.per_page,
    };
    let page = paging.page();
    let per_page = paging.per_page_or(DEFAULT_ITEMS_PER_PAGE);

    let filter = ItemFilter {
        search: params.search,
        status: params.status,
        category_id: params.category_id,
        holder_id: (!claims.is_manager()).then_some(claims.uid),
        page,
        per_page,
    };
    let result = state.item_repo.find_all(filter).await?;

    let data: Vec<Value> = result
        .items
        .iter()
        .map(|(item, category)| item.to_json(category.as_deref()))
        .collect();
    Ok(Json(json!({
        "data": data,
        "meta": pagination::meta(result.total, page, per_page),
    })))
}

#[utoipa::path(
    post,
    path = "/api/items",
    responses(
        (status = 201, description = "Item created"),
        (status = 422, description = "Validation failed")
    ),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<ItemInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let created = inventory_service::create_item(state.db(), payload, &claims.sub).await?;
    state.ai.invalidate_cache_in_background("items");

    let category = category_name(&state, created.category_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Eşya başarıyla oluşturuldu.",
            "data": created.to_json(category.as_deref()),
        })),
    ))
}

pub async fn get_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let item = visible_item(&state, &claims, id).await?;
    let category = category_name(&state, item.category_id).await?;

    let recent = Transaction::find()
        .filter(transaction::Column::ItemId.eq(id))
        .order_by_desc(transaction::Column::CheckoutDate)
        .order_by_desc(transaction::Column::Id)
        .limit(RECENT_TRANSACTIONS)
        .all(state.db())
        .await?;

    let mut data = item.to_json(category.as_deref());
    data["transactions"] = json!(recent);
    Ok(Json(json!({ "data": data })))
}

pub async fn update_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<ItemInput>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let updated = inventory_service::update_item(state.db(), id, payload).await?;
    state.ai.invalidate_cache_in_background("items");

    let category = category_name(&state, updated.category_id).await?;
    Ok(Json(json!({
        "message": "Eşya başarıyla güncellendi.",
        "data": updated.to_json(category.as_deref()),
    })))
}

pub async fn delete_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    inventory_service::decommission(state.db(), id, &claims.sub).await?;
    state.ai.invalidate_cache_in_background("items");
    Ok(Json(json!({ "message": "Eşya envanterden çıkarıldı." })))
}

pub async fn item_stats(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    if !claims.is_manager() {
        let held = state.item_repo.count_held_by(claims.uid).await?;
        return Ok(Json(json!({ "data": { "my_items": held } })));
    }

    let mut by_status: BTreeMap<&str, u64> = ItemStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let counts = state.item_repo.count_by_status().await?;
    let mut total = 0;
    for (status, count) in &counts {
        total += count;
        if let Some(slot) = ItemStatus::parse(status).and_then(|s| by_status.get_mut(s.as_str())) {
            *slot = *count;
        }
    }

    Ok(Json(json!({
        "data": {
            "total": total,
            "by_status": by_status,
        }
    })))
}

pub async fn bulk_status(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<BulkStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let status = payload.status.unwrap_or_default();
    let updated =
        inventory_service::bulk_update_status(state.db(), &payload.item_ids, &status, &claims.sub).await?;
    state.ai.invalidate_cache_in_background("items");

    Ok(Json(json!({
        "message": format!("{} eşyanın durumu güncellendi.", updated),
        "updated_count": updated,
    })))
}

pub async fn bulk_category(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<BulkCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let updated =
        inventory_service::bulk_update_category(state.db(), &payload.item_ids, payload.category_id, &claims.sub)
            .await?;
    state.ai.invalidate_cache_in_background("items");

    Ok(Json(json!({
        "message": format!("{} eşyanın kategorisi güncellendi.", updated),
        "updated_count": updated,
    })))
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<BulkDeleteRequest>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let deleted = inventory_service::bulk_decommission(state.db(), &payload.item_ids, &claims.sub).await?;
    state.ai.invalidate_cache_in_background("items");

    Ok(Json(json!({
        "message": format!("{} eşya envanterden çıkarıldı.", deleted),
        "deleted_count": deleted,
    })))
}

pub async fn export_items(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<ExportQuery>,
) -> ApiResult<Response> {
    claims.require_manager()?;
    let rows = inventory_service::export_rows(
        state.db(),
        params.status.as_deref().filter(|s| !s.is_empty()),
        params.category_id,
        params.search.as_deref(),
    )
    .await?;

    match params.format.as_deref().unwrap_or("csv") {
        "csv" => {
            let body = inventory_service::export_csv(&rows)?;
            let filename = format!(
                "attachment; filename=\"inventory_{}.csv\"",
                chrono::Utc::now().format("%Y-%m-%d")
            );
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, filename),
                ],
                body,
            )
                .into_response())
        }
        "json" => Ok(Json(json!({ "data": rows, "total": rows.len() })).into_response()),
        _ => Err(DomainError::field("format", "Geçersiz format. Geçerli değerler: csv, json").into()),
    }
}

pub async fn item_history(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    visible_item(&state, &claims, id).await?;
    let events = inventory_service::history(state.db(), id).await?;
    Ok(Json(json!({ "data": events })))
}
