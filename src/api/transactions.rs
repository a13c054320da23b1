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
use super::pagination::{self, PageParams};
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::transaction_service::{
    self, CancelInput, CheckoutInput, ExtendInput, ReturnInput, TransactionFilter,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    /// active, returned, late_return, cancelled or overdue
    pub status: Option<String>,
    pub user_id: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/transactions/checkout",
    responses(
        (status = 201, description = "Item checked out"),
        (status = 400, description = "Item not available or borrower blocked"),
        (status = 409, description = "Item already has an open loan")
    ),
    tag = "transactions"
)]
pub async fn checkout(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<CheckoutInput>,
) -> ApiResult<impl IntoResponse> {
    let policy = state.loan_policy();
    let (loan, item) =
        transaction_service::checkout(state.db(), policy, claims.actor(), payload).await?;
    state.ai.invalidate_cache_in_background("transactions");

    let data = transaction_service::to_json(&loan, Some(&item), None, Utc::now(), policy);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Eşya başarıyla ödünç verildi.", "data": data })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/transactions/{id}/return",
    params(("id" = i32, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Item returned"),
        (status = 400, description = "Transaction is not active")
    ),
    tag = "transactions"
)]
pub async fn return_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    payload: Option<Json<ReturnInput>>,
) -> ApiResult<impl IntoResponse> {
    let policy = state.loan_policy();
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    let outcome = transaction_service::return_item(state.db(), policy, claims.actor(), id, input).await?;
    state.ai.invalidate_cache_in_background("transactions");

    let message = if outcome.was_overdue {
        format!(
            "Eşya {} gün gecikmeyle iade alındı. Gecikme ücreti: {:.2} TL",
            outcome.days_overdue, outcome.late_fee
        )
    } else {
        "Eşya başarıyla iade alındı.".to_string()
    };
    Ok(Json(json!({
        "message": message,
        "data": transaction_service::to_json(&outcome.transaction, Some(&outcome.item), None, Utc::now(), policy),
        "was_overdue": outcome.was_overdue,
        "days_overdue": outcome.days_overdue,
        "late_fee": outcome.late_fee,
        "maintenance_request": outcome.maintenance_request,
    })))
}

#[utoipa::path(
    get,
    path = "/api/transactions",
    params(TransactionQuery),
    responses((status = 200, description = "Paginated transactions")),
    tag = "transactions"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<TransactionQuery>,
) -> ApiResult<impl IntoResponse> {
    let paging = PageParams {
        page: params.page,
        per_page: params.per_page,
    };
    let filter = TransactionFilter {
        status: params.status,
        user_id: params.user_id,
        date_from: params.date_from,
        date_to: params.date_to,
        search: params.search,
        page: paging.page(),
        per_page: paging.per_page(),
    };
    let page = transaction_service::list(state.db(), state.loan_policy(), claims.actor(), filter).await?;

    Ok(Json(json!({
        "data": page.rows,
        "meta": pagination::meta(page.total, page.page, page.per_page),
    })))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let data = transaction_service::find_one(state.db(), state.loan_policy(), claims.actor(), id).await?;
    Ok(Json(json!({ "data": data })))
}

pub async fn overdue(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let report = transaction_service::overdue_report(state.db(), state.loan_policy()).await?;
    Ok(Json(json!({ "data": report })))
}

pub async fn my_loans(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    let loans = transaction_service::my_loans(state.db(), state.loan_policy(), claims.actor()).await?;
    Ok(Json(json!({ "data": loans })))
}

pub async fn stats(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    let stats = transaction_service::stats(state.db(), state.loan_policy(), claims.actor()).await?;
    Ok(Json(json!({ "data": stats })))
}

pub async fn extend(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<ExtendInput>,
) -> ApiResult<impl IntoResponse> {
    let loan = transaction_service::extend(state.db(), claims.actor(), id, payload).await?;
    Ok(Json(json!({
        "message": "Ödünç süresi uzatıldı.",
        "data": transaction_service::to_json(&loan, None, None, Utc::now(), state.loan_policy()),
    })))
}

pub async fn cancel(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<CancelInput>,
) -> ApiResult<impl IntoResponse> {
    let loan = transaction_service::cancel(state.db(), claims.actor(), id, payload).await?;
    state.ai.invalidate_cache_in_background("transactions");
    Ok(Json(json!({
        "message": "Ödünç işlemi iptal edildi.",
        "data": loan,
    })))
}

pub async fn pay_fee(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let loan = transaction_service::pay_fee(state.db(), id).await?;
    Ok(Json(json!({
        "message": "Gecikme ücreti ödendi olarak işaretlendi.",
        "data": loan,
    })))
}
