use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::error::ApiResult;
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::report_service::{self, ReportFilter, ReportType};

#[utoipa::path(
    get,
    path = "/api/reports/{type}",
    params(("type" = String, Path, description = "inventory, transactions, maintenance or purchase")),
    responses(
        (status = 200, description = "Report rows and summary"),
        (status = 422, description = "Unknown report type")
    ),
    tag = "reports"
)]
pub async fn generate(
    State(state): State<AppState>,
    claims: Claims,
    Path(report_type): Path<String>,
    Query(filter): Query<ReportFilter>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let report_type = ReportType::parse(&report_type)?;
    let report = report_service::generate(state.db(), report_type, &filter, state.loan_policy()).await?;
    Ok(Json(json!({ "data": report })))
}

pub async fn dashboard(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let data = report_service::dashboard(state.db(), state.loan_policy()).await?;
    Ok(Json(json!({ "data": data })))
}
