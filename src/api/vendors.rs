use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

use super::error::ApiResult;
use crate::auth::Claims;
use crate::domain::{clock, FieldErrors};
use crate::infrastructure::AppState;
use crate::models::vendor::{self, Entity as Vendor};

#[derive(Deserialize)]
pub struct VendorPayload {
    vendor_name: Option<String>,
    contact_info: Option<String>,
}

pub async fn list_vendors(State(state): State<AppState>, _claims: Claims) -> ApiResult<impl IntoResponse> {
    let vendors = Vendor::find()
        .order_by_asc(vendor::Column::VendorName)
        .all(state.db())
        .await?;
    Ok(Json(json!({ "data": vendors })))
}

pub async fn create_vendor(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<VendorPayload>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;

    let name = payload.vendor_name.as_deref().map(str::trim).unwrap_or_default();
    let mut errors = FieldErrors::default();
    errors.require("vendor_name", Some(name), "Tedarikçi adı zorunludur");
    errors.max_len("vendor_name", Some(name), 255, "Tedarikçi adı en fazla 255 karakter olabilir");
    errors.max_len(
        "contact_info",
        payload.contact_info.as_deref(),
        500,
        "İletişim bilgisi en fazla 500 karakter olabilir",
    );
    if !name.is_empty()
        && Vendor::find()
            .filter(vendor::Column::VendorName.eq(name))
            .one(state.db())
            .await?
            .is_some()
    {
        errors.add("vendor_name", "Bu tedarikçi zaten kayıtlı");
    }
    errors.into_result()?;

    let now = clock::now_ts();
    let created = vendor::ActiveModel {
        vendor_name: Set(name.to_string()),
        contact_info: Set(payload.contact_info),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(state.db())
    .await?;

    tracing::info!(vendor_id = created.id, "Vendor created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Tedarikçi oluşturuldu.", "data": created })),
    ))
}
