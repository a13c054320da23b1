use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::error::ApiResult;
use crate::auth::Claims;
use crate::domain::validation::parse_category_schema;
use crate::domain::{CategoryInput, DomainError, FieldErrors};
use crate::infrastructure::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CategoryPayload {
    pub category_name: Option<String>,
    pub description: Option<String>,
    /// Either a JSON object or its text form
    #[schema(value_type = Object)]
    pub schema_definition: Option<Value>,
}

/// Schema documents arrive as objects or as strings; both are stored as text.
fn schema_text(raw: &Option<Value>) -> Option<String> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

async fn validate(
    state: &AppState,
    payload: &CategoryPayload,
    existing_id: Option<i32>,
) -> Result<Option<String>, DomainError> {
    let mut errors = FieldErrors::default();
    let name = payload.category_name.as_deref().map(str::trim);

    if existing_id.is_none() || payload.category_name.is_some() {
        errors.require("category_name", name, "Kategori adı zorunludur");
    }
    errors.max_len("category_name", name, 100, "Kategori adı en fazla 100 karakter olabilir");
    errors.max_len(
        "description",
        payload.description.as_deref(),
        500,
        "Açıklama en fazla 500 karakter olabilir",
    );

    if let Some(name) = name.filter(|n| !n.is_empty()) {
        if let Some(other) = state.category_repo.find_by_name(name).await? {
            if Some(other.id) != existing_id {
                errors.add("category_name", "Bu kategori adı zaten kullanılıyor");
            }
        }
    }

    let schema = schema_text(&payload.schema_definition);
    if let Some(raw) = schema.as_deref() {
        if let Err(msg) = parse_category_schema(raw) {
            errors.add("schema_definition", msg);
        }
    }

    errors.into_result()?;
    Ok(schema)
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "Categories with item counts")),
    tag = "categories"
)]
pub async fn list_categories(State(state): State<AppState>, _claims: Claims) -> ApiResult<impl IntoResponse> {
    let categories = state.category_repo.find_all().await?;
    Ok(Json(json!({ "data": categories })))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CategoryPayload,
    responses(
        (status = 201, description = "Category created"),
        (status = 422, description = "Validation failed")
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<CategoryPayload>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let schema = validate(&state, &payload, None).await?;

    let category = state
        .category_repo
        .create(CategoryInput {
            category_name: payload.category_name.unwrap_or_default().trim().to_string(),
            description: payload.description,
            schema_definition: schema,
        })
        .await?;

    tracing::info!(category_id = category.id, "Category created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Kategori oluşturuldu.", "data": category })),
    ))
}

pub async fn get_category(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let category = state
        .category_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| DomainError::not_found("Kategori bulunamadı"))?;
    Ok(Json(json!({ "data": category })))
}

pub async fn update_category(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<CategoryPayload>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    let existing = state
        .category_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| DomainError::not_found("Kategori bulunamadı"))?;
    let schema = validate(&state, &payload, Some(id)).await?;

    let input = CategoryInput {
        category_name: payload
            .category_name
            .map(|n| n.trim().to_string())
            .unwrap_or(existing.category_name),
        description: payload.description.or(existing.description),
        schema_definition: if payload.schema_definition.is_some() {
            schema
        } else {
            existing.schema_definition.map(|v| v.to_string())
        },
    };
    let category = state.category_repo.update(id, input).await?;
    Ok(Json(json!({ "message": "Kategori güncellendi.", "data": category })))
}

pub async fn delete_category(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    claims.require_manager()?;
    state.category_repo.delete(id).await?;
    tracing::info!(category_id = id, "Category deleted");
    Ok(Json(json!({ "message": "Kategori silindi." })))
}

/// Form fields for items of this category
pub async fn category_schema(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let category = state
        .category_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| DomainError::not_found("Kategori bulunamadı"))?;

    let fields = match &category.schema_definition {
        Some(doc) => parse_category_schema(&doc.to_string()).unwrap_or_default(),
        None => Vec::new(),
    };
    Ok(Json(json!({
        "category_id": category.id,
        "category_name": category.category_name,
        "fields": fields,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_accepts_object_or_text() {
        let obj = Some(json!({ "fields": [] }));
        assert_eq!(schema_text(&obj).as_deref(), Some(r#"{"fields":[]}"#));
        let text = Some(Value::String(r#"{"fields":[]}"#.into()));
        assert_eq!(schema_text(&text).as_deref(), Some(r#"{"fields":[]}"#));
        assert_eq!(schema_text(&Some(Value::String("  ".into()))), None);
        assert_eq!(schema_text(&None), None);
    }
}
