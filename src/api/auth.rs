use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::error::{ApiError, ApiResult};
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::user_service::{self, ChangePasswordInput};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

/// First address of `X-Forwarded-For`, as set by the reverse proxy.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Wrong email or password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::unauthorized(user_service::INVALID_CREDENTIALS));
    };
    tracing::info!("Login attempt");

    let (token, user, role) =
        user_service::login(state.db(), &email, &password, client_ip(&headers)).await?;

    Ok(Json(json!({
        "token": token,
        "token_type": "Bearer",
        "user": user_service::user_json(&user, role.name()),
    })))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Current user")),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, claims: Claims) -> ApiResult<impl IntoResponse> {
    let (user, role) = user_service::find_with_role(state.db(), claims.uid).await?;
    Ok(Json(json!({ "user": user_service::user_json(&user, role.name()) })))
}

/// Tokens are stateless; the client drops its copy.
pub async fn logout(claims: Claims) -> impl IntoResponse {
    tracing::info!(user_id = claims.uid, "User logged out");
    (StatusCode::OK, Json(json!({ "message": "Çıkış yapıldı." })))
}

pub async fn change_password(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<ChangePasswordInput>,
) -> ApiResult<impl IntoResponse> {
    user_service::change_password(state.db(), claims.uid, payload).await?;
    Ok(Json(json!({ "message": "Şifre başarıyla değiştirildi." })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.7, 172.16.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.7"));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
