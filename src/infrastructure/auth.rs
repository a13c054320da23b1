use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Json},
    http::{header, request::Parts, StatusCode},
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::{json, Value};

use crate::domain::roles::Actor;
use crate::domain::Role;
use crate::models::{role, user};

pub const UNAUTHENTICATED_MESSAGE: &str = "Kimlik doğrulaması gerekli.";
pub const FORBIDDEN_MESSAGE: &str = "Bu işlem için yetkiniz yok.";

const TOKEN_TTL_HOURS: i64 = 24;

pub type AuthRejection = (StatusCode, Json<Value>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // email
    pub uid: i32,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    /// Current role of the account; unknown names get the least privileged role.
    pub fn role(&self) -> Role {
        Role::from_name(&self.role).unwrap_or(Role::Staff)
    }

    pub fn is_manager(&self) -> bool {
        self.role().is_manager()
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.uid,
            role: self.role(),
        }
    }

    /// Allows the request only for the listed roles.
    pub fn require_any(&self, roles: &[Role]) -> Result<Role, AuthRejection> {
        let role = self.role();
        if roles.contains(&role) {
            return Ok(role);
        }

        tracing::warn!(
            user_id = self.uid,
            role = %role,
            "Role check failed"
        );
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "message": FORBIDDEN_MESSAGE,
                "required_roles": roles.iter().map(|r| r.name()).collect::<Vec<_>>(),
                "your_role": role.name(),
            })),
        ))
    }

    pub fn require_manager(&self) -> Result<Role, AuthRejection> {
        self.require_any(Role::MANAGERS)
    }

    pub fn require_admin(&self) -> Result<Role, AuthRejection> {
        self.require_any(&[Role::Admin])
    }
}

fn unauthenticated() -> AuthRejection {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": UNAUTHENTICATED_MESSAGE })),
    )
}

/// Token identity is re-read from the account row, so role changes and
/// deletions apply to tokens already issued.
#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    DatabaseConnection: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(unauthenticated)?;

        let mut claims = decode_jwt(token).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            unauthenticated()
        })?;

        let db = DatabaseConnection::from_ref(state);
        let (account, account_role) = user::Entity::find_by_id(claims.uid)
            .find_also_related(role::Entity)
            .one(&db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load token owner: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Beklenmeyen bir hata oluştu. Lütfen tekrar deneyin." })),
                )
            })?
            .ok_or_else(|| {
                tracing::debug!(user_id = claims.uid, "Token owner no longer exists");
                unauthenticated()
            })?;

        claims.sub = account.email;
        claims.role = account_role
            .map(|r| r.role_name)
            .unwrap_or_else(|| Role::Staff.name().to_owned());
        Ok(claims)
    }
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| e.to_string())?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| e.to_string())?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn get_jwt_secret() -> Result<String, String> {
    match env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => Ok(secret),
        _ if cfg!(debug_assertions) => Ok("secret".to_string()),
        _ => Err("JWT_SECRET environment variable must be set in production".to_string()),
    }
}

pub fn create_jwt(user_id: i32, email: &str, role: Role) -> Result<String, String> {
    let secret = get_jwt_secret()?;
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| "token expiry out of range".to_string())?
        .timestamp();

    let claims = Claims {
        sub: email.to_owned(),
        uid: user_id,
        role: role.name().to_owned(),
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| e.to_string())
}

pub fn decode_jwt(token: &str) -> Result<Claims, String> {
    let secret = get_jwt_secret()?;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_identity() {
        let token = create_jwt(7, "manager@lab.edu", Role::InventoryManager).unwrap();
        let claims = decode_jwt(&token).unwrap();
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.sub, "manager@lab.edu");
        assert_eq!(claims.role(), Role::InventoryManager);
        assert!(claims.is_manager());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = create_jwt(1, "a@lab.edu", Role::Staff).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(decode_jwt(&tampered).is_err());
    }

    #[test]
    fn staff_fails_manager_guard() {
        let claims = Claims {
            sub: "s@lab.edu".into(),
            uid: 3,
            role: "Staff".into(),
            exp: 0,
        };
        let (status, Json(body)) = claims.require_manager().unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["your_role"], "Staff");
        assert_eq!(body["required_roles"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }
}
