//! User Service - accounts, credentials and role assignment

use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::{create_jwt, hash_password, verify_password};
use crate::domain::status::{ItemStatus, TransactionStatus};
use crate::domain::validation::is_valid_email;
use crate::domain::{clock, DomainError, FieldErrors, Role};
use crate::models::item::{self, Entity as Item};
use crate::models::role::{self, Entity as RoleEntity};
use crate::models::transaction::{self, Entity as Transaction};
use crate::models::user::{self, Entity as User};

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const INVALID_CREDENTIALS: &str = "Hatalı e-posta veya şifre.";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Admin edit of an account; absent fields are left unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Public view of an account
pub fn user_json(u: &user::Model, role_name: &str) -> Value {
    json!({
        "id": u.id,
        "name": u.name,
        "email": u.email,
        "role": role_name,
        "last_login_at": u.last_login_at,
        "last_login_ip": u.last_login_ip,
        "created_at": u.created_at,
        "updated_at": u.updated_at,
    })
}

async fn role_by_name(db: &DatabaseConnection, role: Role) -> Result<role::Model, DomainError> {
    RoleEntity::find()
        .filter(role::Column::RoleName.eq(role.name()))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::Internal(format!("role '{}' is not seeded", role)))
}

pub async fn find_with_role(db: &DatabaseConnection, id: i32) -> Result<(user::Model, Role), DomainError> {
    let (user, role) = User::find_by_id(id)
        .find_also_related(RoleEntity)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Kullanıcı bulunamadı"))?;
    let role = role
        .and_then(|r| Role::from_name(&r.role_name))
        .unwrap_or(Role::Staff);
    Ok((user, role))
}

/// Checks credentials and records the login. Returns the token and the user.
pub async fn login(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    client_ip: Option<String>,
) -> Result<(String, user::Model, Role), DomainError> {
    let found = User::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .find_also_related(RoleEntity)
        .one(db)
        .await?;

    let Some((user, role)) = found else {
        tracing::warn!("Login failed: unknown email");
        return Err(DomainError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    let verified = verify_password(password, &user.password_hash).map_err(DomainError::Internal)?;
    if !verified {
        tracing::warn!(user_id = user.id, "Login failed: wrong password");
        return Err(DomainError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let role = role
        .and_then(|r| Role::from_name(&r.role_name))
        .unwrap_or(Role::Staff);
    let token = create_jwt(user.id, &user.email, role).map_err(DomainError::Internal)?;

    let mut active: user::ActiveModel = user.into();
    active.last_login_at = Set(Some(clock::now_ts()));
    active.last_login_ip = Set(client_ip);
    let user = active.update(db).await?;

    tracing::info!(user_id = user.id, role = %role, "User logged in");
    Ok((token, user, role))
}

pub async fn change_password(
    db: &DatabaseConnection,
    user_id: i32,
    input: ChangePasswordInput,
) -> Result<(), DomainError> {
    let mut errors = FieldErrors::default();
    errors.require("current_password", input.current_password.as_deref(), "Mevcut şifre zorunludur");
    errors.require("new_password", input.new_password.as_deref(), "Yeni şifre zorunludur");
    if input
        .new_password
        .as_deref()
        .is_some_and(|p| !p.is_empty() && p.chars().count() < MIN_PASSWORD_CHARS)
    {
        errors.add("new_password", "Yeni şifre en az 8 karakter olmalıdır");
    }
    errors.into_result()?;

    let (user, _) = find_with_role(db, user_id).await?;
    let current = input.current_password.unwrap_or_default();
    if !verify_password(&current, &user.password_hash).map_err(DomainError::Internal)? {
        return Err(DomainError::field("current_password", "Mevcut şifre hatalı"));
    }

    let hash = hash_password(&input.new_password.unwrap_or_default()).map_err(DomainError::Internal)?;
    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(hash);
    active.updated_at = Set(clock::now_ts());
    active.update(db).await?;

    tracing::info!(user_id, "Password changed");
    Ok(())
}

pub async fn list(db: &DatabaseConnection) -> Result<Vec<Value>, DomainError> {
    let roles: HashMap<i32, String> = RoleEntity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r.role_name))
        .collect();
    let users = User::find().order_by_asc(user::Column::Name).all(db).await?;

    Ok(users
        .iter()
        .map(|u| user_json(u, roles.get(&u.role_id).map(String::as_str).unwrap_or("Staff")))
        .collect())
}

pub async fn create(db: &DatabaseConnection, input: CreateUserInput) -> Result<Value, DomainError> {
    let mut errors = FieldErrors::default();
    errors.require("name", input.name.as_deref(), "Ad zorunludur");
    errors.max_len("name", input.name.as_deref(), 255, "Ad en fazla 255 karakter olabilir");
    errors.require("email", input.email.as_deref(), "E-posta zorunludur");
    errors.require("password", input.password.as_deref(), "Şifre zorunludur");

    let email = input.email.as_deref().unwrap_or_default().trim().to_lowercase();
    if !email.is_empty() && !is_valid_email(&email) {
        errors.add("email", "Geçerli bir e-posta adresi giriniz");
    }
    if !email.is_empty()
        && User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(db)
            .await?
            .is_some()
    {
        errors.add("email", "Bu e-posta adresi zaten kullanılıyor");
    }
    if input
        .password
        .as_deref()
        .is_some_and(|p| !p.is_empty() && p.chars().count() < MIN_PASSWORD_CHARS)
    {
        errors.add("password", "Şifre en az 8 karakter olmalıdır");
    }
    let role = match input.role.as_deref() {
        None => Some(Role::Staff),
        Some(name) => {
            let parsed = Role::from_name(name);
            if parsed.is_none() {
                errors.add("role", "Geçersiz rol. Geçerli değerler: Admin, Inventory Manager, Staff");
            }
            parsed
        }
    };
    errors.into_result()?;

    let role = role_by_name(db, role.unwrap_or(Role::Staff)).await?;
    let hash = hash_password(&input.password.unwrap_or_default()).map_err(DomainError::Internal)?;
    let now = clock::now_ts();

    let created = user::ActiveModel {
        name: Set(input.name.unwrap_or_default().trim().to_string()),
        email: Set(email),
        password_hash: Set(hash),
        role_id: Set(role.id),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = created.id, role = %role.role_name, "User created");
    Ok(user_json(&created, &role.role_name))
}

pub async fn update(db: &DatabaseConnection, id: i32, input: UpdateUserInput) -> Result<Value, DomainError> {
    let (user, current_role) = find_with_role(db, id).await?;

    let mut errors = FieldErrors::default();
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        errors.add("name", "Ad zorunludur");
    }
    errors.max_len("name", input.name.as_deref(), 255, "Ad en fazla 255 karakter olabilir");

    let email = input.email.as_deref().map(|e| e.trim().to_lowercase());
    match email.as_deref() {
        Some("") => errors.add("email", "E-posta zorunludur"),
        Some(e) if !is_valid_email(e) => errors.add("email", "Geçerli bir e-posta adresi giriniz"),
        Some(e) => {
            let taken = User::find()
                .filter(user::Column::Email.eq(e))
                .filter(user::Column::Id.ne(id))
                .one(db)
                .await?
                .is_some();
            if taken {
                errors.add("email", "Bu e-posta adresi zaten kullanılıyor");
            }
        }
        None => {}
    }
    let password = input.password.filter(|p| !p.is_empty());
    if password
        .as_deref()
        .is_some_and(|p| p.chars().count() < MIN_PASSWORD_CHARS)
    {
        errors.add("password", "Şifre en az 8 karakter olmalıdır");
    }
    let role = match input.role.as_deref() {
        None => current_role,
        Some(name) => Role::from_name(name).unwrap_or_else(|| {
            errors.add("role", "Geçersiz rol. Geçerli değerler: Admin, Inventory Manager, Staff");
            current_role
        }),
    };
    errors.into_result()?;

    let mut active: user::ActiveModel = user.into();
    if let Some(name) = input.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(email) = email {
        active.email = Set(email);
    }
    if let Some(password) = password {
        active.password_hash = Set(hash_password(&password).map_err(DomainError::Internal)?);
    }
    if role != current_role {
        active.role_id = Set(role_by_name(db, role).await?.id);
    }
    active.updated_at = Set(clock::now_ts());
    let updated = active.update(db).await?;

    tracing::info!(user_id = id, role = %role, "User updated");
    Ok(user_json(&updated, role.name()))
}

pub async fn update_role(db: &DatabaseConnection, id: i32, role_name: Option<&str>) -> Result<Value, DomainError> {
    let role = role_name
        .and_then(Role::from_name)
        .ok_or_else(|| DomainError::field("role", "Geçersiz rol. Geçerli değerler: Admin, Inventory Manager, Staff"))?;
    let (user, _) = find_with_role(db, id).await?;
    let role_row = role_by_name(db, role).await?;

    let mut active: user::ActiveModel = user.into();
    active.role_id = Set(role_row.id);
    active.updated_at = Set(clock::now_ts());
    let updated = active.update(db).await?;

    tracing::info!(user_id = id, role = %role, "User role changed");
    Ok(user_json(&updated, role.name()))
}

/// Removes an account. Refused for the caller's own account and for anyone
/// who still holds items.
pub async fn delete(db: &DatabaseConnection, acting_user: i32, id: i32) -> Result<(), DomainError> {
    if acting_user == id {
        return Err(DomainError::invalid_state("Kendi hesabınızı silemezsiniz"));
    }
    let (user, _) = find_with_role(db, id).await?;

    let held = Item::find()
        .filter(item::Column::CurrentHolderId.eq(id))
        .filter(item::Column::Status.eq(ItemStatus::Lent.as_str()))
        .count(db)
        .await?;
    let open = Transaction::find()
        .filter(transaction::Column::UserId.eq(id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
        .count(db)
        .await?;
    if held > 0 || open > 0 {
        return Err(DomainError::invalid_state(format!(
            "Kullanıcının üzerinde {} eşya bulunduğu için silinemez",
            held.max(open)
        )));
    }

    user.delete(db).await?;
    tracing::info!(user_id = id, "User deleted");
    Ok(())
}

pub async fn list_roles(db: &DatabaseConnection) -> Result<Vec<role::Model>, DomainError> {
    Ok(RoleEntity::find().order_by_asc(role::Column::Id).all(db).await?)
}
