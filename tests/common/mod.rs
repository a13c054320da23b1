#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use labtrack::auth::{create_jwt, hash_password};
use labtrack::config::Config;
use labtrack::domain::Role;
use labtrack::models::{category, item, role, user};
use labtrack::{db, server};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub app: Router,
    pub db: DatabaseConnection,
}

pub struct TestUser {
    pub id: i32,
    pub email: String,
    pub token: String,
}

// Helper to create a test database
pub async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

/// Config pointing the AI client at `ai_url` (a closed port by default)
pub fn test_config(ai_url: Option<String>) -> Config {
    Config {
        ai_service_url: ai_url.unwrap_or_else(|| "http://127.0.0.1:9".to_string()),
        ai_timeout_secs: 5,
        ..Config::default()
    }
}

pub async fn setup_app() -> TestApp {
    setup_app_with(test_config(None)).await
}

pub async fn setup_app_with(config: Config) -> TestApp {
    let db = setup_test_db().await;
    let app = server::build_router(db.clone(), config);
    TestApp { app, db }
}

pub async fn create_user(db: &DatabaseConnection, name: &str, email: &str, role: Role) -> TestUser {
    let role_row = role::Entity::find()
        .filter(role::Column::RoleName.eq(role.name()))
        .one(db)
        .await
        .unwrap()
        .expect("roles are seeded by init_db");
    let now = chrono::Utc::now().to_rfc3339();
    let created = user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(PASSWORD).unwrap()),
        role_id: Set(role_row.id),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user");

    TestUser {
        id: created.id,
        email: created.email.clone(),
        token: create_jwt(created.id, &created.email, role).unwrap(),
    }
}

pub async fn admin(db: &DatabaseConnection) -> TestUser {
    create_user(db, "Admin", "admin@lab.edu", Role::Admin).await
}

pub async fn manager(db: &DatabaseConnection) -> TestUser {
    create_user(db, "Manager", "manager@lab.edu", Role::InventoryManager).await
}

pub async fn staff(db: &DatabaseConnection, email: &str) -> TestUser {
    create_user(db, "Staff", email, Role::Staff).await
}

pub async fn create_category(db: &DatabaseConnection, name: &str, schema: Option<&str>) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    category::ActiveModel {
        category_name: Set(name.to_string()),
        description: Set(None),
        schema_definition: Set(schema.map(String::from)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create category")
    .id
}

pub async fn create_item(db: &DatabaseConnection, category_id: i32, number: &str) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    item::ActiveModel {
        inventory_number: Set(number.to_string()),
        name: Set(format!("Item {}", number)),
        category_id: Set(category_id),
        vendor_id: Set(None),
        location: Set("Lab 1".to_string()),
        status: Set("available".to_string()),
        condition_status: Set(None),
        specifications: Set(None),
        current_holder_id: Set(None),
        is_active: Set(true),
        purchase_date: Set(None),
        purchase_value: Set(None),
        warranty_expiry_date: Set(None),
        deleted_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create item")
    .id
}

pub async fn find_item(db: &DatabaseConnection, id: i32) -> item::Model {
    item::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
}

/// Sends one request through the router and returns status plus JSON body
/// (`Value::Null` for empty or non-JSON bodies).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}
