mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::*;
use labtrack::models::user;
use sea_orm::EntityTrait;
use serde_json::json;
use tower::util::ServiceExt; // for `oneshot`

#[tokio::test]
async fn test_login_returns_token_and_records_client_ip() {
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let request = Request::builder()
        .uri("/api/auth/login")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "10.1.2.3, 172.16.0.1")
        .body(Body::from(
            json!({ "email": "staff@lab.edu", "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["role"], "Staff");
    assert!(body["user"].get("password_hash").is_none());

    let stored = user::Entity::find_by_id(staff.id).one(&t.db).await.unwrap().unwrap();
    assert_eq!(stored.last_login_ip.as_deref(), Some("10.1.2.3"));
    assert!(stored.last_login_at.is_some());
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let t = setup_app().await;
    staff(&t.db, "staff@lab.edu").await;

    let (status, body) = send(
        &t.app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "staff@lab.edu", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Hatalı e-posta veya şifre.");

    let (status, _) = send(
        &t.app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@lab.edu", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let t = setup_app().await;

    let (status, body) = send(&t.app, Method::GET, "/api/items", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Kimlik doğrulaması gerekli.");

    let (status, _) = send(&t.app, Method::GET, "/api/auth/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_and_change_password() {
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = get(&t.app, "/api/auth/me", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "staff@lab.edu");

    let (status, body) = post(
        &t.app,
        "/api/auth/change-password",
        &staff.token,
        json!({ "current_password": "wrong", "new_password": "newpassword1" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["current_password"].is_array());

    let (status, _) = post(
        &t.app,
        "/api/auth/change-password",
        &staff.token,
        json!({ "current_password": PASSWORD, "new_password": "newpassword1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &t.app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "staff@lab.edu", "password": "newpassword1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_is_acknowledged() {
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, _) = send(&t.app, Method::POST, "/api/auth/logout", Some(&staff.token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_management_is_admin_only() {
    let t = setup_app().await;
    let admin = admin(&t.db).await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = get(&t.app, "/api/users", &staff.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["your_role"], "Staff");

    let (status, body) = get(&t.app, "/api/users", &manager.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let new_user = json!({
        "name": "New Staff",
        "email": "new@lab.edu",
        "password": "password123",
        "role": "Staff"
    });
    let (status, _) = post(&t.app, "/api/users", &manager.token, new_user.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(&t.app, "/api/users", &admin.token, new_user).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "Staff");
}

#[tokio::test]
async fn test_create_user_validation() {
    let t = setup_app().await;
    let admin = admin(&t.db).await;

    let (status, body) = post(
        &t.app,
        "/api/users",
        &admin.token,
        json!({
            "name": "Bad",
            "email": "admin@lab.edu",
            "password": "short",
            "role": "Janitor"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Girilen bilgiler geçersiz.");
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
    assert!(body["errors"]["role"].is_array());

    let (status, body) = post(
        &t.app,
        "/api/users",
        &admin.token,
        json!({ "name": "Bad", "email": "not-an-email", "password": "password123" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["email"].is_array());
}

#[tokio::test]
async fn test_role_change_and_delete_rules() {
    let t = setup_app().await;
    let admin = admin(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = send(
        &t.app,
        Method::PUT,
        &format!("/api/users/{}/role", staff.id),
        Some(&admin.token),
        Some(json!({ "role": "Inventory Manager" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "Inventory Manager");

    let (status, _) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/users/{}", admin.id),
        Some(&admin.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/users/{}", staff.id),
        Some(&admin.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_holding_items_cannot_be_deleted() {
    let t = setup_app().await;
    let admin = admin(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-1").await;

    let (status, _) = post(
        &t.app,
        "/api/transactions/checkout",
        &admin.token,
        json!({ "item_id": item, "user_id": staff.id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/users/{}", staff.id),
        Some(&admin.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_roles_are_listed() {
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = get(&t.app, "/api/roles", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["role_name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Admin"));
    assert!(names.contains(&"Inventory Manager"));
    assert!(names.contains(&"Staff"));
}

#[tokio::test]
async fn test_demoted_admin_loses_rights_on_existing_token() {
    let t = setup_app().await;
    let admin = admin(&t.db).await;
    let second = create_user(&t.db, "Second Admin", "second@lab.edu", labtrack::domain::Role::Admin).await;

    let (status, _) = send(
        &t.app,
        Method::PUT,
        &format!("/api/users/{}/role", second.id),
        Some(&admin.token),
        Some(json!({ "role": "Staff" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &t.app,
        "/api/users",
        &second.token,
        json!({
            "name": "Sneaky",
            "email": "sneaky@lab.edu",
            "password": "password123",
            "role": "Admin"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["your_role"], "Staff");

    let (_, body) = get(&t.app, "/api/auth/me", &second.token).await;
    assert_eq!(body["user"]["role"], "Staff");
}

#[tokio::test]
async fn test_deleted_user_token_is_rejected() {
    let t = setup_app().await;
    let admin = admin(&t.db).await;
    let manager = manager(&t.db).await;

    let (status, _) = get(&t.app, "/api/reports/dashboard", &manager.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/users/{}", manager.id),
        Some(&admin.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&t.app, "/api/reports/dashboard", &manager.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Kimlik doğrulaması gerekli.");
}

#[tokio::test]
async fn test_admin_edits_account_details() {
    let t = setup_app().await;
    let admin = admin(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let uri = format!("/api/users/{}", staff.id);

    let (status, _) = send(
        &t.app,
        Method::PUT,
        &uri,
        Some(&staff.token),
        Some(json!({ "name": "Kendim" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &t.app,
        Method::PUT,
        &uri,
        Some(&admin.token),
        Some(json!({ "email": "admin@lab.edu", "name": "  ", "password": "kisa" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["name"].is_array());
    assert!(body["errors"]["password"].is_array());

    let (status, body) = send(
        &t.app,
        Method::PUT,
        &uri,
        Some(&admin.token),
        Some(json!({
            "name": "Ayşe Teknisyen",
            "email": "Ayse@Lab.edu",
            "password": "yeni-sifre-123",
            "role": "Inventory Manager"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ayşe Teknisyen");
    assert_eq!(body["data"]["email"], "ayse@lab.edu");
    assert_eq!(body["data"]["role"], "Inventory Manager");

    let (status, body) = send(
        &t.app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "ayse@lab.edu", "password": "yeni-sifre-123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "Inventory Manager");

    let (status, _) = send(
        &t.app,
        Method::PUT,
        "/api/users/9999",
        Some(&admin.token),
        Some(json!({ "name": "Kimse" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
