mod common;

use axum::http::{Method, StatusCode};
use common::*;
use labtrack::services::notification_service::{self as notify, checkout_notice};
use sea_orm::DatabaseConnection;

async fn notify_user(db: &DatabaseConnection, user_id: i32, n: i32) -> Vec<String> {
    let mut ids = Vec::new();
    for i in 0..n {
        let row = notify::send(
            db,
            checkout_notice(user_id, i + 1, &format!("Item {}", i), "2030-01-01T00:00:00Z"),
        )
        .await
        .unwrap();
        ids.push(row.id);
    }
    ids
}

#[tokio::test]
async fn test_read_flow_and_counts() {
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let ids = notify_user(&t.db, staff.id, 3).await;

    let (status, body) = get(&t.app, "/api/notifications/unread-count", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unread_count"], 3);

    let (status, body) = send(
        &t.app,
        Method::POST,
        &format!("/api/notifications/{}/read", ids[0]),
        Some(&staff.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["read_at"].is_string());

    let (status, body) = get(&t.app, "/api/notifications?filter=unread", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["unread_count"], 2);

    let (status, body) = get(&t.app, "/api/notifications?filter=read", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], ids[0]);

    let (status, body) = send(
        &t.app,
        Method::POST,
        "/api/notifications/read-all",
        Some(&staff.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated_count"], 2);

    let (status, body) = send(
        &t.app,
        Method::DELETE,
        "/api/notifications/read",
        Some(&staff.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 3);

    let (_, body) = get(&t.app, "/api/notifications", &staff.token).await;
    assert_eq!(body["meta"]["total"], 0);
}

#[tokio::test]
async fn test_other_users_notifications_are_hidden() {
    let t = setup_app().await;
    let owner = staff(&t.db, "owner@lab.edu").await;
    let intruder = staff(&t.db, "intruder@lab.edu").await;
    let ids = notify_user(&t.db, owner.id, 1).await;

    let (status, _) = send(
        &t.app,
        Method::POST,
        &format!("/api/notifications/{}/read", ids[0]),
        Some(&intruder.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/notifications/{}", ids[0]),
        Some(&intruder.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = get(&t.app, "/api/notifications", &intruder.token).await;
    assert_eq!(body["meta"]["total"], 0);

    let (status, _) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/notifications/{}", ids[0]),
        Some(&owner.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_notifies_borrower() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-001").await;

    post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        serde_json::json!({ "item_id": item, "user_id": staff.id }),
    )
    .await;

    let (status, body) = get(&t.app, "/api/notifications", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["kind"], "success");
    assert!(body["data"][0]["message"].as_str().unwrap().contains("Item LAP-001"));
}
