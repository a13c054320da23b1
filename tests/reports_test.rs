mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_reports_are_for_managers() {
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, _) = get(&t.app, "/api/reports/inventory", &staff.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&t.app, "/api/reports/dashboard", &staff.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_report_type() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;

    let (status, body) = get(&t.app, "/api/reports/payroll", &manager.token).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["type"].is_array());
}

#[tokio::test]
async fn test_inventory_report_summarizes_items() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let laptops = create_category(&t.db, "Laptops", None).await;
    let scopes = create_category(&t.db, "Microscopes", None).await;
    let lent = create_item(&t.db, laptops, "LAP-001").await;
    create_item(&t.db, laptops, "LAP-002").await;
    create_item(&t.db, scopes, "MIC-001").await;

    post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": lent }),
    )
    .await;

    let (status, body) = get(&t.app, "/api/reports/inventory", &manager.token).await;
    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["report_type"], "inventory");
    assert_eq!(report["summary"]["total_items"], 3);
    assert_eq!(report["summary"]["by_status"]["lent"], 1);
    assert_eq!(report["summary"]["by_status"]["available"], 2);
    assert_eq!(report["by_category"]["Laptops"]["count"], 2);
    assert_eq!(report["rows"].as_array().unwrap().len(), 3);

    let (status, body) = get(
        &t.app,
        &format!("/api/reports/inventory?category_id={}", scopes),
        &manager.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"]["total_items"], 1);
}

#[tokio::test]
async fn test_report_date_range_is_validated() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;

    let (status, body) = get(
        &t.app,
        "/api/reports/transactions?date_from=2025-02-01&date_to=2025-01-01",
        &manager.token,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["date_to"].is_array());

    let (status, body) = get(
        &t.app,
        "/api/reports/maintenance?date_from=yesterday",
        &manager.token,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["date_from"].is_array());
}

#[tokio::test]
async fn test_dashboard_headline_numbers() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-001").await;
    create_item(&t.db, category, "LAP-002").await;

    post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": item, "user_id": staff.id }),
    )
    .await;
    post(
        &t.app,
        "/api/purchase-requests",
        &staff.token,
        json!({
            "item_name": "Osiloskop",
            "description": "Elektronik lab",
            "quantity": 1,
            "justification": "Yeni ders"
        }),
    )
    .await;

    let (status, body) = get(&t.app, "/api/reports/dashboard", &manager.token).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["items"]["total"], 2);
    assert_eq!(data["transactions"]["active"], 1);
    assert_eq!(data["transactions"]["overdue"], 0);
    assert_eq!(data["transactions"]["checkouts_last_7_days"], 1);
    assert_eq!(data["purchases"]["pending"], 1);
    assert_eq!(data["users"], 2);
}

#[tokio::test]
async fn test_health_and_docs_are_public() {
    let t = setup_app().await;

    let (status, body) = send(&t.app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "labtrack");
    assert_eq!(body["database"], "ok");

    let (status, body) = send(&t.app, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/auth/login"].is_object());
}
