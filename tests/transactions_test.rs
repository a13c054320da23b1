mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::*;
use labtrack::domain::clock;
use labtrack::models::{maintenance_request, transaction};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;

/// Moves a loan's due date into the past so it counts as overdue.
async fn backdate(db: &sea_orm::DatabaseConnection, transaction_id: i32, days: i64) {
    let loan = transaction::Entity::find_by_id(transaction_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let mut active: transaction::ActiveModel = loan.into();
    active.due_date = Set(clock::format_ts(
        Utc::now() - Duration::days(days) - Duration::hours(1),
    ));
    active.update(db).await.unwrap();
}

#[tokio::test]
async fn test_checkout_lends_item_once() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-1").await;

    let (status, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": item, "user_id": staff.id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Eşya başarıyla ödünç verildi.");
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["user_id"], staff.id);

    let lent = find_item(&t.db, item).await;
    assert_eq!(lent.status, "lent");
    assert_eq!(lent.current_holder_id, Some(staff.id));

    let (status, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": item, "user_id": manager.id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Eşya ödünç verilemez. Mevcut durum: lent");
}

#[tokio::test]
async fn test_staff_can_only_borrow_for_themselves() {
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let other = create_user(&t.db, "Other", "other@lab.edu", labtrack::domain::Role::Staff).await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-1").await;

    let (status, _) = post(
        &t.app,
        "/api/transactions/checkout",
        &staff.token,
        json!({ "item_id": item, "user_id": other.id }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post(
        &t.app,
        "/api/transactions/checkout",
        &staff.token,
        json!({ "item_id": item }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = get(&t.app, "/api/transactions/my-loans", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_rejects_past_due_date() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-1").await;

    let (status, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": item, "due_date": "2001-01-01" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["due_date"].is_array());
    assert_eq!(find_item(&t.db, item).await.status, "available");
}

#[tokio::test]
async fn test_late_return_charges_fee_per_whole_day() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-1").await;

    let (_, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": item, "user_id": staff.id }),
    )
    .await;
    let loan_id = body["data"]["id"].as_i64().unwrap() as i32;
    backdate(&t.db, loan_id, 3).await;

    let (status, body) = send(
        &t.app,
        Method::POST,
        &format!("/api/transactions/{}/return", loan_id),
        Some(&staff.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["was_overdue"], true);
    assert_eq!(body["days_overdue"], 3);
    assert_eq!(body["late_fee"], 3.0);
    assert_eq!(body["data"]["status"], "late_return");
    assert_eq!(find_item(&t.db, item).await.status, "available");

    // Unpaid fee blocks the next checkout until a manager records payment
    let second = create_item(&t.db, category, "LAP-2").await;
    let (status, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &staff.token,
        json!({ "item_id": second }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("gecikme ücreti"));

    let (status, _) = send(
        &t.app,
        Method::POST,
        &format!("/api/transactions/{}/pay-fee", loan_id),
        Some(&staff.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &t.app,
        Method::POST,
        &format!("/api/transactions/{}/pay-fee", loan_id),
        Some(&manager.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["late_fee_paid"], true);

    let (status, _) = post(
        &t.app,
        "/api/transactions/checkout",
        &staff.token,
        json!({ "item_id": second }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_overdue_loan_blocks_new_checkout() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let first = create_item(&t.db, category, "LAP-1").await;
    let second = create_item(&t.db, category, "LAP-2").await;

    let (_, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": first, "user_id": staff.id }),
    )
    .await;
    backdate(&t.db, body["data"]["id"].as_i64().unwrap() as i32, 20).await;

    let (status, _) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": second, "user_id": staff.id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&t.app, "/api/transactions/overdue", &manager.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overdue_count"], 1);
    assert_eq!(body["data"]["transactions"][0]["severity"], "high");
}

#[tokio::test]
async fn test_damaged_return_opens_maintenance_request() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-1").await;

    let (_, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": item, "user_id": staff.id }),
    )
    .await;
    let loan_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = post(
        &t.app,
        &format!("/api/transactions/{}/return", loan_id),
        &manager.token,
        json!({ "return_condition": "damaged", "damage_description": "Ekran kırık" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["was_overdue"], false);
    assert_eq!(body["data"]["status"], "returned");
    assert_eq!(body["maintenance_request"]["priority"], "high");
    assert_eq!(body["maintenance_request"]["description"], "Ekran kırık");

    let returned = find_item(&t.db, item).await;
    assert_eq!(returned.status, "maintenance");
    assert_eq!(returned.current_holder_id, None);

    let requests = maintenance_request::Entity::find()
        .filter(maintenance_request::Column::ItemId.eq(item))
        .all(&t.db)
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, "pending");
}

#[tokio::test]
async fn test_cancel_requires_a_reason() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-1").await;

    let (_, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": item }),
    )
    .await;
    let loan_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = post(
        &t.app,
        &format!("/api/transactions/{}/cancel", loan_id),
        &manager.token,
        json!({ "reason": "kısa" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["reason"].is_array());

    let (status, body) = post(
        &t.app,
        &format!("/api/transactions/{}/cancel", loan_id),
        &manager.token,
        json!({ "reason": "Yanlış eşya kaydedildi" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(find_item(&t.db, item).await.status, "available");
}

#[tokio::test]
async fn test_extend_moves_due_date_forward() {
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-1").await;

    let (_, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &staff.token,
        json!({ "item_id": item }),
    )
    .await;
    let loan_id = body["data"]["id"].as_i64().unwrap();
    let old_due = body["data"]["due_date"].as_str().unwrap().to_string();

    let (status, _) = post(
        &t.app,
        &format!("/api/transactions/{}/extend", loan_id),
        &staff.token,
        json!({ "new_due_date": "2001-01-01" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let new_due = clock::format_ts(Utc::now() + Duration::days(30));
    let (status, body) = post(
        &t.app,
        &format!("/api/transactions/{}/extend", loan_id),
        &staff.token,
        json!({ "new_due_date": new_due, "reason": "Proje uzadı" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["due_date"], new_due);
    assert_ne!(body["data"]["due_date"], old_due);
    assert!(body["data"]["notes"].as_str().unwrap().contains("Proje uzadı"));
}

#[tokio::test]
async fn test_staff_only_see_their_own_transactions() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let mine = create_item(&t.db, category, "LAP-1").await;
    let theirs = create_item(&t.db, category, "LAP-2").await;

    post(&t.app, "/api/transactions/checkout", &staff.token, json!({ "item_id": mine })).await;
    let (_, body) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": theirs }),
    )
    .await;
    let manager_loan = body["data"]["id"].as_i64().unwrap();

    let (status, body) = get(&t.app, "/api/transactions", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);

    let (status, body) = get(&t.app, "/api/transactions", &manager.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 2);

    let (status, _) = get(
        &t.app,
        &format!("/api/transactions/{}", manager_loan),
        &staff.token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn loan_row(item_id: i32, user_id: i32, status: &str) -> transaction::ActiveModel {
    let now = clock::now_ts();
    transaction::ActiveModel {
        item_id: Set(item_id),
        user_id: Set(user_id),
        checkout_date: Set(now.clone()),
        due_date: Set(clock::format_ts(Utc::now() + Duration::days(14))),
        return_date: Set(None),
        status: Set(status.to_string()),
        late_fee: Set(0.0),
        late_fee_paid: Set(false),
        return_condition: Set(None),
        return_notes: Set(None),
        notes: Set(None),
        checked_out_by: Set(None),
        returned_to: Set(None),
        overdue_reminder_sent: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_second_active_loan_for_an_item_is_a_conflict() {
    let t = setup_app().await;
    let manager = manager(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;
    let category = create_category(&t.db, "Laptops", None).await;
    let item = create_item(&t.db, category, "LAP-001").await;

    let (status, _) = post(
        &t.app,
        "/api/transactions/checkout",
        &manager.token,
        json!({ "item_id": item, "user_id": staff.id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // A checkout that slipped past the availability check still hits the index
    let err = loan_row(item, manager.id, "active")
        .insert(&t.db)
        .await
        .unwrap_err();
    let err = labtrack::domain::DomainError::from(err);
    assert!(matches!(err, labtrack::domain::DomainError::Conflict(_)), "{}", err);
    assert!(!err.to_string().contains("idx_transactions"));

    // Closed loans are not constrained
    loan_row(item, manager.id, "returned")
        .insert(&t.db)
        .await
        .unwrap();

    let open = transaction::Entity::find()
        .filter(transaction::Column::ItemId.eq(item))
        .filter(transaction::Column::Status.eq("active"))
        .all(&t.db)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
}
