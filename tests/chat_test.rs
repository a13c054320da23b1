mod common;

use axum::http::StatusCode;
use common::*;
use labtrack::models::{chatbot_fallback_response, chatbot_feedback, chatbot_query};
use sea_orm::EntityTrait;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app_with_ai(server: &MockServer) -> TestApp {
    setup_app_with(test_config(Some(server.uri()))).await
}

#[tokio::test]
async fn test_ask_enriches_ai_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .and(body_json(json!({ "query": "Toplam kaç laptop var?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sql": "SELECT status, COUNT(*) AS count FROM items GROUP BY status",
            "results": [
                { "status": "available", "count": 4 },
                { "status": "lent", "count": 2 }
            ],
            "result_count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let t = app_with_ai(&server).await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = post(
        &t.app,
        "/api/chat/ask",
        &staff.token,
        json!({ "query": "Toplam kaç laptop var?" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query_metadata"]["query_type"], "statistical");
    assert_eq!(body["query_metadata"]["result_count"], 2);
    assert_eq!(body["query_metadata"]["has_tables"], true);
    assert!(body["query_metadata"]["sql_query"]
        .as_str()
        .unwrap()
        .starts_with("SELECT"));
    assert_eq!(body["tables"][0]["total_count"], 2);
    assert_eq!(body["tables"][0]["column_types"]["count"], "number");
    assert!(body["response"].is_string());
    assert!(body["query_id"].is_number());

    let stored = chatbot_query::Entity::find().all(&t.db).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].was_successful);
    assert_eq!(stored[0].result_count, 2);
}

#[tokio::test]
async fn test_ai_failure_is_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let t = app_with_ai(&server).await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = post(
        &t.app,
        "/api/chat/ask",
        &staff.token,
        json!({ "query": "Laptoplar nerede?" }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["message"].as_str().unwrap().contains("AI Servisi"));

    let stored = chatbot_query::Entity::find().all(&t.db).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].was_successful);
    assert_eq!(stored[0].query_type, "location");
}

#[tokio::test]
async fn test_unreachable_ai_service() {
    // Default test config points at a closed port
    let t = setup_app().await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = post(
        &t.app,
        "/api/chat/ask",
        &staff.token,
        json!({ "query": "Bugün hangi eşyalar ödünç verildi?" }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["message"].as_str().unwrap().contains("bağlanılamadı"));

    let (status, body) = get(&t.app, "/api/chat/health", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ai_service"]["status"], "unreachable");
}

#[tokio::test]
async fn test_query_is_checked_before_calling_ai() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let t = app_with_ai(&server).await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = post(&t.app, "/api/chat/ask", &staff.token, json!({ "query": "ab" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["query"].is_array());

    let long = "a".repeat(1001);
    let (status, _) = post(&t.app, "/api/chat/ask", &staff.token, json!({ "query": long })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post(
        &t.app,
        "/api/chat/ask",
        &staff.token,
        json!({ "query": "items; DROP TABLE users" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_and_admin_analytics() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "name": "ThinkPad", "location": "B-101" }]
        })))
        .mount(&server)
        .await;

    let t = app_with_ai(&server).await;
    let admin = admin(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    for query in ["ThinkPad nerede?", "Kimde hangi laptop var?"] {
        let (status, _) = post(&t.app, "/api/chat/ask", &staff.token, json!({ "query": query })).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = get(&t.app, "/api/chat/history?limit=1", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["meta"]["last_page"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = get(&t.app, "/api/chat/history", &admin.token).await;
    assert_eq!(body["meta"]["total"], 0);

    let (status, _) = get(&t.app, "/api/chat/analytics", &staff.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get(&t.app, "/api/chat/analytics?days=7", &admin.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_queries"], 2);
    assert_eq!(body["data"]["success_rate"], 100.0);
    assert_eq!(body["data"]["query_types"]["location"], 1);
    assert_eq!(body["data"]["query_types"]["assignment"], 1);
}

#[tokio::test]
async fn test_ai_failure_answers_from_matching_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let t = app_with_ai(&server).await;
    let admin = admin(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (status, body) = post(
        &t.app,
        "/api/chat/ask",
        &staff.token,
        json!({ "query": "Yardım lazım, ne sorabilirim?" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallback"], true);
    assert!(body["message"].as_str().unwrap().contains("yardımcı"));
    assert!(body["query_id"].is_number());
    assert!(body["query_metadata"]["duration_ms"].is_number());

    let stored = chatbot_query::Entity::find().all(&t.db).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].was_successful);
    assert!(stored[0].used_fallback);
    assert!(stored[0].error_message.is_some());

    let used = chatbot_fallback_response::Entity::find_by_id(stored[0].fallback_response_id.unwrap())
        .one(&t.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(used.trigger_keyword, "yardım");
    assert_eq!(used.usage_count, 1);

    let (_, body) = get(&t.app, "/api/chat/analytics", &admin.token).await;
    assert_eq!(body["data"]["fallback_count"], 1);
    assert_eq!(body["data"]["fallback_rate"], 100.0);
}

#[tokio::test]
async fn test_feedback_is_kept_once_per_user_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;

    let t = app_with_ai(&server).await;
    let admin = admin(&t.db).await;
    let staff = staff(&t.db, "staff@lab.edu").await;

    let (_, body) = post(
        &t.app,
        "/api/chat/ask",
        &staff.token,
        json!({ "query": "Boştaki osiloskoplar" }),
    )
    .await;
    let query_id = body["query_id"].as_i64().unwrap();

    let (status, body) = post(
        &t.app,
        "/api/chat/feedback",
        &staff.token,
        json!({ "query_id": query_id, "rating": "helpful" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["feedback"]["rating"], "helpful");

    let (status, body) = post(
        &t.app,
        "/api/chat/feedback",
        &staff.token,
        json!({ "query_id": query_id, "rating": "not_helpful", "comment": "Liste boş geldi" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Geri bildiriminiz güncellendi.");

    let rows = chatbot_feedback::Entity::find().all(&t.db).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].rating, "not_helpful");
    assert_eq!(rows[0].comment.as_deref(), Some("Liste boş geldi"));

    let (status, body) = post(
        &t.app,
        "/api/chat/feedback",
        &staff.token,
        json!({ "query_id": 9999, "rating": "great" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["query_id"].is_array());
    assert!(body["errors"]["rating"].is_array());

    let (_, body) = get(&t.app, "/api/chat/analytics", &admin.token).await;
    assert_eq!(body["data"]["total_feedback"], 1);
    assert_eq!(body["data"]["not_helpful_feedback"], 1);
    assert_eq!(body["data"]["helpfulness_rate"], 0.0);
}
