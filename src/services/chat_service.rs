//! Chat Service - natural-language questions answered by the AI service
//!
//! The question is forwarded untouched; this side classifies it, shapes the
//! returned rows into a table and keeps a history of every attempt.

use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use crate::domain::status::FeedbackRating;
use crate::domain::{clock, DomainError, FieldErrors};
use crate::models::chatbot_fallback_response::{self, Entity as FallbackResponse};
use crate::models::chatbot_feedback::{self, Entity as ChatbotFeedback};
use crate::models::chatbot_query::{self, Entity as ChatbotQuery};
use crate::services::ai_client::{AiClient, AiError};

pub const MIN_QUERY_CHARS: usize = 3;
pub const MAX_QUERY_CHARS: usize = 1000;
pub const MAX_FEEDBACK_COMMENT_CHARS: usize = 1000;
const FORBIDDEN_CHARS: &[char] = &[';', '<', '>'];

pub const UNREACHABLE_MESSAGE: &str =
    "AI Servisine bağlanılamadı. Servis şu anda kullanılamıyor. Lütfen daha sonra tekrar deneyin.";
pub const SERVICE_ERROR_MESSAGE: &str =
    "AI Servisi hata verdi. Sorgunuz işlenemedi. Lütfen tekrar deneyin.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    TimeBased,
    Statistical,
    Location,
    Status,
    Assignment,
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::TimeBased => "time_based",
            QueryType::Statistical => "statistical",
            QueryType::Location => "location",
            QueryType::Status => "status",
            QueryType::Assignment => "assignment",
            QueryType::General => "general",
        }
    }
}

// Checked in order; the first group with a hit wins.
const QUERY_KEYWORDS: &[(QueryType, &[&str])] = &[
    (
        QueryType::TimeBased,
        &["bugün", "dün", "bu hafta", "geçen hafta", "bu ay", "geçen ay", "today", "yesterday", "week", "month"],
    ),
    (
        QueryType::Statistical,
        &["kaç", "toplam", "sayı", "ortalama", "count", "total", "average", "sum"],
    ),
    (QueryType::Location, &["nerede", "konum", "yer", "where", "location"]),
    (
        QueryType::Status,
        &["durum", "status", "boşta", "kullanımda", "available", "in use"],
    ),
    (
        QueryType::Assignment,
        &["kimin", "kimde", "atanmış", "zimmetli", "assigned", "holder"],
    ),
];

pub fn detect_query_type(query: &str) -> QueryType {
    let lowered = query.to_lowercase();
    QUERY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(QueryType::General)
}

/// Length and character checks applied before anything is sent out.
pub fn validate_query(raw: Option<&str>) -> Result<String, DomainError> {
    let query = raw.map(str::trim).unwrap_or_default();
    let len = query.chars().count();
    if len == 0 {
        return Err(DomainError::field("query", "Sorgu zorunludur"));
    }
    if len < MIN_QUERY_CHARS {
        return Err(DomainError::field("query", "Sorgu en az 3 karakter olmalıdır"));
    }
    if len > MAX_QUERY_CHARS {
        return Err(DomainError::field("query", "Sorgu en fazla 1000 karakter olabilir"));
    }
    if query.contains(FORBIDDEN_CHARS) {
        return Err(DomainError::invalid_state(
            "Sorgunuz geçersiz karakterler içeriyor.",
        ));
    }
    Ok(query.to_string())
}

fn looks_like_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && clock::parse_ts(s.get(..10).unwrap_or_default()).is_some()
}

fn is_numeric(v: &Value) -> bool {
    match v {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

/// Classifies each column as `number`, `date`, `categorical` or `text`.
pub fn detect_column_types(rows: &[Value]) -> BTreeMap<String, &'static str> {
    let Some(Value::Object(first)) = rows.first() else {
        return BTreeMap::new();
    };

    first
        .keys()
        .map(|column| {
            let values: Vec<&Value> = rows
                .iter()
                .filter_map(|r| r.get(column))
                .filter(|v| !v.is_null())
                .collect();
            let total = values.len();
            let numeric = values.iter().filter(|v| is_numeric(v)).count();
            let dates = values
                .iter()
                .filter(|v| v.as_str().is_some_and(looks_like_date))
                .count();
            let unique: HashSet<String> = values.iter().map(|v| v.to_string()).collect();

            let kind = if total > 0 && numeric * 5 >= total * 4 {
                "number"
            } else if total > 0 && dates * 5 >= total * 4 {
                "date"
            } else if unique.len() <= 20 && rows.len() > 10 {
                "categorical"
            } else {
                "text"
            };
            (column.clone(), kind)
        })
        .collect()
}

fn aggregate_sentence(column: &str, value: &Value) -> Option<String> {
    let upper = column.to_uppercase();
    let shown = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if upper.contains("COUNT") {
        Some(format!("Toplam **{}** adet bulundu.", shown))
    } else if upper.contains("SUM") {
        Some(format!("Toplam: **{}**", shown))
    } else if upper.contains("AVG") {
        Some(format!("Ortalama: **{}**", shown))
    } else {
        None
    }
}

/// A short human-readable summary of the rows.
pub fn format_response(rows: &[Value]) -> String {
    if rows.is_empty() {
        return "Sorgunuz için sonuç bulunamadı.".to_string();
    }
    if let [Value::Object(only)] = rows {
        if only.len() == 1 {
            if let Some((column, value)) = only.iter().next() {
                if let Some(sentence) = aggregate_sentence(column, value) {
                    return sentence;
                }
            }
        }
    }
    format!("Sorgunuz için **{} sonuç** bulundu.", rows.len())
}

/// Adds `response`, `tables` and `query_metadata` to the AI payload.
pub fn enrich(mut payload: Value, query_type: QueryType, duration_ms: i64) -> Value {
    let rows: Vec<Value> = payload
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let result_count = payload
        .get("result_count")
        .and_then(Value::as_u64)
        .unwrap_or(rows.len() as u64);

    let tables: Vec<Value> = if rows.is_empty() {
        Vec::new()
    } else {
        let headers: Vec<String> = match rows.first() {
            Some(Value::Object(first)) => first.keys().cloned().collect(),
            _ => Vec::new(),
        };
        vec![json!({
            "headers": headers,
            "rows": rows,
            "total_count": result_count,
            "column_types": detect_column_types(&rows),
        })]
    };

    let metadata = json!({
        "duration_ms": duration_ms,
        "timestamp": clock::now_ts(),
        "query_type": query_type,
        "sql_query": payload.get("sql").cloned().unwrap_or(Value::Null),
        "result_count": result_count,
        "has_tables": !tables.is_empty(),
    });

    if !payload.is_object() {
        payload = Value::Object(Map::new());
    }
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("response".into(), Value::String(format_response(&rows)));
        obj.insert("tables".into(), Value::Array(tables));
        obj.insert("query_metadata".into(), metadata);
    }
    payload
}

/// How an attempt ended, as stored in the query history.
enum Outcome {
    Answered(i32),
    Failed(String),
    FellBack { error: String, response_id: i32 },
}

async fn record(
    db: &DatabaseConnection,
    user_id: i32,
    query: &str,
    query_type: QueryType,
    outcome: Outcome,
    duration_ms: i64,
) -> Option<i32> {
    let (was_successful, result_count, error_message, fallback_response_id) = match outcome {
        Outcome::Answered(count) => (true, count, None, None),
        Outcome::Failed(e) => (false, 0, Some(e), None),
        Outcome::FellBack { error, response_id } => (false, 0, Some(error), Some(response_id)),
    };
    let row = chatbot_query::ActiveModel {
        user_id: Set(user_id),
        query: Set(query.to_string()),
        query_type: Set(query_type.as_str().to_string()),
        was_successful: Set(was_successful),
        result_count: Set(result_count),
        duration_ms: Set(duration_ms),
        error_message: Set(error_message),
        used_fallback: Set(fallback_response_id.is_some()),
        fallback_response_id: Set(fallback_response_id),
        created_at: Set(clock::now_ts()),
        ..Default::default()
    };
    match row.insert(db).await {
        Ok(saved) => Some(saved.id),
        Err(e) => {
            tracing::error!(user_id, "Failed to record chatbot query: {}", e);
            None
        }
    }
}

/// First active canned answer whose keyword appears in the query. Counts the use.
pub async fn find_fallback(
    db: &DatabaseConnection,
    query: &str,
) -> Result<Option<chatbot_fallback_response::Model>, DomainError> {
    let lowered = query.trim().to_lowercase();
    let hit = FallbackResponse::find()
        .filter(chatbot_fallback_response::Column::IsActive.eq(true))
        .order_by_asc(chatbot_fallback_response::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .find(|r| lowered.contains(&r.trigger_keyword.to_lowercase()));

    if let Some(found) = &hit {
        FallbackResponse::update_many()
            .col_expr(
                chatbot_fallback_response::Column::UsageCount,
                Expr::col(chatbot_fallback_response::Column::UsageCount).add(1),
            )
            .filter(chatbot_fallback_response::Column::Id.eq(found.id))
            .exec(db)
            .await?;
    }
    Ok(hit)
}

pub async fn ask(
    db: &DatabaseConnection,
    ai: &AiClient,
    user_id: i32,
    raw_query: Option<&str>,
) -> Result<Value, DomainError> {
    let query = validate_query(raw_query).map_err(|e| {
        if matches!(e, DomainError::InvalidState(_)) {
            tracing::warn!(user_id, "Chatbot query rejected for forbidden characters");
        }
        e
    })?;
    let query_type = detect_query_type(&query);

    let started = Instant::now();
    let result = ai.ask(&query).await;
    let duration_ms = started.elapsed().as_millis() as i64;

    match result {
        Ok(payload) => {
            let count = payload
                .get("result_count")
                .and_then(Value::as_i64)
                .or_else(|| payload.get("results").and_then(Value::as_array).map(|r| r.len() as i64))
                .unwrap_or(0);
            let query_id = record(db, user_id, &query, query_type, Outcome::Answered(count as i32), duration_ms).await;

            tracing::info!(
                user_id,
                query_type = query_type.as_str(),
                duration_ms,
                result_count = count,
                "Chatbot query answered"
            );

            let mut enriched = enrich(payload, query_type, duration_ms);
            if let Some(obj) = enriched.as_object_mut() {
                obj.insert("query_id".into(), json!(query_id));
            }
            Ok(enriched)
        }
        Err(e) => {
            tracing::error!(user_id, duration_ms, "Chatbot query failed: {}", e);
            let message = match e {
                AiError::Status(_) | AiError::InvalidResponse(_) => SERVICE_ERROR_MESSAGE,
                AiError::Unreachable(_) => UNREACHABLE_MESSAGE,
            };
            let fallback = match find_fallback(db, &query).await {
                Ok(found) => found,
                Err(lookup) => {
                    tracing::warn!(user_id, "Fallback lookup failed: {}", lookup);
                    None
                }
            };
            let Some(fallback) = fallback else {
                record(db, user_id, &query, query_type, Outcome::Failed(e.to_string()), duration_ms).await;
                return Err(DomainError::External(message.to_string()));
            };

            tracing::info!(user_id, keyword = %fallback.trigger_keyword, "Answered chatbot query from fallback");
            let outcome = Outcome::FellBack {
                error: e.to_string(),
                response_id: fallback.id,
            };
            let query_id = record(db, user_id, &query, query_type, outcome, duration_ms).await;
            Ok(json!({
                "fallback": true,
                "message": fallback.response_text,
                "response": fallback.response_text,
                "tables": [],
                "query_id": query_id,
                "query_metadata": {
                    "duration_ms": duration_ms,
                    "timestamp": clock::now_ts(),
                    "query_type": query_type,
                },
            }))
        }
    }
}

pub struct HistoryPage {
    pub rows: Vec<chatbot_query::Model>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl HistoryPage {
    pub fn meta(&self) -> Value {
        let current_page = self.offset / self.limit + 1;
        let last_page = self.total.div_ceil(self.limit).max(1);
        json!({
            "total": self.total,
            "limit": self.limit,
            "offset": self.offset,
            "current_page": current_page,
            "last_page": last_page,
        })
    }
}

pub async fn history(
    db: &DatabaseConnection,
    user_id: i32,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<HistoryPage, DomainError> {
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let offset = offset.unwrap_or(0);

    let query = ChatbotQuery::find().filter(chatbot_query::Column::UserId.eq(user_id));
    let total = query.clone().count(db).await?;
    let rows = query
        .order_by_desc(chatbot_query::Column::CreatedAt)
        .order_by_desc(chatbot_query::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;

    Ok(HistoryPage {
        rows,
        total,
        limit,
        offset,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackInput {
    pub query_id: Option<i32>,
    pub rating: Option<String>,
    pub comment: Option<String>,
}

/// Stores the caller's rating of an answer. One row per query and user; a
/// second submission replaces the first. Returns whether a row was created.
pub async fn submit_feedback(
    db: &DatabaseConnection,
    user_id: i32,
    input: FeedbackInput,
) -> Result<(bool, chatbot_feedback::Model), DomainError> {
    let mut errors = FieldErrors::default();
    match input.query_id {
        None => errors.add("query_id", "Sorgu kimliği zorunludur"),
        Some(id) => {
            if ChatbotQuery::find_by_id(id).one(db).await?.is_none() {
                errors.add("query_id", "Seçilen sorgu bulunamadı");
            }
        }
    }
    let rating = match input.rating.as_deref() {
        None | Some("") => {
            errors.add("rating", "Değerlendirme zorunludur");
            None
        }
        Some(raw) => {
            let parsed = FeedbackRating::parse(raw);
            if parsed.is_none() {
                errors.add(
                    "rating",
                    format!("Geçersiz değerlendirme. Geçerli değerler: {}", FeedbackRating::choices()),
                );
            }
            parsed
        }
    };
    let comment = input
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    errors.max_len(
        "comment",
        comment.as_deref(),
        MAX_FEEDBACK_COMMENT_CHARS,
        "Yorum en fazla 1000 karakter olabilir",
    );
    errors.into_result()?;

    let (Some(query_id), Some(rating)) = (input.query_id, rating) else {
        return Err(DomainError::Internal("feedback passed validation without fields".into()));
    };
    let now = clock::now_ts();

    let existing = ChatbotFeedback::find()
        .filter(chatbot_feedback::Column::ChatbotQueryId.eq(query_id))
        .filter(chatbot_feedback::Column::UserId.eq(user_id))
        .one(db)
        .await?;

    let (created, saved) = match existing {
        Some(row) => {
            let mut active: chatbot_feedback::ActiveModel = row.into();
            active.rating = Set(rating.as_str().to_string());
            active.comment = Set(comment);
            active.updated_at = Set(now);
            (false, active.update(db).await?)
        }
        None => {
            let row = chatbot_feedback::ActiveModel {
                chatbot_query_id: Set(query_id),
                user_id: Set(user_id),
                rating: Set(rating.as_str().to_string()),
                comment: Set(comment),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            };
            (true, row.insert(db).await?)
        }
    };

    tracing::info!(user_id, query_id, rating = %rating, created, "Chatbot feedback saved");
    Ok((created, saved))
}

/// Usage figures over the last `days` days (Admin view)
pub async fn analytics(db: &DatabaseConnection, days: i64) -> Result<Value, DomainError> {
    let since = clock::format_ts(Utc::now() - Duration::days(days.clamp(1, 365)));
    let rows = ChatbotQuery::find()
        .filter(chatbot_query::Column::CreatedAt.gte(since.clone()))
        .all(db)
        .await?;

    let total = rows.len();
    let successful = rows.iter().filter(|r| r.was_successful).count();
    let avg_ms = if total == 0 {
        0.0
    } else {
        rows.iter().map(|r| r.duration_ms as f64).sum::<f64>() / total as f64
    };

    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_text: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &rows {
        *by_type.entry(r.query_type.as_str()).or_default() += 1;
        *by_text.entry(r.query.as_str()).or_default() += 1;
    }
    let mut common: Vec<(&str, usize)> = by_text.into_iter().collect();
    common.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    common.truncate(10);

    let fallbacks = rows.iter().filter(|r| r.used_fallback).count();

    let query_ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let feedback = if query_ids.is_empty() {
        Vec::new()
    } else {
        ChatbotFeedback::find()
            .filter(chatbot_feedback::Column::ChatbotQueryId.is_in(query_ids))
            .all(db)
            .await?
    };
    let rated = |rating: FeedbackRating| feedback.iter().filter(|f| f.rating == rating.as_str()).count();
    let helpful = rated(FeedbackRating::Helpful);

    let percent = |part: usize, whole: usize| {
        if whole == 0 {
            0.0
        } else {
            ((part as f64 / whole as f64) * 10000.0).round() / 100.0
        }
    };
    let rate = |part: usize| percent(part, total);

    Ok(json!({
        "since": since,
        "total_queries": total,
        "successful_queries": successful,
        "failed_queries": total - successful,
        "success_rate": rate(successful),
        "average_duration_ms": (avg_ms * 100.0).round() / 100.0,
        "fallback_count": fallbacks,
        "fallback_rate": rate(fallbacks),
        "total_feedback": feedback.len(),
        "helpful_feedback": helpful,
        "not_helpful_feedback": rated(FeedbackRating::NotHelpful),
        "partially_helpful_feedback": rated(FeedbackRating::PartiallyHelpful),
        "helpfulness_rate": percent(helpful, feedback.len()),
        "query_types": by_type,
        "common_queries": common
            .into_iter()
            .map(|(query, count)| json!({ "query": query, "count": count }))
            .collect::<Vec<_>>(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_types_follow_keyword_order() {
        assert_eq!(detect_query_type("Bu hafta kaç eşya ödünç verildi?"), QueryType::TimeBased);
        assert_eq!(detect_query_type("Toplam kaç laptop var"), QueryType::Statistical);
        assert_eq!(detect_query_type("Osiloskop nerede?"), QueryType::Location);
        assert_eq!(detect_query_type("Hangi cihazlar boşta"), QueryType::Status);
        assert_eq!(detect_query_type("Projektör kimde"), QueryType::Assignment);
        assert_eq!(detect_query_type("Laptopları listele"), QueryType::General);
    }

    #[test]
    fn query_validation() {
        assert!(matches!(validate_query(Some("ab")), Err(DomainError::Validation(_))));
        assert!(matches!(
            validate_query(Some("DROP TABLE items;")),
            Err(DomainError::InvalidState(_))
        ));
        assert_eq!(validate_query(Some("  boştaki eşyalar ")).unwrap(), "boştaki eşyalar");
        let long = "a".repeat(1001);
        assert!(validate_query(Some(&long)).is_err());
    }

    #[test]
    fn aggregate_rows_get_a_sentence() {
        assert_eq!(
            format_response(&[json!({ "COUNT(*)": 42 })]),
            "Toplam **42** adet bulundu."
        );
        assert_eq!(format_response(&[json!({ "avg_value": "12.5" })]), "Ortalama: **12.5**");
        assert_eq!(format_response(&[]), "Sorgunuz için sonuç bulunamadı.");
        assert_eq!(
            format_response(&[json!({ "name": "a" }), json!({ "name": "b" })]),
            "Sorgunuz için **2 sonuç** bulundu."
        );
    }

    #[test]
    fn column_types() {
        let rows: Vec<Value> = (0..12)
            .map(|i| {
                json!({
                    "id": i,
                    "created_at": "2025-01-02 10:00:00",
                    "status": if i % 2 == 0 { "available" } else { "lent" },
                    "name": format!("Cihaz {}", i),
                })
            })
            .collect();
        let types = detect_column_types(&rows);
        assert_eq!(types["id"], "number");
        assert_eq!(types["created_at"], "date");
        assert_eq!(types["status"], "categorical");
        assert_eq!(types["name"], "categorical");

        let few = detect_column_types(&rows[..3]);
        assert_eq!(few["name"], "text");
    }

    #[tokio::test]
    async fn fallback_matches_keywords_anywhere_in_the_query() {
        let db = crate::db::init_db("sqlite::memory:").await.unwrap();

        let hit = find_fallback(&db, "  Merhaba, laptoplar nerede? ").await.unwrap().unwrap();
        assert_eq!(hit.trigger_keyword, "merhaba");
        assert!(find_fallback(&db, "Laptoplar nerede?").await.unwrap().is_none());

        FallbackResponse::update_many()
            .col_expr(chatbot_fallback_response::Column::IsActive, Expr::value(false))
            .filter(chatbot_fallback_response::Column::TriggerKeyword.eq("merhaba"))
            .exec(&db)
            .await
            .unwrap();
        assert!(find_fallback(&db, "merhaba").await.unwrap().is_none());
    }

    #[test]
    fn enrich_builds_table_and_metadata() {
        let payload = json!({
            "results": [{ "name": "Osiloskop", "location": "B-101" }],
            "result_count": 1,
            "sql": "SELECT name, location FROM items",
        });
        let v = enrich(payload, QueryType::Location, 120);
        assert_eq!(v["tables"][0]["headers"], json!(["location", "name"]));
        assert_eq!(v["tables"][0]["total_count"], 1);
        assert_eq!(v["query_metadata"]["query_type"], "location");
        assert_eq!(v["query_metadata"]["has_tables"], true);
        assert_eq!(v["query_metadata"]["sql_query"], "SELECT name, location FROM items");
        assert_eq!(v["response"], "Sorgunuz için **1 sonuç** bulundu.");
    }
}
