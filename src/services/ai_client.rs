//! HTTP client for the natural-language query microservice.
//!
//! The service translates questions to SQL and runs them; this side only
//! forwards the question and relays the JSON answer.

use serde_json::{json, Value};
use std::time::Duration;

const SIDE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum AiError {
    /// Connection refused, DNS failure, timeout
    Unreachable(String),
    /// The service answered with a non-success status
    Status(u16),
    /// The body was not the JSON we expect
    InvalidResponse(String),
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiError::Unreachable(e) => write!(f, "AI service unreachable: {}", e),
            AiError::Status(code) => write!(f, "AI service returned status {}", code),
            AiError::InvalidResponse(e) => write!(f, "AI service returned invalid JSON: {}", e),
        }
    }
}

#[derive(Clone)]
pub struct AiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AiClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("labtrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /ask` with `{"query": ...}`.
    pub async fn ask(&self, query: &str) -> Result<Value, AiError> {
        let url = format!("{}/ask", self.base_url);
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| AiError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AiError::Status(resp.status().as_u16()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| AiError::InvalidResponse(e.to_string()))
    }

    /// `GET /health`; never fails, reports `unreachable` instead.
    pub async fn health(&self) -> Value {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).timeout(SIDE_CALL_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => resp
                .json::<Value>()
                .await
                .unwrap_or_else(|_| json!({ "status": "unhealthy" })),
            Ok(_) => json!({ "status": "unhealthy" }),
            Err(e) => json!({ "status": "unreachable", "error": e.to_string() }),
        }
    }

    /// Asks the service to drop cached answers matching `pattern`.
    pub async fn invalidate_cache(&self, pattern: &str) -> bool {
        let url = format!("{}/cache/invalidate", self.base_url);
        match self
            .client
            .post(&url)
            .timeout(SIDE_CALL_TIMEOUT)
            .json(&json!({ "pattern": pattern }))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("Failed to invalidate AI cache ({}): {}", pattern, e);
                false
            }
        }
    }

    /// Fire-and-forget cache invalidation after inventory writes.
    pub fn invalidate_cache_in_background(&self, pattern: &'static str) {
        let client = self.clone();
        tokio::spawn(async move {
            client.invalidate_cache(pattern).await;
        });
    }
}
