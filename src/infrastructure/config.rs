use std::env;

use crate::domain::fees::DEFAULT_LATE_FEE_PER_DAY;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub late_fee_per_day: f64,
    pub default_loan_days: i64,
    pub ai_service_url: String,
    pub ai_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://labtrack.db?mode=rwc".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            late_fee_per_day: DEFAULT_LATE_FEE_PER_DAY,
            default_loan_days: 14,
            ai_service_url: "http://ai-service:8001".to_string(),
            ai_timeout_secs: 60,
            sweep_interval_secs: 300,
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            port: parsed("PORT").unwrap_or(defaults.port),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(Vec::new),
            late_fee_per_day: parsed::<f64>("LATE_FEE_PER_DAY")
                .filter(|rate| *rate >= 0.0)
                .unwrap_or(defaults.late_fee_per_day),
            default_loan_days: parsed::<i64>("DEFAULT_LOAN_DAYS")
                .filter(|days| *days > 0)
                .unwrap_or(defaults.default_loan_days),
            ai_service_url: env::var("AI_SERVICE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ai_service_url),
            ai_timeout_secs: parsed("AI_TIMEOUT_SECS").unwrap_or(defaults.ai_timeout_secs),
            sweep_interval_secs: parsed::<u64>("SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.sweep_interval_secs),
        }
    }
}
