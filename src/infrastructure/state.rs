//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{CategoryRepository, ItemRepository};
use crate::infrastructure::config::Config;
use crate::infrastructure::{SeaOrmCategoryRepository, SeaOrmItemRepository};
use crate::services::ai_client::AiClient;
use crate::services::LoanPolicy;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    /// Item repository
    pub item_repo: Arc<dyn ItemRepository>,
    /// Category repository
    pub category_repo: Arc<dyn CategoryRepository>,
    pub config: Arc<Config>,
    pub ai: AiClient,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let item_repo = Arc::new(SeaOrmItemRepository::new(db.clone()));
        let category_repo = Arc::new(SeaOrmCategoryRepository::new(db.clone()));
        let ai = AiClient::new(config.ai_service_url.clone(), config.ai_timeout_secs);

        Self {
            db,
            item_repo,
            category_repo,
            config: Arc::new(config),
            ai,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn loan_policy(&self) -> LoanPolicy {
        LoanPolicy {
            late_fee_per_day: self.config.late_fee_per_day,
            default_loan_days: self.config.default_loan_days,
        }
    }
}

impl AsRef<DatabaseConnection> for AppState {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Implement FromRef to allow extracting DatabaseConnection from AppState
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
