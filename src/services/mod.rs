//! Services Layer
//!
//! This module contains the business workflows called by the HTTP handlers
//! and the background sweeper.

pub mod ai_client;
pub mod chat_service;
pub mod inventory_service;
pub mod maintenance_service;
pub mod notification_service;
pub mod purchase_service;
pub mod report_service;
pub mod sweeper;
pub mod transaction_service;
pub mod user_service;

// Re-export for convenience
pub use ai_client::AiClient;
pub use transaction_service::LoanPolicy;
