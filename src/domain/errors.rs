//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use std::fmt;

use super::validation::FieldErrors;

#[derive(Debug)]
pub enum DomainError {
    /// Resource not found, with a user-facing message
    NotFound(String),
    /// Field-level validation failures
    Validation(FieldErrors),
    /// Credentials missing or wrong
    Unauthorized(String),
    /// Authenticated but not allowed to perform the action
    Forbidden(String),
    /// A business rule rejected the operation (e.g. returning a closed transaction)
    InvalidState(String),
    /// A workflow transition that the current status does not allow
    InvalidTransition(String),
    /// Uniqueness or concurrent-modification conflict
    Conflict(String),
    /// Database/persistence error
    Database(String),
    /// External service error
    External(String),
    /// Generic internal error
    Internal(String),
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        DomainError::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        DomainError::InvalidState(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        DomainError::Forbidden(msg.into())
    }

    /// Single-field validation failure.
    pub fn field(field: &str, msg: impl Into<String>) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, msg);
        DomainError::Validation(errors)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DomainError::Validation(errors) => write!(f, "Validation error: {}", errors),
            DomainError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            DomainError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            DomainError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            DomainError::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),
            DomainError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DomainError::Database(msg) => write!(f, "Database error: {}", msg),
            DomainError::External(msg) => write!(f, "External service error: {}", msg),
            DomainError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        let text = e.to_string();
        // SQLite reports the partial unique index on open transactions this way
        if text.contains("UNIQUE constraint failed") {
            tracing::warn!("Unique constraint rejected write: {}", text);
            return DomainError::Conflict("Bu kayıt zaten mevcut veya başka bir işlemle çakışıyor".to_string());
        }
        if text.contains("FOREIGN KEY constraint failed") {
            tracing::warn!("Foreign key rejected write: {}", text);
            return DomainError::Conflict("Kayıt başka kayıtlar tarafından kullanılıyor".to_string());
        }
        DomainError::Database(text)
    }
}
