//! Domain layer - Pure business rules
//!
//! This layer contains NO framework dependencies (no SeaORM, no Axum) apart from
//! the repository contracts and the error conversion from the database layer.

pub mod clock;
pub mod errors;
pub mod fees;
pub mod repositories;
pub mod roles;
pub mod sla;
pub mod status;
pub mod validation;

pub use errors::DomainError;
pub use repositories::*;
pub use roles::{Actor, Role};
pub use validation::FieldErrors;
