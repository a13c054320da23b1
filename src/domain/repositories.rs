//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::DomainError;
use crate::models::item::Model as Item;

/// Filter criteria for item queries
#[derive(Debug, Default, Clone)]
pub struct ItemFilter {
    /// Matches name, inventory number or location
    pub search: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<i32>,
    /// Restricts to items currently held by this user
    pub holder_id: Option<i32>,
    /// 1-based page number
    pub page: u64,
    pub per_page: u64,
}

/// Paginated result with total count
#[derive(Debug)]
pub struct PaginatedItems {
    pub items: Vec<(Item, Option<String>)>,
    pub total: u64,
}

/// Repository trait for Item entity
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Active items matching the filter, with their category names
    async fn find_all(&self, filter: ItemFilter) -> Result<PaginatedItems, DomainError>;

    /// Find an item by ID (including decommissioned ones)
    async fn find_by_id(&self, id: i32) -> Result<Option<Item>, DomainError>;

    /// Find an item by its inventory number
    async fn find_by_inventory_number(&self, number: &str) -> Result<Option<Item>, DomainError>;

    /// Active item counts per status
    async fn count_by_status(&self) -> Result<Vec<(String, u64)>, DomainError>;

    /// Number of items currently held by a user
    async fn count_held_by(&self, user_id: i32) -> Result<u64, DomainError>;
}

/// Category data for API responses
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i32,
    pub category_name: String,
    pub description: Option<String>,
    pub schema_definition: Option<Value>,
    pub items_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating or updating a category
#[derive(Debug, Clone, Default)]
pub struct CategoryInput {
    pub category_name: String,
    pub description: Option<String>,
    /// Raw JSON text, already validated
    pub schema_definition: Option<String>,
}

/// Repository trait for Category entity
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// All categories ordered by name
    async fn find_all(&self) -> Result<Vec<Category>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Category>, DomainError>;

    /// Case-sensitive lookup used for uniqueness checks
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, DomainError>;

    async fn create(&self, input: CategoryInput) -> Result<Category, DomainError>;

    async fn update(&self, id: i32, input: CategoryInput) -> Result<Category, DomainError>;

    /// Deletes a category; fails with `InvalidState` while items reference it
    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}
