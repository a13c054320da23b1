//! SeaORM implementation of ItemRepository

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

use crate::domain::{DomainError, ItemFilter, ItemRepository, PaginatedItems};
use crate::models::category::Entity as CategoryEntity;
use crate::models::item::{Column, Entity as ItemEntity, Model as Item};

pub const DEFAULT_PER_PAGE: u64 = 50;
pub const MAX_PER_PAGE: u64 = 100;

/// SeaORM-based implementation of ItemRepository
pub struct SeaOrmItemRepository {
    db: DatabaseConnection,
}

impl SeaOrmItemRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct StatusCount {
    status: String,
    count: i64,
}

#[async_trait]
impl ItemRepository for SeaOrmItemRepository {
    async fn find_all(&self, filter: ItemFilter) -> Result<PaginatedItems, DomainError> {
        let mut query = ItemEntity::find().filter(Column::IsActive.eq(true));

        // Apply filters
        if let Some(q) = filter.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let cond = Condition::any()
                .add(Column::Name.contains(q))
                .add(Column::InventoryNumber.contains(q))
                .add(Column::Location.contains(q));
            query = query.filter(cond);
        }

        if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(Column::Status.eq(status));
        }

        if let Some(category_id) = filter.category_id {
            query = query.filter(Column::CategoryId.eq(category_id));
        }

        if let Some(holder_id) = filter.holder_id {
            query = query.filter(Column::CurrentHolderId.eq(holder_id));
        }

        let per_page = match filter.per_page {
            0 => DEFAULT_PER_PAGE,
            n => n.min(MAX_PER_PAGE),
        };
        let page = filter.page.max(1);

        let paginator = query
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .find_also_related(CategoryEntity)
            .paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page - 1).await?;

        Ok(PaginatedItems {
            items: rows
                .into_iter()
                .map(|(item, category)| (item, category.map(|c| c.category_name)))
                .collect(),
            total,
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Item>, DomainError> {
        Ok(ItemEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_inventory_number(&self, number: &str) -> Result<Option<Item>, DomainError> {
        Ok(ItemEntity::find()
            .filter(Column::InventoryNumber.eq(number))
            .one(&self.db)
            .await?)
    }

    async fn count_by_status(&self) -> Result<Vec<(String, u64)>, DomainError> {
        let rows = ItemEntity::find()
            .select_only()
            .column(Column::Status)
            .column_as(Column::Id.count(), "count")
            .filter(Column::IsActive.eq(true))
            .group_by(Column::Status)
            .into_model::<StatusCount>()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.status, r.count.max(0) as u64))
            .collect())
    }

    async fn count_held_by(&self, user_id: i32) -> Result<u64, DomainError> {
        Ok(ItemEntity::find()
            .filter(Column::CurrentHolderId.eq(user_id))
            .filter(Column::IsActive.eq(true))
            .count(&self.db)
            .await?)
    }
}
