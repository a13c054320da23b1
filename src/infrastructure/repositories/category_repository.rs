//! SeaORM implementation of CategoryRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::{clock, Category, CategoryInput, CategoryRepository, DomainError};
use crate::models::category::{ActiveModel, Column, Entity as CategoryEntity, Model};
use crate::models::item::{self, Entity as ItemEntity};

/// SeaORM-based implementation of CategoryRepository
pub struct SeaOrmCategoryRepository {
    db: DatabaseConnection,
}

impl SeaOrmCategoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn items_count(&self, category_id: i32) -> Result<u64, DomainError> {
        Ok(ItemEntity::find()
            .filter(item::Column::CategoryId.eq(category_id))
            .count(&self.db)
            .await?)
    }

    async fn to_dto(&self, model: Model) -> Result<Category, DomainError> {
        let items_count = self.items_count(model.id).await?;
        Ok(Category {
            id: model.id,
            category_name: model.category_name,
            description: model.description,
            schema_definition: model
                .schema_definition
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            items_count,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[async_trait]
impl CategoryRepository for SeaOrmCategoryRepository {
    async fn find_all(&self) -> Result<Vec<Category>, DomainError> {
        let models = CategoryEntity::find()
            .order_by_asc(Column::CategoryName)
            .all(&self.db)
            .await?;

        let mut result = Vec::with_capacity(models.len());
        for model in models {
            result.push(self.to_dto(model).await?);
        }
        Ok(result)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Category>, DomainError> {
        match CategoryEntity::find_by_id(id).one(&self.db).await? {
            Some(model) => Ok(Some(self.to_dto(model).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, DomainError> {
        let model = CategoryEntity::find()
            .filter(Column::CategoryName.eq(name))
            .one(&self.db)
            .await?;
        match model {
            Some(model) => Ok(Some(self.to_dto(model).await?)),
            None => Ok(None),
        }
    }

    async fn create(&self, input: CategoryInput) -> Result<Category, DomainError> {
        let now = clock::now_ts();

        let category = ActiveModel {
            category_name: Set(input.category_name),
            description: Set(input.description),
            schema_definition: Set(input.schema_definition),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = category.insert(&self.db).await?;
        self.to_dto(result).await
    }

    async fn update(&self, id: i32, input: CategoryInput) -> Result<Category, DomainError> {
        let existing = CategoryEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("Kategori bulunamadı"))?;

        let mut active: ActiveModel = existing.into();
        active.category_name = Set(input.category_name);
        active.description = Set(input.description);
        active.schema_definition = Set(input.schema_definition);
        active.updated_at = Set(clock::now_ts());

        let result = active.update(&self.db).await?;
        self.to_dto(result).await
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let in_use = self.items_count(id).await?;
        if in_use > 0 {
            return Err(DomainError::invalid_state(format!(
                "Bu kategoride {} eşya bulunduğu için silinemez",
                in_use
            )));
        }

        let result = CategoryEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::not_found("Kategori bulunamadı"));
        }

        Ok(())
    }
}
