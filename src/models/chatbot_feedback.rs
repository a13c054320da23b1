use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chatbot_feedback")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub chatbot_query_id: i32,
    pub user_id: i32,
    pub rating: String,
    pub comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chatbot_query::Entity",
        from = "Column::ChatbotQueryId",
        to = "super::chatbot_query::Column::Id"
    )]
    ChatbotQuery,
}

impl Related<super::chatbot_query::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatbotQuery.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
