use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "maintenance_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub item_id: i32,
    pub requested_by: i32,
    pub assigned_to: Option<i32>,
    pub transaction_id: Option<i32>,
    pub maintenance_type: String,
    pub priority: String,
    pub status: String, // 'pending', 'in_progress', 'completed', 'cancelled'
    pub description: String,
    pub resolution_notes: Option<String>,
    pub cost: Option<f64>,
    pub scheduled_date: Option<String>,
    pub completed_date: Option<String>,
    // SLA tracking
    pub sla_hours: i32,
    pub sla_due_date: String,
    pub resolution_target: String,
    pub first_response_at: Option<String>,
    pub resolved_at: Option<String>,
    pub sla_breached: bool,
    pub sla_breach_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
