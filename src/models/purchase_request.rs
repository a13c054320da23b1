use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub item_name: String,
    pub description: String,
    pub category: Option<String>,
    pub quantity: i32,
    pub estimated_cost: Option<f64>,
    pub justification: String,
    pub requested_by: i32,
    pub approved_by: Option<i32>,
    pub reviewed_by: Option<i32>,
    pub status: String, // 'pending', 'approved', 'rejected', 'ordered', 'received', 'cancelled'
    pub priority: String,
    pub rejection_reason: Option<String>,
    pub needed_by_date: Option<String>,
    pub approved_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub vendor_id: Option<i32>,
    pub actual_quantity: Option<i32>,
    pub approved_date: Option<String>,
    pub ordered_date: Option<String>,
    pub received_date: Option<String>,
    pub expected_delivery_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RequestedBy",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Requester,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requester.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
