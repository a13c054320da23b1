use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub inventory_number: String,
    pub name: String,
    pub category_id: i32,
    pub vendor_id: Option<i32>,
    pub location: String,
    pub status: String, // 'available', 'lent', 'maintenance', 'retired', 'donated'
    pub condition_status: Option<String>,
    pub specifications: Option<String>, // JSON object
    pub current_holder_id: Option<i32>,
    pub is_active: bool,
    pub purchase_date: Option<String>,
    pub purchase_value: Option<f64>,
    pub warranty_expiry_date: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Vendor,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CurrentHolderId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Holder,
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parsed `specifications`, or `null` when absent or malformed.
    pub fn specifications_value(&self) -> Value {
        self.specifications
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null)
    }

    pub fn to_json(&self, category_name: Option<&str>) -> Value {
        json!({
            "id": self.id,
            "inventory_number": self.inventory_number,
            "name": self.name,
            "category_id": self.category_id,
            "category_name": category_name,
            "vendor_id": self.vendor_id,
            "location": self.location,
            "status": self.status,
            "condition_status": self.condition_status,
            "specifications": self.specifications_value(),
            "current_holder_id": self.current_holder_id,
            "is_active": self.is_active,
            "purchase_date": self.purchase_date,
            "purchase_value": self.purchase_value,
            "warranty_expiry_date": self.warranty_expiry_date,
            "deleted_at": self.deleted_at,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}
