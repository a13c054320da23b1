//! Inventory Service - item lifecycle and validation

use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::status::{ItemCondition, ItemStatus, LifecycleEvent};
use crate::domain::validation::{check_specifications, parse_category_schema};
use crate::domain::{clock, DomainError, FieldErrors};
use crate::models::category::Entity as Category;
use crate::models::item::{self, Entity as Item};
use crate::models::item_lifecycle_event::{self, Entity as LifecycleEventEntity};
use crate::models::user::Entity as User;
use crate::models::vendor::{self, Entity as Vendor};

const MAX_SPEC_KEYS: usize = 20;

/// Body of `POST /items`; also used for partial updates where every field is optional
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ItemInput {
    pub inventory_number: Option<String>,
    pub name: Option<String>,
    pub category_id: Option<i32>,
    pub vendor_id: Option<i32>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub condition_status: Option<String>,
    pub specifications: Option<Value>,
    pub purchase_date: Option<String>,
    pub purchase_value: Option<f64>,
    pub warranty_expiry_date: Option<String>,
}

fn valid_inventory_number(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
}

pub async fn record_event<C: ConnectionTrait>(
    db: &C,
    item_id: i32,
    event: LifecycleEvent,
    notes: impl Into<String>,
) -> Result<(), DomainError> {
    item_lifecycle_event::ActiveModel {
        item_id: Set(item_id),
        event_type: Set(event.as_str().to_string()),
        notes: Set(Some(notes.into())),
        created_at: Set(clock::now_ts()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Checks shared by create and update. `existing` is the item being updated.
async fn validate(
    db: &DatabaseConnection,
    input: &ItemInput,
    existing: Option<&item::Model>,
) -> Result<(), DomainError> {
    let mut errors = FieldErrors::default();
    let creating = existing.is_none();

    if creating {
        errors.require("inventory_number", input.inventory_number.as_deref(), "Envanter numarası zorunludur.");
        errors.require("name", input.name.as_deref(), "Eşya adı zorunludur.");
        errors.require("location", input.location.as_deref(), "Konum bilgisi zorunludur.");
        if input.category_id.is_none() {
            errors.add("category_id", "Kategori seçimi zorunludur.");
        }
    } else {
        for (field, value) in [("name", input.name.as_deref()), ("location", input.location.as_deref())] {
            if value.is_some_and(|v| v.trim().is_empty()) {
                errors.add(field, "Bu alan boş bırakılamaz.");
            }
        }
    }

    if let Some(number) = input.inventory_number.as_deref().map(str::trim) {
        let len = number.chars().count();
        if !(3..=50).contains(&len) || !valid_inventory_number(number) {
            errors.add(
                "inventory_number",
                "Envanter numarası formatı: BÜYÜK HARF, RAKAM ve TİRE (örn: A-123-B)",
            );
        } else {
            let clash = Item::find()
                .filter(item::Column::InventoryNumber.eq(number))
                .one(db)
                .await?;
            if clash.is_some_and(|other| Some(other.id) != existing.map(|e| e.id)) {
                errors.add("inventory_number", "Bu envanter numarası zaten kullanılıyor.");
            }
        }
    }

    if let Some(name) = input.name.as_deref().map(str::trim) {
        let len = name.chars().count();
        if !name.is_empty() && !(2..=255).contains(&len) {
            errors.add("name", "Eşya adı 2 ile 255 karakter arasında olmalıdır.");
        }
    }
    errors.max_len("location", input.location.as_deref(), 255, "Konum en fazla 255 karakter olabilir.");

    if let Some(status) = input.status.as_deref() {
        match ItemStatus::parse(status) {
            None => errors.add(
                "status",
                format!("Geçersiz durum. Geçerli değerler: {}", ItemStatus::choices()),
            ),
            Some(ItemStatus::Lent) => errors.add(
                "status",
                "Ödünç durumu yalnızca ödünç verme işlemiyle ayarlanabilir.",
            ),
            Some(_) => {}
        }
    }

    if let Some(condition) = input.condition_status.as_deref() {
        if ItemCondition::parse(condition).is_none() {
            errors.add(
                "condition_status",
                format!("Geçersiz kondisyon. Geçerli değerler: {}", ItemCondition::choices()),
            );
        }
    }

    if let Some(vendor_id) = input.vendor_id {
        if Vendor::find_by_id(vendor_id).one(db).await?.is_none() {
            errors.add("vendor_id", "Seçilen tedarikçi bulunamadı.");
        }
    }

    if input.purchase_value.is_some_and(|v| v < 0.0) {
        errors.add("purchase_value", "Satın alma değeri negatif olamaz.");
    }

    let purchase_date = match input.purchase_date.as_deref() {
        Some(raw) => match clock::parse_ts(raw) {
            Some(date) if date > chrono::Utc::now() => {
                errors.add("purchase_date", "Satın alma tarihi gelecekte olamaz.");
                None
            }
            Some(date) => Some(date),
            None => {
                errors.add("purchase_date", "Geçerli bir tarih giriniz.");
                None
            }
        },
        None => existing
            .and_then(|e| e.purchase_date.as_deref())
            .and_then(clock::parse_ts),
    };

    if let Some(raw) = input.warranty_expiry_date.as_deref() {
        match clock::parse_ts(raw) {
            Some(expiry) if purchase_date.is_some_and(|p| expiry < p) => errors.add(
                "warranty_expiry_date",
                "Garanti bitiş tarihi satın alma tarihinden önce olamaz.",
            ),
            Some(_) => {}
            None => errors.add("warranty_expiry_date", "Geçerli bir tarih giriniz."),
        }
    }

    if let Some(specs) = &input.specifications {
        match specs.as_object() {
            Some(map) if map.len() > MAX_SPEC_KEYS => errors.add(
                "specifications",
                format!("En fazla {} özellik girilebilir.", MAX_SPEC_KEYS),
            ),
            Some(_) => {}
            None if specs.is_null() => {}
            None => errors.add("specifications", "Özellikler bir nesne olmalıdır."),
        }
    }

    // Category must exist, and specifications must satisfy its schema
    let category_id = input.category_id.or(existing.map(|e| e.category_id));
    if let Some(category_id) = category_id {
        match Category::find_by_id(category_id).one(db).await? {
            None => errors.add("category_id", "Seçilen kategori bulunamadı."),
            Some(category) => {
                let schema = category
                    .schema_definition
                    .as_deref()
                    .and_then(|raw| parse_category_schema(raw).ok());
                if let Some(fields) = schema {
                    let current = existing.map(|e| e.specifications_value());
                    let specs = input.specifications.as_ref().or(current.as_ref());
                    check_specifications(&fields, specs, &mut errors);
                }
            }
        }
    }

    errors.into_result()
}

fn specs_to_text(specs: &Option<Value>) -> Option<String> {
    specs
        .as_ref()
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
}

fn normalize_date(raw: Option<String>) -> Option<String> {
    raw.map(|d| clock::normalize_ts(&d).unwrap_or(d))
}

pub async fn create_item(
    db: &DatabaseConnection,
    input: ItemInput,
    actor_name: &str,
) -> Result<item::Model, DomainError> {
    validate(db, &input, None).await?;

    let now = clock::now_ts();
    let txn = db.begin().await?;

    let created = item::ActiveModel {
        inventory_number: Set(input.inventory_number.unwrap_or_default().trim().to_string()),
        name: Set(input.name.unwrap_or_default().trim().to_string()),
        category_id: Set(input.category_id.unwrap_or_default()),
        vendor_id: Set(input.vendor_id),
        location: Set(input.location.unwrap_or_default().trim().to_string()),
        status: Set(input
            .status
            .unwrap_or_else(|| ItemStatus::Available.as_str().to_string())),
        condition_status: Set(input.condition_status),
        specifications: Set(specs_to_text(&input.specifications)),
        current_holder_id: Set(None),
        is_active: Set(true),
        purchase_date: Set(normalize_date(input.purchase_date)),
        purchase_value: Set(input.purchase_value),
        warranty_expiry_date: Set(normalize_date(input.warranty_expiry_date)),
        deleted_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    record_event(
        &txn,
        created.id,
        LifecycleEvent::Created,
        format!("Eşya envantere eklendi ({})", actor_name),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(item_id = created.id, inventory_number = %created.inventory_number, "Item created");
    Ok(created)
}

pub async fn update_item(
    db: &DatabaseConnection,
    id: i32,
    input: ItemInput,
) -> Result<item::Model, DomainError> {
    let existing = Item::find_by_id(id)
        .one(db)
        .await?
        .filter(|i| i.is_active)
        .ok_or_else(|| DomainError::not_found("Eşya bulunamadı"))?;

    validate(db, &input, Some(&existing)).await?;

    let old_status = existing.status.clone();
    if existing.status == ItemStatus::Lent.as_str()
        && input.status.as_deref().is_some_and(|s| s != ItemStatus::Lent.as_str())
    {
        return Err(DomainError::invalid_state(
            "Ödünçteki bir eşyanın durumu değiştirilemez. Önce iade alınmalıdır.",
        ));
    }

    let mut active: item::ActiveModel = existing.into();
    if let Some(v) = input.inventory_number {
        active.inventory_number = Set(v.trim().to_string());
    }
    if let Some(v) = input.name {
        active.name = Set(v.trim().to_string());
    }
    if let Some(v) = input.category_id {
        active.category_id = Set(v);
    }
    if input.vendor_id.is_some() {
        active.vendor_id = Set(input.vendor_id);
    }
    if let Some(v) = input.location {
        active.location = Set(v.trim().to_string());
    }
    if let Some(v) = input.status.clone() {
        active.status = Set(v);
    }
    if input.condition_status.is_some() {
        active.condition_status = Set(input.condition_status);
    }
    if input.specifications.is_some() {
        active.specifications = Set(specs_to_text(&input.specifications));
    }
    if input.purchase_date.is_some() {
        active.purchase_date = Set(normalize_date(input.purchase_date));
    }
    if input.purchase_value.is_some() {
        active.purchase_value = Set(input.purchase_value);
    }
    if input.warranty_expiry_date.is_some() {
        active.warranty_expiry_date = Set(normalize_date(input.warranty_expiry_date));
    }
    active.updated_at = Set(clock::now_ts());

    let txn = db.begin().await?;
    let updated = active.update(&txn).await?;
    if updated.status != old_status {
        record_event(
            &txn,
            updated.id,
            LifecycleEvent::StatusChange,
            format!("Durum değişti: {} -> {}", old_status, updated.status),
        )
        .await?;
    }
    txn.commit().await?;

    Ok(updated)
}

/// Soft-deletes an item: it stays in the table for audit, inactive and retired.
pub async fn decommission(
    db: &DatabaseConnection,
    id: i32,
    actor_name: &str,
) -> Result<item::Model, DomainError> {
    let existing = Item::find_by_id(id)
        .one(db)
        .await?
        .filter(|i| i.is_active)
        .ok_or_else(|| DomainError::not_found("Eşya bulunamadı"))?;

    if existing.status == ItemStatus::Lent.as_str() {
        return Err(DomainError::invalid_state(
            "Ödünçteki bir eşya envanterden çıkarılamaz. Önce iade alınmalıdır.",
        ));
    }

    let now = clock::now_ts();
    let txn = db.begin().await?;
    let mut active: item::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.status = Set(ItemStatus::Retired.as_str().to_string());
    active.deleted_at = Set(Some(now.clone()));
    active.updated_at = Set(now);
    let retired = active.update(&txn).await?;
    record_event(
        &txn,
        id,
        LifecycleEvent::Retired,
        format!("Envanterden çıkarıldı ({})", actor_name),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(item_id = id, "Item decommissioned");
    Ok(retired)
}

const LENT_IN_SELECTION: &str = "Bazı eşyalar şu anda ödünçte. Önce iade alınmalıdır.";

/// Distinct ids in request order.
fn distinct_ids(item_ids: &[i32]) -> Vec<i32> {
    let mut ids = Vec::with_capacity(item_ids.len());
    for id in item_ids {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

/// Loads the selected active items inside `txn`; none of them may be lent.
async fn load_for_bulk<C: ConnectionTrait>(
    txn: &C,
    ids: &[i32],
) -> Result<Vec<item::Model>, DomainError> {
    if ids.is_empty() {
        return Err(DomainError::field("item_ids", "En az bir eşya seçilmelidir."));
    }

    let items = Item::find()
        .filter(item::Column::Id.is_in(ids.to_vec()))
        .filter(item::Column::IsActive.eq(true))
        .all(txn)
        .await?;

    if items.len() != ids.len() {
        return Err(DomainError::field("item_ids", "Seçilen eşyalardan bazıları bulunamadı."));
    }
    if items.iter().any(|i| i.status == ItemStatus::Lent.as_str()) {
        return Err(DomainError::field("item_ids", LENT_IN_SELECTION));
    }
    Ok(items)
}

/// `update_many` over the selection that skips lent or inactive rows.
/// Fails when a row changed under us, which rolls back the whole batch.
async fn guarded_bulk_update<C: ConnectionTrait>(
    txn: &C,
    ids: &[i32],
    update: UpdateMany<Item>,
) -> Result<u64, DomainError> {
    let result = update
        .filter(item::Column::Id.is_in(ids.to_vec()))
        .filter(item::Column::IsActive.eq(true))
        .filter(item::Column::Status.ne(ItemStatus::Lent.as_str()))
        .exec(txn)
        .await?;

    if result.rows_affected != ids.len() as u64 {
        return Err(DomainError::field("item_ids", LENT_IN_SELECTION));
    }
    Ok(result.rows_affected)
}

pub async fn bulk_update_status(
    db: &DatabaseConnection,
    item_ids: &[i32],
    status: &str,
    actor_name: &str,
) -> Result<u64, DomainError> {
    let target = match ItemStatus::parse(status) {
        Some(ItemStatus::Lent) | None => {
            return Err(DomainError::field(
                "status",
                "Geçersiz durum. Geçerli değerler: available, maintenance, retired, donated",
            ))
        }
        Some(s) => s,
    };
    let ids = distinct_ids(item_ids);

    let txn = db.begin().await?;
    let items = load_for_bulk(&txn, &ids).await?;
    let updated = guarded_bulk_update(
        &txn,
        &ids,
        Item::update_many()
            .col_expr(item::Column::Status, Expr::value(target.as_str()))
            .col_expr(item::Column::UpdatedAt, Expr::value(clock::now_ts())),
    )
    .await?;
    for item in &items {
        record_event(
            &txn,
            item.id,
            LifecycleEvent::StatusChange,
            format!("Toplu durum güncellemesi: '{}' ({})", target, actor_name),
        )
        .await?;
    }
    txn.commit().await?;

    tracing::info!(count = updated, status = %target, "Bulk status update");
    Ok(updated)
}

/// Moves the selected items into another category. Items whose
/// specifications do not satisfy the new category's schema are refused.
pub async fn bulk_update_category(
    db: &DatabaseConnection,
    item_ids: &[i32],
    category_id: Option<i32>,
    actor_name: &str,
) -> Result<u64, DomainError> {
    let category_id =
        category_id.ok_or_else(|| DomainError::field("category_id", "Kategori seçimi zorunludur."))?;
    let category = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::field("category_id", "Seçilen kategori bulunamadı."))?;
    let schema = category
        .schema_definition
        .as_deref()
        .and_then(|raw| parse_category_schema(raw).ok());
    let ids = distinct_ids(item_ids);

    let txn = db.begin().await?;
    let items = load_for_bulk(&txn, &ids).await?;

    if let Some(fields) = &schema {
        let mut errors = FieldErrors::default();
        for item in &items {
            let mut item_errors = FieldErrors::default();
            check_specifications(fields, Some(&item.specifications_value()), &mut item_errors);
            if !item_errors.is_empty() {
                errors.add(
                    "item_ids",
                    format!(
                        "{} yeni kategorinin zorunlu özelliklerini karşılamıyor.",
                        item.inventory_number
                    ),
                );
            }
        }
        errors.into_result()?;
    }

    let updated = guarded_bulk_update(
        &txn,
        &ids,
        Item::update_many()
            .col_expr(item::Column::CategoryId, Expr::value(category_id))
            .col_expr(item::Column::UpdatedAt, Expr::value(clock::now_ts())),
    )
    .await?;
    for item in items.iter().filter(|i| i.category_id != category_id) {
        record_event(
            &txn,
            item.id,
            LifecycleEvent::CategoryChange,
            format!(
                "Kategori değişti: '{}' ({})",
                category.category_name, actor_name
            ),
        )
        .await?;
    }
    txn.commit().await?;

    tracing::info!(count = updated, category_id, "Bulk category update");
    Ok(updated)
}

pub async fn bulk_decommission(
    db: &DatabaseConnection,
    item_ids: &[i32],
    actor_name: &str,
) -> Result<u64, DomainError> {
    let ids = distinct_ids(item_ids);
    let now = clock::now_ts();

    let txn = db.begin().await?;
    let items = load_for_bulk(&txn, &ids).await?;
    let retired = guarded_bulk_update(
        &txn,
        &ids,
        Item::update_many()
            .col_expr(item::Column::IsActive, Expr::value(false))
            .col_expr(item::Column::Status, Expr::value(ItemStatus::Retired.as_str()))
            .col_expr(item::Column::DeletedAt, Expr::value(now.clone()))
            .col_expr(item::Column::UpdatedAt, Expr::value(now)),
    )
    .await?;
    for item in &items {
        record_event(
            &txn,
            item.id,
            LifecycleEvent::Retired,
            format!("Toplu silme ({})", actor_name),
        )
        .await?;
    }
    txn.commit().await?;

    tracing::info!(count = retired, "Bulk decommission");
    Ok(retired)
}

pub async fn history(
    db: &DatabaseConnection,
    item_id: i32,
) -> Result<Vec<item_lifecycle_event::Model>, DomainError> {
    Ok(LifecycleEventEntity::find()
        .filter(item_lifecycle_event::Column::ItemId.eq(item_id))
        .order_by_desc(item_lifecycle_event::Column::CreatedAt)
        .order_by_desc(item_lifecycle_event::Column::Id)
        .all(db)
        .await?)
}

/// One flattened row of an inventory export
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExportRow {
    pub inventory_number: String,
    pub name: String,
    pub category: String,
    pub vendor: String,
    pub location: String,
    pub status: String,
    pub condition: String,
    pub current_holder: String,
    pub purchase_value: f64,
    pub warranty_expiry: Option<String>,
    pub created_at: String,
}

pub async fn export_rows(
    db: &DatabaseConnection,
    status: Option<&str>,
    category_id: Option<i32>,
    search: Option<&str>,
) -> Result<Vec<ExportRow>, DomainError> {
    let mut query = Item::find().filter(item::Column::IsActive.eq(true));
    if let Some(status) = status {
        query = query.filter(item::Column::Status.eq(status));
    }
    if let Some(category_id) = category_id {
        query = query.filter(item::Column::CategoryId.eq(category_id));
    }
    if let Some(q) = search.filter(|q| !q.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(item::Column::InventoryNumber.contains(q))
                .add(item::Column::Name.contains(q)),
        );
    }

    let rows = query
        .order_by_asc(item::Column::InventoryNumber)
        .find_also_related(Category)
        .all(db)
        .await?;

    let vendors: std::collections::HashMap<i32, String> = Vendor::find()
        .all(db)
        .await?
        .into_iter()
        .map(|v: vendor::Model| (v.id, v.vendor_name))
        .collect();
    let holder_ids: Vec<i32> = rows.iter().filter_map(|(i, _)| i.current_holder_id).collect();
    let holders: std::collections::HashMap<i32, String> = if holder_ids.is_empty() {
        Default::default()
    } else {
        User::find()
            .filter(crate::models::user::Column::Id.is_in(holder_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect()
    };

    let na = || "N/A".to_string();
    Ok(rows
        .into_iter()
        .map(|(item, category)| ExportRow {
            category: category.map(|c| c.category_name).unwrap_or_else(na),
            vendor: item
                .vendor_id
                .and_then(|id| vendors.get(&id).cloned())
                .unwrap_or_else(na),
            current_holder: item
                .current_holder_id
                .and_then(|id| holders.get(&id).cloned())
                .unwrap_or_else(na),
            condition: item.condition_status.clone().unwrap_or_else(na),
            purchase_value: item.purchase_value.unwrap_or(0.0),
            warranty_expiry: item.warranty_expiry_date.clone(),
            created_at: item.created_at.chars().take(10).collect(),
            inventory_number: item.inventory_number,
            name: item.name,
            location: item.location,
            status: item.status,
        })
        .collect())
}

pub fn export_csv(rows: &[ExportRow]) -> Result<String, DomainError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "Inventory Number",
            "Name",
            "Category",
            "Vendor",
            "Location",
            "Status",
            "Condition",
            "Current Holder",
            "Purchase Value",
            "Warranty Expiry",
            "Created At",
        ])
        .map_err(|e| DomainError::Internal(e.to_string()))?;

    for row in rows {
        let value = format!("{:.2}", row.purchase_value);
        writer
            .write_record([
                row.inventory_number.as_str(),
                row.name.as_str(),
                row.category.as_str(),
                row.vendor.as_str(),
                row.location.as_str(),
                row.status.as_str(),
                row.condition.as_str(),
                row.current_holder.as_str(),
                value.as_str(),
                row.warranty_expiry.as_deref().unwrap_or("N/A"),
                row.created_at.as_str(),
            ])
            .map_err(|e| DomainError::Internal(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DomainError::Internal(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DomainError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_number_shape() {
        assert!(valid_inventory_number("LAB-0042"));
        assert!(!valid_inventory_number("lab-0042"));
        assert!(!valid_inventory_number("LAB 0042"));
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let rows = vec![ExportRow {
            inventory_number: "OSC-001".into(),
            name: "Osiloskop, dijital".into(),
            category: "Ölçüm".into(),
            vendor: "N/A".into(),
            location: "B212".into(),
            status: "available".into(),
            condition: "new".into(),
            current_holder: "N/A".into(),
            purchase_value: 1250.0,
            warranty_expiry: None,
            created_at: "2025-01-02".into(),
        }];
        let csv = export_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Inventory Number,Name"));
        assert_eq!(
            lines.next().unwrap(),
            "OSC-001,\"Osiloskop, dijital\",Ölçüm,N/A,B212,available,new,N/A,1250.00,N/A,2025-01-02"
        );
    }
}
