//! Purchase Service - procurement requests and their approval workflow

use chrono::Utc;
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::domain::status::{Priority, PurchaseStatus};
use crate::domain::{clock, Actor, DomainError, FieldErrors};
use crate::models::purchase_request::{self, Entity as PurchaseRequest};
use crate::models::vendor::Entity as Vendor;
use crate::services::notification_service as notify;

const MAX_COST: f64 = 999_999.99;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseInput {
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<i32>,
    pub estimated_cost: Option<f64>,
    pub justification: Option<String>,
    pub priority: Option<String>,
    pub needed_by_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApproveInput {
    pub approved_cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectInput {
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderInput {
    pub vendor_id: Option<i32>,
    pub actual_cost: Option<f64>,
    pub expected_delivery_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiveInput {
    pub actual_quantity: Option<i32>,
    pub actual_cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PurchaseFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    /// Managers may narrow the list down to their own requests
    pub mine_only: bool,
}

fn check_cost(errors: &mut FieldErrors, field: &str, value: Option<f64>) {
    match value {
        Some(v) if v < 0.0 => errors.add(field, "Maliyet negatif olamaz"),
        Some(v) if v > MAX_COST => errors.add(field, "Maliyet 999.999,99 değerini aşamaz"),
        _ => {}
    }
}

fn check_notes(errors: &mut FieldErrors, notes: Option<&str>) {
    errors.max_len("notes", notes, 1000, "Notlar en fazla 1000 karakter olabilir");
}

/// Validates a create (`partial == false`) or an update body.
fn validate(input: &PurchaseInput, partial: bool) -> Result<Option<Priority>, DomainError> {
    let mut errors = FieldErrors::default();

    if !partial {
        errors.require("item_name", input.item_name.as_deref(), "Ürün adı zorunludur");
        errors.require("description", input.description.as_deref(), "Açıklama zorunludur");
        errors.require("justification", input.justification.as_deref(), "Gerekçe zorunludur");
        if input.quantity.is_none() {
            errors.add("quantity", "Miktar zorunludur");
        }
    } else {
        for (field, value) in [
            ("item_name", input.item_name.as_deref()),
            ("description", input.description.as_deref()),
            ("justification", input.justification.as_deref()),
        ] {
            if value.is_some_and(|v| v.trim().is_empty()) {
                errors.add(field, "Bu alan boş bırakılamaz");
            }
        }
    }

    errors.max_len("item_name", input.item_name.as_deref(), 255, "Ürün adı en fazla 255 karakter olabilir");
    errors.max_len("description", input.description.as_deref(), 1000, "Açıklama en fazla 1000 karakter olabilir");
    errors.max_len("justification", input.justification.as_deref(), 1000, "Gerekçe en fazla 1000 karakter olabilir");
    errors.max_len("category", input.category.as_deref(), 100, "Kategori en fazla 100 karakter olabilir");
    if input.quantity.is_some_and(|q| q < 1) {
        errors.add("quantity", "Miktar en az 1 olmalıdır");
    }
    check_cost(&mut errors, "estimated_cost", input.estimated_cost);

    let priority = match input.priority.as_deref() {
        Some(raw) => {
            let parsed = Priority::parse(raw);
            if parsed.is_none() {
                errors.add("priority", format!("Geçersiz öncelik. Geçerli değerler: {}", Priority::choices()));
            }
            parsed
        }
        None => None,
    };

    if let Some(raw) = input.needed_by_date.as_deref().filter(|s| !s.is_empty()) {
        match clock::parse_ts(raw) {
            Some(date) if date.date_naive() < Utc::now().date_naive() => {
                errors.add("needed_by_date", "İhtiyaç tarihi geçmişte olamaz")
            }
            Some(_) => {}
            None => errors.add("needed_by_date", "Geçerli bir tarih giriniz"),
        }
    }

    errors.into_result()?;
    Ok(priority)
}

async fn find_request(db: &DatabaseConnection, id: i32) -> Result<purchase_request::Model, DomainError> {
    PurchaseRequest::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Satın alma talebi bulunamadı"))
}

fn status_of(r: &purchase_request::Model) -> PurchaseStatus {
    PurchaseStatus::parse(&r.status).unwrap_or(PurchaseStatus::Pending)
}

/// Rejects the move when the workflow does not allow it. `verb` completes
/// "Bu talep ... Durum: x".
fn ensure_transition(r: &purchase_request::Model, next: PurchaseStatus, verb: &str) -> Result<(), DomainError> {
    if status_of(r).can_transition_to(next) {
        return Ok(());
    }
    Err(DomainError::InvalidTransition(format!(
        "Bu talep {}. Durum: {}",
        verb, r.status
    )))
}

/// Writes the changed columns only while the row still has the status it was
/// read with; a concurrent transition makes this fail instead of overwriting.
async fn save_transition(
    db: &DatabaseConnection,
    read: &purchase_request::Model,
    active: purchase_request::ActiveModel,
    next: PurchaseStatus,
) -> Result<purchase_request::Model, DomainError> {
    let result = PurchaseRequest::update_many()
        .set(active)
        .filter(purchase_request::Column::Id.eq(read.id))
        .filter(purchase_request::Column::Status.eq(read.status.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected != 1 {
        return Err(DomainError::InvalidTransition(
            "Bu talep başka bir istek tarafından güncellendi".to_string(),
        ));
    }

    let updated = find_request(db, read.id).await?;
    tracing::info!(request_id = updated.id, status = %next, "Purchase request status changed");
    notify::send_logged(db, notify::purchase_status_notice(updated.requested_by, updated.id, next)).await;
    Ok(updated)
}

pub async fn list(
    db: &DatabaseConnection,
    actor: Actor,
    filter: PurchaseFilter,
) -> Result<Vec<purchase_request::Model>, DomainError> {
    let mut errors = FieldErrors::default();
    if filter.status.as_deref().is_some_and(|s| PurchaseStatus::parse(s).is_none()) {
        errors.add("status", "Geçersiz durum değeri.");
    }
    if filter.priority.as_deref().is_some_and(|p| Priority::parse(p).is_none()) {
        errors.add("priority", "Geçersiz öncelik değeri.");
    }
    errors.into_result()?;

    let mut query = PurchaseRequest::find();
    if !actor.is_manager() || filter.mine_only {
        query = query.filter(purchase_request::Column::RequestedBy.eq(actor.id));
    }
    if let Some(status) = filter.status {
        query = query.filter(purchase_request::Column::Status.eq(status));
    }
    if let Some(priority) = filter.priority {
        query = query.filter(purchase_request::Column::Priority.eq(priority));
    }
    Ok(query
        .order_by_desc(purchase_request::Column::CreatedAt)
        .order_by_desc(purchase_request::Column::Id)
        .all(db)
        .await?)
}

pub async fn show(db: &DatabaseConnection, actor: Actor, id: i32) -> Result<purchase_request::Model, DomainError> {
    let request = find_request(db, id).await?;
    if !actor.can_act_for(request.requested_by) {
        return Err(DomainError::forbidden("Bu talebi görüntüleme yetkiniz yok"));
    }
    Ok(request)
}

pub async fn create(
    db: &DatabaseConnection,
    actor: Actor,
    input: PurchaseInput,
) -> Result<purchase_request::Model, DomainError> {
    let priority = validate(&input, false)?.unwrap_or(Priority::Medium);
    let now = clock::now_ts();

    let created = purchase_request::ActiveModel {
        item_name: Set(input.item_name.unwrap_or_default().trim().to_string()),
        description: Set(input.description.unwrap_or_default().trim().to_string()),
        category: Set(input.category.filter(|c| !c.trim().is_empty())),
        quantity: Set(input.quantity.unwrap_or(1)),
        estimated_cost: Set(input.estimated_cost),
        justification: Set(input.justification.unwrap_or_default().trim().to_string()),
        requested_by: Set(actor.id),
        status: Set(PurchaseStatus::Pending.as_str().to_string()),
        priority: Set(priority.as_str().to_string()),
        needed_by_date: Set(input.needed_by_date.as_deref().and_then(clock::normalize_ts)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(request_id = created.id, requested_by = actor.id, "Purchase request created");
    Ok(created)
}

pub async fn update(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    input: PurchaseInput,
) -> Result<purchase_request::Model, DomainError> {
    let existing = find_request(db, id).await?;
    if !actor.can_act_for(existing.requested_by) {
        return Err(DomainError::forbidden("Bu talebi düzenleme yetkiniz yok"));
    }
    if status_of(&existing) != PurchaseStatus::Pending {
        return Err(DomainError::invalid_state("Sadece beklemedeki talepler düzenlenebilir"));
    }
    let priority = validate(&input, true)?;

    let mut active: purchase_request::ActiveModel = existing.clone().into();
    if let Some(v) = input.item_name {
        active.item_name = Set(v.trim().to_string());
    }
    if let Some(v) = input.description {
        active.description = Set(v.trim().to_string());
    }
    if let Some(v) = input.category {
        active.category = Set(Some(v).filter(|c| !c.trim().is_empty()));
    }
    if let Some(v) = input.quantity {
        active.quantity = Set(v);
    }
    if input.estimated_cost.is_some() {
        active.estimated_cost = Set(input.estimated_cost);
    }
    if let Some(v) = input.justification {
        active.justification = Set(v.trim().to_string());
    }
    if let Some(p) = priority {
        active.priority = Set(p.as_str().to_string());
    }
    if let Some(raw) = input.needed_by_date {
        active.needed_by_date = Set(clock::normalize_ts(&raw));
    }
    active.updated_at = Set(clock::now_ts());

    let result = PurchaseRequest::update_many()
        .set(active)
        .filter(purchase_request::Column::Id.eq(existing.id))
        .filter(purchase_request::Column::Status.eq(PurchaseStatus::Pending.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected != 1 {
        return Err(DomainError::invalid_state("Sadece beklemedeki talepler düzenlenebilir"));
    }
    find_request(db, existing.id).await
}

pub async fn approve(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    input: ApproveInput,
) -> Result<purchase_request::Model, DomainError> {
    let mut errors = FieldErrors::default();
    check_cost(&mut errors, "approved_cost", input.approved_cost);
    check_notes(&mut errors, input.notes.as_deref());
    errors.into_result()?;

    let existing = find_request(db, id).await?;
    ensure_transition(&existing, PurchaseStatus::Approved, "onaylanamaz")?;

    let approved_cost = input.approved_cost.or(existing.estimated_cost);
    let now = clock::now_ts();
    let mut active: purchase_request::ActiveModel = existing.clone().into();
    active.status = Set(PurchaseStatus::Approved.as_str().to_string());
    active.approved_by = Set(Some(actor.id));
    active.reviewed_by = Set(Some(actor.id));
    active.approved_cost = Set(approved_cost);
    active.approved_date = Set(Some(now.clone()));
    if input.notes.is_some() {
        active.notes = Set(input.notes);
    }
    active.updated_at = Set(now);
    save_transition(db, &existing, active, PurchaseStatus::Approved).await
}

pub async fn reject(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    input: RejectInput,
) -> Result<purchase_request::Model, DomainError> {
    let mut errors = FieldErrors::default();
    errors.require("rejection_reason", input.rejection_reason.as_deref(), "Ret nedeni zorunludur.");
    errors.max_len(
        "rejection_reason",
        input.rejection_reason.as_deref(),
        500,
        "Ret nedeni en fazla 500 karakter olabilir.",
    );
    errors.into_result()?;

    let existing = find_request(db, id).await?;
    ensure_transition(&existing, PurchaseStatus::Rejected, "reddedilemez")?;

    let mut active: purchase_request::ActiveModel = existing.clone().into();
    active.status = Set(PurchaseStatus::Rejected.as_str().to_string());
    active.reviewed_by = Set(Some(actor.id));
    active.rejection_reason = Set(input.rejection_reason.map(|r| r.trim().to_string()));
    active.updated_at = Set(clock::now_ts());
    save_transition(db, &existing, active, PurchaseStatus::Rejected).await
}

pub async fn order(
    db: &DatabaseConnection,
    id: i32,
    input: OrderInput,
) -> Result<purchase_request::Model, DomainError> {
    let mut errors = FieldErrors::default();
    check_cost(&mut errors, "actual_cost", input.actual_cost);
    check_notes(&mut errors, input.notes.as_deref());
    if let Some(vendor_id) = input.vendor_id {
        if Vendor::find_by_id(vendor_id).one(db).await?.is_none() {
            errors.add("vendor_id", "Seçilen tedarikçi mevcut değil.");
        }
    }
    let expected = match input.expected_delivery_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match clock::parse_ts(raw) {
            Some(d) if d.date_naive() < Utc::now().date_naive() => {
                errors.add(
                    "expected_delivery_date",
                    "Beklenen teslimat tarihi bugün veya sonrası olmalıdır.",
                );
                None
            }
            Some(d) => Some(clock::format_ts(d)),
            None => {
                errors.add(
                    "expected_delivery_date",
                    "Beklenen teslimat tarihi geçerli bir tarih olmalıdır.",
                );
                None
            }
        },
        None => None,
    };
    errors.into_result()?;

    let existing = find_request(db, id).await?;
    ensure_transition(&existing, PurchaseStatus::Ordered, "sipariş edilemez")?;

    let now = clock::now_ts();
    let mut active: purchase_request::ActiveModel = existing.clone().into();
    active.status = Set(PurchaseStatus::Ordered.as_str().to_string());
    active.ordered_date = Set(Some(now.clone()));
    if input.vendor_id.is_some() {
        active.vendor_id = Set(input.vendor_id);
    }
    if input.actual_cost.is_some() {
        active.actual_cost = Set(input.actual_cost);
    }
    if expected.is_some() {
        active.expected_delivery_date = Set(expected);
    }
    if input.notes.is_some() {
        active.notes = Set(input.notes);
    }
    active.updated_at = Set(now);
    save_transition(db, &existing, active, PurchaseStatus::Ordered).await
}

pub async fn receive(
    db: &DatabaseConnection,
    id: i32,
    input: ReceiveInput,
) -> Result<purchase_request::Model, DomainError> {
    let mut errors = FieldErrors::default();
    match input.actual_quantity {
        None => errors.add("actual_quantity", "Gerçek miktar zorunludur."),
        Some(q) if q < 1 => errors.add("actual_quantity", "Gerçek miktar en az 1 olmalıdır."),
        Some(_) => {}
    }
    check_cost(&mut errors, "actual_cost", input.actual_cost);
    check_notes(&mut errors, input.notes.as_deref());
    errors.into_result()?;

    let existing = find_request(db, id).await?;
    ensure_transition(&existing, PurchaseStatus::Received, "teslim alınamaz")?;

    let now = clock::now_ts();
    let mut active: purchase_request::ActiveModel = existing.clone().into();
    active.status = Set(PurchaseStatus::Received.as_str().to_string());
    active.received_date = Set(Some(now.clone()));
    active.actual_quantity = Set(input.actual_quantity);
    if input.actual_cost.is_some() {
        active.actual_cost = Set(input.actual_cost);
    }
    if input.notes.is_some() {
        active.notes = Set(input.notes);
    }
    active.updated_at = Set(now);
    save_transition(db, &existing, active, PurchaseStatus::Received).await
}

async fn cancel_with_reason(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    reason: &str,
    denied: &str,
) -> Result<purchase_request::Model, DomainError> {
    let existing = find_request(db, id).await?;
    if !actor.can_act_for(existing.requested_by) {
        return Err(DomainError::forbidden(denied));
    }
    if !status_of(&existing).can_transition_to(PurchaseStatus::Cancelled) {
        return Err(DomainError::InvalidTransition(
            "Bu durumda olan talepler iptal edilemez".to_string(),
        ));
    }

    let mut active: purchase_request::ActiveModel = existing.clone().into();
    active.status = Set(PurchaseStatus::Cancelled.as_str().to_string());
    active.rejection_reason = Set(Some(reason.to_string()));
    active.updated_at = Set(clock::now_ts());
    save_transition(db, &existing, active, PurchaseStatus::Cancelled).await
}

pub async fn cancel(db: &DatabaseConnection, actor: Actor, id: i32) -> Result<purchase_request::Model, DomainError> {
    cancel_with_reason(db, actor, id, "Talep iptal edildi", "Bu talebi iptal etme yetkiniz yok").await
}

/// Soft delete: the request is kept as cancelled.
pub async fn soft_delete(db: &DatabaseConnection, actor: Actor, id: i32) -> Result<purchase_request::Model, DomainError> {
    cancel_with_reason(db, actor, id, "Silindi", "Bu talebi silme yetkiniz yok").await
}

pub fn summarize(rows: &[purchase_request::Model]) -> Value {
    let mut by_status: BTreeMap<&str, usize> = PurchaseStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut by_priority: BTreeMap<&str, usize> = Priority::ALL.iter().map(|p| (p.as_str(), 0)).collect();
    for r in rows {
        *by_status.entry(r.status.as_str()).or_default() += 1;
        *by_priority.entry(r.priority.as_str()).or_default() += 1;
    }

    let sum = |status: PurchaseStatus, pick: fn(&purchase_request::Model) -> Option<f64>| -> f64 {
        let total: f64 = rows
            .iter()
            .filter(|r| r.status == status.as_str())
            .filter_map(pick)
            .sum();
        (total * 100.0).round() / 100.0
    };

    json!({
        "total": rows.len(),
        "by_status": by_status,
        "by_priority": by_priority,
        "total_estimated_cost": sum(PurchaseStatus::Pending, |r| r.estimated_cost),
        "total_approved_cost": sum(PurchaseStatus::Approved, |r| r.approved_cost),
        "total_spent": sum(PurchaseStatus::Received, |r| r.actual_cost),
    })
}

pub async fn statistics(db: &DatabaseConnection, actor: Actor) -> Result<Value, DomainError> {
    let mut query = PurchaseRequest::find();
    if !actor.is_manager() {
        query = query.filter(purchase_request::Column::RequestedBy.eq(actor.id));
    }
    let rows = query.all(db).await?;
    Ok(summarize(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PurchaseInput {
        PurchaseInput {
            item_name: Some("Lehim istasyonu".into()),
            description: Some("Elektronik laboratuvarı için".into()),
            quantity: Some(2),
            estimated_cost: Some(450.0),
            justification: Some("Mevcut istasyon arızalı".into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_requires_core_fields() {
        let err = validate(&PurchaseInput::default(), false).unwrap_err();
        let DomainError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for field in ["item_name", "description", "justification", "quantity"] {
            assert!(errors.has(field), "missing error for {}", field);
        }
    }

    #[test]
    fn quantity_and_cost_bounds() {
        let mut bad = input();
        bad.quantity = Some(0);
        bad.estimated_cost = Some(-1.0);
        bad.priority = Some("asap".into());
        let DomainError::Validation(errors) = validate(&bad, false).unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.has("quantity"));
        assert!(errors.has("estimated_cost"));
        assert!(errors.has("priority"));

        assert_eq!(validate(&input(), false).unwrap(), None);
    }

    #[test]
    fn partial_update_allows_missing_fields() {
        let only_priority = PurchaseInput {
            priority: Some("urgent".into()),
            ..Default::default()
        };
        assert_eq!(validate(&only_priority, true).unwrap(), Some(Priority::Urgent));
    }

    async fn requester(db: &DatabaseConnection) -> Actor {
        use crate::domain::Role;
        use crate::models::{role, user};

        let staff_role = role::Entity::find()
            .filter(role::Column::RoleName.eq(Role::Staff.name()))
            .one(db)
            .await
            .unwrap()
            .unwrap();
        let now = clock::now_ts();
        let created = user::ActiveModel {
            name: Set("Staff".into()),
            email: Set("staff@lab.edu".into()),
            password_hash: Set("x".into()),
            role_id: Set(staff_role.id),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        Actor {
            id: created.id,
            role: Role::Staff,
        }
    }

    #[tokio::test]
    async fn transition_from_a_stale_read_is_refused() {
        let db = crate::db::init_db("sqlite::memory:").await.unwrap();
        let actor = requester(&db).await;
        let created = create(&db, actor, input()).await.unwrap();

        // Another request rejects it after we read it as pending
        let stale = find_request(&db, created.id).await.unwrap();
        reject(
            &db,
            actor,
            created.id,
            RejectInput {
                rejection_reason: Some("Bütçe yok".into()),
            },
        )
        .await
        .unwrap();

        let mut active: purchase_request::ActiveModel = stale.clone().into();
        active.status = Set(PurchaseStatus::Approved.as_str().to_string());
        let err = save_transition(&db, &stale, active, PurchaseStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        let stored = find_request(&db, created.id).await.unwrap();
        assert_eq!(stored.status, "rejected");
    }
}
