//! Maintenance Service - repair requests and their service-level tracking

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

use crate::domain::sla::{self, SlaTargets};
use crate::domain::status::{ItemStatus, LifecycleEvent, MaintenanceStatus, MaintenanceType, Priority};
use crate::domain::{clock, Actor, DomainError, FieldErrors};
use crate::models::item::{self, Entity as Item};
use crate::models::maintenance_request::{self, Entity as MaintenanceRequest};
use crate::models::transaction::Entity as Transaction;
use crate::models::user::Entity as User;
use crate::services::inventory_service::record_event;
use crate::services::notification_service as notify;

/// A validated request ready to be stored
#[derive(Debug, Clone)]
pub struct MaintenanceDraft {
    pub item_id: i32,
    pub requested_by: i32,
    pub transaction_id: Option<i32>,
    pub maintenance_type: MaintenanceType,
    pub priority: Priority,
    pub description: String,
    pub scheduled_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInput {
    pub item_id: Option<i32>,
    pub maintenance_type: Option<String>,
    pub priority: Option<String>,
    pub description: Option<String>,
    pub transaction_id: Option<i32>,
    pub scheduled_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInput {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub maintenance_type: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<i32>,
    pub resolution_notes: Option<String>,
    pub cost: Option<f64>,
    pub scheduled_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignInput {
    pub assigned_to: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveInput {
    pub resolution_notes: Option<String>,
    pub cost: Option<f64>,
}

#[derive(Debug, Default, Clone)]
pub struct MaintenanceFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub maintenance_type: Option<String>,
    pub assigned_to: Option<i32>,
    pub item_id: Option<i32>,
}

/// Inserts a request with its SLA deadlines. Runs on whatever connection the
/// caller holds, so returns can open one inside their own transaction.
pub async fn insert_request<C: ConnectionTrait>(
    conn: &C,
    draft: MaintenanceDraft,
) -> Result<maintenance_request::Model, DomainError> {
    let now = Utc::now();
    let targets = SlaTargets::for_priority(draft.priority, now);
    let now_ts = clock::format_ts(now);

    let row = maintenance_request::ActiveModel {
        item_id: Set(draft.item_id),
        requested_by: Set(draft.requested_by),
        assigned_to: Set(None),
        transaction_id: Set(draft.transaction_id),
        maintenance_type: Set(draft.maintenance_type.as_str().to_string()),
        priority: Set(draft.priority.as_str().to_string()),
        status: Set(MaintenanceStatus::Pending.as_str().to_string()),
        description: Set(draft.description),
        resolution_notes: Set(None),
        cost: Set(None),
        scheduled_date: Set(draft.scheduled_date),
        completed_date: Set(None),
        sla_hours: Set(targets.sla_hours as i32),
        sla_due_date: Set(clock::format_ts(targets.sla_due_date)),
        resolution_target: Set(clock::format_ts(targets.resolution_target)),
        first_response_at: Set(None),
        resolved_at: Set(None),
        sla_breached: Set(false),
        sla_breach_reason: Set(None),
        created_at: Set(now_ts.clone()),
        updated_at: Set(now_ts),
        ..Default::default()
    };
    Ok(row.insert(conn).await?)
}

fn parse_enum<T>(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
    choices: String,
) -> Option<T> {
    let raw = raw?;
    let parsed = parse(raw);
    if parsed.is_none() {
        errors.add(field, format!("Geçersiz değer. Geçerli değerler: {}", choices));
    }
    parsed
}

pub fn to_json(
    r: &maintenance_request::Model,
    item: Option<&item::Model>,
    now: DateTime<Utc>,
) -> Value {
    let status = MaintenanceStatus::parse(&r.status).unwrap_or(MaintenanceStatus::Pending);
    // Open requests count down to the next milestone they still owe
    let remaining = if !status.is_open() {
        None
    } else if r.first_response_at.is_none() {
        clock::parse_ts(&r.sla_due_date).map(|d| sla::time_remaining(d, now))
    } else {
        clock::parse_ts(&r.resolution_target).map(|d| sla::time_remaining(d, now))
    };

    json!({
        "id": r.id,
        "item_id": r.item_id,
        "requested_by": r.requested_by,
        "assigned_to": r.assigned_to,
        "transaction_id": r.transaction_id,
        "maintenance_type": r.maintenance_type,
        "priority": r.priority,
        "status": r.status,
        "description": r.description,
        "resolution_notes": r.resolution_notes,
        "cost": r.cost,
        "scheduled_date": r.scheduled_date,
        "completed_date": r.completed_date,
        "sla_hours": r.sla_hours,
        "sla_due_date": r.sla_due_date,
        "resolution_target": r.resolution_target,
        "first_response_at": r.first_response_at,
        "resolved_at": r.resolved_at,
        "sla_breached": r.sla_breached,
        "sla_breach_reason": r.sla_breach_reason,
        "time_remaining": remaining,
        "created_at": r.created_at,
        "updated_at": r.updated_at,
        "item": item.map(|i| json!({
            "id": i.id,
            "name": i.name,
            "inventory_number": i.inventory_number,
            "status": i.status,
        })),
    })
}

async fn find_request<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<maintenance_request::Model, DomainError> {
    MaintenanceRequest::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Bakım talebi bulunamadı"))
}

/// Writes the changed columns only while the row still has the status it
/// was read with, so two concurrent transitions cannot both apply.
async fn save_if_unchanged<C: ConnectionTrait>(
    db: &C,
    read: &maintenance_request::Model,
    active: maintenance_request::ActiveModel,
) -> Result<maintenance_request::Model, DomainError> {
    let result = MaintenanceRequest::update_many()
        .set(active)
        .filter(maintenance_request::Column::Id.eq(read.id))
        .filter(maintenance_request::Column::Status.eq(read.status.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected != 1 {
        return Err(DomainError::InvalidTransition(
            "Bu talep başka bir istek tarafından güncellendi".to_string(),
        ));
    }
    find_request(db, read.id).await
}

async fn item_name<C: ConnectionTrait>(db: &C, item_id: i32) -> String {
    match Item::find_by_id(item_id).one(db).await {
        Ok(Some(i)) => i.name,
        _ => format!("#{}", item_id),
    }
}

/// Puts an item under repair unless it is out on loan or out of service.
async fn hold_item_for_repair<C: ConnectionTrait>(db: &C, item_id: i32, request_id: i32) -> Result<(), DomainError> {
    let result = Item::update_many()
        .col_expr(item::Column::Status, Expr::value(ItemStatus::Maintenance.as_str()))
        .col_expr(item::Column::UpdatedAt, Expr::value(clock::now_ts()))
        .filter(item::Column::Id.eq(item_id))
        .filter(item::Column::Status.eq(ItemStatus::Available.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 1 {
        record_event(
            db,
            item_id,
            LifecycleEvent::Maintenance,
            format!("Acil bakım talebi #{} nedeniyle bakıma alındı", request_id),
        )
        .await?;
    }
    Ok(())
}

/// Returns an item from repair to the pool, unless another open request still holds it.
async fn release_item_from_repair<C: ConnectionTrait>(
    db: &C,
    item_id: i32,
    request_id: i32,
) -> Result<(), DomainError> {
    let still_open = MaintenanceRequest::find()
        .filter(maintenance_request::Column::ItemId.eq(item_id))
        .filter(maintenance_request::Column::Id.ne(request_id))
        .filter(maintenance_request::Column::Status.is_in([
            MaintenanceStatus::Pending.as_str(),
            MaintenanceStatus::InProgress.as_str(),
        ]))
        .count(db)
        .await?;
    if still_open > 0 {
        return Ok(());
    }

    let result = Item::update_many()
        .col_expr(item::Column::Status, Expr::value(ItemStatus::Available.as_str()))
        .col_expr(item::Column::UpdatedAt, Expr::value(clock::now_ts()))
        .filter(item::Column::Id.eq(item_id))
        .filter(item::Column::Status.eq(ItemStatus::Maintenance.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 1 {
        record_event(
            db,
            item_id,
            LifecycleEvent::StatusChange,
            format!("Bakım talebi #{} kapatıldı, eşya kullanıma açıldı", request_id),
        )
        .await?;
    }
    Ok(())
}

/// Stamps the SLA milestones reached by moving from `from` to `to`.
fn record_milestones(
    active: &mut maintenance_request::ActiveModel,
    existing: &maintenance_request::Model,
    from: MaintenanceStatus,
    to: MaintenanceStatus,
    now: DateTime<Utc>,
) {
    let now_ts = clock::format_ts(now);
    let mut breach: Option<&str> = None;

    if from == MaintenanceStatus::Pending && to != MaintenanceStatus::Pending && existing.first_response_at.is_none() {
        active.first_response_at = Set(Some(now_ts.clone()));
        if clock::parse_ts(&existing.sla_due_date).is_some_and(|d| sla::is_breach(now, d)) {
            breach = Some(sla::FIRST_RESPONSE_BREACH);
        }
    }
    if to == MaintenanceStatus::Completed {
        active.resolved_at = Set(Some(now_ts.clone()));
        active.completed_date = Set(Some(now_ts));
        if clock::parse_ts(&existing.resolution_target).is_some_and(|d| sla::is_breach(now, d)) {
            breach = breach.or(Some(sla::RESOLUTION_BREACH));
        }
    }

    if let Some(reason) = breach {
        if !existing.sla_breached {
            active.sla_breached = Set(true);
            active.sla_breach_reason = Set(Some(reason.to_string()));
        }
    }
}

pub async fn create(
    db: &DatabaseConnection,
    actor: Actor,
    input: CreateInput,
) -> Result<(maintenance_request::Model, item::Model), DomainError> {
    let mut errors = FieldErrors::default();
    if input.item_id.is_none() {
        errors.add("item_id", "Eşya seçimi zorunludur");
    }
    errors.require("maintenance_type", input.maintenance_type.as_deref(), "Bakım türü zorunludur");
    errors.require("description", input.description.as_deref(), "Açıklama zorunludur");
    errors.max_len("description", input.description.as_deref(), 2000, "Açıklama en fazla 2000 karakter olabilir");
    let maintenance_type = parse_enum(
        &mut errors,
        "maintenance_type",
        input.maintenance_type.as_deref().filter(|s| !s.is_empty()),
        MaintenanceType::parse,
        MaintenanceType::choices(),
    );
    let priority = parse_enum(
        &mut errors,
        "priority",
        input.priority.as_deref(),
        Priority::parse,
        Priority::choices(),
    )
    .unwrap_or(Priority::Medium);
    let scheduled_date = match input.scheduled_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => {
            let normalized = clock::normalize_ts(raw);
            if normalized.is_none() {
                errors.add("scheduled_date", "Geçerli bir tarih giriniz");
            }
            normalized
        }
        None => None,
    };

    let item = match input.item_id {
        Some(id) => {
            let found = Item::find_by_id(id).one(db).await?;
            if found.is_none() {
                errors.add("item_id", "Seçilen eşya bulunamadı");
            }
            found
        }
        None => None,
    };
    if let Some(transaction_id) = input.transaction_id {
        if Transaction::find_by_id(transaction_id).one(db).await?.is_none() {
            errors.add("transaction_id", "Seçilen işlem bulunamadı");
        }
    }
    errors.into_result()?;

    let (Some(item), Some(maintenance_type), Some(description)) =
        (item, maintenance_type, input.description)
    else {
        return Err(DomainError::Internal("validated fields missing".to_string()));
    };

    let txn = db.begin().await?;
    let request = insert_request(
        &txn,
        MaintenanceDraft {
            item_id: item.id,
            requested_by: actor.id,
            transaction_id: input.transaction_id,
            maintenance_type,
            priority,
            description: description.trim().to_string(),
            scheduled_date,
        },
    )
    .await?;
    if priority == Priority::Urgent {
        hold_item_for_repair(&txn, item.id, request.id).await?;
    }
    let item = Item::find_by_id(item.id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Eşya bulunamadı"))?;
    txn.commit().await?;

    tracing::info!(
        request_id = request.id,
        item_id = item.id,
        priority = %priority,
        sla_due_date = %request.sla_due_date,
        "Maintenance request created"
    );

    notify::send_logged(
        db,
        notify::maintenance_created_notice(actor.id, request.id, &item.name),
    )
    .await;

    Ok((request, item))
}

pub async fn list(
    db: &DatabaseConnection,
    actor: Actor,
    filter: MaintenanceFilter,
) -> Result<Vec<Value>, DomainError> {
    let mut condition = Condition::all();
    if !actor.is_manager() {
        condition = condition.add(
            Condition::any()
                .add(maintenance_request::Column::RequestedBy.eq(actor.id))
                .add(maintenance_request::Column::AssignedTo.eq(actor.id)),
        );
    }
    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(maintenance_request::Column::Status.eq(status));
    }
    if let Some(priority) = filter.priority.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(maintenance_request::Column::Priority.eq(priority));
    }
    if let Some(kind) = filter.maintenance_type.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(maintenance_request::Column::MaintenanceType.eq(kind));
    }
    if let Some(assignee) = filter.assigned_to {
        condition = condition.add(maintenance_request::Column::AssignedTo.eq(assignee));
    }
    if let Some(item_id) = filter.item_id {
        condition = condition.add(maintenance_request::Column::ItemId.eq(item_id));
    }

    let mut rows = MaintenanceRequest::find()
        .filter(condition)
        .order_by_desc(maintenance_request::Column::CreatedAt)
        .order_by_desc(maintenance_request::Column::Id)
        .all(db)
        .await?;
    // Stable sort keeps newest-first inside each priority band
    rows.sort_by_key(|r| Priority::parse(&r.priority).map(|p| p.rank()).unwrap_or(u8::MAX));

    let item_ids: Vec<i32> = rows.iter().map(|r| r.item_id).collect();
    let items: HashMap<i32, item::Model> = if item_ids.is_empty() {
        HashMap::new()
    } else {
        Item::find()
            .filter(item::Column::Id.is_in(item_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect()
    };

    let now = Utc::now();
    Ok(rows
        .iter()
        .map(|r| to_json(r, items.get(&r.item_id), now))
        .collect())
}

pub async fn show(db: &DatabaseConnection, actor: Actor, id: i32) -> Result<Value, DomainError> {
    let request = find_request(db, id).await?;
    if !actor.is_manager() && request.requested_by != actor.id && request.assigned_to != Some(actor.id) {
        return Err(DomainError::forbidden("Bu bakım talebini görüntüleme yetkiniz yok"));
    }
    let item = Item::find_by_id(request.item_id).one(db).await?;
    Ok(to_json(&request, item.as_ref(), Utc::now()))
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateInput,
) -> Result<maintenance_request::Model, DomainError> {
    let existing = find_request(db, id).await?;
    let current = MaintenanceStatus::parse(&existing.status).unwrap_or(MaintenanceStatus::Pending);

    let mut errors = FieldErrors::default();
    let status = parse_enum(&mut errors, "status", input.status.as_deref(), MaintenanceStatus::parse, MaintenanceStatus::choices());
    let priority = parse_enum(&mut errors, "priority", input.priority.as_deref(), Priority::parse, Priority::choices());
    let kind = parse_enum(
        &mut errors,
        "maintenance_type",
        input.maintenance_type.as_deref(),
        MaintenanceType::parse,
        MaintenanceType::choices(),
    );
    if input.cost.is_some_and(|c| c < 0.0) {
        errors.add("cost", "Maliyet negatif olamaz");
    }
    if input.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
        errors.add("description", "Açıklama boş olamaz");
    }
    if let Some(assignee) = input.assigned_to {
        if User::find_by_id(assignee).one(db).await?.is_none() {
            errors.add("assigned_to", "Seçilen kullanıcı bulunamadı");
        }
    }
    errors.into_result()?;

    if let Some(next) = status {
        if next != current && !current.can_transition_to(next) {
            return Err(DomainError::InvalidTransition(format!(
                "Bakım talebi '{}' durumundan '{}' durumuna geçemez",
                current, next
            )));
        }
    }

    let now = Utc::now();
    let mut active: maintenance_request::ActiveModel = existing.clone().into();
    if let Some(next) = status.filter(|s| *s != current) {
        active.status = Set(next.as_str().to_string());
        record_milestones(&mut active, &existing, current, next, now);
    }
    if let Some(p) = priority {
        active.priority = Set(p.as_str().to_string());
    }
    if let Some(k) = kind {
        active.maintenance_type = Set(k.as_str().to_string());
    }
    if let Some(d) = input.description {
        active.description = Set(d.trim().to_string());
    }
    if let Some(a) = input.assigned_to {
        active.assigned_to = Set(Some(a));
    }
    if let Some(notes) = input.resolution_notes {
        active.resolution_notes = Set(Some(notes));
    }
    if let Some(c) = input.cost {
        active.cost = Set(Some(c));
    }
    if let Some(raw) = input.scheduled_date {
        active.scheduled_date = Set(clock::normalize_ts(&raw));
    }
    active.updated_at = Set(clock::format_ts(now));

    let txn = db.begin().await?;
    let updated = save_if_unchanged(&txn, &existing, active).await?;
    let closed = status.is_some_and(|s| s != current && !s.is_open());
    if closed {
        release_item_from_repair(&txn, updated.item_id, updated.id).await?;
    }
    txn.commit().await?;

    if let Some(next) = status.filter(|s| *s != current) {
        let name = item_name(db, updated.item_id).await;
        notify::send_logged(
            db,
            notify::maintenance_status_notice(updated.requested_by, updated.id, &name, next),
        )
        .await;
    }

    Ok(updated)
}

pub async fn assign(
    db: &DatabaseConnection,
    id: i32,
    input: AssignInput,
) -> Result<maintenance_request::Model, DomainError> {
    let existing = find_request(db, id).await?;
    let current = MaintenanceStatus::parse(&existing.status).unwrap_or(MaintenanceStatus::Pending);
    if !current.is_open() {
        return Err(DomainError::InvalidTransition(format!(
            "Bu talep atanamaz. Durum: {}",
            existing.status
        )));
    }
    if User::find_by_id(input.assigned_to).one(db).await?.is_none() {
        return Err(DomainError::field("assigned_to", "Seçilen kullanıcı bulunamadı"));
    }

    let mut active: maintenance_request::ActiveModel = existing.clone().into();
    active.assigned_to = Set(Some(input.assigned_to));
    active.status = Set(MaintenanceStatus::InProgress.as_str().to_string());
    record_milestones(&mut active, &existing, current, MaintenanceStatus::InProgress, Utc::now());
    active.updated_at = Set(clock::now_ts());
    let updated = save_if_unchanged(db, &existing, active).await?;

    tracing::info!(request_id = id, assignee = input.assigned_to, "Maintenance request assigned");

    let name = item_name(db, updated.item_id).await;
    notify::send_logged(db, notify::maintenance_assigned_notice(input.assigned_to, updated.id, &name)).await;

    Ok(updated)
}

fn resolution_notes(input: &ResolveInput) -> Result<String, DomainError> {
    let mut errors = FieldErrors::default();
    errors.require("resolution_notes", input.resolution_notes.as_deref(), "Çözüm notu zorunludur");
    errors.max_len("resolution_notes", input.resolution_notes.as_deref(), 2000, "Çözüm notu en fazla 2000 karakter olabilir");
    if input.cost.is_some_and(|c| c < 0.0) {
        errors.add("cost", "Maliyet negatif olamaz");
    }
    errors.into_result()?;
    Ok(input.resolution_notes.as_deref().unwrap_or_default().trim().to_string())
}

pub async fn complete(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    input: ResolveInput,
) -> Result<maintenance_request::Model, DomainError> {
    let notes = resolution_notes(&input)?;
    let existing = find_request(db, id).await?;
    if existing.status != MaintenanceStatus::InProgress.as_str() {
        return Err(DomainError::InvalidTransition(format!(
            "Sadece işlemdeki talepler tamamlanabilir. Durum: {}",
            existing.status
        )));
    }
    if !actor.is_manager() && existing.assigned_to != Some(actor.id) {
        return Err(DomainError::forbidden("Bu talebi tamamlama yetkiniz yok"));
    }

    let mut active: maintenance_request::ActiveModel = existing.clone().into();
    active.status = Set(MaintenanceStatus::Completed.as_str().to_string());
    active.resolution_notes = Set(Some(notes));
    if input.cost.is_some() {
        active.cost = Set(input.cost);
    }
    record_milestones(
        &mut active,
        &existing,
        MaintenanceStatus::InProgress,
        MaintenanceStatus::Completed,
        Utc::now(),
    );
    active.updated_at = Set(clock::now_ts());

    let txn = db.begin().await?;
    let updated = save_if_unchanged(&txn, &existing, active).await?;
    release_item_from_repair(&txn, updated.item_id, updated.id).await?;
    txn.commit().await?;

    tracing::info!(
        request_id = id,
        sla_breached = updated.sla_breached,
        "Maintenance request completed"
    );

    let name = item_name(db, updated.item_id).await;
    notify::send_logged(
        db,
        notify::maintenance_status_notice(updated.requested_by, updated.id, &name, MaintenanceStatus::Completed),
    )
    .await;

    Ok(updated)
}

pub async fn cancel(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    input: ResolveInput,
) -> Result<maintenance_request::Model, DomainError> {
    let notes = resolution_notes(&input)?;
    let existing = find_request(db, id).await?;
    if !actor.is_manager() && existing.requested_by != actor.id {
        return Err(DomainError::forbidden("Bu talebi iptal etme yetkiniz yok"));
    }
    close_as_cancelled(db, existing, notes).await
}

/// Soft delete: the row stays for reporting, marked cancelled.
pub async fn soft_delete(db: &DatabaseConnection, id: i32) -> Result<maintenance_request::Model, DomainError> {
    let existing = find_request(db, id).await?;
    close_as_cancelled(db, existing, "Talep silindi".to_string()).await
}

async fn close_as_cancelled(
    db: &DatabaseConnection,
    existing: maintenance_request::Model,
    notes: String,
) -> Result<maintenance_request::Model, DomainError> {
    let current = MaintenanceStatus::parse(&existing.status).unwrap_or(MaintenanceStatus::Pending);
    if !current.can_transition_to(MaintenanceStatus::Cancelled) {
        return Err(DomainError::InvalidTransition(format!(
            "Bu talep iptal edilemez. Durum: {}",
            existing.status
        )));
    }

    let mut active: maintenance_request::ActiveModel = existing.clone().into();
    active.status = Set(MaintenanceStatus::Cancelled.as_str().to_string());
    active.resolution_notes = Set(Some(notes));
    active.updated_at = Set(clock::now_ts());

    let txn = db.begin().await?;
    let updated = save_if_unchanged(&txn, &existing, active).await?;
    release_item_from_repair(&txn, updated.item_id, updated.id).await?;
    txn.commit().await?;

    let name = item_name(db, updated.item_id).await;
    notify::send_logged(
        db,
        notify::maintenance_status_notice(updated.requested_by, updated.id, &name, MaintenanceStatus::Cancelled),
    )
    .await;

    Ok(updated)
}

fn hours_between(from: &str, to: Option<&str>) -> Option<f64> {
    let start = clock::parse_ts(from)?;
    let end = clock::parse_ts(to?)?;
    Some((end - start).num_minutes() as f64 / 60.0)
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    (avg * 100.0).round() / 100.0
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((part as f64 / total as f64) * 10000.0).round() / 100.0
}

/// SLA compliance figures over a set of requests
pub fn sla_statistics(rows: &[maintenance_request::Model], now: DateTime<Utc>) -> Value {
    let total = rows.len();
    let breached = rows.iter().filter(|r| r.sla_breached).count();
    let at_risk = rows
        .iter()
        .filter(|r| !r.sla_breached)
        .filter(|r| MaintenanceStatus::parse(&r.status).is_some_and(|s| s.is_open()))
        .filter(|r| {
            let deadline = if r.first_response_at.is_none() {
                &r.sla_due_date
            } else {
                &r.resolution_target
            };
            clock::parse_ts(deadline).is_some_and(|d| {
                matches!(
                    sla::time_remaining(d, now).status,
                    sla::SlaUrgency::Warning | sla::SlaUrgency::Critical
                )
            })
        })
        .count();

    let response: Vec<f64> = rows
        .iter()
        .filter_map(|r| hours_between(&r.created_at, r.first_response_at.as_deref()))
        .collect();
    let resolution: Vec<f64> = rows
        .iter()
        .filter_map(|r| hours_between(&r.created_at, r.resolved_at.as_deref()))
        .collect();

    json!({
        "total": total,
        "compliant": total - breached,
        "breached": breached,
        "breach_rate": percentage(breached, total),
        // Nothing tracked yet counts as fully compliant
        "compliance_rate": if total == 0 { 100.0 } else { percentage(total - breached, total) },
        "at_risk_count": at_risk,
        "average_response_hours": average(&response),
        "average_resolution_hours": average(&resolution),
    })
}

pub async fn statistics(db: &DatabaseConnection, actor: Actor) -> Result<Value, DomainError> {
    let mut query = MaintenanceRequest::find();
    if !actor.is_manager() {
        query = query.filter(
            Condition::any()
                .add(maintenance_request::Column::RequestedBy.eq(actor.id))
                .add(maintenance_request::Column::AssignedTo.eq(actor.id)),
        );
    }
    let rows = query.all(db).await?;

    let mut by_status: BTreeMap<&str, usize> = MaintenanceStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut by_type: BTreeMap<&str, usize> = MaintenanceType::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut by_priority: BTreeMap<&str, usize> = Priority::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for r in &rows {
        *by_status.entry(r.status.as_str()).or_default() += 1;
        *by_type.entry(r.maintenance_type.as_str()).or_default() += 1;
        *by_priority.entry(r.priority.as_str()).or_default() += 1;
    }

    let costs: Vec<f64> = rows.iter().filter_map(|r| r.cost).collect();
    let total_cost: f64 = costs.iter().sum();

    Ok(json!({
        "total": rows.len(),
        "by_status": by_status,
        "by_type": by_type,
        "by_priority": by_priority,
        "total_cost": (total_cost * 100.0).round() / 100.0,
        "average_cost": average(&costs),
        "sla": sla_statistics(&rows, Utc::now()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(priority: Priority, created: DateTime<Utc>) -> maintenance_request::Model {
        let targets = SlaTargets::for_priority(priority, created);
        maintenance_request::Model {
            id: 1,
            item_id: 1,
            requested_by: 1,
            assigned_to: None,
            transaction_id: None,
            maintenance_type: "hardware_failure".into(),
            priority: priority.as_str().into(),
            status: "pending".into(),
            description: "Ekran titriyor".into(),
            resolution_notes: None,
            cost: None,
            scheduled_date: None,
            completed_date: None,
            sla_hours: targets.sla_hours as i32,
            sla_due_date: clock::format_ts(targets.sla_due_date),
            resolution_target: clock::format_ts(targets.resolution_target),
            first_response_at: None,
            resolved_at: None,
            sla_breached: false,
            sla_breach_reason: None,
            created_at: clock::format_ts(created),
            updated_at: clock::format_ts(created),
        }
    }

    #[test]
    fn late_first_response_is_a_breach() {
        let now = Utc::now();
        let existing = request(Priority::Urgent, now - Duration::hours(3));
        let mut active: maintenance_request::ActiveModel = existing.clone().into();
        record_milestones(&mut active, &existing, MaintenanceStatus::Pending, MaintenanceStatus::InProgress, now);

        assert!(matches!(active.first_response_at, ActiveValue::Set(Some(_))));
        assert!(matches!(active.sla_breached, ActiveValue::Set(true)));
        assert!(matches!(
            &active.sla_breach_reason,
            ActiveValue::Set(Some(reason)) if reason == sla::FIRST_RESPONSE_BREACH
        ));
    }

    #[test]
    fn timely_completion_is_compliant() {
        let now = Utc::now();
        let mut existing = request(Priority::Low, now - Duration::hours(5));
        existing.status = "in_progress".into();
        existing.first_response_at = Some(clock::format_ts(now - Duration::hours(4)));
        let mut active: maintenance_request::ActiveModel = existing.clone().into();
        record_milestones(&mut active, &existing, MaintenanceStatus::InProgress, MaintenanceStatus::Completed, now);

        assert!(matches!(active.resolved_at, ActiveValue::Set(Some(_))));
        assert!(!matches!(active.sla_breached, ActiveValue::Set(true)));
    }

    #[test]
    fn statistics_rates() {
        let now = Utc::now();
        let mut breached = request(Priority::High, now - Duration::hours(10));
        breached.sla_breached = true;
        let fresh = request(Priority::Low, now);
        let mut soon = request(Priority::Urgent, now - Duration::minutes(30));
        soon.status = "pending".into();

        let stats = sla_statistics(&[breached, fresh, soon], now);
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["breached"], 1);
        assert_eq!(stats["compliant"], 2);
        assert_eq!(stats["breach_rate"], 33.33);
        assert_eq!(stats["at_risk_count"], 1);
    }

    #[test]
    fn no_requests_means_full_compliance() {
        let stats = sla_statistics(&[], Utc::now());
        assert_eq!(stats["total"], 0);
        assert_eq!(stats["compliance_rate"], 100.0);
        assert_eq!(stats["breach_rate"], 0.0);
    }

    #[test]
    fn open_requests_report_time_remaining() {
        let now = Utc::now();
        let v = to_json(&request(Priority::Medium, now), None, now);
        assert_eq!(v["time_remaining"]["status"], "normal");

        let mut done = request(Priority::Medium, now);
        done.status = "completed".into();
        assert!(to_json(&done, None, now)["time_remaining"].is_null());
    }
}
