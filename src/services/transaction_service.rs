//! Transaction Service - checkout, return and loan bookkeeping
//!
//! Every multi-row change runs inside one database transaction. The partial
//! unique index on open transactions backs up the status checks, so two
//! racing checkouts of the same item cannot both commit.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::domain::fees::{self, OverdueSeverity};
use crate::domain::status::{
    ItemStatus, LifecycleEvent, MaintenanceType, Priority, ReturnCondition, TransactionStatus,
};
use crate::domain::{clock, Actor, DomainError, FieldErrors};
use crate::models::item::{self, Entity as Item};
use crate::models::maintenance_request;
use crate::models::transaction::{self, Entity as Transaction};
use crate::models::user::{self, Entity as User};
use crate::services::inventory_service::record_event;
use crate::services::maintenance_service::{self, MaintenanceDraft};
use crate::services::notification_service as notify;

/// Loan rules that come from configuration
#[derive(Debug, Clone, Copy)]
pub struct LoanPolicy {
    pub late_fee_per_day: f64,
    pub default_loan_days: i64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            late_fee_per_day: fees::DEFAULT_LATE_FEE_PER_DAY,
            default_loan_days: 14,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub item_id: i32,
    pub user_id: Option<i32>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnInput {
    pub return_condition: Option<String>,
    pub return_notes: Option<String>,
    pub damage_description: Option<String>,
    pub maintenance_priority: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendInput {
    pub new_due_date: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelInput {
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct ReturnOutcome {
    pub transaction: transaction::Model,
    pub item: item::Model,
    pub was_overdue: bool,
    pub days_overdue: i64,
    pub late_fee: f64,
    pub maintenance_request: Option<maintenance_request::Model>,
}

/// An open loan is overdue once its due date has passed.
pub fn is_overdue(t: &transaction::Model, now: DateTime<Utc>) -> bool {
    t.status == TransactionStatus::Active.as_str()
        && clock::parse_ts(&t.due_date).is_some_and(|due| due < now)
}

/// Days late: up to now for open loans, up to the return for closed ones.
pub fn days_overdue(t: &transaction::Model, now: DateTime<Utc>) -> i64 {
    let Some(due) = clock::parse_ts(&t.due_date) else {
        return 0;
    };
    let reference = if t.status == TransactionStatus::Active.as_str() {
        Some(now)
    } else if t.status == TransactionStatus::LateReturn.as_str() {
        t.return_date.as_deref().and_then(clock::parse_ts)
    } else {
        None
    };
    reference.map(|r| fees::days_overdue(due, r)).unwrap_or(0)
}

/// Serializes a transaction with its derived fields.
pub fn to_json(
    t: &transaction::Model,
    item: Option<&item::Model>,
    borrower: Option<&user::Model>,
    now: DateTime<Utc>,
    policy: LoanPolicy,
) -> Value {
    let days = days_overdue(t, now);
    let overdue = is_overdue(t, now);
    let accrued_fee = if overdue {
        fees::late_fee(days, policy.late_fee_per_day)
    } else {
        t.late_fee
    };

    json!({
        "id": t.id,
        "item_id": t.item_id,
        "user_id": t.user_id,
        "checkout_date": t.checkout_date,
        "due_date": t.due_date,
        "return_date": t.return_date,
        "status": t.status,
        "late_fee": t.late_fee,
        "late_fee_paid": t.late_fee_paid,
        "accrued_late_fee": accrued_fee,
        "return_condition": t.return_condition,
        "return_notes": t.return_notes,
        "notes": t.notes,
        "checked_out_by": t.checked_out_by,
        "returned_to": t.returned_to,
        "is_overdue": overdue,
        "days_overdue": days,
        "created_at": t.created_at,
        "updated_at": t.updated_at,
        "item": item.map(|i| json!({
            "id": i.id,
            "name": i.name,
            "inventory_number": i.inventory_number,
            "location": i.location,
        })),
        "user": borrower.map(|u| json!({
            "id": u.id,
            "name": u.name,
            "email": u.email,
        })),
    })
}

fn append_note(existing: Option<String>, line: String) -> Option<String> {
    let stamp = Utc::now().format("%Y-%m-%d %H:%M");
    Some(match existing {
        Some(prev) if !prev.is_empty() => format!("{}\n[{}] {}", prev, stamp, line),
        _ => format!("[{}] {}", stamp, line),
    })
}

async fn find_transaction<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<transaction::Model, DomainError> {
    Transaction::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("İşlem bulunamadı"))
}

/// Moves an open transaction to a terminal status. Fails with `Conflict` when
/// another request closed it first.
async fn close_transaction<C: ConnectionTrait>(
    db: &C,
    id: i32,
    columns: Vec<(transaction::Column, SimpleExpr)>,
) -> Result<transaction::Model, DomainError> {
    let mut update = Transaction::update_many();
    for (column, value) in columns {
        update = update.col_expr(column, value);
    }
    let result = update
        .col_expr(transaction::Column::UpdatedAt, Expr::value(clock::now_ts()))
        .filter(transaction::Column::Id.eq(id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected != 1 {
        return Err(DomainError::Conflict(
            "İşlem başka bir istek tarafından güncellendi".to_string(),
        ));
    }
    find_transaction(db, id).await
}

async fn release_item<C: ConnectionTrait>(
    db: &C,
    item_id: i32,
    status: ItemStatus,
) -> Result<item::Model, DomainError> {
    let existing = Item::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Eşya bulunamadı"))?;
    let mut active: item::ActiveModel = existing.into();
    active.status = Set(status.as_str().to_string());
    active.current_holder_id = Set(None);
    active.updated_at = Set(clock::now_ts());
    Ok(active.update(db).await?)
}

pub async fn checkout(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    actor: Actor,
    input: CheckoutInput,
) -> Result<(transaction::Model, item::Model), DomainError> {
    let borrower_id = input.user_id.unwrap_or(actor.id);
    if !actor.can_act_for(borrower_id) {
        return Err(DomainError::forbidden(
            "Personel yalnızca kendi adına ödünç alabilir",
        ));
    }

    let now = Utc::now();
    let due = match input.due_date.as_deref() {
        Some(raw) => clock::parse_ts(raw)
            .ok_or_else(|| DomainError::field("due_date", "Geçerli bir tarih giriniz"))?,
        None => now + Duration::days(policy.default_loan_days),
    };
    if due <= now {
        return Err(DomainError::field("due_date", "İade tarihi gelecekte olmalıdır"));
    }
    let now_ts = clock::format_ts(now);

    let txn = db.begin().await?;

    let item = Item::find_by_id(input.item_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Eşya bulunamadı"))?;
    if !item.is_active || item.status != ItemStatus::Available.as_str() {
        return Err(DomainError::invalid_state(format!(
            "Eşya ödünç verilemez. Mevcut durum: {}",
            item.status
        )));
    }

    let borrower = User::find_by_id(borrower_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Kullanıcı bulunamadı"))?;

    let overdue = Transaction::find()
        .filter(transaction::Column::UserId.eq(borrower.id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
        .filter(transaction::Column::DueDate.lt(now_ts.clone()))
        .count(&txn)
        .await?;
    if overdue > 0 {
        return Err(DomainError::invalid_state(format!(
            "Kullanıcının {} gecikmiş eşyası var. Önce iade edilmelidir.",
            overdue
        )));
    }

    let unpaid: f64 = Transaction::find()
        .filter(transaction::Column::UserId.eq(borrower.id))
        .filter(transaction::Column::LateFee.gt(0.0))
        .filter(transaction::Column::LateFeePaid.eq(false))
        .all(&txn)
        .await?
        .iter()
        .map(|t| t.late_fee)
        .sum();
    if unpaid > 0.0 {
        return Err(DomainError::invalid_state(format!(
            "Kullanıcının ödenmemiş gecikme ücreti var: {:.2} TL",
            unpaid
        )));
    }

    let created = transaction::ActiveModel {
        item_id: Set(item.id),
        user_id: Set(borrower.id),
        checkout_date: Set(now_ts.clone()),
        due_date: Set(clock::format_ts(due)),
        return_date: Set(None),
        status: Set(TransactionStatus::Active.as_str().to_string()),
        late_fee: Set(0.0),
        late_fee_paid: Set(false),
        notes: Set(input.notes.filter(|n| !n.trim().is_empty())),
        checked_out_by: Set(Some(actor.id)),
        overdue_reminder_sent: Set(false),
        created_at: Set(now_ts.clone()),
        updated_at: Set(now_ts.clone()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match DomainError::from(e) {
        DomainError::Conflict(_) => {
            DomainError::Conflict("Bu eşya için zaten aktif bir ödünç işlemi var".to_string())
        }
        other => other,
    })?;

    let claimed = Item::update_many()
        .col_expr(item::Column::Status, Expr::value(ItemStatus::Lent.as_str()))
        .col_expr(item::Column::CurrentHolderId, Expr::value(borrower.id))
        .col_expr(item::Column::UpdatedAt, Expr::value(now_ts))
        .filter(item::Column::Id.eq(item.id))
        .filter(item::Column::Status.eq(ItemStatus::Available.as_str()))
        .exec(&txn)
        .await?;
    if claimed.rows_affected != 1 {
        return Err(DomainError::Conflict(
            "Bu eşya için zaten aktif bir ödünç işlemi var".to_string(),
        ));
    }

    record_event(
        &txn,
        item.id,
        LifecycleEvent::Checkout,
        format!("{} kullanıcısına ödünç verildi", borrower.name),
    )
    .await?;

    let lent = Item::find_by_id(item.id)
        .one(&txn)
        .await?
        .ok_or_else(|| DomainError::not_found("Eşya bulunamadı"))?;
    txn.commit().await?;

    tracing::info!(
        transaction_id = created.id,
        item_id = lent.id,
        borrower_id = borrower.id,
        "Item checked out"
    );

    notify::send_logged(
        db,
        notify::checkout_notice(borrower.id, created.id, &lent.name, &created.due_date),
    )
    .await;

    Ok((created, lent))
}

pub async fn return_item(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    actor: Actor,
    id: i32,
    input: ReturnInput,
) -> Result<ReturnOutcome, DomainError> {
    let mut errors = FieldErrors::default();
    let condition = match input.return_condition.as_deref() {
        None => ReturnCondition::Good,
        Some(raw) => ReturnCondition::parse(raw).unwrap_or_else(|| {
            errors.add(
                "return_condition",
                format!("Geçersiz durum. Geçerli değerler: {}", ReturnCondition::choices()),
            );
            ReturnCondition::Good
        }),
    };
    let priority = match input.maintenance_priority.as_deref() {
        None => Priority::High,
        Some(raw) => Priority::parse(raw).unwrap_or_else(|| {
            errors.add(
                "maintenance_priority",
                format!("Geçersiz öncelik. Geçerli değerler: {}", Priority::choices()),
            );
            Priority::High
        }),
    };
    errors.max_len("return_notes", input.return_notes.as_deref(), 1000, "İade notu en fazla 1000 karakter olabilir");
    errors.into_result()?;

    let existing = find_transaction(db, id).await?;
    if !actor.can_act_for(existing.user_id) {
        return Err(DomainError::forbidden("Bu işlemi iade etme yetkiniz yok"));
    }
    if existing.status != TransactionStatus::Active.as_str() {
        return Err(DomainError::invalid_state(format!(
            "İşlem aktif değil. Mevcut durum: {}",
            existing.status
        )));
    }

    let now = Utc::now();
    let due = clock::parse_ts(&existing.due_date).unwrap_or(now);
    let days = fees::days_overdue(due, now);
    let was_overdue = now > due;
    let (status, late_fee) = if was_overdue {
        (
            TransactionStatus::LateReturn,
            fees::late_fee(days, policy.late_fee_per_day),
        )
    } else {
        (TransactionStatus::Returned, 0.0)
    };

    let txn = db.begin().await?;

    let closed = close_transaction(
        &txn,
        id,
        vec![
            (transaction::Column::Status, Expr::value(status.as_str())),
            (transaction::Column::ReturnDate, Expr::value(clock::format_ts(now))),
            (transaction::Column::LateFee, Expr::value(late_fee)),
            (transaction::Column::ReturnCondition, Expr::value(condition.as_str())),
            (transaction::Column::ReturnNotes, Expr::value(input.return_notes.clone())),
            (transaction::Column::ReturnedTo, Expr::value(actor.id)),
        ],
    )
    .await?;

    let item_status = if condition.needs_maintenance() {
        ItemStatus::Maintenance
    } else {
        ItemStatus::Available
    };
    let item = release_item(&txn, closed.item_id, item_status).await?;
    record_event(
        &txn,
        item.id,
        LifecycleEvent::Return,
        format!("İade alındı (durum: {})", condition),
    )
    .await?;

    let maintenance_request = if condition.needs_maintenance() {
        let description = input
            .damage_description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "Eşya '{}' durumunda iade edildi. İnceleme gerekiyor.",
                    condition
                )
            });
        let request = maintenance_service::insert_request(
            &txn,
            MaintenanceDraft {
                item_id: item.id,
                requested_by: actor.id,
                transaction_id: Some(closed.id),
                maintenance_type: MaintenanceType::HardwareFailure,
                priority,
                description,
                scheduled_date: None,
            },
        )
        .await?;
        record_event(
            &txn,
            item.id,
            LifecycleEvent::Maintenance,
            format!("Hasarlı iade sonrası bakım talebi #{} açıldı", request.id),
        )
        .await?;
        Some(request)
    } else {
        None
    };

    txn.commit().await?;

    tracing::info!(
        transaction_id = closed.id,
        status = %status,
        days_overdue = days,
        late_fee,
        "Item returned"
    );

    notify::send_logged(db, notify::return_notice(closed.user_id, closed.id, late_fee)).await;
    if let Some(request) = &maintenance_request {
        notify::send_logged(
            db,
            notify::maintenance_created_notice(actor.id, request.id, &item.name),
        )
        .await;
    }

    Ok(ReturnOutcome {
        transaction: closed,
        item,
        was_overdue,
        days_overdue: days,
        late_fee,
        maintenance_request,
    })
}

pub async fn extend(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    input: ExtendInput,
) -> Result<transaction::Model, DomainError> {
    let raw = input
        .new_due_date
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DomainError::field("new_due_date", "Yeni bitiş tarihi zorunludur"))?;
    let new_due = clock::parse_ts(raw)
        .ok_or_else(|| DomainError::field("new_due_date", "Geçerli bir tarih giriniz"))?;
    if input.reason.as_deref().is_some_and(|r| r.chars().count() > 500) {
        return Err(DomainError::field("reason", "Uzatma nedeni en fazla 500 karakter olabilir"));
    }

    let existing = find_transaction(db, id).await?;
    if existing.status != TransactionStatus::Active.as_str() {
        return Err(DomainError::invalid_state("Sadece aktif işlemler uzatılabilir"));
    }
    if !actor.can_act_for(existing.user_id) {
        return Err(DomainError::forbidden("Bu işlemi uzatma yetkiniz yok"));
    }

    if new_due <= Utc::now() {
        return Err(DomainError::field(
            "new_due_date",
            "Yeni bitiş tarihi bugünden sonra olmalıdır",
        ));
    }
    if clock::parse_ts(&existing.due_date).is_some_and(|current| new_due <= current) {
        return Err(DomainError::field(
            "new_due_date",
            "Yeni bitiş tarihi mevcut bitiş tarihinden sonra olmalıdır",
        ));
    }

    let old_due = existing.due_date.clone();
    let note = match input.reason.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(reason) => format!("Süre uzatıldı: {}", reason.trim()),
        None => "Süre uzatıldı".to_string(),
    };

    let mut active: transaction::ActiveModel = existing.clone().into();
    active.due_date = Set(clock::format_ts(new_due));
    active.notes = Set(append_note(existing.notes, note));
    active.overdue_reminder_sent = Set(false);
    active.updated_at = Set(clock::now_ts());
    let updated = active.update(db).await?;

    tracing::info!(
        transaction_id = id,
        old_due_date = %old_due,
        new_due_date = %updated.due_date,
        "Transaction extended"
    );
    Ok(updated)
}

pub async fn cancel(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    input: CancelInput,
) -> Result<transaction::Model, DomainError> {
    let reason = input.reason.unwrap_or_default();
    let reason = reason.trim();
    let len = reason.chars().count();
    if len == 0 {
        return Err(DomainError::field("reason", "İptal nedeni zorunludur"));
    }
    if len < 10 {
        return Err(DomainError::field("reason", "İptal nedeni en az 10 karakter olmalıdır"));
    }
    if len > 500 {
        return Err(DomainError::field("reason", "İptal nedeni en fazla 500 karakter olmalıdır"));
    }

    let existing = find_transaction(db, id).await?;
    if existing.status != TransactionStatus::Active.as_str() {
        return Err(DomainError::invalid_state("Sadece aktif işlemler iptal edilebilir"));
    }
    if !actor.can_act_for(existing.user_id) {
        return Err(DomainError::forbidden("Bu işlemi iptal etme yetkiniz yok"));
    }

    let txn = db.begin().await?;
    let cancelled = close_transaction(
        &txn,
        id,
        vec![
            (
                transaction::Column::Status,
                Expr::value(TransactionStatus::Cancelled.as_str()),
            ),
            (
                transaction::Column::Notes,
                Expr::value(append_note(existing.notes.clone(), format!("İptal edildi: {}", reason))),
            ),
        ],
    )
    .await?;
    let item = release_item(&txn, cancelled.item_id, ItemStatus::Available).await?;
    record_event(
        &txn,
        item.id,
        LifecycleEvent::StatusChange,
        format!("Ödünç işlemi #{} iptal edildi", cancelled.id),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(transaction_id = id, "Transaction cancelled");
    Ok(cancelled)
}

pub async fn pay_fee(db: &DatabaseConnection, id: i32) -> Result<transaction::Model, DomainError> {
    let existing = find_transaction(db, id).await?;
    if existing.late_fee <= 0.0 {
        return Err(DomainError::invalid_state("Bu işlem için gecikme ücreti bulunmuyor"));
    }
    if existing.late_fee_paid {
        return Err(DomainError::invalid_state("Gecikme ücreti zaten ödenmiş"));
    }

    let mut active: transaction::ActiveModel = existing.into();
    active.late_fee_paid = Set(true);
    active.updated_at = Set(clock::now_ts());
    Ok(active.update(db).await?)
}

/// Filter parameters for listing transactions
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    /// A stored status, or `overdue` for open loans past their due date
    pub status: Option<String>,
    pub user_id: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// Matches item name or borrower name
    pub search: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

pub struct TransactionPage {
    pub rows: Vec<Value>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Loads the items and borrowers referenced by a batch of transactions.
async fn related(
    db: &DatabaseConnection,
    rows: &[transaction::Model],
) -> Result<(HashMap<i32, item::Model>, HashMap<i32, user::Model>), DomainError> {
    let item_ids: Vec<i32> = rows.iter().map(|t| t.item_id).collect();
    let user_ids: Vec<i32> = rows.iter().map(|t| t.user_id).collect();
    if rows.is_empty() {
        return Ok((HashMap::new(), HashMap::new()));
    }

    let items = Item::find()
        .filter(item::Column::Id.is_in(item_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();
    let users = User::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    Ok((items, users))
}

pub async fn list(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    actor: Actor,
    filter: TransactionFilter,
) -> Result<TransactionPage, DomainError> {
    let now = Utc::now();
    let mut condition = Condition::all();

    // Staff only ever see their own loans
    if !actor.is_manager() {
        condition = condition.add(transaction::Column::UserId.eq(actor.id));
    } else if let Some(user_id) = filter.user_id {
        condition = condition.add(transaction::Column::UserId.eq(user_id));
    }

    match filter.status.as_deref().filter(|s| !s.is_empty()) {
        Some("overdue") => {
            condition = condition
                .add(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
                .add(transaction::Column::DueDate.lt(clock::format_ts(now)));
        }
        Some(status) => {
            if TransactionStatus::parse(status).is_none() {
                return Err(DomainError::field(
                    "status",
                    format!(
                        "Geçersiz durum. Geçerli değerler: {}, overdue",
                        TransactionStatus::choices()
                    ),
                ));
            }
            condition = condition.add(transaction::Column::Status.eq(status));
        }
        None => {}
    }

    if let Some(from) = filter.date_from.as_deref().and_then(clock::normalize_ts) {
        condition = condition.add(transaction::Column::CheckoutDate.gte(from));
    }
    if let Some(to) = filter.date_to.as_deref().and_then(clock::parse_ts) {
        // Inclusive of the whole `date_to` day when only a date is given
        let end = if to.time() == chrono::NaiveTime::MIN {
            to + Duration::days(1) - Duration::seconds(1)
        } else {
            to
        };
        condition = condition.add(transaction::Column::CheckoutDate.lte(clock::format_ts(end)));
    }

    if let Some(q) = filter.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let item_ids: Vec<i32> = Item::find()
            .filter(item::Column::Name.contains(q))
            .all(db)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        let user_ids: Vec<i32> = User::find()
            .filter(user::Column::Name.contains(q))
            .all(db)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        condition = condition.add(
            Condition::any()
                .add(transaction::Column::ItemId.is_in(item_ids))
                .add(transaction::Column::UserId.is_in(user_ids)),
        );
    }

    let per_page = match filter.per_page {
        0 => 20,
        n => n.min(100),
    };
    let page = filter.page.max(1);

    let paginator = Transaction::find()
        .filter(condition)
        .order_by_desc(transaction::Column::CheckoutDate)
        .order_by_desc(transaction::Column::Id)
        .paginate(db, per_page);
    let total = paginator.num_items().await?;
    let models = paginator.fetch_page(page - 1).await?;

    let (items, users) = related(db, &models).await?;
    let rows = models
        .iter()
        .map(|t| to_json(t, items.get(&t.item_id), users.get(&t.user_id), now, policy))
        .collect();

    Ok(TransactionPage {
        rows,
        total,
        page,
        per_page,
    })
}

pub async fn find_one(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    actor: Actor,
    id: i32,
) -> Result<Value, DomainError> {
    let t = find_transaction(db, id).await?;
    if !actor.can_act_for(t.user_id) {
        return Err(DomainError::forbidden("Bu işlemi görüntüleme yetkiniz yok"));
    }
    let (items, users) = related(db, std::slice::from_ref(&t)).await?;
    Ok(to_json(
        &t,
        items.get(&t.item_id),
        users.get(&t.user_id),
        Utc::now(),
        policy,
    ))
}

/// Open loans past their due date, most overdue first, with a severity breakdown.
pub async fn overdue_report(db: &DatabaseConnection, policy: LoanPolicy) -> Result<Value, DomainError> {
    let now = Utc::now();
    let models = Transaction::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
        .filter(transaction::Column::DueDate.lt(clock::format_ts(now)))
        .order_by_asc(transaction::Column::DueDate)
        .all(db)
        .await?;
    let (items, users) = related(db, &models).await?;

    let mut breakdown: HashMap<&'static str, u64> =
        HashMap::from([("critical", 0), ("high", 0), ("medium", 0)]);

    let rows: Vec<Value> = models
        .iter()
        .map(|t| {
            let days = days_overdue(t, now);
            let severity = OverdueSeverity::from_days(days);
            let key = match severity {
                OverdueSeverity::Critical => "critical",
                OverdueSeverity::High => "high",
                OverdueSeverity::Medium => "medium",
            };
            *breakdown.entry(key).or_default() += 1;
            json!({
                "transaction": to_json(t, items.get(&t.item_id), users.get(&t.user_id), now, policy),
                "days_overdue": days,
                "severity": severity,
                "overdue_weeks": (days + 6) / 7,
                "late_fee": fees::late_fee(days, policy.late_fee_per_day),
            })
        })
        .collect();

    Ok(json!({
        "overdue_count": rows.len(),
        "transactions": rows,
        "severity_breakdown": breakdown,
    }))
}

pub async fn my_loans(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    actor: Actor,
) -> Result<Vec<Value>, DomainError> {
    let now = Utc::now();
    let models = Transaction::find()
        .filter(transaction::Column::UserId.eq(actor.id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
        .order_by_asc(transaction::Column::DueDate)
        .all(db)
        .await?;
    let (items, users) = related(db, &models).await?;
    Ok(models
        .iter()
        .map(|t| to_json(t, items.get(&t.item_id), users.get(&t.user_id), now, policy))
        .collect())
}

pub async fn stats(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    actor: Actor,
) -> Result<Value, DomainError> {
    let now = Utc::now();
    let mut query = Transaction::find();
    if !actor.is_manager() {
        query = query.filter(transaction::Column::UserId.eq(actor.id));
    }
    let all = query.all(db).await?;

    let count = |status: TransactionStatus| all.iter().filter(|t| t.status == status.as_str()).count();
    let overdue: Vec<&transaction::Model> = all.iter().filter(|t| is_overdue(t, now)).collect();
    let total_late_fees: f64 = all.iter().map(|t| t.late_fee).sum();
    let unpaid_late_fees: f64 = all
        .iter()
        .filter(|t| !t.late_fee_paid)
        .map(|t| t.late_fee)
        .sum();
    let accruing: f64 = overdue
        .iter()
        .map(|t| fees::late_fee(days_overdue(t, now), policy.late_fee_per_day))
        .sum();

    Ok(json!({
        "total": all.len(),
        "active": count(TransactionStatus::Active),
        "overdue": overdue.len(),
        "returned": count(TransactionStatus::Returned),
        "late_return": count(TransactionStatus::LateReturn),
        "cancelled": count(TransactionStatus::Cancelled),
        "total_late_fees": total_late_fees,
        "unpaid_late_fees": unpaid_late_fees,
        "accruing_late_fees": accruing,
        "late_fee_per_day": policy.late_fee_per_day,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(status: &str, due: DateTime<Utc>, returned: Option<DateTime<Utc>>) -> transaction::Model {
        transaction::Model {
            id: 1,
            item_id: 1,
            user_id: 1,
            checkout_date: clock::format_ts(due - Duration::days(14)),
            due_date: clock::format_ts(due),
            return_date: returned.map(clock::format_ts),
            status: status.to_string(),
            late_fee: 0.0,
            late_fee_paid: false,
            return_condition: None,
            return_notes: None,
            notes: None,
            checked_out_by: None,
            returned_to: None,
            overdue_reminder_sent: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn overdue_is_derived_from_open_loans_only() {
        let now = Utc::now();
        assert!(is_overdue(&loan("active", now - Duration::days(2), None), now));
        assert!(!is_overdue(&loan("active", now + Duration::days(2), None), now));
        assert!(!is_overdue(&loan("returned", now - Duration::days(2), None), now));
    }

    #[test]
    fn closed_late_loans_count_days_until_return() {
        let now = Utc::now();
        let due = now - Duration::days(10);
        let t = loan("late_return", due, Some(due + Duration::days(3) + Duration::hours(5)));
        assert_eq!(days_overdue(&t, now), 3);
        assert_eq!(days_overdue(&loan("returned", due, Some(due)), now), 0);
    }

    #[test]
    fn json_carries_derived_fields() {
        let now = Utc::now();
        let t = loan("active", now - Duration::days(4) - Duration::hours(1), None);
        let v = to_json(&t, None, None, now, LoanPolicy::default());
        assert_eq!(v["is_overdue"], true);
        assert_eq!(v["days_overdue"], 4);
        assert_eq!(v["accrued_late_fee"], 4.0);
    }

    #[test]
    fn notes_are_appended() {
        let notes = append_note(Some("ilk".into()), "Süre uzatıldı".into()).unwrap();
        assert!(notes.starts_with("ilk\n["));
        assert!(notes.ends_with("Süre uzatıldı"));
    }
}
