//! Report Service - aggregate views over inventory, loans and requests

use chrono::{Duration, Utc};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

use crate::domain::status::{ItemStatus, MaintenanceStatus, PurchaseStatus, TransactionStatus};
use crate::domain::{clock, DomainError};
use crate::models::category::{self, Entity as Category};
use crate::models::item::{self, Entity as Item};
use crate::models::maintenance_request::{self, Entity as MaintenanceRequest};
use crate::models::purchase_request::{self, Entity as PurchaseRequest};
use crate::models::transaction::{self, Entity as Transaction};
use crate::models::user::{self, Entity as User};
use crate::services::{maintenance_service, purchase_service, transaction_service};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Inventory,
    Transactions,
    Maintenance,
    Purchase,
}

impl ReportType {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "inventory" => Ok(ReportType::Inventory),
            "transactions" => Ok(ReportType::Transactions),
            "maintenance" => Ok(ReportType::Maintenance),
            "purchase" => Ok(ReportType::Purchase),
            other => Err(DomainError::field(
                "type",
                format!(
                    "Geçersiz rapor türü: {}. Geçerli değerler: inventory, transactions, maintenance, purchase",
                    other
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub category_id: Option<i32>,
    pub user_id: Option<i32>,
    pub priority: Option<String>,
}

impl ReportFilter {
    /// Inclusive bounds on `created_at`-like columns; a bare `date_to` covers the whole day.
    fn bounds(&self) -> Result<(Option<String>, Option<String>), DomainError> {
        let parse = |field: &str, raw: Option<&str>| -> Result<Option<chrono::DateTime<Utc>>, DomainError> {
            match raw.filter(|s| !s.is_empty()) {
                None => Ok(None),
                Some(raw) => clock::parse_ts(raw)
                    .map(Some)
                    .ok_or_else(|| DomainError::field(field, "Geçerli bir tarih giriniz")),
            }
        };
        let from = parse("date_from", self.date_from.as_deref())?;
        let to = parse("date_to", self.date_to.as_deref())?.map(|t| {
            if t.time() == chrono::NaiveTime::MIN {
                t + Duration::days(1) - Duration::seconds(1)
            } else {
                t
            }
        });
        if let (Some(f), Some(t)) = (from, to) {
            if t < f {
                return Err(DomainError::field(
                    "date_to",
                    "Bitiş tarihi başlangıç tarihinden önce olamaz",
                ));
            }
        }
        Ok((from.map(clock::format_ts), to.map(clock::format_ts)))
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| !s.is_empty())
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn count_by<'a, I>(keys: &[&'a str], values: I) -> BTreeMap<&'a str, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = keys.iter().map(|k| (*k, 0)).collect();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    counts
}

pub async fn generate(
    db: &DatabaseConnection,
    report_type: ReportType,
    filter: &ReportFilter,
    policy: transaction_service::LoanPolicy,
) -> Result<Value, DomainError> {
    let data = match report_type {
        ReportType::Inventory => inventory_report(db, filter).await?,
        ReportType::Transactions => transaction_report(db, filter, policy).await?,
        ReportType::Maintenance => maintenance_report(db, filter).await?,
        ReportType::Purchase => purchase_report(db, filter).await?,
    };
    tracing::debug!(report = ?report_type, "Report generated");
    Ok(data)
}

async fn inventory_report(db: &DatabaseConnection, filter: &ReportFilter) -> Result<Value, DomainError> {
    let (from, to) = filter.bounds()?;
    let mut query = Item::find();
    if let Some(status) = filter.status() {
        query = query.filter(item::Column::Status.eq(status));
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(item::Column::CategoryId.eq(category_id));
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(item::Column::CurrentHolderId.eq(user_id));
    }
    if let Some(from) = from {
        query = query.filter(item::Column::CreatedAt.gte(from));
    }
    if let Some(to) = to {
        query = query.filter(item::Column::CreatedAt.lte(to));
    }
    let items = query.order_by_asc(item::Column::InventoryNumber).all(db).await?;

    let categories: HashMap<i32, String> = Category::find()
        .all(db)
        .await?
        .into_iter()
        .map(|c: category::Model| (c.id, c.category_name))
        .collect();

    let statuses: Vec<&str> = ItemStatus::ALL.iter().map(|s| s.as_str()).collect();
    let by_status = count_by(&statuses, items.iter().map(|i| i.status.as_str()));

    let mut by_category: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for i in &items {
        let name = categories
            .get(&i.category_id)
            .cloned()
            .unwrap_or_else(|| "Kategorisiz".to_string());
        let entry = by_category.entry(name).or_default();
        entry.0 += 1;
        entry.1 += i.purchase_value.unwrap_or(0.0);
    }

    let now = Utc::now();
    let soon = clock::format_ts(now + Duration::days(30));
    let now_ts = clock::format_ts(now);
    let (mut expiring, mut expired) = (0, 0);
    for w in items.iter().filter_map(|i| i.warranty_expiry_date.as_deref()) {
        let Some(w) = clock::normalize_ts(w) else { continue };
        if w < now_ts {
            expired += 1;
        } else if w <= soon {
            expiring += 1;
        }
    }

    let values: Vec<f64> = items.iter().filter_map(|i| i.purchase_value).collect();
    let total_value: f64 = values.iter().sum();

    Ok(json!({
        "report_type": "inventory",
        "generated_at": now_ts,
        "rows": items
            .iter()
            .map(|i| i.to_json(categories.get(&i.category_id).map(String::as_str)))
            .collect::<Vec<_>>(),
        "summary": {
            "total_items": items.len(),
            "active_items": items.iter().filter(|i| i.is_active).count(),
            "by_status": by_status,
            "total_value": round2(total_value),
            "average_value": if values.is_empty() { 0.0 } else { round2(total_value / values.len() as f64) },
            "warranty": { "expiring_soon": expiring, "expired": expired },
        },
        "by_category": by_category
            .into_iter()
            .map(|(name, (count, value))| (name, json!({ "count": count, "value": round2(value) })))
            .collect::<BTreeMap<_, _>>(),
    }))
}

async fn transaction_report(
    db: &DatabaseConnection,
    filter: &ReportFilter,
    policy: transaction_service::LoanPolicy,
) -> Result<Value, DomainError> {
    let (from, to) = filter.bounds()?;
    let now = Utc::now();
    let mut query = Transaction::find();
    match filter.status() {
        Some("overdue") => {
            query = query
                .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
                .filter(transaction::Column::DueDate.lt(clock::format_ts(now)));
        }
        Some(status) => query = query.filter(transaction::Column::Status.eq(status)),
        None => {}
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(transaction::Column::UserId.eq(user_id));
    }
    if let Some(from) = from {
        query = query.filter(transaction::Column::CheckoutDate.gte(from));
    }
    if let Some(to) = to {
        query = query.filter(transaction::Column::CheckoutDate.lte(to));
    }
    if let Some(category_id) = filter.category_id {
        let ids: Vec<i32> = Item::find()
            .filter(item::Column::CategoryId.eq(category_id))
            .all(db)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        query = query.filter(transaction::Column::ItemId.is_in(ids));
    }
    let rows = query
        .order_by_desc(transaction::Column::CheckoutDate)
        .all(db)
        .await?;

    let items: HashMap<i32, item::Model> = Item::find()
        .filter(item::Column::Id.is_in(rows.iter().map(|t| t.item_id).collect::<Vec<_>>()))
        .all(db)
        .await?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();
    let users: HashMap<i32, user::Model> = User::find()
        .filter(user::Column::Id.is_in(rows.iter().map(|t| t.user_id).collect::<Vec<_>>()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let statuses: Vec<&str> = TransactionStatus::ALL.iter().map(|s| s.as_str()).collect();
    let by_status = count_by(&statuses, rows.iter().map(|t| t.status.as_str()));
    let total_fees: f64 = rows.iter().map(|t| t.late_fee).sum();
    let unpaid: f64 = rows.iter().filter(|t| !t.late_fee_paid).map(|t| t.late_fee).sum();

    Ok(json!({
        "report_type": "transactions",
        "generated_at": clock::format_ts(now),
        "rows": rows
            .iter()
            .map(|t| transaction_service::to_json(t, items.get(&t.item_id), users.get(&t.user_id), now, policy))
            .collect::<Vec<_>>(),
        "summary": {
            "total_transactions": rows.len(),
            "by_status": by_status,
            "overdue": rows.iter().filter(|t| transaction_service::is_overdue(t, now)).count(),
            "total_late_fees": round2(total_fees),
            "unpaid_late_fees": round2(unpaid),
        },
    }))
}

async fn maintenance_report(db: &DatabaseConnection, filter: &ReportFilter) -> Result<Value, DomainError> {
    let (from, to) = filter.bounds()?;
    let mut query = MaintenanceRequest::find();
    if let Some(status) = filter.status() {
        query = query.filter(maintenance_request::Column::Status.eq(status));
    }
    if let Some(priority) = filter.priority.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(maintenance_request::Column::Priority.eq(priority));
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(
            Condition::any()
                .add(maintenance_request::Column::RequestedBy.eq(user_id))
                .add(maintenance_request::Column::AssignedTo.eq(user_id)),
        );
    }
    if let Some(from) = from {
        query = query.filter(maintenance_request::Column::CreatedAt.gte(from));
    }
    if let Some(to) = to {
        query = query.filter(maintenance_request::Column::CreatedAt.lte(to));
    }
    let rows = query
        .order_by_desc(maintenance_request::Column::CreatedAt)
        .all(db)
        .await?;

    let now = Utc::now();
    let statuses: Vec<&str> = MaintenanceStatus::ALL.iter().map(|s| s.as_str()).collect();
    let by_status = count_by(&statuses, rows.iter().map(|r| r.status.as_str()));

    let mut by_priority: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for r in &rows {
        let entry = by_priority.entry(r.priority.as_str()).or_default();
        entry.0 += 1;
        entry.1 += r.cost.unwrap_or(0.0);
    }
    let costs: Vec<f64> = rows.iter().filter_map(|r| r.cost).collect();
    let total_cost: f64 = costs.iter().sum();

    Ok(json!({
        "report_type": "maintenance",
        "generated_at": clock::format_ts(now),
        "rows": rows.iter().map(|r| maintenance_service::to_json(r, None, now)).collect::<Vec<_>>(),
        "summary": {
            "total_requests": rows.len(),
            "by_status": by_status,
            "total_cost": round2(total_cost),
            "average_cost": if costs.is_empty() { 0.0 } else { round2(total_cost / costs.len() as f64) },
            "sla": maintenance_service::sla_statistics(&rows, now),
        },
        "by_priority": by_priority
            .into_iter()
            .map(|(p, (count, cost))| (p, json!({ "count": count, "total_cost": round2(cost) })))
            .collect::<BTreeMap<_, _>>(),
    }))
}

async fn purchase_report(db: &DatabaseConnection, filter: &ReportFilter) -> Result<Value, DomainError> {
    let (from, to) = filter.bounds()?;
    let mut query = PurchaseRequest::find();
    if let Some(status) = filter.status() {
        query = query.filter(purchase_request::Column::Status.eq(status));
    }
    if let Some(priority) = filter.priority.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(purchase_request::Column::Priority.eq(priority));
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(purchase_request::Column::RequestedBy.eq(user_id));
    }
    if let Some(from) = from {
        query = query.filter(purchase_request::Column::CreatedAt.gte(from));
    }
    if let Some(to) = to {
        query = query.filter(purchase_request::Column::CreatedAt.lte(to));
    }
    let rows = query
        .order_by_desc(purchase_request::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(json!({
        "report_type": "purchase",
        "generated_at": clock::now_ts(),
        "rows": rows,
        "summary": purchase_service::summarize(&rows),
    }))
}

/// Headline numbers for the landing page
pub async fn dashboard(
    db: &DatabaseConnection,
    policy: transaction_service::LoanPolicy,
) -> Result<Value, DomainError> {
    let now = Utc::now();
    let now_ts = clock::format_ts(now);

    let items = Item::find().filter(item::Column::IsActive.eq(true)).all(db).await?;
    let statuses: Vec<&str> = ItemStatus::ALL.iter().map(|s| s.as_str()).collect();
    let items_by_status = count_by(&statuses, items.iter().map(|i| i.status.as_str()));

    let open_loans = Transaction::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
        .all(db)
        .await?;
    let overdue: Vec<&transaction::Model> = open_loans
        .iter()
        .filter(|t| t.due_date.as_str() < now_ts.as_str())
        .collect();
    let accruing: f64 = overdue
        .iter()
        .map(|t| {
            crate::domain::fees::late_fee(transaction_service::days_overdue(t, now), policy.late_fee_per_day)
        })
        .sum();

    let open_maintenance = MaintenanceRequest::find()
        .filter(maintenance_request::Column::Status.is_in([
            MaintenanceStatus::Pending.as_str(),
            MaintenanceStatus::InProgress.as_str(),
        ]))
        .all(db)
        .await?;

    let pending_purchases = PurchaseRequest::find()
        .filter(purchase_request::Column::Status.eq(PurchaseStatus::Pending.as_str()))
        .count(db)
        .await?;

    let week_ago = clock::format_ts(now - Duration::days(7));
    let checkouts_this_week = Transaction::find()
        .filter(transaction::Column::CheckoutDate.gte(week_ago))
        .count(db)
        .await?;

    Ok(json!({
        "generated_at": now_ts,
        "items": {
            "total": items.len(),
            "by_status": items_by_status,
        },
        "transactions": {
            "active": open_loans.len(),
            "overdue": overdue.len(),
            "checkouts_last_7_days": checkouts_this_week,
            "accruing_late_fees": round2(accruing),
        },
        "maintenance": {
            "open": open_maintenance.len(),
            "urgent": open_maintenance.iter().filter(|r| r.priority == "urgent").count(),
            "sla_breached": open_maintenance.iter().filter(|r| r.sla_breached).count(),
        },
        "purchases": {
            "pending": pending_purchases,
        },
        "users": User::find().count(db).await?,
    }))
}
