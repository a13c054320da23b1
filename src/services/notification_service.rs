//! Notification Service - in-app messages and their templates

use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::domain::status::{MaintenanceStatus, NotificationKind, PurchaseStatus};
use crate::domain::{clock, DomainError};
use crate::models::notification::{self, Entity as Notification};

/// A notification about to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i32,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
}

impl NewNotification {
    fn new(user_id: i32, kind: NotificationKind, title: &str, message: String) -> Self {
        Self {
            user_id,
            kind,
            title: title.to_string(),
            message,
            action_url: None,
            action_text: None,
        }
    }

    fn action(mut self, url: String, text: &str) -> Self {
        self.action_url = Some(url);
        self.action_text = Some(text.to_string());
        self
    }
}

/// Day.month.year, the way due dates are shown to users
fn display_date(ts: &str) -> String {
    clock::parse_ts(ts)
        .map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn checkout_notice(user_id: i32, transaction_id: i32, item_name: &str, due_date: &str) -> NewNotification {
    NewNotification::new(
        user_id,
        NotificationKind::Success,
        "Ödünç Alma Başarılı",
        format!(
            "{} başarıyla ödünç alındı. İade tarihi: {}",
            item_name,
            display_date(due_date)
        ),
    )
    .action(format!("/transactions/{}", transaction_id), "İşlemi Görüntüle")
}

pub fn return_notice(user_id: i32, transaction_id: i32, late_fee: f64) -> NewNotification {
    let (kind, message) = if late_fee > 0.0 {
        (
            NotificationKind::Warning,
            format!("Ürün iade edildi. Gecikme ücreti: {:.2} TL", late_fee),
        )
    } else {
        (
            NotificationKind::Success,
            "Ürün başarıyla iade edildi. Teşekkür ederiz!".to_string(),
        )
    };
    NewNotification::new(user_id, kind, "Ürün İade Edildi", message)
        .action(format!("/transactions/{}", transaction_id), "İşlemi Görüntüle")
}

pub fn overdue_notice(
    user_id: i32,
    transaction_id: i32,
    item_name: &str,
    days_overdue: i64,
    late_fee: f64,
) -> NewNotification {
    NewNotification::new(
        user_id,
        NotificationKind::Error,
        "Gecikmiş Ürün",
        format!(
            "'{}' ürünü {} gün gecikmiş. Gecikme ücreti: {:.2} TL",
            item_name, days_overdue, late_fee
        ),
    )
    .action(format!("/transactions/{}", transaction_id), "Hemen İade Et")
}

pub fn maintenance_created_notice(user_id: i32, request_id: i32, item_name: &str) -> NewNotification {
    NewNotification::new(
        user_id,
        NotificationKind::Info,
        "Bakım Talebi Oluşturuldu",
        format!("'{}' için bakım talebi oluşturuldu.", item_name),
    )
    .action(format!("/maintenance/{}", request_id), "Talebi Görüntüle")
}

pub fn maintenance_assigned_notice(assignee_id: i32, request_id: i32, item_name: &str) -> NewNotification {
    NewNotification::new(
        assignee_id,
        NotificationKind::Info,
        "Bakım Talebi Atandı",
        format!("'{}' için bir bakım talebi size atandı.", item_name),
    )
    .action(format!("/maintenance/{}", request_id), "Talebi Görüntüle")
}

fn maintenance_status_label(status: MaintenanceStatus) -> &'static str {
    match status {
        MaintenanceStatus::Pending => "Beklemede",
        MaintenanceStatus::InProgress => "İşlemde",
        MaintenanceStatus::Completed => "Tamamlandı",
        MaintenanceStatus::Cancelled => "İptal Edildi",
    }
}

pub fn maintenance_status_notice(
    user_id: i32,
    request_id: i32,
    item_name: &str,
    status: MaintenanceStatus,
) -> NewNotification {
    let kind = if status == MaintenanceStatus::Completed {
        NotificationKind::Success
    } else {
        NotificationKind::Info
    };
    NewNotification::new(
        user_id,
        kind,
        "Bakım Durumu Güncellendi",
        format!(
            "'{}' için bakım talebi durumu: {}",
            item_name,
            maintenance_status_label(status)
        ),
    )
    .action(format!("/maintenance/{}", request_id), "Detayları Gör")
}

pub fn purchase_status_label(status: PurchaseStatus) -> &'static str {
    match status {
        PurchaseStatus::Pending => "Beklemede",
        PurchaseStatus::Approved => "Onaylandı",
        PurchaseStatus::Rejected => "Reddedildi",
        PurchaseStatus::Ordered => "Sipariş Edildi",
        PurchaseStatus::Received => "Teslim Alındı",
        PurchaseStatus::Cancelled => "İptal Edildi",
    }
}

pub fn purchase_status_notice(user_id: i32, request_id: i32, status: PurchaseStatus) -> NewNotification {
    let kind = match status {
        PurchaseStatus::Approved | PurchaseStatus::Received => NotificationKind::Success,
        PurchaseStatus::Rejected => NotificationKind::Warning,
        _ => NotificationKind::Info,
    };
    NewNotification::new(
        user_id,
        kind,
        "Satın Alma Talebi Güncellendi",
        format!("Satın alma talebi durumu: {}", purchase_status_label(status)),
    )
    .action(format!("/purchase-requests/{}", request_id), "Detayları Gör")
}

/// Persist a notification
pub async fn send<C: ConnectionTrait>(
    db: &C,
    new: NewNotification,
) -> Result<notification::Model, DomainError> {
    let row = notification::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(new.user_id),
        kind: Set(new.kind.as_str().to_string()),
        title: Set(new.title),
        message: Set(new.message),
        action_url: Set(new.action_url),
        action_text: Set(new.action_text),
        read_at: Set(None),
        created_at: Set(clock::now_ts()),
    };
    Ok(row.insert(db).await?)
}

/// Persist a notification after the main work has committed; failures are
/// logged and swallowed.
pub async fn send_logged<C: ConnectionTrait>(db: &C, new: NewNotification) {
    let user_id = new.user_id;
    let title = new.title.clone();
    if let Err(e) = send(db, new).await {
        tracing::error!(user_id, title = %title, "Failed to write notification: {}", e);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl ReadFilter {
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("unread") => ReadFilter::Unread,
            Some("read") => ReadFilter::Read,
            _ => ReadFilter::All,
        }
    }
}

pub struct NotificationPage {
    pub notifications: Vec<notification::Model>,
    pub total: u64,
    pub unread_count: u64,
}

pub async fn list_for_user(
    db: &DatabaseConnection,
    user_id: i32,
    filter: ReadFilter,
    page: u64,
    per_page: u64,
) -> Result<NotificationPage, DomainError> {
    let mut query = Notification::find().filter(notification::Column::UserId.eq(user_id));
    query = match filter {
        ReadFilter::All => query,
        ReadFilter::Unread => query.filter(notification::Column::ReadAt.is_null()),
        ReadFilter::Read => query.filter(notification::Column::ReadAt.is_not_null()),
    };

    let paginator = query
        .order_by_desc(notification::Column::CreatedAt)
        .paginate(db, per_page.clamp(1, 100));
    let total = paginator.num_items().await?;
    let notifications = paginator.fetch_page(page.max(1) - 1).await?;

    Ok(NotificationPage {
        notifications,
        total,
        unread_count: unread_count(db, user_id).await?,
    })
}

pub async fn unread_count(db: &DatabaseConnection, user_id: i32) -> Result<u64, DomainError> {
    Ok(Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::ReadAt.is_null())
        .count(db)
        .await?)
}

/// Rows belonging to someone else are reported as missing.
async fn find_owned(
    db: &DatabaseConnection,
    user_id: i32,
    id: &str,
) -> Result<notification::Model, DomainError> {
    Notification::find_by_id(id.to_string())
        .filter(notification::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Bildirim bulunamadı"))
}

pub async fn mark_read(
    db: &DatabaseConnection,
    user_id: i32,
    id: &str,
) -> Result<notification::Model, DomainError> {
    let existing = find_owned(db, user_id, id).await?;
    if existing.read_at.is_some() {
        return Ok(existing);
    }
    let mut active: notification::ActiveModel = existing.into();
    active.read_at = Set(Some(clock::now_ts()));
    Ok(active.update(db).await?)
}

pub async fn mark_all_read(db: &DatabaseConnection, user_id: i32) -> Result<u64, DomainError> {
    let result = Notification::update_many()
        .col_expr(
            notification::Column::ReadAt,
            Expr::value(clock::now_ts()),
        )
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::ReadAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete(db: &DatabaseConnection, user_id: i32, id: &str) -> Result<(), DomainError> {
    let existing = find_owned(db, user_id, id).await?;
    existing.delete(db).await?;
    Ok(())
}

pub async fn delete_read(db: &DatabaseConnection, user_id: i32) -> Result<u64, DomainError> {
    let result = Notification::delete_many()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::ReadAt.is_not_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
