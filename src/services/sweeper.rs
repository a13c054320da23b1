//! Background sweeper: overdue reminders and SLA breach flags.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::time::Duration;

use crate::domain::status::{MaintenanceStatus, TransactionStatus};
use crate::domain::{clock, fees, sla, DomainError};
use crate::models::item::Entity as Item;
use crate::models::maintenance_request::{self, Entity as MaintenanceRequest};
use crate::models::transaction::{self, Entity as Transaction};
use crate::services::notification_service as notify;
use crate::services::transaction_service::LoanPolicy;

/// What one pass changed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub overdue_reminders: u64,
    pub response_breaches: u64,
    pub resolution_breaches: u64,
}

pub async fn run_sweeper(db: DatabaseConnection, policy: LoanPolicy, interval_secs: u64) {
    tracing::info!("🧹 Sweeper started (every {}s)", interval_secs);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        ticker.tick().await;
        match sweep_once(&db, policy).await {
            Ok(report) if report != SweepReport::default() => {
                tracing::info!(
                    overdue_reminders = report.overdue_reminders,
                    response_breaches = report.response_breaches,
                    resolution_breaches = report.resolution_breaches,
                    "Sweep completed"
                );
            }
            Ok(_) => tracing::debug!("Sweep completed, nothing to do"),
            Err(e) => tracing::error!("❌ Sweep failed: {}", e),
        }
    }
}

pub async fn sweep_once(db: &DatabaseConnection, policy: LoanPolicy) -> Result<SweepReport, DomainError> {
    let overdue_reminders = send_overdue_reminders(db, policy).await?;
    let (response_breaches, resolution_breaches) = flag_sla_breaches(db).await?;
    Ok(SweepReport {
        overdue_reminders,
        response_breaches,
        resolution_breaches,
    })
}

/// One reminder per overdue loan; the flag is cleared again when the loan is extended.
async fn send_overdue_reminders(db: &DatabaseConnection, policy: LoanPolicy) -> Result<u64, DomainError> {
    let now = Utc::now();
    let due = Transaction::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
        .filter(transaction::Column::DueDate.lt(clock::format_ts(now)))
        .filter(transaction::Column::OverdueReminderSent.eq(false))
        .find_also_related(Item)
        .all(db)
        .await?;

    let mut sent = 0;
    for (loan, item) in due {
        // Claim the reminder first so a concurrent pass cannot send it twice
        let claimed = Transaction::update_many()
            .col_expr(transaction::Column::OverdueReminderSent, Expr::value(true))
            .filter(transaction::Column::Id.eq(loan.id))
            .filter(transaction::Column::OverdueReminderSent.eq(false))
            .exec(db)
            .await?;
        if claimed.rows_affected != 1 {
            continue;
        }

        let days = crate::services::transaction_service::days_overdue(&loan, now);
        let name = item.map(|i| i.name).unwrap_or_else(|| format!("#{}", loan.item_id));
        notify::send_logged(
            db,
            notify::overdue_notice(
                loan.user_id,
                loan.id,
                &name,
                days,
                fees::late_fee(days, policy.late_fee_per_day),
            ),
        )
        .await;
        sent += 1;
    }
    Ok(sent)
}

/// Flags requests that missed a deadline while still open. A request is flagged once.
async fn flag_sla_breaches(db: &DatabaseConnection) -> Result<(u64, u64), DomainError> {
    let now_ts = clock::now_ts();

    let response = MaintenanceRequest::update_many()
        .col_expr(maintenance_request::Column::SlaBreached, Expr::value(true))
        .col_expr(
            maintenance_request::Column::SlaBreachReason,
            Expr::value(sla::FIRST_RESPONSE_BREACH),
        )
        .col_expr(maintenance_request::Column::UpdatedAt, Expr::value(now_ts.clone()))
        .filter(maintenance_request::Column::Status.eq(MaintenanceStatus::Pending.as_str()))
        .filter(maintenance_request::Column::SlaBreached.eq(false))
        .filter(maintenance_request::Column::SlaDueDate.lt(now_ts.clone()))
        .exec(db)
        .await?;

    let resolution = MaintenanceRequest::update_many()
        .col_expr(maintenance_request::Column::SlaBreached, Expr::value(true))
        .col_expr(
            maintenance_request::Column::SlaBreachReason,
            Expr::value(sla::RESOLUTION_BREACH),
        )
        .col_expr(maintenance_request::Column::UpdatedAt, Expr::value(now_ts.clone()))
        .filter(maintenance_request::Column::Status.eq(MaintenanceStatus::InProgress.as_str()))
        .filter(maintenance_request::Column::SlaBreached.eq(false))
        .filter(maintenance_request::Column::ResolutionTarget.lt(now_ts))
        .exec(db)
        .await?;

    if response.rows_affected > 0 || resolution.rows_affected > 0 {
        tracing::warn!(
            response = response.rows_affected,
            resolution = resolution.rows_affected,
            "Maintenance SLA breaches flagged"
        );
    }
    Ok((response.rows_affected, resolution.rows_affected))
}
