//! Maintenance service-level targets.
//!
//! Each priority carries a first-response target and a resolution target,
//! both measured in hours from the moment the request was created.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::status::Priority;

pub const FIRST_RESPONSE_BREACH: &str = "First response SLA exceeded";
pub const RESOLUTION_BREACH: &str = "Resolution SLA exceeded";

pub fn response_hours(priority: Priority) -> i64 {
    match priority {
        Priority::Low => 72,
        Priority::Medium => 24,
        Priority::High => 4,
        Priority::Urgent => 2,
    }
}

pub fn resolution_hours(priority: Priority) -> i64 {
    match priority {
        Priority::Low => 168,
        Priority::Medium => 72,
        Priority::High => 24,
        Priority::Urgent => 8,
    }
}

/// Deadlines derived from a request's creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaTargets {
    pub sla_hours: i64,
    pub sla_due_date: DateTime<Utc>,
    pub resolution_target: DateTime<Utc>,
}

impl SlaTargets {
    pub fn for_priority(priority: Priority, created_at: DateTime<Utc>) -> Self {
        let sla_hours = response_hours(priority);
        Self {
            sla_hours,
            sla_due_date: created_at + Duration::hours(sla_hours),
            resolution_target: created_at + Duration::hours(resolution_hours(priority)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaUrgency {
    Normal,
    Warning,
    Critical,
    Breached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRemaining {
    pub status: SlaUrgency,
    /// Signed minutes until the deadline; negative once breached.
    pub minutes: i64,
    pub formatted: String,
}

pub fn time_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> TimeRemaining {
    let minutes = (deadline - now).num_minutes();
    let abs = minutes.abs();
    let (d, h, m) = (abs / (24 * 60), (abs / 60) % 24, abs % 60);

    if deadline < now {
        return TimeRemaining {
            status: SlaUrgency::Breached,
            minutes,
            formatted: format!("Overdue by {}d {}h {}m", d, h, m),
        };
    }

    let status = if minutes <= 2 * 60 {
        SlaUrgency::Critical
    } else if minutes <= 4 * 60 {
        SlaUrgency::Warning
    } else {
        SlaUrgency::Normal
    };

    TimeRemaining {
        status,
        minutes,
        formatted: format!("{}d {}h {}m remaining", d, h, m),
    }
}

/// Whether a milestone reached at `at` missed its `deadline`.
pub fn is_breach(at: DateTime<Utc>, deadline: DateTime<Utc>) -> bool {
    at > deadline
}
