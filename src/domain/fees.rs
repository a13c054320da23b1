//! Late-fee and overdue arithmetic.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_LATE_FEE_PER_DAY: f64 = 1.0;

/// Whole days between `due` and `reference`, 0 when not past due.
pub fn days_overdue(due: DateTime<Utc>, reference: DateTime<Utc>) -> i64 {
    if reference <= due {
        return 0;
    }
    (reference - due).num_days()
}

pub fn late_fee(days_overdue: i64, rate_per_day: f64) -> f64 {
    if days_overdue <= 0 {
        return 0.0;
    }
    let fee = days_overdue as f64 * rate_per_day;
    (fee * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdueSeverity {
    Medium,
    High,
    Critical,
}

impl OverdueSeverity {
    pub fn from_days(days: i64) -> Self {
        if days > 30 {
            OverdueSeverity::Critical
        } else if days > 14 {
            OverdueSeverity::High
        } else {
            OverdueSeverity::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn partial_days_are_floored() {
        let due = Utc::now();
        assert_eq!(days_overdue(due, due + Duration::hours(23)), 0);
        assert_eq!(days_overdue(due, due + Duration::hours(49)), 2);
        assert_eq!(days_overdue(due, due - Duration::days(3)), 0);
    }

    #[test]
    fn fee_scales_with_rate() {
        assert_eq!(late_fee(5, DEFAULT_LATE_FEE_PER_DAY), 5.0);
        assert_eq!(late_fee(3, 2.5), 7.5);
        assert_eq!(late_fee(0, 10.0), 0.0);
    }

    #[test]
    fn severity_thresholds() {
        assert_eq!(OverdueSeverity::from_days(1), OverdueSeverity::Medium);
        assert_eq!(OverdueSeverity::from_days(14), OverdueSeverity::Medium);
        assert_eq!(OverdueSeverity::from_days(15), OverdueSeverity::High);
        assert_eq!(OverdueSeverity::from_days(30), OverdueSeverity::High);
        assert_eq!(OverdueSeverity::from_days(31), OverdueSeverity::Critical);
    }
}
