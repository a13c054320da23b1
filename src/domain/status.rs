//! Status vocabularies stored as lowercase strings in the database, and the
//! transitions each workflow allows.

use std::fmt;

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Comma-separated list of accepted values, for error messages.
            pub fn choices() -> String {
                Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(ItemStatus {
    Available => "available",
    Lent => "lent",
    Maintenance => "maintenance",
    Retired => "retired",
    Donated => "donated",
});

string_enum!(ItemCondition {
    New => "new",
    Used => "used",
    Refurbished => "refurbished",
    Damaged => "damaged",
});

string_enum!(TransactionStatus {
    Active => "active",
    Returned => "returned",
    LateReturn => "late_return",
    Cancelled => "cancelled",
});

impl TransactionStatus {
    /// Only open loans move, and only to a terminal status.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (
                TransactionStatus::Active,
                TransactionStatus::Returned
                    | TransactionStatus::LateReturn
                    | TransactionStatus::Cancelled
            )
        )
    }
}

string_enum!(ReturnCondition {
    Excellent => "excellent",
    Good => "good",
    Fair => "fair",
    Poor => "poor",
    Damaged => "damaged",
});

impl ReturnCondition {
    /// Conditions that send the item to maintenance on return.
    pub fn needs_maintenance(&self) -> bool {
        matches!(self, ReturnCondition::Poor | ReturnCondition::Damaged)
    }
}

string_enum!(MaintenanceStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl MaintenanceStatus {
    pub fn can_transition_to(&self, next: MaintenanceStatus) -> bool {
        use MaintenanceStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Cancelled) | (InProgress, Completed) | (InProgress, Cancelled)
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self, MaintenanceStatus::Pending | MaintenanceStatus::InProgress)
    }
}

string_enum!(MaintenanceType {
    HardwareFailure => "hardware_failure",
    SoftwareIssue => "software_issue",
    RoutineCleaning => "routine_cleaning",
    ConsumableReplacement => "consumable_replacement",
});

string_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

impl Priority {
    /// Sort key, most urgent first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

string_enum!(PurchaseStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Ordered => "ordered",
    Received => "received",
    Cancelled => "cancelled",
});

impl PurchaseStatus {
    pub fn can_transition_to(&self, next: PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Ordered)
                | (Approved, Cancelled)
                | (Ordered, Received)
        )
    }
}

string_enum!(NotificationKind {
    Info => "info",
    Success => "success",
    Warning => "warning",
    Error => "error",
});

string_enum!(LifecycleEvent {
    Created => "created",
    Checkout => "checkout",
    Return => "return",
    Maintenance => "maintenance",
    StatusChange => "status_change",
    CategoryChange => "category_change",
    Retired => "retired",
});

string_enum!(FeedbackRating {
    Helpful => "helpful",
    NotHelpful => "not_helpful",
    PartiallyHelpful => "partially_helpful",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_transitions_only_leave_active() {
        use TransactionStatus::*;
        assert!(Active.can_transition_to(Returned));
        assert!(Active.can_transition_to(LateReturn));
        assert!(Active.can_transition_to(Cancelled));
        assert!(!Active.can_transition_to(Active));
        for terminal in [Returned, LateReturn, Cancelled] {
            for next in TransactionStatus::ALL {
                assert!(!terminal.can_transition_to(*next));
            }
        }
    }

    #[test]
    fn purchase_workflow() {
        use PurchaseStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Ordered));
        assert!(Ordered.can_transition_to(Received));
        assert!(!Pending.can_transition_to(Ordered));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Ordered.can_transition_to(Cancelled));
        assert!(!Received.can_transition_to(Cancelled));
    }

    #[test]
    fn maintenance_workflow() {
        use MaintenanceStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(Pending.is_open() && !Cancelled.is_open());
    }

    #[test]
    fn parse_and_display_agree() {
        assert_eq!(ItemStatus::parse("lent"), Some(ItemStatus::Lent));
        assert_eq!(ItemStatus::parse("overdue"), None);
        assert_eq!(TransactionStatus::LateReturn.to_string(), "late_return");
        assert_eq!(Priority::choices(), "low, medium, high, urgent");
    }

    #[test]
    fn poor_and_damaged_returns_need_maintenance() {
        assert!(ReturnCondition::Damaged.needs_maintenance());
        assert!(ReturnCondition::Poor.needs_maintenance());
        assert!(!ReturnCondition::Fair.needs_maintenance());
    }
}
