//! User roles and role-based permissions.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Admin")]
    Admin,
    #[serde(rename = "Inventory Manager")]
    InventoryManager,
    #[serde(rename = "Staff")]
    Staff,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::InventoryManager, Role::Staff];

    /// Roles allowed to manage inventory, loans, and requests.
    pub const MANAGERS: &'static [Role] = &[Role::Admin, Role::InventoryManager];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::InventoryManager => "Inventory Manager",
            Role::Staff => "Staff",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|r| r.name() == name)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Admin or Inventory Manager
    pub fn is_manager(&self) -> bool {
        Role::MANAGERS.contains(self)
    }
}

/// The authenticated user performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub role: Role,
}

impl Actor {
    pub fn is_manager(&self) -> bool {
        self.role.is_manager()
    }

    /// Managers act on anyone's records, everyone else only on their own.
    pub fn can_act_for(&self, owner_id: i32) -> bool {
        self.is_manager() || self.id == owner_id
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_name(role.name()), Some(role));
        }
        assert_eq!(Role::from_name("admin"), None);
    }

    #[test]
    fn managers() {
        assert!(Role::Admin.is_manager());
        assert!(Role::InventoryManager.is_manager());
        assert!(!Role::Staff.is_manager());
        assert!(!Role::InventoryManager.is_admin());
    }
}
