//! User permission flags. Users carry a bitmask over these; `SuperAdmin`
//! passes every test.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum Permission {
    Invalid = 1 << 0,
    SuperAdmin = 1 << 1,
    Admin = 1 << 2,
    Job = 1 << 3,
    Reports = 1 << 4,
}

impl Permission {
    pub fn bit(self) -> u32 {
        self as u32
    }

    /// Case-insensitive name lookup; anything unknown maps to `Invalid`.
    pub fn from_name(name: &str) -> Permission {
        match name.to_ascii_lowercase().as_str() {
            "superadmin" => Permission::SuperAdmin,
            "admin" => Permission::Admin,
            "job" => Permission::Job,
            "reports" => Permission::Reports,
            _ => Permission::Invalid,
        }
    }
}

/// Tests a permission bitmask. `SuperAdmin` implies every permission;
/// otherwise the exact bit must be present.
pub fn has_permission(mask: u32, permission: Permission) -> bool {
    if mask & Permission::SuperAdmin.bit() != 0 {
        true
    } else {
        mask & permission.bit() != 0
    }
}
