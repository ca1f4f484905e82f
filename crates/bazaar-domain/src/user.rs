//! User domain types.

use serde::{Deserialize, Serialize};

/// Marketplace permission level.
///
/// Wire format: `u8` (0 = Client, 1 = Provider, 2 = Admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Books services. Every self-registered account starts here.
    #[default]
    Client = 0,
    /// Publishes services in the catalogue.
    Provider = 1,
    /// Back-office account; the only role allowed to use password login.
    Admin = 2,
}

impl UserRole {
    /// Convert from `u8` wire value. Returns `None` for unknown values.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Client),
            1 => Some(Self::Provider),
            2 => Some(Self::Admin),
            _ => None,
        }
    }

    /// Convert to `u8` wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}
