//! Domain types shared across all Bazaar services.
//!
//! Pure types and functions with no framework dependencies.

pub mod phone;
pub mod user;
