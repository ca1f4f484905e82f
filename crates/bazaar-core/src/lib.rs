//! Service plumbing shared by Bazaar backends: tracing setup, HTTP layers, serde helpers.

pub mod middleware;
pub mod serde;
pub mod tracing;
