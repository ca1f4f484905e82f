//! Auth types shared across Bazaar services.
//!
//! Provides stateless access-token validation plus the `BearerToken` and
//! `DeviceInfo` request extractors. Session liveness is checked only by the
//! auth service; other services use [`token::validate_access_token`] as a
//! cheap pre-filter before calling it.

pub mod bearer;
pub mod device;
pub mod token;
