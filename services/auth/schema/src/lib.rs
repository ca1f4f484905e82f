//! sea-orm entities owned by the auth service.

pub mod refresh_tokens;
pub mod sessions;
pub mod sms_logs;
pub mod users;
pub mod verification_codes;
