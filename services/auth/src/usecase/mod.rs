pub mod admin;
pub mod cleanup;
pub mod rate_limit;
pub mod revoke;
pub mod send_code;
pub mod token;
pub mod verify_code;
