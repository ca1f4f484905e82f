pub mod db;
pub mod hasher;
pub mod sms;
pub mod system;
