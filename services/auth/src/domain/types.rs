use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_auth_types::device::DeviceInfo;
use bazaar_domain::user::UserRole;

/// Single-use numeric code sent to a phone.
#[derive(Debug, Clone)]
pub struct VerificationCode {
    pub id: Uuid,
    /// Canonical `+380…` phone.
    pub phone: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Unused and not yet expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at > now
    }
}

/// Marketplace account as seen by the auth service.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub phone: Option<String>,
    pub phone_normalized: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub is_verified: bool,
    pub is_active: bool,
    pub is_blocked: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Active and not blocked.
    pub fn can_sign_in(&self) -> bool {
        self.is_active && !self.is_blocked
    }
}

/// User record returned to clients. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub is_verified: bool,
    pub is_active: bool,
    #[serde(serialize_with = "bazaar_core::serde::to_rfc3339_ms_opt")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "bazaar_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone_normalized.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            is_verified: user.is_verified,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Server-side record of an opaque refresh token.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub device: DeviceInfo,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

/// Binds one access-token string to the refresh token issued with it.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub last_activity_at: DateTime<Utc>,
    pub device: DeviceInfo,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Session details returned by access-token validation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub refresh_token_id: Uuid,
    #[serde(serialize_with = "bazaar_core::serde::to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
    #[serde(serialize_with = "bazaar_core::serde::to_rfc3339_ms")]
    pub last_activity_at: DateTime<Utc>,
    pub device_id: Option<String>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            refresh_token_id: session.refresh_token_id,
            expires_at: session.expires_at,
            last_activity_at: session.last_activity_at,
            device_id: session.device.device_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsStatus {
    Sent,
    Failed,
}

impl SmsStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Append-only audit entry for one SMS dispatch attempt.
#[derive(Debug, Clone)]
pub struct SmsLog {
    pub id: Uuid,
    pub phone: String,
    pub message: String,
    pub provider: String,
    pub status: SmsStatus,
    pub provider_message_id: Option<String>,
    pub cost: Option<f64>,
    pub error_message: Option<String>,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
}

/// Access + refresh token pair handed to the client after a login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    #[serde(serialize_with = "bazaar_core::serde::to_rfc3339_ms")]
    pub access_token_expires_at: DateTime<Utc>,
    #[serde(serialize_with = "bazaar_core::serde::to_rfc3339_ms")]
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Result of every login-shaped operation (OTP verify, refresh, admin login).
#[derive(Debug, Clone, Serialize)]
pub struct AuthOutcome {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// Row counts touched by a revocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RevocationSummary {
    pub refresh_tokens_revoked: u64,
    pub sessions_deactivated: u64,
}

/// Row counts removed by one cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub verification_codes: u64,
    pub sessions: u64,
    pub refresh_tokens: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.verification_codes + self.sessions + self.refresh_tokens
    }
}

/// What to do when the rate-limit counters cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitFailurePolicy {
    /// Treat the count as zero and let the request through.
    #[default]
    FailOpen,
    /// Surface the storage failure to the caller.
    FailClosed,
}

/// Language of the verification SMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsLocale {
    #[default]
    Uk,
    Ru,
}

impl SmsLocale {
    /// Text of the verification SMS carrying `code`.
    pub fn code_message(self, code: &str, minutes: i64) -> String {
        match self {
            Self::Uk => format!("Ваш код підтвердження: {code}. Код дійсний {minutes} хв."),
            Self::Ru => format!("Ваш код подтверждения: {code}. Код действителен {minutes} мин."),
        }
    }
}

impl fmt::Display for SmsLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uk => "uk",
            Self::Ru => "ru",
        })
    }
}

impl FromStr for SmsLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uk" | "ua" => Ok(Self::Uk),
            "ru" => Ok(Self::Ru),
            other => Err(format!("unsupported sms locale: {other}")),
        }
    }
}

/// Provider acknowledgement of a dispatched message.
#[derive(Debug, Clone, PartialEq)]
pub struct SmsDispatch {
    pub message_id: Option<String>,
    pub cost: Option<f64>,
    pub test_mode: bool,
}

/// Delivery state of a previously sent message, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsDeliveryStatus {
    pub message_id: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sent: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub rate: Option<f64>,
}
