use std::str::FromStr;

use chrono::Duration;

use bazaar_core::tracing::LogFormat;

use crate::domain::types::{RateLimitFailurePolicy, SmsLocale};

/// Verification-code issuance and checking rules.
#[derive(Debug, Clone)]
pub struct OtpSettings {
    /// Digits per code. Env var: `OTP_CODE_LENGTH`.
    pub code_length: usize,
    /// Code lifetime. Env var: `OTP_CODE_EXPIRY_MINUTES`.
    pub expiry_minutes: i64,
    /// Attempts before a code is disabled. Env var: `OTP_MAX_ATTEMPTS`.
    pub max_attempts: i32,
    /// Env var: `SMS_MAX_PER_PHONE_PER_HOUR`.
    pub max_per_phone_per_hour: u64,
    /// Env var: `SMS_MAX_PER_IP_PER_HOUR`.
    pub max_per_origin_per_hour: u64,
    /// Env var: `RATE_LIMIT_FAIL_OPEN`.
    pub failure_policy: RateLimitFailurePolicy,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            code_length: 4,
            expiry_minutes: 5,
            max_attempts: 3,
            max_per_phone_per_hour: 3,
            max_per_origin_per_hour: 10,
            failure_policy: RateLimitFailurePolicy::FailOpen,
        }
    }
}

impl OtpSettings {
    pub fn expiry(&self) -> Duration {
        Duration::minutes(self.expiry_minutes)
    }
}

/// Token lifetimes and refresh semantics.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// Env var: `ACCESS_TOKEN_TTL_MINUTES`. Also the session lifetime.
    pub access_ttl_minutes: i64,
    /// Env var: `REFRESH_TOKEN_TTL_DAYS`.
    pub refresh_ttl_days: i64,
    /// One-time-use refresh tokens. Env var: `REFRESH_TOKEN_ROTATION`.
    pub rotation: bool,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl_minutes: 15,
            refresh_ttl_days: 30,
            rotation: true,
        }
    }
}

impl TokenSettings {
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_ttl_minutes)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_ttl_days)
    }
}

/// SMS provider connection and sending rules.
#[derive(Debug, Clone)]
pub struct SmsSettings {
    /// Env var: `SMS_BASE_URL`.
    pub base_url: String,
    /// Env var: `SMS_API_TOKEN`.
    pub api_token: String,
    /// Env var: `SMS_SENDER_ID`.
    pub sender_id: String,
    /// Env var: `SMS_PROVIDER`.
    pub provider: String,
    /// Env var: `SMS_TEST_MODE`.
    pub test_mode: bool,
    /// Minimum provider balance before a send is attempted. Env var: `SMS_BALANCE_FLOOR`.
    pub balance_floor: f64,
    /// Env var: `SMS_LOCALE`.
    pub locale: SmsLocale,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.turbosms.ua".to_owned(),
            api_token: String::new(),
            sender_id: "Bazaar".to_owned(),
            provider: "turbosms".to_owned(),
            test_mode: false,
            balance_floor: 0.0,
            locale: SmsLocale::Uk,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("refresh token lifetime must be longer than access token lifetime")]
    RefreshNotLongerThanAccess,
}

/// Auth service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// HMAC secret for signing access tokens.
    pub jwt_secret: String,
    /// TCP port to listen on (default 3112). Env var: `AUTH_PORT`.
    pub auth_port: u16,
    pub otp: OtpSettings,
    pub tokens: TokenSettings,
    pub sms: SmsSettings,
    /// Seconds between cleanup runs, 0 disables. Env var: `CLEANUP_INTERVAL_SECS`.
    pub cleanup_interval_secs: u64,
    /// Env var: `LOG_FORMAT`.
    pub log_format: LogFormat,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
            .expect("invalid auth configuration")
    }

    /// Build from an arbitrary variable source. Unparseable optional values fall
    /// back to their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let flag = |name: &str| get(name).and_then(|v| parse_bool(&v));
        let parsed = Parsed(&get);

        let otp_defaults = OtpSettings::default();
        let otp = OtpSettings {
            code_length: parsed
                .get("OTP_CODE_LENGTH")
                .filter(|n: &usize| (4..=8).contains(n))
                .unwrap_or(otp_defaults.code_length),
            expiry_minutes: parsed
                .get("OTP_CODE_EXPIRY_MINUTES")
                .filter(|n: &i64| *n > 0)
                .unwrap_or(otp_defaults.expiry_minutes),
            max_attempts: parsed
                .get("OTP_MAX_ATTEMPTS")
                .filter(|n: &i32| *n > 0)
                .unwrap_or(otp_defaults.max_attempts),
            max_per_phone_per_hour: parsed
                .get("SMS_MAX_PER_PHONE_PER_HOUR")
                .unwrap_or(otp_defaults.max_per_phone_per_hour),
            max_per_origin_per_hour: parsed
                .get("SMS_MAX_PER_IP_PER_HOUR")
                .unwrap_or(otp_defaults.max_per_origin_per_hour),
            failure_policy: match flag("RATE_LIMIT_FAIL_OPEN") {
                Some(false) => RateLimitFailurePolicy::FailClosed,
                _ => RateLimitFailurePolicy::FailOpen,
            },
        };

        let token_defaults = TokenSettings::default();
        let tokens = TokenSettings {
            access_ttl_minutes: parsed
                .get("ACCESS_TOKEN_TTL_MINUTES")
                .filter(|n: &i64| *n > 0)
                .unwrap_or(token_defaults.access_ttl_minutes),
            refresh_ttl_days: parsed
                .get("REFRESH_TOKEN_TTL_DAYS")
                .filter(|n: &i64| *n > 0)
                .unwrap_or(token_defaults.refresh_ttl_days),
            rotation: flag("REFRESH_TOKEN_ROTATION")
                .unwrap_or(token_defaults.rotation),
        };
        if tokens.refresh_ttl() <= tokens.access_ttl() {
            return Err(ConfigError::RefreshNotLongerThanAccess);
        }

        let sms_defaults = SmsSettings::default();
        let sms = SmsSettings {
            base_url: get("SMS_BASE_URL").unwrap_or(sms_defaults.base_url),
            api_token: get("SMS_API_TOKEN").unwrap_or(sms_defaults.api_token),
            sender_id: get("SMS_SENDER_ID").unwrap_or(sms_defaults.sender_id),
            provider: get("SMS_PROVIDER").unwrap_or(sms_defaults.provider),
            test_mode: flag("SMS_TEST_MODE").unwrap_or(sms_defaults.test_mode),
            balance_floor: parsed
                .get("SMS_BALANCE_FLOOR")
                .unwrap_or(sms_defaults.balance_floor),
            locale: parsed.get("SMS_LOCALE").unwrap_or(sms_defaults.locale),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            auth_port: parsed.get("AUTH_PORT").unwrap_or(3112),
            otp,
            tokens,
            sms,
            cleanup_interval_secs: parsed.get("CLEANUP_INTERVAL_SECS").unwrap_or(3600),
            log_format: parsed.get("LOG_FORMAT").unwrap_or_default(),
        })
    }
}

/// Typed view over the variable source; unparseable values read as absent.
struct Parsed<'a, F>(&'a F);

impl<F> Parsed<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get<T: FromStr>(&self, name: &str) -> Option<T> {
        (self.0)(name).and_then(|v| v.trim().parse().ok())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
