#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{
    RefreshToken, RevocationSummary, Session, SmsLog, User, VerificationCode,
};
use crate::error::AuthServiceError;

/// Repository for one-time verification codes.
///
/// Every mutating method is a single predicate-guarded statement; the returned
/// flag or count tells the caller whether its predicate still held.
pub trait VerificationCodeRepository: Send + Sync {
    /// Codes for `phone` whose `expires_at >= since`.
    async fn count_recent_by_phone(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError>;

    /// Codes requested from `ip_address` whose `expires_at >= since`.
    async fn count_recent_by_origin(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError>;

    /// Mark every active code for `phone` as used. Returns the number invalidated.
    async fn invalidate_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError>;

    async fn create(&self, code: &VerificationCode) -> Result<(), AuthServiceError>;

    /// Newest unused, unexpired code for `phone`.
    async fn find_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AuthServiceError>;

    /// `attempts += 1` while the code is unused and under `max_attempts`.
    /// `false` means the code is exhausted or already consumed.
    async fn record_failed_attempt(
        &self,
        id: Uuid,
        max_attempts: i32,
    ) -> Result<bool, AuthServiceError>;

    /// Consume the code: `is_used = true, used_at = now, attempts += 1`, only if it is
    /// unused, unexpired and under `max_attempts`. `false` means another request won.
    async fn consume(
        &self,
        id: Uuid,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthServiceError>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError>;
}

/// Repository for user accounts.
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthServiceError>;

    /// Look up by canonical phone.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AuthServiceError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthServiceError>;

    async fn create(&self, user: &User) -> Result<(), AuthServiceError>;

    /// Successful OTP login: verified, active, `last_login_at = now`.
    async fn mark_verified_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError>;

    /// Successful password login: `last_login_at = now`.
    async fn record_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthServiceError>;
}

/// Repository for refresh tokens and the sessions bound to them.
pub trait TokenRepository: Send + Sync {
    /// Insert a refresh token and its session atomically (same transaction).
    async fn create_pair(
        &self,
        refresh_token: &RefreshToken,
        session: &Session,
    ) -> Result<(), AuthServiceError>;

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshToken>, AuthServiceError>;

    /// Replace `previous_id` with a new pair in one transaction: optionally revoke
    /// it, deactivate its sessions, then insert `refresh_token` and `session`.
    ///
    /// With `revoke_previous` the revoke only matches a token that is not revoked
    /// yet; if it matches nothing, nothing is written and `None` is returned.
    /// Otherwise returns the number of sessions deactivated.
    async fn exchange_pair(
        &self,
        previous_id: Uuid,
        revoke_previous: bool,
        refresh_token: &RefreshToken,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>, AuthServiceError>;

    async fn find_session_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<Session>, AuthServiceError>;

    /// Set `last_activity_at = now`. The only write on the validation path.
    async fn touch_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthServiceError>;

    /// Revoke every refresh token and deactivate every session of a user.
    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError>;

    /// Revoke the user's refresh tokens for `device_id` and the sessions that depend on them.
    async fn revoke_for_device(
        &self,
        user_id: Uuid,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError>;

    /// Revoke one refresh token and deactivate its sessions in one transaction.
    async fn revoke_chain(
        &self,
        refresh_token_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError>;

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError>;

    async fn delete_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError>;
}

/// Append-only SMS audit trail.
pub trait SmsLogRepository: Send + Sync {
    async fn append(&self, log: &SmsLog) -> Result<(), AuthServiceError>;
}
