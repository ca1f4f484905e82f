use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use bazaar_auth::config::{OtpSettings, SmsSettings, TokenSettings};
use bazaar_auth::domain::port::{Clock, PasswordHasher, SecretSource, SmsGateway};
use bazaar_auth::domain::repository::{
    SmsLogRepository, TokenRepository, UserRepository, VerificationCodeRepository,
};
use bazaar_auth::domain::types::{
    RefreshToken, RevocationSummary, Session, SmsDeliveryStatus, SmsDispatch, SmsLog, User,
    VerificationCode,
};
use bazaar_auth::error::{AuthServiceError, SmsGatewayError};
use bazaar_auth::usecase::admin::{AdminLoginUseCase, CreateAdminUseCase, SmsAccountUseCase};
use bazaar_auth::usecase::cleanup::CleanupUseCase;
use bazaar_auth::usecase::revoke::RevokeTokensUseCase;
use bazaar_auth::usecase::send_code::SendCodeUseCase;
use bazaar_auth::usecase::token::{
    RefreshTokenUseCase, TokenIssuer, ValidateAccessTokenUseCase,
};
use bazaar_auth::usecase::verify_code::VerifyCodeUseCase;
use bazaar_auth_types::device::DeviceInfo;
use bazaar_domain::user::UserRole;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";
pub const TEST_PHONE: &str = "+380501234567";
pub const TEST_CODE: &str = "4821";

fn injected(what: &str) -> AuthServiceError {
    AuthServiceError::DatabaseUnavailable(anyhow::anyhow!("injected {what} failure"))
}

// ── MemoryStore ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Tables {
    pub codes: Vec<VerificationCode>,
    pub users: Vec<User>,
    pub refresh_tokens: Vec<RefreshToken>,
    pub sessions: Vec<Session>,
    pub sms_logs: Vec<SmsLog>,
}

#[derive(Default)]
pub struct Faults {
    pub counts: AtomicBool,
    pub code_create: AtomicBool,
    pub sms_log: AtomicBool,
    pub token_insert: AtomicBool,
}

/// In-memory implementation of every repository port.
///
/// Mutations apply the same predicates as the SQL adapter so racing callers see
/// the same winner/loser outcomes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    pub faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn with_users(users: Vec<User>) -> Self {
        let store = Self::default();
        store.tables().users = users;
        store
    }

    pub fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn fail_counts(&self) {
        self.faults.counts.store(true, Ordering::SeqCst);
    }

    pub fn fail_code_create(&self) {
        self.faults.code_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_sms_log(&self) {
        self.faults.sms_log.store(true, Ordering::SeqCst);
    }

    pub fn fail_token_insert(&self, fail: bool) {
        self.faults.token_insert.store(fail, Ordering::SeqCst);
    }

    fn faulty(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

impl VerificationCodeRepository for MemoryStore {
    async fn count_recent_by_phone(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        if Self::faulty(&self.faults.counts) {
            return Err(injected("count"));
        }
        let tables = self.tables();
        Ok(tables
            .codes
            .iter()
            .filter(|c| c.phone == phone && c.expires_at >= since)
            .count() as u64)
    }

    async fn count_recent_by_origin(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        if Self::faulty(&self.faults.counts) {
            return Err(injected("count"));
        }
        let tables = self.tables();
        Ok(tables
            .codes
            .iter()
            .filter(|c| c.ip_address.as_deref() == Some(ip_address) && c.expires_at >= since)
            .count() as u64)
    }

    async fn invalidate_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        let mut tables = self.tables();
        let mut n = 0;
        for code in tables
            .codes
            .iter_mut()
            .filter(|c| c.phone == phone && c.is_active(now))
        {
            code.is_used = true;
            code.used_at = Some(now);
            n += 1;
        }
        Ok(n)
    }

    async fn create(&self, code: &VerificationCode) -> Result<(), AuthServiceError> {
        if Self::faulty(&self.faults.code_create) {
            return Err(injected("insert"));
        }
        self.tables().codes.push(code.clone());
        Ok(())
    }

    async fn find_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AuthServiceError> {
        let found = self
            .tables()
            .codes
            .iter()
            .filter(|c| c.phone == phone && c.is_active(now))
            .max_by_key(|c| c.created_at)
            .cloned();
        // Lets concurrent callers interleave between read and conditional write.
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        max_attempts: i32,
    ) -> Result<bool, AuthServiceError> {
        let mut tables = self.tables();
        match tables
            .codes
            .iter_mut()
            .find(|c| c.id == id && !c.is_used && c.attempts < max_attempts)
        {
            Some(code) => {
                code.attempts += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn consume(
        &self,
        id: Uuid,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthServiceError> {
        let mut tables = self.tables();
        match tables
            .codes
            .iter_mut()
            .find(|c| c.id == id && c.is_active(now) && c.attempts < max_attempts)
        {
            Some(code) => {
                code.is_used = true;
                code.used_at = Some(now);
                code.attempts += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError> {
        let mut tables = self.tables();
        let before = tables.codes.len();
        tables.codes.retain(|c| c.expires_at >= now);
        Ok((before - tables.codes.len()) as u64)
    }
}

impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthServiceError> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AuthServiceError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.phone_normalized.as_deref() == Some(phone))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthServiceError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<(), AuthServiceError> {
        self.tables().users.push(user.clone());
        Ok(())
    }

    async fn mark_verified_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        if let Some(user) = self.tables().users.iter_mut().find(|u| u.id == id) {
            user.is_verified = true;
            user.is_active = true;
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn record_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthServiceError> {
        if let Some(user) = self.tables().users.iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }
}

fn revoke_tokens<'a>(
    tokens: impl Iterator<Item = &'a mut RefreshToken>,
    now: DateTime<Utc>,
) -> Vec<Uuid> {
    tokens
        .filter(|t| !t.is_revoked)
        .map(|t| {
            t.is_revoked = true;
            t.revoked_at = Some(now);
            t.id
        })
        .collect()
}

fn deactivate<'a>(sessions: impl Iterator<Item = &'a mut Session>) -> u64 {
    sessions
        .filter(|s| s.is_active)
        .map(|s| s.is_active = false)
        .count() as u64
}

impl TokenRepository for MemoryStore {
    async fn create_pair(
        &self,
        refresh_token: &RefreshToken,
        session: &Session,
    ) -> Result<(), AuthServiceError> {
        if Self::faulty(&self.faults.token_insert) {
            return Err(injected("token pair"));
        }
        let mut tables = self.tables();
        tables.refresh_tokens.push(refresh_token.clone());
        tables.sessions.push(session.clone());
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshToken>, AuthServiceError> {
        let found = self
            .tables()
            .refresh_tokens
            .iter()
            .find(|t| t.token == token)
            .cloned();
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn exchange_pair(
        &self,
        previous_id: Uuid,
        revoke_previous: bool,
        refresh_token: &RefreshToken,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>, AuthServiceError> {
        // The whole exchange runs under one lock, so a failure leaves no partial write.
        let mut tables = self.tables();
        if revoke_previous
            && !tables
                .refresh_tokens
                .iter()
                .any(|t| t.id == previous_id && !t.is_revoked)
        {
            return Ok(None);
        }
        if Self::faulty(&self.faults.token_insert) {
            return Err(injected("token pair"));
        }
        if revoke_previous {
            revoke_tokens(
                tables.refresh_tokens.iter_mut().filter(|t| t.id == previous_id),
                now,
            );
        }
        let deactivated = deactivate(
            tables
                .sessions
                .iter_mut()
                .filter(|s| s.refresh_token_id == previous_id),
        );
        tables.refresh_tokens.push(refresh_token.clone());
        tables.sessions.push(session.clone());
        Ok(Some(deactivated))
    }

    async fn find_session_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<Session>, AuthServiceError> {
        Ok(self
            .tables()
            .sessions
            .iter()
            .find(|s| s.access_token == access_token)
            .cloned())
    }

    async fn touch_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthServiceError> {
        if let Some(session) = self.tables().sessions.iter_mut().find(|s| s.id == id) {
            session.last_activity_at = now;
        }
        Ok(())
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError> {
        let mut tables = self.tables();
        let revoked = revoke_tokens(
            tables.refresh_tokens.iter_mut().filter(|t| t.user_id == user_id),
            now,
        );
        let sessions = deactivate(tables.sessions.iter_mut().filter(|s| s.user_id == user_id));
        Ok(RevocationSummary {
            refresh_tokens_revoked: revoked.len() as u64,
            sessions_deactivated: sessions,
        })
    }

    async fn revoke_for_device(
        &self,
        user_id: Uuid,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError> {
        let mut tables = self.tables();
        let device_tokens: Vec<Uuid> = tables
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.device.device_id.as_deref() == Some(device_id))
            .map(|t| t.id)
            .collect();
        let sessions = deactivate(
            tables
                .sessions
                .iter_mut()
                .filter(|s| device_tokens.contains(&s.refresh_token_id)),
        );
        let revoked = revoke_tokens(
            tables
                .refresh_tokens
                .iter_mut()
                .filter(|t| device_tokens.contains(&t.id)),
            now,
        );
        Ok(RevocationSummary {
            refresh_tokens_revoked: revoked.len() as u64,
            sessions_deactivated: sessions,
        })
    }

    async fn revoke_chain(
        &self,
        refresh_token_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError> {
        let mut tables = self.tables();
        let revoked = revoke_tokens(
            tables
                .refresh_tokens
                .iter_mut()
                .filter(|t| t.id == refresh_token_id),
            now,
        );
        let sessions = deactivate(
            tables
                .sessions
                .iter_mut()
                .filter(|s| s.refresh_token_id == refresh_token_id),
        );
        Ok(RevocationSummary {
            refresh_tokens_revoked: revoked.len() as u64,
            sessions_deactivated: sessions,
        })
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError> {
        let mut tables = self.tables();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.expires_at >= now);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        let mut tables = self.tables();
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|t| t.expires_at >= now);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}

impl SmsLogRepository for MemoryStore {
    async fn append(&self, log: &SmsLog) -> Result<(), AuthServiceError> {
        if Self::faulty(&self.faults.sms_log) {
            return Err(injected("sms log"));
        }
        self.tables().sms_logs.push(log.clone());
        Ok(())
    }
}

// ── MockSmsGateway ───────────────────────────────────────────────────────────

/// Scripted SMS provider that records every message it is asked to send.
pub struct MockSmsGateway {
    pub test_mode: bool,
    pub sent: Mutex<Vec<(String, String)>>,
    /// `None` makes the balance query fail.
    pub balance: Mutex<Option<f64>>,
    pub fail_send: AtomicBool,
}

impl MockSmsGateway {
    pub fn new() -> Self {
        Self {
            test_mode: false,
            sent: Mutex::new(vec![]),
            balance: Mutex::new(Some(100.0)),
            fail_send: AtomicBool::new(false),
        }
    }

    pub fn set_balance(&self, balance: Option<f64>) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl SmsGateway for MockSmsGateway {
    fn provider(&self) -> &str {
        "mock"
    }

    fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    async fn send(&self, phone: &str, text: &str) -> Result<SmsDispatch, SmsGatewayError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(SmsGatewayError::Provider {
                code: 204,
                status: "INVALID_SENDER".to_owned(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((phone.to_owned(), text.to_owned()));
        Ok(SmsDispatch {
            message_id: Some(format!("msg-{}", sent.len())),
            cost: Some(0.79),
            test_mode: self.test_mode,
        })
    }

    async fn balance(&self) -> Result<f64, SmsGatewayError> {
        (*self.balance.lock().unwrap()).ok_or(SmsGatewayError::Timeout)
    }

    async fn delivery_status(
        &self,
        message_id: &str,
    ) -> Result<SmsDeliveryStatus, SmsGatewayError> {
        if message_id == "unknown" {
            return Err(SmsGatewayError::Provider {
                code: 404,
                status: "MESSAGE_NOT_FOUND".to_owned(),
            });
        }
        Ok(SmsDeliveryStatus {
            message_id: message_id.to_owned(),
            recipient: Some("380501234567".to_owned()),
            status: Some("Delivered".to_owned()),
            sent: None,
            updated: None,
            rate: Some(0.79),
        })
    }

    async fn sender_ids(&self) -> Result<Vec<String>, SmsGatewayError> {
        Ok(vec!["Bazaar".to_owned()])
    }
}

// ── Clock / secrets / hasher ─────────────────────────────────────────────────

/// Manually advanced clock. Starts at the real current time so issued JWTs
/// still validate against the system clock.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now().trunc_subsecs(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Deterministic OTP codes and counter-based refresh tokens.
pub struct FixedSecrets {
    pub code: Mutex<String>,
    counter: AtomicU64,
}

impl FixedSecrets {
    pub fn new() -> Self {
        Self {
            code: Mutex::new(TEST_CODE.to_owned()),
            counter: AtomicU64::new(0),
        }
    }
}

impl SecretSource for FixedSecrets {
    fn signing_key(&self) -> &str {
        TEST_JWT_SECRET
    }

    fn otp_code(&self, len: usize) -> String {
        let code = self.code.lock().unwrap();
        format!("{code:0>len$}").chars().take(len).collect()
    }

    fn refresh_token(&self) -> String {
        format!("refresh-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Reversible stand-in for argon2 so tests stay fast.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, AuthServiceError> {
        Ok(format!("plain${password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("plain$") == Some(password)
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn test_user(phone: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::now_v7(),
        phone: Some(phone.to_owned()),
        phone_normalized: Some(phone.to_owned()),
        email: None,
        password_hash: None,
        first_name: Some("Olena".to_owned()),
        last_name: Some("Kovalenko".to_owned()),
        role: UserRole::Client,
        is_verified: true,
        is_active: true,
        is_blocked: false,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn admin_user(email: &str, password: &str) -> User {
    User {
        email: Some(email.to_owned()),
        password_hash: Some(format!("plain${password}")),
        role: UserRole::Admin,
        phone: None,
        phone_normalized: None,
        ..test_user(TEST_PHONE)
    }
}

pub fn device(device_id: &str) -> DeviceInfo {
    DeviceInfo {
        ip_address: Some("203.0.113.7".to_owned()),
        user_agent: Some("BazaarApp/2.3".to_owned()),
        device_id: Some(device_id.to_owned()),
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

/// Wires every use case to one shared store, gateway, clock and secret source.
pub struct Harness {
    pub store: MemoryStore,
    pub gateway: Arc<MockSmsGateway>,
    pub clock: Arc<FixedClock>,
    pub secrets: Arc<FixedSecrets>,
    pub otp: OtpSettings,
    pub tokens: TokenSettings,
    pub sms: SmsSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::default())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            store,
            gateway: Arc::new(MockSmsGateway::new()),
            clock: Arc::new(FixedClock::new()),
            secrets: Arc::new(FixedSecrets::new()),
            otp: OtpSettings::default(),
            tokens: TokenSettings::default(),
            sms: SmsSettings::default(),
        }
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer {
            clock: self.clock(),
            secrets: self.secrets.clone(),
            settings: self.tokens.clone(),
        }
    }

    pub fn send_code(
        &self,
    ) -> SendCodeUseCase<MemoryStore, MemoryStore, MemoryStore, Arc<MockSmsGateway>> {
        SendCodeUseCase {
            codes: self.store.clone(),
            users: self.store.clone(),
            sms_logs: self.store.clone(),
            gateway: Arc::clone(&self.gateway),
            clock: self.clock(),
            secrets: self.secrets.clone(),
            otp: self.otp.clone(),
            sms: self.sms.clone(),
        }
    }

    pub fn verify_code(&self) -> VerifyCodeUseCase<MemoryStore, MemoryStore, MemoryStore> {
        VerifyCodeUseCase {
            codes: self.store.clone(),
            users: self.store.clone(),
            tokens: self.store.clone(),
            clock: self.clock(),
            issuer: self.issuer(),
            settings: self.otp.clone(),
        }
    }

    pub fn refresh(&self) -> RefreshTokenUseCase<MemoryStore, MemoryStore> {
        RefreshTokenUseCase {
            users: self.store.clone(),
            tokens: self.store.clone(),
            issuer: self.issuer(),
        }
    }

    pub fn validate(&self) -> ValidateAccessTokenUseCase<MemoryStore, MemoryStore> {
        ValidateAccessTokenUseCase {
            users: self.store.clone(),
            tokens: self.store.clone(),
            clock: self.clock(),
            secrets: self.secrets.clone(),
        }
    }

    pub fn revoke(&self) -> RevokeTokensUseCase<MemoryStore> {
        RevokeTokensUseCase {
            tokens: self.store.clone(),
            clock: self.clock(),
        }
    }

    pub fn admin_login(&self) -> AdminLoginUseCase<MemoryStore, MemoryStore> {
        AdminLoginUseCase {
            users: self.store.clone(),
            tokens: self.store.clone(),
            hasher: Arc::new(PlainHasher),
            issuer: self.issuer(),
        }
    }

    pub fn create_admin(&self) -> CreateAdminUseCase<MemoryStore> {
        CreateAdminUseCase {
            users: self.store.clone(),
            hasher: Arc::new(PlainHasher),
            clock: self.clock(),
        }
    }

    pub fn sms_account(&self) -> SmsAccountUseCase<Arc<MockSmsGateway>> {
        SmsAccountUseCase {
            gateway: Arc::clone(&self.gateway),
        }
    }

    pub fn cleanup(&self) -> CleanupUseCase<MemoryStore, MemoryStore> {
        CleanupUseCase {
            codes: self.store.clone(),
            tokens: self.store.clone(),
            clock: self.clock(),
        }
    }
}
