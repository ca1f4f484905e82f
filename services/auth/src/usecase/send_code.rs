use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use bazaar_domain::phone::{mask_phone, validate_phone};

use crate::config::{OtpSettings, SmsSettings};
use crate::domain::port::{Clock, SecretSource, SmsGateway};
use crate::domain::repository::{SmsLogRepository, UserRepository, VerificationCodeRepository};
use crate::domain::types::{SmsDispatch, SmsLocale, SmsLog, SmsStatus, VerificationCode};
use crate::error::AuthServiceError;
use crate::usecase::rate_limit::RateLimiter;

pub struct SendCodeInput {
    /// Phone as typed by the user.
    pub phone: String,
    /// Caller address used for the origin rate limit.
    pub origin: Option<String>,
    /// Overrides the configured SMS locale.
    pub locale: Option<SmsLocale>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendCodeOutput {
    /// Canonical phone the code was sent to.
    pub phone: String,
    #[serde(serialize_with = "bazaar_core::serde::to_rfc3339_ms")]
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Existing account for this phone, if any.
    pub user_id: Option<Uuid>,
}

pub struct SendCodeUseCase<C, U, L, G>
where
    C: VerificationCodeRepository,
    U: UserRepository,
    L: SmsLogRepository,
    G: SmsGateway,
{
    pub codes: C,
    pub users: U,
    pub sms_logs: L,
    pub gateway: G,
    pub clock: Arc<dyn Clock>,
    pub secrets: Arc<dyn SecretSource>,
    pub otp: OtpSettings,
    pub sms: SmsSettings,
}

impl<C, U, L, G> SendCodeUseCase<C, U, L, G>
where
    C: VerificationCodeRepository,
    U: UserRepository,
    L: SmsLogRepository,
    G: SmsGateway,
{
    pub async fn execute(&self, input: SendCodeInput) -> Result<SendCodeOutput, AuthServiceError> {
        let phone = validate_phone(&input.phone).map_err(|e| {
            tracing::info!(reason = %e, "rejected phone number");
            AuthServiceError::InvalidPhoneNumber
        })?;
        let masked = mask_phone(&phone);
        let now = self.clock.now();

        // 1. Rate limit gate
        let limiter = RateLimiter {
            codes: &self.codes,
            settings: &self.otp,
        };
        if let Some(scope) = limiter.check(&phone, input.origin.as_deref(), now).await? {
            return Err(AuthServiceError::RateLimitExceeded(scope));
        }

        // 2. Invalidate earlier codes, best effort
        match self.codes.invalidate_active(&phone, now).await {
            Ok(0) => {}
            Ok(n) => {
                tracing::debug!(phone = %masked, invalidated = n, "previous codes invalidated")
            }
            Err(e) => {
                tracing::warn!(phone = %masked, error = %e, "failed to invalidate previous codes");
            }
        }

        // 3-4. Generate and persist the new code
        let code = VerificationCode {
            id: Uuid::new_v4(),
            phone: phone.clone(),
            code: self.secrets.otp_code(self.otp.code_length),
            expires_at: now + self.otp.expiry(),
            is_used: false,
            used_at: None,
            attempts: 0,
            ip_address: input.origin.clone(),
            created_at: now,
        };
        self.codes.create(&code).await?;

        // 5. Dispatch
        let text = input
            .locale
            .unwrap_or(self.sms.locale)
            .code_message(&code.code, self.otp.expiry_minutes);
        let outcome = self.dispatch(&phone, &text).await;

        // 6. Audit trail, whatever the outcome
        self.write_log(&phone, text, &outcome, now).await;

        // 7. Result
        if let Err(reason) = outcome {
            tracing::warn!(phone = %masked, reason = %reason, "verification sms not delivered");
            return Err(AuthServiceError::SmsDeliveryFailed);
        }

        let user_id = match self.users.find_by_phone(&phone).await {
            Ok(user) => user.map(|u| u.id),
            Err(e) => {
                tracing::warn!(phone = %masked, error = %e, "existing user lookup failed");
                None
            }
        };

        tracing::info!(phone = %masked, code_id = %code.id, "verification code sent");
        Ok(SendCodeOutput {
            phone,
            expires_at: code.expires_at,
            user_id,
        })
    }

    /// Balance check then send. `Err` carries the message stored in the SMS log.
    async fn dispatch(&self, phone: &str, text: &str) -> Result<SmsDispatch, String> {
        if !self.gateway.is_test_mode() {
            match self.gateway.balance().await {
                Ok(balance) if balance < self.sms.balance_floor => {
                    tracing::error!(
                        balance,
                        floor = self.sms.balance_floor,
                        "sms balance below floor"
                    );
                    return Err("balance below floor".to_owned());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "sms balance check failed, sending anyway");
                }
            }
        }
        self.gateway.send(phone, text).await.map_err(|e| e.to_string())
    }

    async fn write_log(
        &self,
        phone: &str,
        message: String,
        outcome: &Result<SmsDispatch, String>,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        let log = match outcome {
            Ok(dispatch) => SmsLog {
                id: Uuid::new_v4(),
                phone: phone.to_owned(),
                message,
                provider: self.gateway.provider().to_owned(),
                status: SmsStatus::Sent,
                provider_message_id: dispatch.message_id.clone(),
                cost: dispatch.cost,
                error_message: None,
                test_mode: dispatch.test_mode,
                created_at: now,
            },
            Err(reason) => SmsLog {
                id: Uuid::new_v4(),
                phone: phone.to_owned(),
                message,
                provider: self.gateway.provider().to_owned(),
                status: SmsStatus::Failed,
                provider_message_id: None,
                cost: None,
                error_message: Some(reason.clone()),
                test_mode: self.gateway.is_test_mode(),
                created_at: now,
            },
        };
        if let Err(e) = self.sms_logs.append(&log).await {
            tracing::error!(phone = %mask_phone(phone), error = %e, "failed to write sms log");
        }
    }
}
