use std::sync::Arc;

use subtle::ConstantTimeEq;
use uuid::Uuid;

use bazaar_auth_types::device::DeviceInfo;
use bazaar_domain::phone::{mask_phone, normalize_phone};
use bazaar_domain::user::UserRole;

use crate::config::OtpSettings;
use crate::domain::port::Clock;
use crate::domain::repository::{TokenRepository, UserRepository, VerificationCodeRepository};
use crate::domain::types::{AuthOutcome, User, UserProfile};
use crate::error::AuthServiceError;
use crate::usecase::token::TokenIssuer;

pub struct VerifyCodeInput {
    pub phone: String,
    pub code: String,
    pub device: DeviceInfo,
    /// Required to register a phone that has no account yet.
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub struct VerifyCodeUseCase<C, U, T>
where
    C: VerificationCodeRepository,
    U: UserRepository,
    T: TokenRepository,
{
    pub codes: C,
    pub users: U,
    pub tokens: T,
    pub clock: Arc<dyn Clock>,
    pub issuer: TokenIssuer,
    pub settings: OtpSettings,
}

impl<C, U, T> VerifyCodeUseCase<C, U, T>
where
    C: VerificationCodeRepository,
    U: UserRepository,
    T: TokenRepository,
{
    pub async fn execute(&self, input: VerifyCodeInput) -> Result<AuthOutcome, AuthServiceError> {
        let phone = normalize_phone(&input.phone);
        let masked = mask_phone(&phone);
        let now = self.clock.now();

        // 1. The phone's active code; wrong guesses count against it.
        let code = self
            .codes
            .find_active(&phone, now)
            .await?
            .ok_or(AuthServiceError::InvalidOrExpiredCode)?;

        // 2. Exhausted codes stay disabled, even for the right value.
        if code.attempts >= self.settings.max_attempts {
            tracing::info!(phone = %masked, code_id = %code.id, "verification attempts exhausted");
            return Err(AuthServiceError::MaxAttemptsReached);
        }

        let matches: bool = code
            .code
            .as_bytes()
            .ct_eq(input.code.trim().as_bytes())
            .into();
        if !matches {
            // Concurrent wrong guesses can all pass the check above; the guarded
            // increment keeps `attempts` at or below the maximum.
            if !self
                .codes
                .record_failed_attempt(code.id, self.settings.max_attempts)
                .await?
            {
                tracing::info!(
                    phone = %masked,
                    code_id = %code.id,
                    "verification attempts exhausted"
                );
                return Err(AuthServiceError::MaxAttemptsReached);
            }
            tracing::info!(
                phone = %masked,
                attempt = code.attempts + 1,
                max = self.settings.max_attempts,
                "wrong verification code"
            );
            return Err(AuthServiceError::InvalidOrExpiredCode);
        }

        // 3. Conditional consume; a concurrent verifier may have won.
        if !self
            .codes
            .consume(code.id, self.settings.max_attempts, now)
            .await?
        {
            return Err(AuthServiceError::InvalidOrExpiredCode);
        }

        // 4. Upsert the account. The code stays consumed if this fails.
        let user = match self.users.find_by_phone(&phone).await? {
            Some(user) if user.is_blocked => {
                tracing::info!(user_id = %user.id, "blocked user attempted login");
                return Err(AuthServiceError::AccountBlocked);
            }
            Some(mut user) => {
                self.users.mark_verified_login(user.id, now).await?;
                user.is_verified = true;
                user.is_active = true;
                user.last_login_at = Some(now);
                user.updated_at = now;
                user
            }
            None => {
                let first_name = non_empty(input.first_name).ok_or(AuthServiceError::UserNotFound)?;
                let user = User {
                    id: Uuid::now_v7(),
                    phone: Some(input.phone.trim().to_owned()),
                    phone_normalized: Some(phone.clone()),
                    email: None,
                    password_hash: None,
                    first_name: Some(first_name),
                    last_name: non_empty(input.last_name),
                    role: UserRole::Client,
                    is_verified: true,
                    is_active: true,
                    is_blocked: false,
                    last_login_at: Some(now),
                    created_at: now,
                    updated_at: now,
                };
                self.users.create(&user).await?;
                tracing::info!(user_id = %user.id, phone = %masked, "user registered");
                user
            }
        };

        // 5. Token pair bound to the caller's device
        let tokens = self.issuer.issue(&self.tokens, &user, &input.device).await?;

        tracing::info!(
            user_id = %user.id,
            device_id = input.device.device_id.as_deref().unwrap_or("-"),
            "otp login"
        );

        Ok(AuthOutcome {
            user: UserProfile::from(&user),
            tokens,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
