use std::sync::Arc;

use uuid::Uuid;

use bazaar_auth_types::device::DeviceInfo;
use bazaar_domain::phone::validate_phone;
use bazaar_domain::user::UserRole;

use crate::domain::port::{Clock, PasswordHasher, SmsGateway};
use crate::domain::repository::{TokenRepository, UserRepository};
use crate::domain::types::{AuthOutcome, SmsDeliveryStatus, User, UserProfile};
use crate::error::AuthServiceError;
use crate::usecase::token::TokenIssuer;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ── AdminLogin ───────────────────────────────────────────────────────────────

pub struct AdminLoginInput {
    pub email: String,
    pub password: String,
    pub device: DeviceInfo,
}

pub struct AdminLoginUseCase<U: UserRepository, T: TokenRepository> {
    pub users: U,
    pub tokens: T,
    pub hasher: Arc<dyn PasswordHasher>,
    pub issuer: TokenIssuer,
}

impl<U: UserRepository, T: TokenRepository> AdminLoginUseCase<U, T> {
    pub async fn execute(&self, input: AdminLoginInput) -> Result<AuthOutcome, AuthServiceError> {
        let email = normalize_email(&input.email);

        // Unknown email and wrong password look the same to the caller.
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthServiceError::InvalidCredentials)?;
        if !user.role.is_admin() {
            return Err(AuthServiceError::AccessDenied);
        }
        if !user.can_sign_in() {
            return Err(AuthServiceError::AccountBlocked);
        }
        let hash = user
            .password_hash
            .clone()
            .ok_or(AuthServiceError::PasswordNotSet)?;
        // Argon2 is CPU bound; keep it off the async workers.
        let hasher = Arc::clone(&self.hasher);
        let password = input.password;
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthServiceError::Internal(e.into()))?;
        if !verified {
            tracing::info!(user_id = %user.id, "admin password mismatch");
            return Err(AuthServiceError::InvalidCredentials);
        }

        let now = self.issuer.clock.now();
        self.users.record_login(user.id, now).await?;
        user.last_login_at = Some(now);
        user.updated_at = now;

        let tokens = self.issuer.issue(&self.tokens, &user, &input.device).await?;
        tracing::info!(user_id = %user.id, "admin login");

        Ok(AuthOutcome {
            user: UserProfile::from(&user),
            tokens,
        })
    }
}

// ── CreateAdmin ──────────────────────────────────────────────────────────────

pub struct CreateAdminInput {
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub first_name: Option<String>,
}

/// Seeds a back-office account. Admins never self-register.
pub struct CreateAdminUseCase<U: UserRepository> {
    pub users: U,
    pub hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

impl<U: UserRepository> CreateAdminUseCase<U> {
    pub async fn execute(&self, input: CreateAdminInput) -> Result<UserProfile, AuthServiceError> {
        let email = normalize_email(&input.email);
        if email.is_empty() || input.password.is_empty() {
            return Err(AuthServiceError::InvalidCredentials);
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthServiceError::Internal(anyhow::anyhow!(
                "an account with this email already exists"
            )));
        }
        let phone = input
            .phone
            .as_deref()
            .map(validate_phone)
            .transpose()
            .map_err(|_| AuthServiceError::InvalidPhoneNumber)?;

        let now = self.clock.now();
        let user = User {
            id: Uuid::now_v7(),
            phone: phone.clone(),
            phone_normalized: phone,
            email: Some(email),
            password_hash: Some(self.hasher.hash(&input.password)?),
            first_name: input.first_name,
            last_name: None,
            role: UserRole::Admin,
            is_verified: true,
            is_active: true,
            is_blocked: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.create(&user).await?;
        tracing::info!(user_id = %user.id, "admin account created");
        Ok(UserProfile::from(&user))
    }
}

// ── SMS account queries ──────────────────────────────────────────────────────

/// Read-only provider queries for the back office.
pub struct SmsAccountUseCase<G: SmsGateway> {
    pub gateway: G,
}

impl<G: SmsGateway> SmsAccountUseCase<G> {
    pub async fn balance(&self) -> Result<f64, AuthServiceError> {
        self.gateway
            .balance()
            .await
            .map_err(AuthServiceError::SmsGatewayUnavailable)
    }

    pub async fn sender_ids(&self) -> Result<Vec<String>, AuthServiceError> {
        self.gateway
            .sender_ids()
            .await
            .map_err(AuthServiceError::SmsGatewayUnavailable)
    }

    pub async fn delivery_status(
        &self,
        message_id: &str,
    ) -> Result<SmsDeliveryStatus, AuthServiceError> {
        self.gateway
            .delivery_status(message_id)
            .await
            .map_err(AuthServiceError::SmsGatewayUnavailable)
    }
}
