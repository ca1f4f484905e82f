use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use bazaar_auth_types::device::DeviceInfo;
use bazaar_auth_types::token::{
    ACCESS_TOKEN_TYPE, AccessClaims, encode_access_token, validate_access_token,
};

use crate::config::TokenSettings;
use crate::domain::port::{Clock, SecretSource};
use crate::domain::repository::{TokenRepository, UserRepository};
use crate::domain::types::{
    AuthOutcome, RefreshToken, Session, SessionView, TokenPair, User, UserProfile,
};
use crate::error::AuthServiceError;

fn epoch_secs(t: DateTime<Utc>) -> u64 {
    u64::try_from(t.timestamp()).unwrap_or_default()
}

// ── Token pair issuance ──────────────────────────────────────────────────────

/// Mints access/refresh pairs and persists the session that binds them.
///
/// Shared by OTP verification, refresh and admin login so every login path
/// produces the same RefreshToken + Session shape.
#[derive(Clone)]
pub struct TokenIssuer {
    pub clock: Arc<dyn Clock>,
    pub secrets: Arc<dyn SecretSource>,
    pub settings: TokenSettings,
}

/// A signed pair plus the rows that must be persisted before it is handed out.
pub struct MintedPair {
    pub refresh_token: RefreshToken,
    pub session: Session,
    pub pair: TokenPair,
}

impl TokenIssuer {
    /// Mint and persist a new pair.
    pub async fn issue<T: TokenRepository>(
        &self,
        tokens: &T,
        user: &User,
        device: &DeviceInfo,
    ) -> Result<TokenPair, AuthServiceError> {
        let minted = self.mint(user, device)?;
        // Nothing is returned unless both rows exist; validation depends on the session.
        tokens
            .create_pair(&minted.refresh_token, &minted.session)
            .await?;
        Ok(minted.pair)
    }

    /// Sign an access token and build the refresh token and session rows without
    /// persisting them.
    pub fn mint(&self, user: &User, device: &DeviceInfo) -> Result<MintedPair, AuthServiceError> {
        let now = self.clock.now();
        let access_expires_at = now + self.settings.access_ttl();
        let refresh_expires_at = now + self.settings.refresh_ttl();

        let claims = AccessClaims {
            sub: user.id.to_string(),
            phone: user.phone_normalized.clone(),
            role: user.role.as_u8(),
            typ: ACCESS_TOKEN_TYPE.to_owned(),
            iat: epoch_secs(now),
            exp: epoch_secs(access_expires_at),
            jti: Uuid::new_v4().to_string(),
        };
        let access_token = encode_access_token(&claims, self.secrets.signing_key())
            .map_err(|e| AuthServiceError::Internal(e.into()))?;

        let refresh_token = RefreshToken {
            id: Uuid::new_v4(),
            token: self.secrets.refresh_token(),
            user_id: user.id,
            expires_at: refresh_expires_at,
            is_revoked: false,
            revoked_at: None,
            device: device.clone(),
            created_at: now,
        };
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            access_token: access_token.clone(),
            refresh_token_id: refresh_token.id,
            expires_at: access_expires_at,
            is_active: true,
            last_activity_at: now,
            device: device.clone(),
            created_at: now,
        };

        let pair = TokenPair {
            access_token,
            refresh_token: refresh_token.token.clone(),
            token_type: "Bearer",
            access_token_expires_at: access_expires_at,
            refresh_token_expires_at: refresh_expires_at,
        };
        Ok(MintedPair {
            refresh_token,
            session,
            pair,
        })
    }
}

// ── RefreshToken ─────────────────────────────────────────────────────────────

pub struct RefreshTokenInput {
    pub refresh_token: String,
    pub device: DeviceInfo,
}

pub struct RefreshTokenUseCase<U: UserRepository, T: TokenRepository> {
    pub users: U,
    pub tokens: T,
    pub issuer: TokenIssuer,
}

impl<U: UserRepository, T: TokenRepository> RefreshTokenUseCase<U, T> {
    pub async fn execute(&self, input: RefreshTokenInput) -> Result<AuthOutcome, AuthServiceError> {
        let now = self.issuer.clock.now();

        let current = self
            .tokens
            .find_refresh_token(&input.refresh_token)
            .await?
            .filter(|t| t.is_usable(now))
            .ok_or(AuthServiceError::InvalidRefreshToken)?;

        let user = self
            .users
            .find_by_id(current.user_id)
            .await?
            .ok_or(AuthServiceError::InvalidRefreshToken)?;
        if !user.can_sign_in() {
            return Err(AuthServiceError::AccountBlocked);
        }

        // Keep the device binding when the client did not resend its id.
        let device = DeviceInfo {
            device_id: input.device.device_id.clone().or(current.device.device_id),
            ..input.device
        };
        let minted = self.issuer.mint(&user, &device)?;

        // With rotation the revoke is the claim on this token: of two concurrent
        // refreshes only the one whose update matched a row may continue. A failed
        // exchange leaves the old token usable.
        let deactivated = self
            .tokens
            .exchange_pair(
                current.id,
                self.issuer.settings.rotation,
                &minted.refresh_token,
                &minted.session,
                now,
            )
            .await?
            .ok_or(AuthServiceError::InvalidRefreshToken)?;
        let tokens = minted.pair;

        tracing::info!(
            user_id = %user.id,
            rotated = self.issuer.settings.rotation,
            sessions_deactivated = deactivated,
            "refresh token exchanged"
        );

        Ok(AuthOutcome {
            user: UserProfile::from(&user),
            tokens,
        })
    }
}

// ── ValidateAccessToken ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub user: User,
    pub session: Session,
}

impl ValidatedSession {
    pub fn profile(&self) -> UserProfile {
        UserProfile::from(&self.user)
    }

    pub fn view(&self) -> SessionView {
        SessionView::from(&self.session)
    }
}

pub struct ValidateAccessTokenUseCase<U: UserRepository, T: TokenRepository> {
    pub users: U,
    pub tokens: T,
    pub clock: Arc<dyn Clock>,
    pub secrets: Arc<dyn SecretSource>,
}

impl<U: UserRepository, T: TokenRepository> ValidateAccessTokenUseCase<U, T> {
    pub async fn execute(&self, access_token: &str) -> Result<ValidatedSession, AuthServiceError> {
        let info = validate_access_token(access_token, self.secrets.signing_key())
            .map_err(|_| AuthServiceError::InvalidAccessToken)?;

        let now = self.clock.now();
        let mut session = self
            .tokens
            .find_session_by_access_token(access_token)
            .await?
            .filter(|s| s.is_live(now) && s.user_id == info.user_id)
            .ok_or(AuthServiceError::SessionExpiredOrRevoked)?;

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthServiceError::SessionExpiredOrRevoked)?;
        if user.is_blocked {
            return Err(AuthServiceError::AccountBlocked);
        }

        match self.tokens.touch_session(session.id, now).await {
            Ok(()) => session.last_activity_at = now,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "session activity touch failed"
                );
            }
        }

        Ok(ValidatedSession { user, session })
    }
}
