use std::sync::Arc;

use uuid::Uuid;

use crate::domain::port::Clock;
use crate::domain::repository::TokenRepository;
use crate::domain::types::{RevocationSummary, Session};
use crate::error::AuthServiceError;

/// Logout at three scopes: one session, one device, every device.
pub struct RevokeTokensUseCase<T: TokenRepository> {
    pub tokens: T,
    pub clock: Arc<dyn Clock>,
}

impl<T: TokenRepository> RevokeTokensUseCase<T> {
    /// Logout everywhere.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<RevocationSummary, AuthServiceError> {
        let summary = self
            .tokens
            .revoke_all_for_user(user_id, self.clock.now())
            .await?;
        tracing::info!(
            user_id = %user_id,
            refresh_tokens_revoked = summary.refresh_tokens_revoked,
            sessions_deactivated = summary.sessions_deactivated,
            "revoked all user tokens"
        );
        Ok(summary)
    }

    /// Logout from every session that descends from `device_id`'s refresh tokens.
    pub async fn revoke_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<RevocationSummary, AuthServiceError> {
        let summary = self
            .tokens
            .revoke_for_device(user_id, device_id, self.clock.now())
            .await?;
        tracing::info!(
            user_id = %user_id,
            device_id,
            refresh_tokens_revoked = summary.refresh_tokens_revoked,
            sessions_deactivated = summary.sessions_deactivated,
            "revoked device tokens"
        );
        Ok(summary)
    }

    /// Logout of the session behind a validated access token.
    pub async fn revoke_session(
        &self,
        session: &Session,
    ) -> Result<RevocationSummary, AuthServiceError> {
        let summary = self
            .tokens
            .revoke_chain(session.refresh_token_id, self.clock.now())
            .await?;
        tracing::info!(
            user_id = %session.user_id,
            session_id = %session.id,
            "session revoked"
        );
        Ok(summary)
    }
}
