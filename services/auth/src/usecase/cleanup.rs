use std::sync::Arc;
use std::time::Duration;

use crate::domain::port::Clock;
use crate::domain::repository::{TokenRepository, VerificationCodeRepository};
use crate::domain::types::CleanupReport;
use crate::error::AuthServiceError;

/// Deletes expired codes, sessions and refresh tokens. Only touches rows whose
/// `expires_at` is already in the past, so it needs no coordination with live traffic.
pub struct CleanupUseCase<C: VerificationCodeRepository, T: TokenRepository> {
    pub codes: C,
    pub tokens: T,
    pub clock: Arc<dyn Clock>,
}

impl<C: VerificationCodeRepository, T: TokenRepository> CleanupUseCase<C, T> {
    pub async fn execute(&self) -> Result<CleanupReport, AuthServiceError> {
        let now = self.clock.now();
        let verification_codes = self.codes.delete_expired(now).await?;
        // Sessions reference refresh tokens.
        let sessions = self.tokens.delete_expired_sessions(now).await?;
        let refresh_tokens = self.tokens.delete_expired_refresh_tokens(now).await?;

        let report = CleanupReport {
            verification_codes,
            sessions,
            refresh_tokens,
        };
        tracing::info!(
            verification_codes = report.verification_codes,
            sessions = report.sessions,
            refresh_tokens = report.refresh_tokens,
            "expired auth rows removed"
        );
        Ok(report)
    }

    /// Run forever, once per `every`. Failures are logged and retried next tick.
    pub async fn run_periodically(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.execute().await {
                tracing::warn!(error = %e, "cleanup run failed");
            }
        }
    }
}
