use chrono::{DateTime, Duration, Utc};

use bazaar_domain::phone::mask_phone;

use crate::config::OtpSettings;
use crate::domain::repository::VerificationCodeRepository;
use crate::domain::types::RateLimitFailurePolicy;
use crate::error::{AuthServiceError, RateLimitScope};

/// Counting window for both limits.
const WINDOW_HOURS: i64 = 1;

/// Sliding one-hour limit on code requests, per phone and per origin address.
pub struct RateLimiter<'a, C: VerificationCodeRepository> {
    pub codes: &'a C,
    pub settings: &'a OtpSettings,
}

impl<C: VerificationCodeRepository> RateLimiter<'_, C> {
    /// First limit breached, phone before origin, or `None`.
    pub async fn check(
        &self,
        phone: &str,
        origin: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<RateLimitScope>, AuthServiceError> {
        let since = now - Duration::hours(WINDOW_HOURS);

        let by_phone = self
            .tolerate(
                RateLimitScope::Phone,
                self.codes.count_recent_by_phone(phone, since).await,
            )?;
        if by_phone >= self.settings.max_per_phone_per_hour {
            tracing::info!(phone = %mask_phone(phone), count = by_phone, "phone rate limit hit");
            return Ok(Some(RateLimitScope::Phone));
        }

        let Some(origin) = origin else {
            return Ok(None);
        };
        let by_origin = self
            .tolerate(
                RateLimitScope::Origin,
                self.codes.count_recent_by_origin(origin, since).await,
            )?;
        if by_origin >= self.settings.max_per_origin_per_hour {
            tracing::info!(origin, count = by_origin, "origin rate limit hit");
            return Ok(Some(RateLimitScope::Origin));
        }

        Ok(None)
    }

    fn tolerate(
        &self,
        scope: RateLimitScope,
        count: Result<u64, AuthServiceError>,
    ) -> Result<u64, AuthServiceError> {
        match (count, self.settings.failure_policy) {
            (Ok(n), _) => Ok(n),
            (Err(e), RateLimitFailurePolicy::FailOpen) => {
                tracing::warn!(
                    scope = scope.as_str(),
                    error = %e,
                    "rate limit count failed, allowing request"
                );
                Ok(0)
            }
            (Err(e), RateLimitFailurePolicy::FailClosed) => Err(e),
        }
    }
}
