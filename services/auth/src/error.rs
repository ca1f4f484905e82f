use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Which rate limit a rejected code request hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    Phone,
    Origin,
}

impl RateLimitScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Origin => "origin",
        }
    }
}

/// Failures reported by the SMS provider adapter.
#[derive(Debug, thiserror::Error)]
pub enum SmsGatewayError {
    #[error("sms provider timed out")]
    Timeout,
    #[error("sms provider unreachable: {0}")]
    Transport(String),
    #[error("sms provider rejected request: {code} {status}")]
    Provider { code: i64, status: String },
    #[error("unexpected sms provider response: {0}")]
    Decode(String),
    #[error("insufficient sms balance")]
    InsufficientBalance,
}

/// Auth service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("invalid phone number")]
    InvalidPhoneNumber,
    #[error("too many code requests for this {}", .0.as_str())]
    RateLimitExceeded(RateLimitScope),
    #[error("invalid or expired code")]
    InvalidOrExpiredCode,
    #[error("maximum verification attempts reached")]
    MaxAttemptsReached,
    #[error("user not found")]
    UserNotFound,
    #[error("sms delivery failed")]
    SmsDeliveryFailed,
    #[error("sms gateway unavailable")]
    SmsGatewayUnavailable(#[source] SmsGatewayError),
    #[error("database unavailable")]
    DatabaseUnavailable(#[source] anyhow::Error),
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("session expired or revoked")]
    SessionExpiredOrRevoked,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("account blocked")]
    AccountBlocked,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("access denied")]
    AccessDenied,
    #[error("password not set")]
    PasswordNotSet,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPhoneNumber => "INVALID_PHONE_NUMBER",
            Self::RateLimitExceeded(_) => "RATE_LIMIT_EXCEEDED",
            Self::InvalidOrExpiredCode => "INVALID_OR_EXPIRED_CODE",
            Self::MaxAttemptsReached => "MAX_ATTEMPTS_REACHED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::SmsDeliveryFailed => "SMS_DELIVERY_FAILED",
            Self::SmsGatewayUnavailable(_) => "SMS_GATEWAY_UNAVAILABLE",
            Self::DatabaseUnavailable(_) => "DATABASE_UNAVAILABLE",
            Self::InvalidAccessToken => "INVALID_ACCESS_TOKEN",
            Self::SessionExpiredOrRevoked => "SESSION_EXPIRED_OR_REVOKED",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::AccountBlocked => "ACCOUNT_BLOCKED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::PasswordNotSet => "PASSWORD_NOT_SET",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPhoneNumber => StatusCode::BAD_REQUEST,
            Self::InvalidOrExpiredCode
            | Self::InvalidAccessToken
            | Self::SessionExpiredOrRevoked
            | Self::InvalidRefreshToken
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AccountBlocked
            | Self::AccessDenied
            | Self::PasswordNotSet
            | Self::MaxAttemptsReached => StatusCode::FORBIDDEN,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::SmsDeliveryFailed | Self::SmsGatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // TraceLayer already records every request; only server-side faults carry
        // a cause chain worth logging here.
        match &self {
            Self::DatabaseUnavailable(e) | Self::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), kind = self.kind(), "request failed");
            }
            Self::SmsGatewayUnavailable(e) => {
                tracing::error!(error = %e, kind = self.kind(), "request failed");
            }
            _ => {}
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::RateLimitExceeded(scope) = &self {
            body["scope"] = serde_json::Value::from(scope.as_str());
        }
        (status, axum::Json(body)).into_response()
    }
}
