#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};

use crate::domain::types::{SmsDeliveryStatus, SmsDispatch};
use crate::error::{AuthServiceError, SmsGatewayError};

/// Outbound SMS provider.
pub trait SmsGateway: Send + Sync {
    /// Name recorded in `sms_logs.provider`.
    fn provider(&self) -> &str;

    /// In test mode nothing reaches the provider.
    fn is_test_mode(&self) -> bool;

    /// Send `text` to a canonical phone.
    async fn send(&self, phone: &str, text: &str) -> Result<SmsDispatch, SmsGatewayError>;

    /// Remaining account balance in the provider's currency.
    async fn balance(&self) -> Result<f64, SmsGatewayError>;

    async fn delivery_status(
        &self,
        message_id: &str,
    ) -> Result<SmsDeliveryStatus, SmsGatewayError>;

    async fn sender_ids(&self) -> Result<Vec<String>, SmsGatewayError>;
}

/// One-way password hashing for admin accounts.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthServiceError>;

    /// `false` for a mismatch and for an unparseable stored hash.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Signing key and random material for codes and tokens.
pub trait SecretSource: Send + Sync {
    /// HS256 key for access tokens.
    fn signing_key(&self) -> &str;

    /// Numeric code of exactly `len` digits.
    fn otp_code(&self, len: usize) -> String;

    /// Opaque high-entropy refresh token value.
    fn refresh_token(&self) -> String;
}

impl<G: SmsGateway> SmsGateway for std::sync::Arc<G> {
    fn provider(&self) -> &str {
        (**self).provider()
    }

    fn is_test_mode(&self) -> bool {
        (**self).is_test_mode()
    }

    async fn send(&self, phone: &str, text: &str) -> Result<SmsDispatch, SmsGatewayError> {
        (**self).send(phone, text).await
    }

    async fn balance(&self) -> Result<f64, SmsGatewayError> {
        (**self).balance().await
    }

    async fn delivery_status(
        &self,
        message_id: &str,
    ) -> Result<SmsDeliveryStatus, SmsGatewayError> {
        (**self).delivery_status(message_id).await
    }

    async fn sender_ids(&self) -> Result<Vec<String>, SmsGatewayError> {
        (**self).sender_ids().await
    }
}
