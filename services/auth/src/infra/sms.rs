//! HTTP adapter for the TurboSMS-style JSON API.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_domain::phone::mask_phone;

use crate::config::SmsSettings;
use crate::domain::port::SmsGateway;
use crate::domain::types::{SmsDeliveryStatus, SmsDispatch};
use crate::error::SmsGatewayError;

const SEND_TIMEOUT: Duration = Duration::from_secs(15);
const BALANCE_TIMEOUT: Duration = Duration::from_secs(10);
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider codes below this value are successes (including "partially accepted").
const FIRST_ERROR_CODE: i64 = 100;

pub struct HttpSmsGateway {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    sender_id: String,
    provider: String,
    test_mode: bool,
}

impl HttpSmsGateway {
    pub fn new(settings: &SmsSettings) -> Result<Self, SmsGatewayError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SmsGatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            api_token: settings.api_token.clone(),
            sender_id: settings.sender_id.clone(),
            provider: settings.provider.clone(),
            test_mode: settings.test_mode,
        })
    }

    async fn call<B, R>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<R, SmsGatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_token)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let envelope: Envelope<R> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SmsGatewayError::Timeout
            } else {
                SmsGatewayError::Decode(e.to_string())
            }
        })?;
        envelope.into_result()
    }
}

fn transport_error(e: reqwest::Error) -> SmsGatewayError {
    if e.is_timeout() {
        SmsGatewayError::Timeout
    } else {
        SmsGatewayError::Transport(e.to_string())
    }
}

/// Every provider response: a status code, its name and an endpoint-specific payload.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response_code: i64,
    response_status: String,
    response_result: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, SmsGatewayError> {
        if !(0..FIRST_ERROR_CODE).contains(&self.response_code) {
            if self.response_status.contains("NOT_ENOUGH_CREDITS") {
                return Err(SmsGatewayError::InsufficientBalance);
            }
            return Err(SmsGatewayError::Provider {
                code: self.response_code,
                status: self.response_status,
            });
        }
        self.response_result
            .ok_or_else(|| SmsGatewayError::Decode("missing response_result".to_owned()))
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    recipients: [&'a str; 1],
    sms: SmsBody<'a>,
}

#[derive(Serialize)]
struct SmsBody<'a> {
    sender: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResult {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    response_code: i64,
    #[serde(default)]
    response_status: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    balance: f64,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    messages: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SenderEntry {
    Name(String),
    Record { sender: String },
}

impl SenderEntry {
    fn into_name(self) -> String {
        match self {
            Self::Name(name) | Self::Record { sender: name } => name,
        }
    }
}

/// The provider reports one result per recipient; a single-recipient send succeeds
/// only if that recipient was accepted.
fn dispatch_from_results(results: Vec<SendResult>) -> Result<SmsDispatch, SmsGatewayError> {
    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| SmsGatewayError::Decode("empty send result".to_owned()))?;
    if !(0..FIRST_ERROR_CODE).contains(&first.response_code) {
        return Err(SmsGatewayError::Provider {
            code: first.response_code,
            status: first.response_status,
        });
    }
    Ok(SmsDispatch {
        message_id: first.message_id,
        cost: None,
        test_mode: false,
    })
}

impl SmsGateway for HttpSmsGateway {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    async fn send(&self, phone: &str, text: &str) -> Result<SmsDispatch, SmsGatewayError> {
        if self.test_mode {
            tracing::info!(phone = %mask_phone(phone), text, "sms test mode, not sent");
            return Ok(SmsDispatch {
                message_id: Some(format!("test-{}", Uuid::new_v4())),
                cost: Some(0.0),
                test_mode: true,
            });
        }

        let request = SendRequest {
            recipients: [phone.trim_start_matches('+')],
            sms: SmsBody {
                sender: &self.sender_id,
                text,
            },
        };
        let results: Vec<SendResult> = self
            .call("message/send.json", &request, SEND_TIMEOUT)
            .await?;
        dispatch_from_results(results)
    }

    async fn balance(&self) -> Result<f64, SmsGatewayError> {
        let result: BalanceResult = self
            .call("user/balance.json", &serde_json::json!({}), BALANCE_TIMEOUT)
            .await?;
        Ok(result.balance)
    }

    async fn delivery_status(
        &self,
        message_id: &str,
    ) -> Result<SmsDeliveryStatus, SmsGatewayError> {
        let request = StatusRequest {
            messages: [message_id],
        };
        let results: Vec<SmsDeliveryStatus> = self
            .call("message/status.json", &request, QUERY_TIMEOUT)
            .await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| SmsGatewayError::Decode("empty status result".to_owned()))
    }

    async fn sender_ids(&self) -> Result<Vec<String>, SmsGatewayError> {
        let entries: Vec<SenderEntry> = self
            .call("user/senders.json", &serde_json::json!({}), QUERY_TIMEOUT)
            .await?;
        Ok(entries.into_iter().map(SenderEntry::into_name).collect())
    }
}
