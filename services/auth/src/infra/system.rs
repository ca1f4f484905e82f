use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngExt;

use crate::domain::port::{Clock, SecretSource};

/// Refresh tokens carry 384 bits of entropy.
const REFRESH_TOKEN_BYTES: usize = 48;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Secrets backed by the thread-local CSPRNG.
#[derive(Clone)]
pub struct OsSecretSource {
    signing_key: String,
}

impl OsSecretSource {
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
        }
    }
}

impl SecretSource for OsSecretSource {
    fn signing_key(&self) -> &str {
        &self.signing_key
    }

    fn otp_code(&self, len: usize) -> String {
        let mut rng = rand::rng();
        (0..len)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect()
    }

    fn refresh_token(&self) -> String {
        let mut rng = rand::rng();
        let bytes: [u8; REFRESH_TOKEN_BYTES] = std::array::from_fn(|_| rng.random());
        URL_SAFE_NO_PAD.encode(bytes)
    }
}
