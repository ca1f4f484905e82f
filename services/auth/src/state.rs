use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::{OtpSettings, SmsSettings, TokenSettings};
use crate::domain::port::{Clock, PasswordHasher, SecretSource};
use crate::infra::db::{
    DbSmsLogRepository, DbTokenRepository, DbUserRepository, DbVerificationCodeRepository,
};
use crate::infra::sms::HttpSmsGateway;
use crate::usecase::token::TokenIssuer;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub gateway: Arc<HttpSmsGateway>,
    pub clock: Arc<dyn Clock>,
    pub secrets: Arc<dyn SecretSource>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub otp: OtpSettings,
    pub tokens: TokenSettings,
    pub sms: SmsSettings,
}

impl AppState {
    pub fn code_repo(&self) -> DbVerificationCodeRepository {
        DbVerificationCodeRepository {
            db: self.db.clone(),
        }
    }

    pub fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn token_repo(&self) -> DbTokenRepository {
        DbTokenRepository {
            db: self.db.clone(),
        }
    }

    pub fn sms_log_repo(&self) -> DbSmsLogRepository {
        DbSmsLogRepository {
            db: self.db.clone(),
        }
    }

    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer {
            clock: Arc::clone(&self.clock),
            secrets: Arc::clone(&self.secrets),
            settings: self.tokens.clone(),
        }
    }
}
