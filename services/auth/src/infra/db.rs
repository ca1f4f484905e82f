use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use uuid::Uuid;

use bazaar_auth_schema::{refresh_tokens, sessions, sms_logs, users, verification_codes};
use bazaar_auth_types::device::DeviceInfo;
use bazaar_domain::user::UserRole;

use crate::domain::repository::{
    SmsLogRepository, TokenRepository, UserRepository, VerificationCodeRepository,
};
use crate::domain::types::{
    RefreshToken, RevocationSummary, Session, SmsLog, User, VerificationCode,
};
use crate::error::AuthServiceError;

/// Wrap a persistence failure as [`AuthServiceError::DatabaseUnavailable`].
pub trait DbResultExt<T> {
    fn db(self, context: &'static str) -> Result<T, AuthServiceError>;
}

impl<T, E> DbResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn db(self, context: &'static str) -> Result<T, AuthServiceError> {
        self.context(context)
            .map_err(AuthServiceError::DatabaseUnavailable)
    }
}

// ── VerificationCode repository ──────────────────────────────────────────────

#[derive(Clone)]
pub struct DbVerificationCodeRepository {
    pub db: DatabaseConnection,
}

impl VerificationCodeRepository for DbVerificationCodeRepository {
    async fn count_recent_by_phone(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        verification_codes::Entity::find()
            .filter(verification_codes::Column::Phone.eq(phone))
            .filter(verification_codes::Column::ExpiresAt.gte(since))
            .count(&self.db)
            .await
            .db("count recent codes by phone")
    }

    async fn count_recent_by_origin(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        verification_codes::Entity::find()
            .filter(verification_codes::Column::IpAddress.eq(ip_address))
            .filter(verification_codes::Column::ExpiresAt.gte(since))
            .count(&self.db)
            .await
            .db("count recent codes by origin")
    }

    async fn invalidate_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        let result = verification_codes::Entity::update_many()
            .col_expr(verification_codes::Column::IsUsed, Expr::value(true))
            .col_expr(verification_codes::Column::UsedAt, Expr::value(now))
            .filter(verification_codes::Column::Phone.eq(phone))
            .filter(verification_codes::Column::IsUsed.eq(false))
            .filter(verification_codes::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await
            .db("invalidate active codes")?;
        Ok(result.rows_affected)
    }

    async fn create(&self, code: &VerificationCode) -> Result<(), AuthServiceError> {
        verification_codes::ActiveModel {
            id: Set(code.id),
            phone: Set(code.phone.clone()),
            code: Set(code.code.clone()),
            expires_at: Set(code.expires_at),
            is_used: Set(code.is_used),
            used_at: Set(code.used_at),
            attempts: Set(code.attempts),
            ip_address: Set(code.ip_address.clone()),
            created_at: Set(code.created_at),
        }
        .insert(&self.db)
        .await
        .db("create verification code")?;
        Ok(())
    }

    async fn find_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AuthServiceError> {
        let model = verification_codes::Entity::find()
            .filter(verification_codes::Column::Phone.eq(phone))
            .filter(verification_codes::Column::IsUsed.eq(false))
            .filter(verification_codes::Column::ExpiresAt.gt(now))
            .order_by_desc(verification_codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .db("find active verification code")?;
        Ok(model.map(code_from_model))
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        max_attempts: i32,
    ) -> Result<bool, AuthServiceError> {
        let result = verification_codes::Entity::update_many()
            .col_expr(
                verification_codes::Column::Attempts,
                Expr::col(verification_codes::Column::Attempts).add(1),
            )
            .filter(verification_codes::Column::Id.eq(id))
            .filter(verification_codes::Column::IsUsed.eq(false))
            .filter(verification_codes::Column::Attempts.lt(max_attempts))
            .exec(&self.db)
            .await
            .db("record failed attempt")?;
        Ok(result.rows_affected == 1)
    }

    async fn consume(
        &self,
        id: Uuid,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthServiceError> {
        let result = verification_codes::Entity::update_many()
            .col_expr(verification_codes::Column::IsUsed, Expr::value(true))
            .col_expr(verification_codes::Column::UsedAt, Expr::value(now))
            .col_expr(
                verification_codes::Column::Attempts,
                Expr::col(verification_codes::Column::Attempts).add(1),
            )
            .filter(verification_codes::Column::Id.eq(id))
            .filter(verification_codes::Column::IsUsed.eq(false))
            .filter(verification_codes::Column::ExpiresAt.gt(now))
            .filter(verification_codes::Column::Attempts.lt(max_attempts))
            .exec(&self.db)
            .await
            .db("consume verification code")?;
        Ok(result.rows_affected == 1)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError> {
        let result = verification_codes::Entity::delete_many()
            .filter(verification_codes::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await
            .db("delete expired verification codes")?;
        Ok(result.rows_affected)
    }
}

fn code_from_model(model: verification_codes::Model) -> VerificationCode {
    VerificationCode {
        id: model.id,
        phone: model.phone,
        code: model.code,
        expires_at: model.expires_at,
        is_used: model.is_used,
        used_at: model.used_at,
        attempts: model.attempts,
        ip_address: model.ip_address,
        created_at: model.created_at,
    }
}

// ── User repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthServiceError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .db("find user by id")?;
        Ok(model.map(user_from_model))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AuthServiceError> {
        let model = users::Entity::find()
            .filter(users::Column::PhoneNormalized.eq(phone))
            .one(&self.db)
            .await
            .db("find user by phone")?;
        Ok(model.map(user_from_model))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthServiceError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .db("find user by email")?;
        Ok(model.map(user_from_model))
    }

    async fn create(&self, user: &User) -> Result<(), AuthServiceError> {
        users::ActiveModel {
            id: Set(user.id),
            phone: Set(user.phone.clone()),
            phone_normalized: Set(user.phone_normalized.clone()),
            email: Set(user.email.clone()),
            password_hash: Set(user.password_hash.clone()),
            first_name: Set(user.first_name.clone()),
            last_name: Set(user.last_name.clone()),
            role: Set(i16::from(user.role.as_u8())),
            is_verified: Set(user.is_verified),
            is_active: Set(user.is_active),
            is_blocked: Set(user.is_blocked),
            last_login_at: Set(user.last_login_at),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
        }
        .insert(&self.db)
        .await
        .db("create user")?;
        Ok(())
    }

    async fn mark_verified_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        users::Entity::update_many()
            .col_expr(users::Column::IsVerified, Expr::value(true))
            .col_expr(users::Column::IsActive, Expr::value(true))
            .col_expr(users::Column::LastLoginAt, Expr::value(now))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .db("mark user verified")?;
        Ok(())
    }

    async fn record_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthServiceError> {
        users::Entity::update_many()
            .col_expr(users::Column::LastLoginAt, Expr::value(now))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .db("record user login")?;
        Ok(())
    }
}

fn user_from_model(model: users::Model) -> User {
    let role = u8::try_from(model.role)
        .ok()
        .and_then(UserRole::from_u8)
        .unwrap_or_else(|| {
            tracing::warn!(
                user_id = %model.id,
                role = model.role,
                "unknown role, treating as client"
            );
            UserRole::Client
        });
    User {
        id: model.id,
        phone: model.phone,
        phone_normalized: model.phone_normalized,
        email: model.email,
        password_hash: model.password_hash,
        first_name: model.first_name,
        last_name: model.last_name,
        role,
        is_verified: model.is_verified,
        is_active: model.is_active,
        is_blocked: model.is_blocked,
        last_login_at: model.last_login_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

// ── Token repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbTokenRepository {
    pub db: DatabaseConnection,
}

impl TokenRepository for DbTokenRepository {
    async fn create_pair(
        &self,
        refresh_token: &RefreshToken,
        session: &Session,
    ) -> Result<(), AuthServiceError> {
        self.db
            .transaction::<_, (), DbErr>(|txn| {
                let refresh_token = refresh_token.clone();
                let session = session.clone();
                Box::pin(async move {
                    insert_refresh_token(txn, &refresh_token).await?;
                    insert_session(txn, &session).await?;
                    Ok(())
                })
            })
            .await
            .db("persist token pair")
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshToken>, AuthServiceError> {
        let model = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::Token.eq(token))
            .one(&self.db)
            .await
            .db("find refresh token")?;
        Ok(model.map(refresh_token_from_model))
    }

    async fn exchange_pair(
        &self,
        previous_id: Uuid,
        revoke_previous: bool,
        refresh_token: &RefreshToken,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>, AuthServiceError> {
        self.db
            .transaction::<_, Option<u64>, DbErr>(|txn| {
                let refresh_token = refresh_token.clone();
                let session = session.clone();
                Box::pin(async move {
                    if revoke_previous {
                        let revoked = revoke_refresh_tokens(now)
                            .filter(refresh_tokens::Column::Id.eq(previous_id))
                            .exec(txn)
                            .await?;
                        if revoked.rows_affected == 0 {
                            return Ok(None);
                        }
                    }
                    let deactivated = deactivate_sessions()
                        .filter(sessions::Column::RefreshTokenId.eq(previous_id))
                        .exec(txn)
                        .await?;
                    insert_refresh_token(txn, &refresh_token).await?;
                    insert_session(txn, &session).await?;
                    Ok(Some(deactivated.rows_affected))
                })
            })
            .await
            .db("exchange token pair")
    }

    async fn find_session_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<Session>, AuthServiceError> {
        let model = sessions::Entity::find()
            .filter(sessions::Column::AccessToken.eq(access_token))
            .one(&self.db)
            .await
            .db("find session by access token")?;
        Ok(model.map(session_from_model))
    }

    async fn touch_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthServiceError> {
        sessions::Entity::update_many()
            .col_expr(sessions::Column::LastActivityAt, Expr::value(now))
            .filter(sessions::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .db("touch session")?;
        Ok(())
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError> {
        self.db
            .transaction::<_, RevocationSummary, DbErr>(move |txn| {
                Box::pin(async move {
                    let tokens = revoke_refresh_tokens(now)
                        .filter(refresh_tokens::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;
                    let sessions = deactivate_sessions()
                        .filter(sessions::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;
                    Ok(RevocationSummary {
                        refresh_tokens_revoked: tokens.rows_affected,
                        sessions_deactivated: sessions.rows_affected,
                    })
                })
            })
            .await
            .db("revoke all user tokens")
    }

    async fn revoke_for_device(
        &self,
        user_id: Uuid,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError> {
        let device_id = device_id.to_owned();
        self.db
            .transaction::<_, RevocationSummary, DbErr>(move |txn| {
                Box::pin(async move {
                    let device_tokens = Query::select()
                        .column(refresh_tokens::Column::Id)
                        .from(refresh_tokens::Entity)
                        .and_where(refresh_tokens::Column::UserId.eq(user_id))
                        .and_where(refresh_tokens::Column::DeviceId.eq(device_id.as_str()))
                        .to_owned();
                    let sessions = deactivate_sessions()
                        .filter(sessions::Column::RefreshTokenId.in_subquery(device_tokens))
                        .exec(txn)
                        .await?;
                    let tokens = revoke_refresh_tokens(now)
                        .filter(refresh_tokens::Column::UserId.eq(user_id))
                        .filter(refresh_tokens::Column::DeviceId.eq(device_id.as_str()))
                        .exec(txn)
                        .await?;
                    Ok(RevocationSummary {
                        refresh_tokens_revoked: tokens.rows_affected,
                        sessions_deactivated: sessions.rows_affected,
                    })
                })
            })
            .await
            .db("revoke device tokens")
    }

    async fn revoke_chain(
        &self,
        refresh_token_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RevocationSummary, AuthServiceError> {
        self.db
            .transaction::<_, RevocationSummary, DbErr>(move |txn| {
                Box::pin(async move {
                    let tokens = revoke_refresh_tokens(now)
                        .filter(refresh_tokens::Column::Id.eq(refresh_token_id))
                        .exec(txn)
                        .await?;
                    let sessions = deactivate_sessions()
                        .filter(sessions::Column::RefreshTokenId.eq(refresh_token_id))
                        .exec(txn)
                        .await?;
                    Ok(RevocationSummary {
                        refresh_tokens_revoked: tokens.rows_affected,
                        sessions_deactivated: sessions.rows_affected,
                    })
                })
            })
            .await
            .db("revoke session")
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await
            .db("delete expired sessions")?;
        Ok(result.rows_affected)
    }

    async fn delete_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await
            .db("delete expired refresh tokens")?;
        Ok(result.rows_affected)
    }
}

/// `UPDATE refresh_tokens SET is_revoked = true … WHERE is_revoked = false`, caller adds scope.
fn revoke_refresh_tokens(now: DateTime<Utc>) -> sea_orm::UpdateMany<refresh_tokens::Entity> {
    refresh_tokens::Entity::update_many()
        .col_expr(refresh_tokens::Column::IsRevoked, Expr::value(true))
        .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(now))
        .filter(refresh_tokens::Column::IsRevoked.eq(false))
}

/// `UPDATE sessions SET is_active = false WHERE is_active = true`, caller adds scope.
fn deactivate_sessions() -> sea_orm::UpdateMany<sessions::Entity> {
    sessions::Entity::update_many()
        .col_expr(sessions::Column::IsActive, Expr::value(false))
        .filter(sessions::Column::IsActive.eq(true))
}

async fn insert_refresh_token(
    txn: &DatabaseTransaction,
    token: &RefreshToken,
) -> Result<(), DbErr> {
    refresh_tokens::ActiveModel {
        id: Set(token.id),
        token: Set(token.token.clone()),
        user_id: Set(token.user_id),
        expires_at: Set(token.expires_at),
        is_revoked: Set(token.is_revoked),
        revoked_at: Set(token.revoked_at),
        ip_address: Set(token.device.ip_address.clone()),
        user_agent: Set(token.device.user_agent.clone()),
        device_id: Set(token.device.device_id.clone()),
        created_at: Set(token.created_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

async fn insert_session(txn: &DatabaseTransaction, session: &Session) -> Result<(), DbErr> {
    sessions::ActiveModel {
        id: Set(session.id),
        user_id: Set(session.user_id),
        access_token: Set(session.access_token.clone()),
        refresh_token_id: Set(session.refresh_token_id),
        expires_at: Set(session.expires_at),
        is_active: Set(session.is_active),
        last_activity_at: Set(session.last_activity_at),
        ip_address: Set(session.device.ip_address.clone()),
        user_agent: Set(session.device.user_agent.clone()),
        device_id: Set(session.device.device_id.clone()),
        created_at: Set(session.created_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn refresh_token_from_model(model: refresh_tokens::Model) -> RefreshToken {
    RefreshToken {
        id: model.id,
        token: model.token,
        user_id: model.user_id,
        expires_at: model.expires_at,
        is_revoked: model.is_revoked,
        revoked_at: model.revoked_at,
        device: DeviceInfo {
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            device_id: model.device_id,
        },
        created_at: model.created_at,
    }
}

fn session_from_model(model: sessions::Model) -> Session {
    Session {
        id: model.id,
        user_id: model.user_id,
        access_token: model.access_token,
        refresh_token_id: model.refresh_token_id,
        expires_at: model.expires_at,
        is_active: model.is_active,
        last_activity_at: model.last_activity_at,
        device: DeviceInfo {
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            device_id: model.device_id,
        },
        created_at: model.created_at,
    }
}

// ── SmsLog repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSmsLogRepository {
    pub db: DatabaseConnection,
}

impl SmsLogRepository for DbSmsLogRepository {
    async fn append(&self, log: &SmsLog) -> Result<(), AuthServiceError> {
        sms_logs::ActiveModel {
            id: Set(log.id),
            phone: Set(log.phone.clone()),
            message: Set(log.message.clone()),
            provider: Set(log.provider.clone()),
            status: Set(log.status.as_str().to_owned()),
            provider_message_id: Set(log.provider_message_id.clone()),
            cost: Set(log.cost),
            error_message: Set(log.error_message.clone()),
            test_mode: Set(log.test_mode),
            created_at: Set(log.created_at),
        }
        .insert(&self.db)
        .await
        .db("append sms log")?;
        Ok(())
    }
}

/// Readiness probe: a trivial round trip to the database.
pub async fn ping(db: &DatabaseConnection) -> anyhow::Result<()> {
    db.ping().await.context("ping database")
}
