use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;

use bazaar_auth_types::bearer::BearerToken;
use bazaar_auth_types::device::DeviceInfo;

use crate::error::AuthServiceError;
use crate::handlers::authenticate;
use crate::infra::sms::HttpSmsGateway;
use crate::state::AppState;
use crate::usecase::admin::{AdminLoginInput, AdminLoginUseCase, SmsAccountUseCase};

async fn sms_account(
    state: &AppState,
    bearer: &BearerToken,
) -> Result<SmsAccountUseCase<Arc<HttpSmsGateway>>, AuthServiceError> {
    let validated = authenticate(state, bearer).await?;
    if !validated.user.role.is_admin() {
        return Err(AuthServiceError::AccessDenied);
    }
    Ok(SmsAccountUseCase {
        gateway: Arc::clone(&state.gateway),
    })
}

// ── POST /auth/admin/login ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn admin_login(
    State(state): State<AppState>,
    device: DeviceInfo,
    Json(body): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = AdminLoginUseCase {
        users: state.user_repo(),
        tokens: state.token_repo(),
        hasher: Arc::clone(&state.hasher),
        issuer: state.issuer(),
    };
    let out = usecase
        .execute(AdminLoginInput {
            email: body.email,
            password: body.password,
            device,
        })
        .await?;
    Ok(Json(out))
}

// ── GET /auth/admin/sms/* ─────────────────────────────────────────────────────

pub async fn sms_balance(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<impl IntoResponse, AuthServiceError> {
    let balance = sms_account(&state, &bearer).await?.balance().await?;
    Ok(Json(serde_json::json!({ "balance": balance })))
}

pub async fn sms_senders(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<impl IntoResponse, AuthServiceError> {
    let senders = sms_account(&state, &bearer).await?.sender_ids().await?;
    Ok(Json(serde_json::json!({ "senders": senders })))
}

pub async fn sms_message_status(
    State(state): State<AppState>,
    bearer: BearerToken,
    Path(message_id): Path<String>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let status = sms_account(&state, &bearer)
        .await?
        .delivery_status(&message_id)
        .await?;
    Ok(Json(status))
}
