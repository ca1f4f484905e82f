use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use bazaar_auth_types::device::DeviceInfo;

use crate::domain::types::SmsLocale;
use crate::error::AuthServiceError;
use crate::state::AppState;
use crate::usecase::send_code::{SendCodeInput, SendCodeUseCase};
use crate::usecase::verify_code::{VerifyCodeInput, VerifyCodeUseCase};

// ── POST /auth/otp ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SendCodeRequest {
    pub phone: String,
    #[serde(default)]
    pub locale: Option<SmsLocale>,
}

pub async fn send_code(
    State(state): State<AppState>,
    device: DeviceInfo,
    Json(body): Json<SendCodeRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = SendCodeUseCase {
        codes: state.code_repo(),
        users: state.user_repo(),
        sms_logs: state.sms_log_repo(),
        gateway: Arc::clone(&state.gateway),
        clock: Arc::clone(&state.clock),
        secrets: Arc::clone(&state.secrets),
        otp: state.otp.clone(),
        sms: state.sms.clone(),
    };
    let out = usecase
        .execute(SendCodeInput {
            phone: body.phone,
            origin: device.ip_address,
            locale: body.locale,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(out)))
}

// ── POST /auth/otp/verify ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub phone: String,
    pub code: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

pub async fn verify_code(
    State(state): State<AppState>,
    device: DeviceInfo,
    Json(body): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = VerifyCodeUseCase {
        codes: state.code_repo(),
        users: state.user_repo(),
        tokens: state.token_repo(),
        clock: Arc::clone(&state.clock),
        issuer: state.issuer(),
        settings: state.otp.clone(),
    };
    let out = usecase
        .execute(VerifyCodeInput {
            phone: body.phone,
            code: body.code,
            device,
            first_name: body.first_name,
            last_name: body.last_name,
        })
        .await?;
    Ok(Json(out))
}
