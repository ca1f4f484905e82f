use axum::{
    Router,
    routing::{delete, get, post},
};

use bazaar_core::middleware::with_http_layers;

use crate::handlers::{
    admin::{admin_login, sms_balance, sms_message_status, sms_senders},
    health::{healthz, readyz},
    otp::{send_code, verify_code},
    token::{check_token, refresh_token, revoke_all_tokens, revoke_device_tokens, revoke_token},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // OTP
        .route("/auth/otp", post(send_code))
        .route("/auth/otp/verify", post(verify_code))
        // Token
        .route("/auth/token", get(check_token).delete(revoke_token))
        .route("/auth/token/refresh", post(refresh_token))
        .route("/auth/tokens", delete(revoke_all_tokens))
        .route("/auth/devices/{device_id}", delete(revoke_device_tokens))
        // Admin
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/admin/sms/balance", get(sms_balance))
        .route("/auth/admin/sms/senders", get(sms_senders))
        .route("/auth/admin/sms/messages/{message_id}", get(sms_message_status))
        .with_state(state);
    with_http_layers(router)
}
