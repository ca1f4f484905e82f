use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use bazaar_auth_types::bearer::BearerToken;
use bazaar_auth_types::device::DeviceInfo;
use bazaar_domain::user::UserRole;

use crate::domain::types::{SessionView, UserProfile};
use crate::error::AuthServiceError;
use crate::handlers::authenticate;
use crate::state::AppState;
use crate::usecase::revoke::RevokeTokensUseCase;
use crate::usecase::token::{RefreshTokenInput, RefreshTokenUseCase};

fn revoker(state: &AppState) -> RevokeTokensUseCase<crate::infra::db::DbTokenRepository> {
    RevokeTokensUseCase {
        tokens: state.token_repo(),
        clock: Arc::clone(&state.clock),
    }
}

// ── GET /auth/token ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CheckTokenQuery {
    /// Minimum role the caller must hold.
    pub role: Option<UserRole>,
}

#[derive(Serialize)]
pub struct CheckTokenResponse {
    pub user: UserProfile,
    pub session: SessionView,
}

pub async fn check_token(
    State(state): State<AppState>,
    bearer: BearerToken,
    Query(query): Query<CheckTokenQuery>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let validated = authenticate(&state, &bearer).await?;

    if let Some(min_role) = query.role {
        if validated.user.role.as_u8() < min_role.as_u8() {
            return Err(AuthServiceError::AccessDenied);
        }
    }

    Ok(Json(CheckTokenResponse {
        user: validated.profile(),
        session: validated.view(),
    }))
}

// ── POST /auth/token/refresh ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    device: DeviceInfo,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = RefreshTokenUseCase {
        users: state.user_repo(),
        tokens: state.token_repo(),
        issuer: state.issuer(),
    };
    let out = usecase
        .execute(RefreshTokenInput {
            refresh_token: body.refresh_token,
            device,
        })
        .await?;
    Ok(Json(out))
}

// ── DELETE /auth/token ────────────────────────────────────────────────────────

pub async fn revoke_token(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<impl IntoResponse, AuthServiceError> {
    let validated = authenticate(&state, &bearer).await?;
    revoker(&state).revoke_session(&validated.session).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── DELETE /auth/tokens ───────────────────────────────────────────────────────

pub async fn revoke_all_tokens(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<impl IntoResponse, AuthServiceError> {
    let validated = authenticate(&state, &bearer).await?;
    let summary = revoker(&state).revoke_all(validated.user.id).await?;
    Ok(Json(summary))
}

// ── DELETE /auth/devices/{device_id} ──────────────────────────────────────────

pub async fn revoke_device_tokens(
    State(state): State<AppState>,
    bearer: BearerToken,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let validated = authenticate(&state, &bearer).await?;
    let summary = revoker(&state)
        .revoke_device(validated.user.id, &device_id)
        .await?;
    Ok(Json(summary))
}
