use axum::extract::State;
use axum::http::StatusCode;

use crate::infra::db::ping;
use crate::state::AppState;

/// Handler for `GET /healthz`: liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Handler for `GET /readyz`: ready once the database answers.
pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    match ping(&state.db).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
