pub mod admin;
pub mod health;
pub mod otp;
pub mod token;

use std::sync::Arc;

use bazaar_auth_types::bearer::BearerToken;

use crate::error::AuthServiceError;
use crate::state::AppState;
use crate::usecase::token::{ValidateAccessTokenUseCase, ValidatedSession};

/// Full (signature + session + user) check of the caller's bearer token.
pub(crate) async fn authenticate(
    state: &AppState,
    bearer: &BearerToken,
) -> Result<ValidatedSession, AuthServiceError> {
    let usecase = ValidateAccessTokenUseCase {
        users: state.user_repo(),
        tokens: state.token_repo(),
        clock: Arc::clone(&state.clock),
        secrets: Arc::clone(&state.secrets),
    };
    usecase.execute(bearer.as_str()).await
}
