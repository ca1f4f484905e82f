//! `Authorization: Bearer …` extractor.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::AUTHORIZATION;
use http::request::Parts;

/// Raw access token taken from the `Authorization` header. Not validated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Why a request carried no usable bearer token. Always renders as 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BearerRejection {
    #[error("missing authorization header")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
}

impl IntoResponse for BearerRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "kind": "INVALID_ACCESS_TOKEN",
            "message": self.to_string(),
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

fn parse_bearer(value: &str) -> Result<String, BearerRejection> {
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(BearerRejection::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(BearerRejection::Malformed);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(BearerRejection::Malformed);
    }
    Ok(token.to_owned())
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = BearerRejection;

    // Values are read synchronously so the returned future is 'static (axum-core 0.5
    // declares this as `fn -> impl Future + Send`).
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = match parts.headers.get(AUTHORIZATION) {
            None => Err(BearerRejection::Missing),
            Some(value) => value
                .to_str()
                .map_err(|_| BearerRejection::Malformed)
                .and_then(parse_bearer)
                .map(BearerToken),
        };
        async move { result }
    }
}
