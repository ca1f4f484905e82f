//! Device information recorded against issued tokens.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use http::HeaderMap;
use http::header::USER_AGENT;
use http::request::Parts;
use serde::{Deserialize, Serialize};

/// Header a client uses to identify itself for device-scoped revocation.
pub const X_DEVICE_ID: &str = "x-device-id";

const MAX_USER_AGENT_LEN: usize = 512;
const MAX_DEVICE_ID_LEN: usize = 128;

/// Caller address, user agent and optional client-chosen device id.
///
/// Every field is optional: a missing header never rejects the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
}

impl DeviceInfo {
    /// Build from request headers, falling back to the socket peer for the address.
    ///
    /// Address precedence: last `x-forwarded-for` hop, then `x-real-ip`, then `peer`.
    /// The last hop is the one appended by the nearest proxy; earlier hops are
    /// whatever the client sent.
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let header = |name: &str| header_str(headers, name);

        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| header("x-real-ip"))
            .map(str::to_owned)
            .or_else(|| peer.map(|addr| addr.ip().to_string()));

        Self {
            ip_address,
            user_agent: header(USER_AGENT.as_str()).map(|s| truncate(s, MAX_USER_AGENT_LEN)),
            device_id: header(X_DEVICE_ID).map(|s| truncate(s, MAX_DEVICE_ID_LEN)),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

impl<S> FromRequestParts<S> for DeviceInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let info = Self::from_headers(&parts.headers, peer);
        async move { Ok(info) }
    }
}
