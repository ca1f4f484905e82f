//! JWT access-token claims and validation.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;
#[cfg(any(feature = "USE_ONLY_IN_AUTH_SERVICE", test))]
use serde::Serialize;
use uuid::Uuid;

use bazaar_domain::user::UserRole;

/// Value of the `typ` claim on access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Identity extracted from a validated access token.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub user_id: Uuid,
    /// Canonical phone; absent for admin accounts created without one.
    pub phone: Option<String>,
    pub role: UserRole,
    pub token_id: Uuid,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Errors returned by [`validate_access_token`].
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("not an access token")]
    WrongType,
}

/// JWT claims payload shared by token creation (auth service) and validation (everyone).
///
/// | Field | JWT claim | Meaning |
/// |-------|-----------|---------|
/// | `sub` | `sub` | user ID (UUID string) |
/// | `phone` | custom | canonical phone, omitted when the user has none |
/// | `role` | custom | [`UserRole`] wire value |
/// | `typ` | custom | always [`ACCESS_TOKEN_TYPE`] |
/// | `iat` / `exp` | `iat` / `exp` | seconds since epoch |
/// | `jti` | `jti` | random UUID; makes every token string unique |
///
/// [`Serialize`] requires the **`USE_ONLY_IN_AUTH_SERVICE`** cargo feature, since the
/// auth service is the sole token issuer.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(any(feature = "USE_ONLY_IN_AUTH_SERVICE", test), derive(Serialize))]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: u8,
    pub typ: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

/// Decode and validate a JWT, returning raw claims.
///
/// Validation: HS256, exp checked, required claims: `exp` + `sub`.
/// Default leeway = 60s to tolerate clock skew between services.
fn decode_jwt(token: &str, secret: &str) -> Result<AccessClaims, TokenError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;
    validation.required_spec_claims.clear();
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })?;

    Ok(data.claims)
}

/// Validate an access token's signature, expiry and type, returning parsed identity.
///
/// This is only the stateless half of validation: a token that passes here may still
/// belong to a revoked session.
pub fn validate_access_token(token: &str, secret: &str) -> Result<TokenInfo, TokenError> {
    let claims = decode_jwt(token, secret)?;
    if claims.typ != ACCESS_TOKEN_TYPE {
        return Err(TokenError::WrongType);
    }
    let user_id = claims.sub.parse::<Uuid>().map_err(|_| TokenError::Malformed)?;
    let token_id = claims.jti.parse::<Uuid>().map_err(|_| TokenError::Malformed)?;
    let role = UserRole::from_u8(claims.role).ok_or(TokenError::Malformed)?;
    Ok(TokenInfo {
        user_id,
        phone: claims.phone,
        role,
        token_id,
        issued_at: claims.iat,
        expires_at: claims.exp,
    })
}

/// Sign access-token claims with HS256.
#[cfg(any(feature = "USE_ONLY_IN_AUTH_SERVICE", test))]
pub fn encode_access_token(
    claims: &AccessClaims,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
}
