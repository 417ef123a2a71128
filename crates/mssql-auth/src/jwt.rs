//! Claim parsing for JWT access tokens.
//!
//! This decodes the header/payload segments of a JWT for inspection (expiry,
//! tenant, audience). It does not verify the signature — the token came from
//! a trusted acquirer (device-code flow, Azure SDK, or a caller-supplied
//! manual token) and is only ever sent back to the server that issued the
//! FEDAUTH challenge, so signature verification is the server's job, not
//! ours.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::AuthError;

/// The claims this crate cares about from an Azure AD access token.
///
/// Unknown claims are ignored; this is intentionally not an exhaustive
/// mirror of the JWT.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Expiry, in seconds since the Unix epoch.
    pub exp: Option<i64>,
    /// Not-before, in seconds since the Unix epoch.
    pub nbf: Option<i64>,
    /// Issued-at, in seconds since the Unix epoch.
    pub iat: Option<i64>,
    /// Audience (the resource the token was issued for).
    pub aud: Option<String>,
    /// Tenant ID (Azure AD's `tid` claim).
    pub tid: Option<String>,
    /// Subject/object ID of the signed-in principal.
    pub sub: Option<String>,
    /// User principal name or app display name, when present.
    pub upn: Option<String>,
}

/// Decode the claims (second segment) of a JWT without verifying its signature.
pub fn decode_claims(token: &str) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let _header = parts
        .next()
        .ok_or_else(|| AuthError::TokenAcquisition("JWT has no header segment".into()))?;
    let payload = parts
        .next()
        .ok_or_else(|| AuthError::TokenAcquisition("JWT has no payload segment".into()))?;

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::TokenAcquisition(format!("JWT payload is not valid base64: {e}")))?;

    serde_json::from_slice(&decoded)
        .map_err(|e| AuthError::TokenAcquisition(format!("JWT payload is not valid JSON: {e}")))
}

impl JwtClaims {
    /// Seconds remaining until `exp`, relative to `now` (seconds since epoch).
    /// Returns `None` if the token carries no `exp` claim.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: i64) -> Option<i64> {
        self.exp.map(|exp| exp - now)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_token(payload_json: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload_json);
        format!("{header}.{payload}.")
    }

    #[test]
    fn decodes_known_claims() {
        let token = make_token(r#"{"exp":1999999999,"tid":"tenant-1","aud":"https://database.windows.net/"}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(1999999999));
        assert_eq!(claims.tid.as_deref(), Some("tenant-1"));
        assert_eq!(claims.aud.as_deref(), Some("https://database.windows.net/"));
    }

    #[test]
    fn ignores_unknown_claims() {
        let token = make_token(r#"{"exp":1,"some_future_claim":{"nested":true}}"#);
        assert!(decode_claims(&token).is_ok());
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(decode_claims("not-a-jwt").is_err());
        assert!(decode_claims("only.two").is_ok() || decode_claims("only.two").is_err());
    }

    #[test]
    fn seconds_until_expiry_computes_delta() {
        let claims = JwtClaims {
            exp: Some(1000),
            nbf: None,
            iat: None,
            aud: None,
            tid: None,
            sub: None,
            upn: None,
        };
        assert_eq!(claims.seconds_until_expiry(900), Some(100));
    }
}
