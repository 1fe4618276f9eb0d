//! Token validation seam and the structural claims authenticator.
//!
//! The gateway only needs an identity and a role back from a token.
//! Cryptographic signature verification belongs to the identity provider
//! in front of the gateway and stays outside this contract.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use praetor_core::types::Principal;

pub trait Authenticator: Send + Sync {
    /// `None` means the credential is missing, malformed, or expired.
    fn validate(&self, token: &str) -> Option<Principal>;
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Validates JWT structure and expiry and extracts the principal from the
/// `sub` and `role` claims.
pub struct ClaimsAuthenticator;

impl ClaimsAuthenticator {
    fn decode<T: DeserializeOwned>(segment: &str) -> Option<T> {
        let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl Authenticator for ClaimsAuthenticator {
    fn validate(&self, token: &str) -> Option<Principal> {
        let mut parts = token.split('.');
        let header_seg = parts.next()?;
        let claims_seg = parts.next()?;
        parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let header: JwtHeader = Self::decode(header_seg)?;
        if header.alg.is_empty() || header.typ.is_empty() {
            return None;
        }

        let claims: JwtClaims = Self::decode(claims_seg)?;
        let now = chrono::Utc::now().timestamp();
        if claims.iat <= 0 || claims.exp <= now {
            return None;
        }

        Some(Principal { id: claims.sub, role: claims.role })
    }
}
