// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unverified decoding of compact signed tokens into claims.
//!
//! The signature segment is never checked here. Decoded claims feed UX
//! (display name) and proactive-expiry math only, never authorization
//! decisions — every server the app calls verifies the token on its own.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

/// Failure decoding a compact token's claims segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not three dot-separated segments of base64url data.
    Malformed,
    /// The payload segment is not a JSON object.
    Payload(String),
    /// A required claim is absent or has the wrong type.
    MissingClaim(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("token is not a three-segment compact string"),
            Self::Payload(detail) => write!(f, "token payload is not a JSON object: {detail}"),
            Self::MissingClaim(name) => write!(f, "token is missing the `{name}` claim"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Claims carried by an identity credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject id assigned by the identity provider.
    pub sub: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: u64,
    /// Email address, when the provider includes it.
    pub email: Option<String>,
    /// Provider-specific username claim, when present.
    pub username: Option<String>,
}

/// Decode the claims segment of a compact signed token.
///
/// Splits on `.`, base64url-decodes the middle segment, and parses it as
/// JSON. `exp` and `sub` are required; everything else is optional.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(DecodeError::Malformed);
    }

    let payload = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|_| DecodeError::Malformed)?;
    let value: serde_json::Value =
        serde_json::from_slice(&payload).map_err(|e| DecodeError::Payload(e.to_string()))?;

    let sub = value
        .get("sub")
        .and_then(|v| v.as_str())
        .ok_or(DecodeError::MissingClaim("sub"))?
        .to_owned();
    let exp = value.get("exp").and_then(|v| v.as_u64()).ok_or(DecodeError::MissingClaim("exp"))?;
    let email = value.get("email").and_then(|v| v.as_str()).map(String::from);
    let username = value.get("cognito:username").and_then(|v| v.as_str()).map(String::from);

    Ok(Claims { sub, exp, email, username })
}

/// Identity derived from an identity credential's claims.
///
/// Recomputed on every successful sign-in or renewal; never persisted
/// independently of the credential it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub email: Option<String>,
    pub subject_id: String,
}

impl Identity {
    /// Derive the displayable identity. The provider's username claim
    /// wins; the subject id is the fallback.
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            username: claims.username.clone().unwrap_or_else(|| claims.sub.clone()),
            email: claims.email.clone(),
            subject_id: claims.sub.clone(),
        }
    }
}

/// Return the current time as seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
