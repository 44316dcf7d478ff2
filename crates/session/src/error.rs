// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed failures for session and credential operations.

use std::fmt;

use crate::claims::DecodeError;

/// Errors produced by the negotiator, the credential store, and the
/// session service. Every failure is a value the state machine can act
/// on; nothing is thrown silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Endpoint unreachable, DNS failure, or timeout. Retried by the next
    /// scheduled renewal tick, never synchronously.
    Network(String),
    /// The identity provider rejected the presented credentials.
    InvalidCredentials(String),
    /// The identity provider rejected the request payload (conflict or
    /// validation failure).
    InvalidInput(String),
    /// The grant presented to the token endpoint was rejected.
    InvalidGrant,
    /// The authorization or confirmation code expired before it was used.
    ExpiredCode,
    /// No renewal credential in storage; silent renewal is impossible.
    MissingRefreshToken,
    /// The renewal credential itself was expired or revoked.
    SessionExpired,
    /// The user dismissed the interactive sign-in.
    Cancelled,
    /// The identity credential could not be decoded.
    Decode(DecodeError),
    /// The credential store's underlying medium failed.
    Storage(String),
}

impl AuthError {
    /// Stable wire code for this error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::InvalidCredentials(_) => "invalid_credentials",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidGrant => "invalid_grant",
            Self::ExpiredCode => "expired_code",
            Self::MissingRefreshToken => "missing_refresh_token",
            Self::SessionExpired => "session_expired",
            Self::Cancelled => "cancelled",
            Self::Decode(_) => "decode",
            Self::Storage(_) => "storage",
        }
    }

    /// Short human-readable message for the UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Could not reach the sign-in service. Check your connection.".to_owned(),
            Self::InvalidCredentials(_) => "Incorrect username or password.".to_owned(),
            Self::InvalidInput(detail) => detail.clone(),
            Self::InvalidGrant | Self::ExpiredCode => "Sign-in took too long. Please try again.".to_owned(),
            Self::MissingRefreshToken | Self::SessionExpired => {
                "Your session has expired. Please sign in again.".to_owned()
            }
            Self::Cancelled => String::new(),
            Self::Decode(_) => "Received an unreadable response from the sign-in service.".to_owned(),
            Self::Storage(_) => "Could not access secure storage on this device.".to_owned(),
        }
    }

    /// Whether this failure must tear down the whole session.
    pub fn forces_sign_out(&self) -> bool {
        matches!(self, Self::MissingRefreshToken | Self::SessionExpired)
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(detail)
            | Self::InvalidCredentials(detail)
            | Self::InvalidInput(detail)
            | Self::Storage(detail) => write!(f, "{}: {detail}", self.as_str()),
            Self::Decode(e) => write!(f, "{}: {e}", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidInput(format!("malformed provider response: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<DecodeError> for AuthError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
