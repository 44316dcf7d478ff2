// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session and credential lifecycle core for the souq mobile client.
//!
//! Drives the authorization-code + PKCE handshake against the identity
//! provider, persists the resulting credential set, decodes identity claims
//! (without verifying them — see [`claims`]), and keeps the session fresh
//! with a background renewal task owned by the [`service::SessionService`]
//! lifecycle. UI layers hold a service reference and subscribe to
//! transition events; they never copy session state.

pub mod claims;
pub mod config;
pub mod error;
pub mod idp;
pub mod negotiator;
pub mod oauth;
pub mod pkce;
pub mod service;
pub mod store;
pub mod test_support;

mod scheduler;

pub use claims::{Claims, DecodeError, Identity};
pub use config::AuthConfig;
pub use error::AuthError;
pub use negotiator::{AuthBrowser, AuthOutcome, BrowserOutcome, Negotiator};
pub use service::{SessionEvent, SessionService, SessionState, SessionStatus};
pub use store::{CredentialKey, CredentialSet, CredentialStore, FileStore, MemoryStore};
