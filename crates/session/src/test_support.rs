// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: token and config builders.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::config::AuthConfig;

/// Build a compact identity token with the given claims and a dummy
/// signature segment. Only the payload segment matters to the decoder.
pub fn make_id_token(sub: &str, username: Option<&str>, email: Option<&str>, exp: u64) -> String {
    let header = serde_json::json!({ "alg": "RS256", "typ": "JWT" });
    let mut payload = serde_json::json!({ "sub": sub, "exp": exp, "token_use": "id" });
    if let Some(username) = username {
        payload["cognito:username"] = username.into();
    }
    if let Some(email) = email {
        payload["email"] = email.into();
    }
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode(b"sig"),
    )
}

/// Config with test defaults, optionally pointing every identity-provider
/// endpoint at one local base URL.
pub fn test_config(endpoint_override: Option<String>) -> AuthConfig {
    #[cfg(test)]
    install_test_crypto_provider();
    AuthConfig {
        region: "eu-north-1".to_owned(),
        domain: "auth.example.com".to_owned(),
        client_id: "test-client".to_owned(),
        redirect_uri: "souq://signin/".to_owned(),
        scopes: "openid email profile".to_owned(),
        renew_interval_secs: 180,
        renew_margin_secs: 60,
        http_timeout_secs: 5,
        endpoint_override,
    }
}

/// Install a process-wide rustls crypto provider so `reqwest::Client` can be
/// constructed in tests (production installs one in the CLI entry point).
/// Idempotent: repeated calls after the first are ignored.
#[cfg(test)]
fn install_test_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
