// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-endpoint wire calls and shapes.

use serde::Deserialize;

use crate::error::AuthError;

/// Successful token-endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Token-endpoint error body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Exchange an authorization code (+ verifier) for a credential set.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, AuthError> {
    let resp = client
        .post(token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ])
        .send()
        .await?;
    read_token_response(resp).await
}

/// Exchange a refresh credential for a new access + identity pair.
///
/// The provider does not reissue the refresh credential on this grant.
pub async fn refresh_grant(
    client: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let resp = client
        .post(token_endpoint)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;
    read_token_response(resp).await
}

/// Revoke a refresh credential. Callers treat failure as best-effort.
pub async fn revoke(
    client: &reqwest::Client,
    revoke_endpoint: &str,
    client_id: &str,
    token: &str,
) -> Result<(), AuthError> {
    let resp = client
        .post(revoke_endpoint)
        .form(&[("token", token), ("client_id", client_id)])
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::Network(format!("revocation failed ({status}): {text}")));
    }
    Ok(())
}

async fn read_token_response(resp: reqwest::Response) -> Result<TokenResponse, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<TokenResponse>().await?);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(classify_token_error(status.as_u16(), &text))
}

/// Map a non-success token-endpoint answer onto the error taxonomy.
pub(crate) fn classify_token_error(status: u16, body: &str) -> AuthError {
    let parsed = serde_json::from_str::<TokenErrorBody>(body).ok();
    let code = parsed.as_ref().map(|b| b.error.as_str()).unwrap_or_default();

    match code {
        "invalid_grant" => AuthError::InvalidGrant,
        "invalid_request" | "invalid_client" | "unsupported_grant_type" | "invalid_scope" => {
            let detail = parsed
                .as_ref()
                .and_then(|b| b.error_description.clone())
                .unwrap_or_else(|| code.to_owned());
            AuthError::InvalidInput(detail)
        }
        _ if status >= 500 => AuthError::Network(format!("token endpoint unavailable ({status})")),
        _ => AuthError::InvalidInput(format!("token endpoint error ({status}): {body}")),
    }
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
