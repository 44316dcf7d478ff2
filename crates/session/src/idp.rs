// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Direct identity-provider API: registration and confirmation.
//!
//! JSON POSTs selected by an operation header — the provider's native,
//! non-OAuth surface. Neither operation authenticates the user; a new
//! account stays unconfirmed until the out-of-band code is submitted.

use crate::error::AuthError;

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_SIGN_UP: &str = "AWSCognitoIdentityProviderService.SignUp";
const TARGET_CONFIRM_SIGN_UP: &str = "AWSCognitoIdentityProviderService.ConfirmSignUp";

/// Outcome of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub username: String,
    pub email: String,
}

/// Outcome of a confirmation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmOutcome {
    pub username: String,
}

/// Register a new account.
pub async fn sign_up(
    client: &reqwest::Client,
    endpoint: &str,
    client_id: &str,
    username: &str,
    email: &str,
    password: &str,
) -> Result<SignUpOutcome, AuthError> {
    let body = serde_json::json!({
        "ClientId": client_id,
        "Username": username,
        "Password": password,
        "UserAttributes": [{ "Name": "email", "Value": email }],
    });
    let _ = post_operation(client, endpoint, TARGET_SIGN_UP, &body).await?;
    Ok(SignUpOutcome { username: username.to_owned(), email: email.to_owned() })
}

/// Submit the out-of-band confirmation code for a new account.
pub async fn confirm_sign_up(
    client: &reqwest::Client,
    endpoint: &str,
    client_id: &str,
    username: &str,
    code: &str,
) -> Result<ConfirmOutcome, AuthError> {
    let body = serde_json::json!({
        "ClientId": client_id,
        "Username": username,
        "ConfirmationCode": code,
    });
    let _ = post_operation(client, endpoint, TARGET_CONFIRM_SIGN_UP, &body).await?;
    Ok(ConfirmOutcome { username: username.to_owned() })
}

async fn post_operation(
    client: &reqwest::Client,
    endpoint: &str,
    target: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value, AuthError> {
    let resp = client
        .post(endpoint)
        .header("Content-Type", CONTENT_TYPE)
        .header("X-Amz-Target", target)
        .body(body.to_string())
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if status.is_success() {
        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        return serde_json::from_str(&text)
            .map_err(|e| AuthError::InvalidInput(format!("malformed provider response: {e}")));
    }
    Err(classify_operation_error(status.as_u16(), &text))
}

/// Map a `{__type, message}` error body onto the error taxonomy.
pub(crate) fn classify_operation_error(status: u16, body: &str) -> AuthError {
    let value = serde_json::from_str::<serde_json::Value>(body).unwrap_or_default();
    let kind = value.get("__type").and_then(|v| v.as_str()).unwrap_or_default();
    // Some deployments namespace the type as `service#Exception`.
    let kind = kind.rsplit('#').next().unwrap_or(kind);
    let message = value
        .get("message")
        .or_else(|| value.get("Message"))
        .and_then(|v| v.as_str())
        .unwrap_or("request rejected")
        .to_owned();

    match kind {
        "NotAuthorizedException" | "UserNotFoundException" | "UserNotConfirmedException" => {
            AuthError::InvalidCredentials(message)
        }
        "UsernameExistsException"
        | "AliasExistsException"
        | "InvalidParameterException"
        | "InvalidPasswordException"
        | "CodeMismatchException" => AuthError::InvalidInput(message),
        "ExpiredCodeException" => AuthError::ExpiredCode,
        _ if status >= 500 => AuthError::Network(format!("identity provider unavailable ({status})")),
        _ => AuthError::InvalidInput(message),
    }
}

#[cfg(test)]
#[path = "idp_tests.rs"]
mod tests;
