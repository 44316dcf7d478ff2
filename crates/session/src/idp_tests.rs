// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;
use crate::error::AuthError;

fn body(kind: &str, message: &str) -> String {
    serde_json::json!({ "__type": kind, "message": message }).to_string()
}

#[parameterized(
    username_exists = { "UsernameExistsException" },
    alias_exists = { "AliasExistsException" },
    invalid_parameter = { "InvalidParameterException" },
    invalid_password = { "InvalidPasswordException" },
    code_mismatch = { "CodeMismatchException" },
)]
fn validation_failures_are_invalid_input(kind: &str) {
    let err = classify_operation_error(400, &body(kind, "rejected"));
    assert_eq!(err, AuthError::InvalidInput("rejected".to_owned()));
}

#[test]
fn not_authorized_is_invalid_credentials() -> anyhow::Result<()> {
    let err = classify_operation_error(400, &body("NotAuthorizedException", "bad password"));
    assert_eq!(err, AuthError::InvalidCredentials("bad password".to_owned()));
    Ok(())
}

#[test]
fn expired_code_is_its_own_failure() -> anyhow::Result<()> {
    let err = classify_operation_error(400, &body("ExpiredCodeException", "code too old"));
    assert_eq!(err, AuthError::ExpiredCode);
    Ok(())
}

#[test]
fn namespaced_type_is_unwrapped() -> anyhow::Result<()> {
    let err = classify_operation_error(
        400,
        &body("com.amazonaws.cognito#UsernameExistsException", "taken"),
    );
    assert_eq!(err, AuthError::InvalidInput("taken".to_owned()));
    Ok(())
}

#[test]
fn server_errors_are_network_failures() -> anyhow::Result<()> {
    assert!(matches!(
        classify_operation_error(500, &body("InternalErrorException", "boom")),
        AuthError::Network(_),
    ));
    Ok(())
}

#[test]
fn garbage_body_falls_back_to_invalid_input() -> anyhow::Result<()> {
    assert!(matches!(classify_operation_error(400, "<html>"), AuthError::InvalidInput(_)));
    Ok(())
}
