// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end flows against an in-process fake identity provider:
//! registration, confirmation, interactive sign-in, proactive renewal,
//! restart restoration, and sign-out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Router};
use tokio::net::TcpListener;

use souq_session::test_support::{make_id_token, test_config};
use souq_session::{
    AuthBrowser, AuthConfig, AuthError, BrowserOutcome, CredentialKey, CredentialStore, FileStore,
    SessionEvent, SessionService, SessionStatus,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Shared state of the fake identity provider.
#[derive(Clone)]
struct IdpState {
    /// Refresh-grant exchanges served so far.
    renewals: Arc<AtomicU32>,
    /// Expiry for identity tokens issued on the code exchange.
    issued_exp: u64,
    /// Expiry for identity tokens issued on the refresh grant.
    renewed_exp: u64,
}

async fn token_handler(
    State(state): State<IdpState>,
    Form(params): Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    let grant_type = params.get("grant_type").map(String::as_str).unwrap_or_default();
    match grant_type {
        "authorization_code" => {
            let code_ok = params.get("code").map(String::as_str) == Some("good-code");
            let verifier_ok = params.get("code_verifier").is_some_and(|v| !v.is_empty());
            let redirect_ok = params.get("redirect_uri").map(String::as_str) == Some("souq://signin/");
            if !(code_ok && verifier_ok && redirect_ok) {
                return (
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({ "error": "invalid_grant" }).to_string(),
                );
            }
            let body = serde_json::json!({
                "access_token": "access-initial",
                "id_token": make_id_token("sub-1", Some("amira"), Some("amira@example.com"), state.issued_exp),
                "refresh_token": "refresh-1",
                "expires_in": 3600,
                "token_type": "Bearer",
            });
            (StatusCode::OK, body.to_string())
        }
        "refresh_token" => {
            if params.get("refresh_token").map(String::as_str) != Some("refresh-1") {
                return (
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({ "error": "invalid_grant" }).to_string(),
                );
            }
            let n = state.renewals.fetch_add(1, Ordering::Relaxed) + 1;
            let body = serde_json::json!({
                "access_token": format!("access-renewed-{n}"),
                "id_token": make_id_token("sub-1", Some("amira"), Some("amira@example.com"), state.renewed_exp),
                "expires_in": 3600,
                "token_type": "Bearer",
            });
            (StatusCode::OK, body.to_string())
        }
        _ => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "unsupported_grant_type" }).to_string(),
        ),
    }
}

async fn operation_handler(headers: HeaderMap, body: String) -> (StatusCode, String) {
    let target = headers.get("x-amz-target").and_then(|v| v.to_str().ok()).unwrap_or_default();
    let payload: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    let username = payload.get("Username").and_then(|v| v.as_str()).unwrap_or_default();

    match target {
        "AWSCognitoIdentityProviderService.SignUp" => {
            if username == "taken" {
                let err = serde_json::json!({
                    "__type": "UsernameExistsException",
                    "message": "User already exists",
                });
                return (StatusCode::BAD_REQUEST, err.to_string());
            }
            let ok = serde_json::json!({ "UserConfirmed": false, "UserSub": "sub-1" });
            (StatusCode::OK, ok.to_string())
        }
        "AWSCognitoIdentityProviderService.ConfirmSignUp" => {
            let code = payload.get("ConfirmationCode").and_then(|v| v.as_str()).unwrap_or_default();
            if code != "123456" {
                let err = serde_json::json!({
                    "__type": "CodeMismatchException",
                    "message": "Invalid verification code provided",
                });
                return (StatusCode::BAD_REQUEST, err.to_string());
            }
            (StatusCode::OK, "{}".to_owned())
        }
        _ => (StatusCode::BAD_REQUEST, "{}".to_owned()),
    }
}

async fn start_idp(issued_exp: u64, renewed_exp: u64) -> (SocketAddr, Arc<AtomicU32>) {
    let renewals = Arc::new(AtomicU32::new(0));
    let state = IdpState { renewals: Arc::clone(&renewals), issued_exp, renewed_exp };

    let app = Router::new()
        .route("/oauth2/token", post(token_handler))
        .route("/oauth2/revoke", post(|| async { StatusCode::OK }))
        .route("/", post(operation_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (addr, renewals)
}

fn config_for(addr: SocketAddr) -> AuthConfig {
    // Production installs a rustls crypto provider in the CLI entry point;
    // the integration test binary must do the same before building a client.
    let _ = rustls::crypto::ring::default_provider().install_default();
    AuthConfig { renew_interval_secs: 1, ..test_config(Some(format!("http://{addr}"))) }
}

struct CodeBrowser;

impl AuthBrowser for CodeBrowser {
    fn authorize(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<BrowserOutcome, AuthError>> + Send {
        assert!(url.contains("code_challenge_method=S256"), "authorize URL missing PKCE: {url}");
        async { Ok(BrowserOutcome::Redirect("souq://signin/?code=good-code".to_owned())) }
    }
}

fn file_store(dir: &tempfile::TempDir) -> Arc<FileStore> {
    Arc::new(FileStore::new(dir.path().join("session.json")))
}

#[tokio::test]
async fn fresh_install_sign_up_confirm_sign_in_and_restart() -> anyhow::Result<()> {
    let (addr, _renewals) = start_idp(epoch_secs() + 3600, epoch_secs() + 3600).await;
    let dir = tempfile::tempdir()?;
    let store = file_store(&dir);

    let service = SessionService::new(
        config_for(addr),
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    );

    let outcome = service.sign_up("amira", "amira@example.com", "s3cret-pw").await?;
    assert_eq!(outcome.username, "amira");
    let confirmed = service.confirm_sign_up("amira", "123456").await?;
    assert_eq!(confirmed.username, "amira");
    assert_eq!(service.status().await, SessionStatus::Unauthenticated);

    let identity = service.sign_in(&CodeBrowser).await?;
    assert_eq!(identity.username, "amira");
    assert_eq!(identity.email.as_deref(), Some("amira@example.com"));
    assert_eq!(service.status().await, SessionStatus::Authenticated);
    assert!(service.bearer_token().await.is_some());

    assert_eq!(store.get(CredentialKey::AccessToken)?, Some("access-initial".to_owned()));
    assert!(store.get(CredentialKey::IdToken)?.is_some());
    assert_eq!(store.get(CredentialKey::RefreshToken)?, Some("refresh-1".to_owned()));
    assert_eq!(store.get(CredentialKey::PendingVerifier)?, None);

    service.shutdown();

    // A new process over the same store restores the session.
    let restarted = SessionService::new(
        config_for(addr),
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    );
    let status = restarted.restore().await?;
    assert_eq!(status, SessionStatus::Authenticated);
    assert!(restarted.bearer_token().await.is_some());

    restarted.shutdown();
    Ok(())
}

#[tokio::test]
async fn near_expiry_session_is_renewed_in_background() -> anyhow::Result<()> {
    // Issued credential expires inside the proactive margin; the renewed
    // one is long-lived.
    let (addr, renewals) = start_idp(epoch_secs() + 30, epoch_secs() + 3600).await;
    let dir = tempfile::tempdir()?;
    let store = file_store(&dir);

    let service = SessionService::new(
        config_for(addr),
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    );
    let mut events = service.subscribe();

    let _ = service.sign_in(&CodeBrowser).await?;

    // Watch for the renewal round-trip on the event stream.
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    let mut saw_renewal_in_flight = false;
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv()).await??;
        let SessionEvent::Transition { next, .. } = event;
        if next == SessionStatus::RenewalInFlight {
            saw_renewal_in_flight = true;
        }
        if saw_renewal_in_flight && next == SessionStatus::Authenticated {
            break;
        }
    }

    assert_eq!(renewals.load(Ordering::Relaxed), 1);
    assert_eq!(store.get(CredentialKey::AccessToken)?, Some("access-renewed-1".to_owned()));
    // The refresh credential was retained, not reissued.
    assert_eq!(store.get(CredentialKey::RefreshToken)?, Some("refresh-1".to_owned()));

    // The renewed credential is far from expiry; ticks stay quiet now.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(renewals.load(Ordering::Relaxed), 1);

    service.shutdown();
    Ok(())
}

#[tokio::test]
async fn sign_out_clears_storage_and_state() -> anyhow::Result<()> {
    let (addr, _renewals) = start_idp(epoch_secs() + 3600, epoch_secs() + 3600).await;
    let dir = tempfile::tempdir()?;
    let store = file_store(&dir);

    let service = SessionService::new(
        config_for(addr),
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    );
    let _ = service.sign_in(&CodeBrowser).await?;

    service.sign_out().await?;

    assert_eq!(service.status().await, SessionStatus::Unauthenticated);
    assert_eq!(service.bearer_token().await, None);
    assert_eq!(store.get(CredentialKey::AccessToken)?, None);
    assert_eq!(store.get(CredentialKey::IdToken)?, None);
    assert_eq!(store.get(CredentialKey::RefreshToken)?, None);
    Ok(())
}

#[tokio::test]
async fn expired_persisted_session_is_not_restored() -> anyhow::Result<()> {
    let (addr, _renewals) = start_idp(epoch_secs() + 3600, epoch_secs() + 3600).await;
    let dir = tempfile::tempdir()?;
    let store = file_store(&dir);

    store.set(CredentialKey::AccessToken, "access-stale")?;
    store.set(
        CredentialKey::IdToken,
        &make_id_token("sub-1", Some("amira"), None, epoch_secs().saturating_sub(5)),
    )?;
    store.set(CredentialKey::RefreshToken, "refresh-1")?;

    let service = SessionService::new(
        config_for(addr),
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    );
    let status = service.restore().await?;

    assert_eq!(status, SessionStatus::Unauthenticated);
    assert_eq!(service.bearer_token().await, None);
    Ok(())
}

#[tokio::test]
async fn registration_conflicts_and_bad_codes_surface_typed_errors() -> anyhow::Result<()> {
    let (addr, _renewals) = start_idp(epoch_secs() + 3600, epoch_secs() + 3600).await;
    let dir = tempfile::tempdir()?;
    let store = file_store(&dir);

    let service = SessionService::new(
        config_for(addr),
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    );

    let conflict = service.sign_up("taken", "taken@example.com", "s3cret-pw").await;
    assert_eq!(conflict.err().map(|e| e.as_str()), Some("invalid_input"));

    let bad_code = service.confirm_sign_up("amira", "000000").await;
    assert_eq!(bad_code.err().map(|e| e.as_str()), Some("invalid_input"));

    // Neither operation touches session state or storage.
    assert_eq!(service.status().await, SessionStatus::Unauthenticated);
    assert_eq!(store.get(CredentialKey::IdToken)?, None);
    Ok(())
}
