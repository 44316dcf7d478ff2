// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol sequencing against the identity provider.
//!
//! Four operations: interactive sign-in (browser-delegated code exchange),
//! registration, confirmation, and silent renewal. Each returns a typed
//! result the session service folds into its state machine.

use std::future::Future;
use std::sync::Arc;

use crate::claims::{self, Identity};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::idp::{self, ConfirmOutcome, SignUpOutcome};
use crate::store::{self, CredentialKey, CredentialSet, CredentialStore};
use crate::{oauth, pkce};

/// Interactive-browser collaborator: presents the authorization URL and
/// resolves with the redirect the authorization server issued, or with
/// the user's cancellation.
pub trait AuthBrowser {
    fn authorize(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<BrowserOutcome, AuthError>> + Send;
}

/// What came back from the browser collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserOutcome {
    /// Redirect URL carrying the authorization code in its query string.
    Redirect(String),
    /// The user dismissed the browser without completing authorization.
    Cancelled,
}

/// A successful sign-in or renewal.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub identity: Identity,
    pub credentials: CredentialSet,
}

/// Drives the protocol operations. Holds the HTTP client, the immutable
/// provider configuration, and the credential store.
pub struct Negotiator {
    http: reqwest::Client,
    config: AuthConfig,
    store: Arc<dyn CredentialStore>,
}

impl Negotiator {
    pub fn new(config: AuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_default();
        Self { http, config, store }
    }

    /// Register a new account. Does not authenticate: the account stays
    /// unconfirmed until [`Negotiator::confirm_sign_up`] succeeds.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        idp::sign_up(
            &self.http,
            &self.config.idp_endpoint(),
            &self.config.client_id,
            username,
            email,
            password,
        )
        .await
    }

    /// Submit the out-of-band confirmation code.
    pub async fn confirm_sign_up(
        &self,
        username: &str,
        code: &str,
    ) -> Result<ConfirmOutcome, AuthError> {
        idp::confirm_sign_up(
            &self.http,
            &self.config.idp_endpoint(),
            &self.config.client_id,
            username,
            code,
        )
        .await
    }

    /// Interactive sign-in via the hosted authorization endpoint.
    ///
    /// The pending verifier is the only state written before the exchange
    /// succeeds, and persisting the credential set is the final step — a
    /// failure anywhere earlier leaves storage without a session marker.
    /// An authorization code arriving without a pending verifier is
    /// rejected.
    pub async fn sign_in<B: AuthBrowser>(&self, browser: &B) -> Result<AuthOutcome, AuthError> {
        let verifier = pkce::generate_code_verifier();
        let challenge = pkce::compute_code_challenge(&verifier);
        self.store.set(CredentialKey::PendingVerifier, &verifier)?;

        let url = pkce::build_authorize_url(
            &self.config.authorize_endpoint(),
            &self.config.client_id,
            &self.config.scopes,
            &self.config.redirect_uri,
            &challenge,
        );

        let redirect = match browser.authorize(&url).await {
            Ok(BrowserOutcome::Redirect(redirect)) => redirect,
            Ok(BrowserOutcome::Cancelled) => {
                self.store.delete(CredentialKey::PendingVerifier)?;
                return Err(AuthError::Cancelled);
            }
            Err(e) => {
                self.store.delete(CredentialKey::PendingVerifier)?;
                return Err(e);
            }
        };

        let Some(code) = extract_code(&redirect) else {
            self.store.delete(CredentialKey::PendingVerifier)?;
            return Err(AuthError::InvalidInput(
                "redirect carried no authorization code".to_owned(),
            ));
        };
        let verifier = self.take_pending_verifier()?;

        let token = oauth::exchange_code(
            &self.http,
            &self.config.token_endpoint(),
            &self.config.client_id,
            &code,
            &verifier,
            &self.config.redirect_uri,
        )
        .await
        .map_err(|e| match e {
            // A code is redeemable promptly and exactly once.
            AuthError::InvalidGrant => AuthError::ExpiredCode,
            other => other,
        })?;

        let decoded = claims::decode(&token.id_token)?;
        let identity = Identity::from_claims(&decoded);
        let credentials = CredentialSet {
            access_token: token.access_token,
            id_token: token.id_token,
            refresh_token: token.refresh_token,
        };
        store::persist_credentials(self.store.as_ref(), &credentials)?;

        tracing::info!(username = %identity.username, "interactive sign-in completed");
        Ok(AuthOutcome { identity, credentials })
    }

    /// Silent renewal via the refresh grant.
    ///
    /// The provider does not reissue the refresh credential; the stored
    /// one is retained. An `invalid_grant` answer means the refresh
    /// credential itself is dead: all three credentials are deleted and
    /// the session is expired.
    pub async fn renew(&self) -> Result<AuthOutcome, AuthError> {
        let Some(refresh_token) = self.store.get(CredentialKey::RefreshToken)? else {
            return Err(AuthError::MissingRefreshToken);
        };

        let token = match oauth::refresh_grant(
            &self.http,
            &self.config.token_endpoint(),
            &self.config.client_id,
            &refresh_token,
        )
        .await
        {
            Ok(token) => token,
            Err(AuthError::InvalidGrant) => {
                store::clear_credentials(self.store.as_ref())?;
                return Err(AuthError::SessionExpired);
            }
            Err(e) => return Err(e),
        };

        let decoded = claims::decode(&token.id_token)?;
        let identity = Identity::from_claims(&decoded);
        let credentials = CredentialSet {
            access_token: token.access_token,
            id_token: token.id_token,
            refresh_token: token.refresh_token.or(Some(refresh_token)),
        };
        store::persist_credentials(self.store.as_ref(), &credentials)?;

        tracing::debug!(username = %identity.username, "credentials renewed");
        Ok(AuthOutcome { identity, credentials })
    }

    /// Local-first sign-out: storage is cleared first and unconditionally;
    /// server-side revocation is best-effort and never blocks.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let refresh_token = self.store.get(CredentialKey::RefreshToken)?;
        store::clear_credentials(self.store.as_ref())?;
        self.store.delete(CredentialKey::PendingVerifier)?;

        if let Some(ref token) = refresh_token {
            if let Err(e) = oauth::revoke(
                &self.http,
                &self.config.revoke_endpoint(),
                &self.config.client_id,
                token,
            )
            .await
            {
                tracing::debug!(err = %e, "best-effort revocation failed");
            }
        }
        Ok(())
    }

    /// Consume the pending verifier: read, delete, and reject the
    /// authorization code when no attempt was pending.
    fn take_pending_verifier(&self) -> Result<String, AuthError> {
        let verifier = self.store.get(CredentialKey::PendingVerifier)?;
        self.store.delete(CredentialKey::PendingVerifier)?;
        verifier.ok_or_else(|| {
            AuthError::InvalidInput("authorization code without a pending sign-in attempt".to_owned())
        })
    }
}

/// Pull the `code` query parameter out of a redirect URL.
fn extract_code(redirect: &str) -> Option<String> {
    let query = redirect.split_once('?').map(|(_, q)| q)?;
    let query = query.split_once('#').map_or(query, |(q, _)| q);
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == "code" && !v.is_empty()).then(|| v.to_owned())
    })
}

#[cfg(test)]
#[path = "negotiator_tests.rs"]
mod tests;
