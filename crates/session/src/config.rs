// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Identity-provider and renewal configuration for the session core.
///
/// Read once at startup and immutable afterwards.
#[derive(Debug, Clone, clap::Args)]
pub struct AuthConfig {
    /// Identity-provider region (selects the direct-API host).
    #[arg(long, env = "SOUQ_IDP_REGION", default_value = "eu-north-1")]
    pub region: String,

    /// Hosted authorization domain, without scheme.
    #[arg(long, env = "SOUQ_IDP_DOMAIN")]
    pub domain: String,

    /// App client id registered with the identity provider.
    #[arg(long, env = "SOUQ_IDP_CLIENT_ID")]
    pub client_id: String,

    /// Redirect target the authorization server sends the code back to.
    #[arg(long, env = "SOUQ_REDIRECT_URI", default_value = "souq://signin/")]
    pub redirect_uri: String,

    /// Space-separated scopes requested on interactive sign-in.
    #[arg(long, env = "SOUQ_SCOPES", default_value = "openid email profile")]
    pub scopes: String,

    /// Renewal scheduler tick interval in seconds.
    #[arg(long, default_value_t = 180, env = "SOUQ_RENEW_INTERVAL_SECS")]
    pub renew_interval_secs: u64,

    /// Proactive-renewal margin: renew once expiry is this close, in seconds.
    #[arg(long, default_value_t = 60, env = "SOUQ_RENEW_MARGIN_SECS")]
    pub renew_margin_secs: u64,

    /// HTTP timeout for identity-provider calls, in seconds.
    #[arg(long, default_value_t = 30, env = "SOUQ_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: u64,

    /// Point every identity-provider endpoint at one base URL (local
    /// stacks and tests).
    #[arg(long, hide = true, env = "SOUQ_IDP_ENDPOINT_OVERRIDE")]
    pub endpoint_override: Option<String>,
}

impl AuthConfig {
    /// Hosted authorization endpoint (browser-delegated).
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth2/authorize", self.hosted_base())
    }

    /// Token endpoint for code and refresh grants.
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.hosted_base())
    }

    /// Best-effort revocation endpoint.
    pub fn revoke_endpoint(&self) -> String {
        format!("{}/oauth2/revoke", self.hosted_base())
    }

    /// Direct-API endpoint (registration and confirmation).
    pub fn idp_endpoint(&self) -> String {
        match self.endpoint_override {
            Some(ref base) => format!("{}/", base.trim_end_matches('/')),
            None => format!("https://cognito-idp.{}.amazonaws.com/", self.region),
        }
    }

    pub fn renew_interval(&self) -> Duration {
        Duration::from_secs(self.renew_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn hosted_base(&self) -> String {
        match self.endpoint_override {
            Some(ref base) => base.trim_end_matches('/').to_owned(),
            None => format!("https://{}", self.domain),
        }
    }
}
