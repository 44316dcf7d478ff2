// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proactive credential renewal, decoupled from any screen's lifetime.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::claims;
use crate::service::SessionService;
use crate::store::CredentialKey;

/// Spawn the recurring renewal check.
///
/// Ticks immediately on activation and then on a fixed interval until the
/// token is cancelled. Each tick reads the identity credential from the
/// store, decodes it, and renews once expiry is within the configured
/// margin. A decode failure or an absent credential is "nothing to renew",
/// and no tick failure terminates the task itself.
pub(crate) fn spawn_renewal_task(service: Arc<SessionService>, cancel: CancellationToken) {
    let interval = service.config().renew_interval();
    let margin = service.config().renew_margin_secs;

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            let id_token = match service.store().get(CredentialKey::IdToken) {
                Ok(Some(token)) => token,
                Ok(None) => {
                    tracing::debug!("no identity credential stored, nothing to renew");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(err = %e, "credential store read failed during renewal tick");
                    continue;
                }
            };

            let decoded = match claims::decode(&id_token) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(err = %e, "identity credential undecodable, nothing to renew");
                    continue;
                }
            };

            let now = claims::epoch_secs();
            let remaining = decoded.exp.saturating_sub(now);
            if decoded.exp > now && remaining >= margin {
                continue;
            }

            tracing::info!(remaining_secs = remaining, "identity credential near expiry, renewing");
            service.renew_tick().await;
        }
    });
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
