// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal stand-in for the interactive browser collaborator.

use std::future::Future;

use tokio::io::{AsyncBufReadExt, BufReader};

use souq_session::{AuthBrowser, AuthError, BrowserOutcome};

/// Prints the authorization URL, best-effort opens it in the platform
/// browser, then reads the pasted redirect URL from stdin. An empty line
/// cancels the attempt.
pub struct StdinBrowser;

impl AuthBrowser for StdinBrowser {
    fn authorize(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<BrowserOutcome, AuthError>> + Send {
        let url = url.to_owned();
        async move {
            println!("Open this URL to sign in:");
            println!("  {url}");
            open_in_browser(&url);
            println!("Paste the redirect URL here (empty line to cancel):");

            let mut line = String::new();
            let mut stdin = BufReader::new(tokio::io::stdin());
            let _ = stdin
                .read_line(&mut line)
                .await
                .map_err(|e| AuthError::InvalidInput(format!("could not read redirect: {e}")))?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Ok(BrowserOutcome::Cancelled);
            }
            Ok(BrowserOutcome::Redirect(trimmed.to_owned()))
        }
    }
}

fn open_in_browser(url: &str) {
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open").arg(url).spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open").arg(url).spawn();
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = url;
    }
}
