// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `signup`, `confirm`, `login`, `status`, `renew`,
//! `logout`.

use std::sync::Arc;

use souq_session::{
    claims, AuthConfig, CredentialStore, FileStore, SessionService, SessionState,
};

use crate::browser::StdinBrowser;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Register a new account with the identity provider.
    Signup(SignupArgs),
    /// Submit the emailed confirmation code for a new account.
    Confirm(ConfirmArgs),
    /// Interactive sign-in via the hosted authorization page.
    Login,
    /// Show the current session status.
    Status,
    /// Force a silent renewal of the current session.
    Renew,
    /// Sign out and clear stored credentials.
    Logout,
}

#[derive(Debug, clap::Args)]
pub struct SignupArgs {
    /// Username for the new account.
    pub username: String,
    /// Email address the confirmation code is sent to.
    #[arg(long)]
    pub email: String,
    /// Password for the new account.
    #[arg(long, env = "SOUQ_PASSWORD")]
    pub password: String,
}

#[derive(Debug, clap::Args)]
pub struct ConfirmArgs {
    /// Username of the account to confirm.
    pub username: String,
    /// Confirmation code from the email.
    pub code: String,
}

/// Run a subcommand. Returns a process exit code.
pub async fn run(config: &AuthConfig, command: &Command) -> i32 {
    let store = Arc::new(FileStore::at_default_location()) as Arc<dyn CredentialStore>;
    let service = SessionService::new(config.clone(), store);

    if let Err(e) = service.restore().await {
        eprintln!("warning: could not restore persisted session: {e}");
    }

    let code = match command {
        Command::Signup(args) => cmd_signup(&service, args).await,
        Command::Confirm(args) => cmd_confirm(&service, args).await,
        Command::Login => cmd_login(&service).await,
        Command::Status => cmd_status(&service).await,
        Command::Renew => cmd_renew(&service).await,
        Command::Logout => cmd_logout(&service).await,
    };

    service.shutdown();
    code
}

async fn cmd_signup(service: &Arc<SessionService>, args: &SignupArgs) -> i32 {
    match service.sign_up(&args.username, &args.email, &args.password).await {
        Ok(outcome) => {
            println!(
                "Account '{}' created. Check {} for the confirmation code, then run:",
                outcome.username, outcome.email,
            );
            println!("  souq confirm {} <code>", outcome.username);
            0
        }
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            1
        }
    }
}

async fn cmd_confirm(service: &Arc<SessionService>, args: &ConfirmArgs) -> i32 {
    match service.confirm_sign_up(&args.username, &args.code).await {
        Ok(outcome) => {
            println!("Account '{}' confirmed. Run `souq login` to sign in.", outcome.username);
            0
        }
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            1
        }
    }
}

async fn cmd_login(service: &Arc<SessionService>) -> i32 {
    match service.sign_in(&StdinBrowser).await {
        Ok(identity) => {
            println!("Signed in as {}.", identity.username);
            0
        }
        Err(e) if e.as_str() == "cancelled" => {
            println!("Sign-in cancelled.");
            0
        }
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            1
        }
    }
}

async fn cmd_status(service: &Arc<SessionService>) -> i32 {
    match service.snapshot().await {
        SessionState::Authenticated { identity, credentials }
        | SessionState::RenewalInFlight { identity, credentials } => {
            println!("Signed in as {} ({})", identity.username, identity.subject_id);
            if let Some(ref email) = identity.email {
                println!("  email:   {email}");
            }
            match claims::decode(&credentials.id_token) {
                Ok(decoded) => {
                    let now = claims::epoch_secs();
                    if decoded.exp > now {
                        println!("  expires: in {}s", decoded.exp - now);
                    } else {
                        println!("  expires: {}s ago", now - decoded.exp);
                    }
                }
                Err(e) => println!("  expires: unknown ({e})"),
            }
            println!("  refresh: {}", if credentials.refresh_token.is_some() { "yes" } else { "no" });
            0
        }
        SessionState::Failed { error } => {
            println!("Not signed in (last attempt failed: {error}).");
            1
        }
        _ => {
            println!("Not signed in.");
            1
        }
    }
}

async fn cmd_renew(service: &Arc<SessionService>) -> i32 {
    match service.renew().await {
        Ok(identity) => {
            println!("Session renewed for {}.", identity.username);
            0
        }
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            1
        }
    }
}

async fn cmd_logout(service: &Arc<SessionService>) -> i32 {
    match service.sign_out().await {
        Ok(()) => {
            println!("Signed out.");
            0
        }
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            1
        }
    }
}
