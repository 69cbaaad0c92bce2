// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Myemtee - command-line client for the Myemtee mood tracker.
//!
//! Signs in against the user pool, keeps the session in the local credential
//! store, and seals or opens mood entries with the per-user key.

mod account;
mod entries;
mod prompt;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use myemtee_core::MyemteeError;

use crate::account::Client;

/// Myemtee - mood tracker client.
#[derive(Parser, Debug)]
#[command(name = "myemtee", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in with username and password, answering MFA if required.
    Login {
        username: String,
        /// Remember this device without asking.
        #[arg(long)]
        remember: bool,
    },
    /// Revoke the session and clear stored credentials.
    Logout,
    /// Print the signed-in user's profile.
    Whoami {
        /// Fetch the profile again instead of using the cached copy.
        #[arg(long)]
        refresh: bool,
    },
    /// Print a live token, refreshing the session if needed.
    Token {
        /// Print the identity token instead of the access token.
        #[arg(long)]
        id: bool,
    },
    /// Create an account. The email is the username.
    Signup {
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Confirm a new account with the emailed code.
    ConfirmSignup { username: String, code: String },
    /// Request a password reset code.
    ForgotPassword { username: String },
    /// Set a new password using a reset code.
    ResetPassword { username: String, code: String },
    /// Show device trust for a user, or change the remember-device prompt.
    RememberDevice {
        username: String,
        /// Never offer to remember this device.
        #[arg(long, conflicts_with = "ask")]
        never: bool,
        /// Offer to remember this device again at next login.
        #[arg(long)]
        ask: bool,
    },
    /// Stop trusting this device; MFA is required at next login.
    ForgetDevice { username: String },
    /// Encrypt entries (JSON object or array) for upload.
    Encrypt {
        /// Input file; stdin when omitted.
        input: Option<PathBuf>,
        /// Identity claim to key with instead of the signed-in user's.
        #[arg(long)]
        identity: Option<String>,
    },
    /// Decrypt entries (JSON object or array) as received from the backend.
    Decrypt {
        input: Option<PathBuf>,
        #[arg(long)]
        identity: Option<String>,
    },
    /// Daily average moods for a month from history-endpoint JSON.
    Calendar {
        /// Month as YYYY-MM.
        month: String,
        input: Option<PathBuf>,
        #[arg(long)]
        identity: Option<String>,
        /// Ignore the cached month and recompute.
        #[arg(long)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match myemtee_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            myemtee_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.app.log_level);

    let result = match Client::open(config) {
        Ok(client) => {
            let result = run(&client, cli.command).await;
            client.close().await;
            result
        }
        Err(e) => run_offline(cli.command, e).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(exit_code(&e));
    }
}

async fn run(client: &Client, command: Commands) -> Result<(), MyemteeError> {
    match command {
        Commands::Login { username, remember } => {
            account::login(client, &username, remember).await
        }
        Commands::Logout => account::logout(client).await,
        Commands::Whoami { refresh } => account::whoami(client, refresh).await,
        Commands::Token { id } => account::token(client, id).await,
        Commands::Signup { email, name } => account::signup(client, &email, &name).await,
        Commands::ConfirmSignup { username, code } => {
            account::confirm_signup(client, &username, &code).await
        }
        Commands::ForgotPassword { username } => account::forgot_password(client, &username).await,
        Commands::ResetPassword { username, code } => {
            account::reset_password(client, &username, &code).await
        }
        Commands::RememberDevice {
            username,
            never,
            ask,
        } => {
            let preference = match (never, ask) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            account::remember_device(client, &username, preference).await
        }
        Commands::ForgetDevice { username } => account::forget_device(client, &username).await,
        Commands::Encrypt { input, identity } => {
            entries::encrypt(Some(client), input.as_deref(), identity).await
        }
        Commands::Decrypt { input, identity } => {
            entries::decrypt(Some(client), input.as_deref(), identity).await
        }
        Commands::Calendar {
            month,
            input,
            identity,
            refresh,
        } => entries::calendar(client, &month, input.as_deref(), identity, refresh).await,
    }
}

/// Commands that still work when no user pool is configured: sealing and
/// opening entries for an explicit identity. Anything else reports `err`.
async fn run_offline(command: Commands, err: MyemteeError) -> Result<(), MyemteeError> {
    match command {
        Commands::Encrypt {
            input,
            identity: Some(identity),
        } => entries::encrypt(None, input.as_deref(), Some(identity)).await,
        Commands::Decrypt {
            input,
            identity: Some(identity),
        } => entries::decrypt(None, input.as_deref(), Some(identity)).await,
        _ => Err(err),
    }
}

/// Exit status: 2 for "sign in first", 1 for everything else.
fn exit_code(err: &MyemteeError) -> i32 {
    match err {
        MyemteeError::NotAuthenticated | MyemteeError::NotAuthorized(_) => 2,
        _ => 1,
    }
}

/// Initialize the tracing subscriber on stderr, leaving stdout for output.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("myemtee={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
