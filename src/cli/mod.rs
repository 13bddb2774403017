//! CLI module for Ocarina.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Version display
//! - Thin command handlers over the dispatcher, session manager, task
//!   poller and hashing engine
//!
//! # Usage
//!
//! ```ignore
//! use clap::Parser;
//! use ocarina::cli::{run_cli_command, Cli};
//!
//! let cli = Cli::parse();
//! if let Err(err) = runtime.block_on(run_cli_command(cli)) {
//!     eprintln!("{}", err);
//!     std::process::exit(err.exit_code());
//! }
//! ```

pub mod args;
pub mod version;

pub use args::{Cli, Command, OauthCommand, TaskArgs};
pub use version::{handle_version_command, user_agent, VERSION};

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::adapters::{ReqwestHttpClient, TerminalPrompt};
use crate::auth::SessionManager;
use crate::config::Config;
use crate::dispatch::{AuthScheme, ClientContext, Dispatcher, Payload};
use crate::endpoints;
use crate::error::{ClientResult, UsageError};
use crate::hashing::{self, HashAlgorithm, HashConfig, HashResult};
use crate::task::{delete_task, wait_for_task};
use crate::traits::HttpClient;

/// Run the parsed command to completion.
///
/// Results are printed to stdout; every failure is returned so the caller
/// can turn it into an exit status.
pub async fn run_cli_command(cli: Cli) -> ClientResult<()> {
    match &cli.command {
        Command::Version => {
            handle_version_command();
            Ok(())
        }
        Command::Hash {
            path,
            algorithm,
            skip_hash,
        } => handle_hash_command(path, *algorithm, *skip_hash),
        Command::Config => {
            let config = load_config(&cli)?;
            print!("{}", config);
            Ok(())
        }
        Command::Emit { endpoint, json } => {
            let endpoint = endpoints::lookup(endpoint)?;
            let payload = parse_payload(json, cli.angry)?;
            let mut dispatcher = dispatcher(&cli, load_config(&cli)?, None);
            let response = dispatcher.emit(endpoint, payload).await?;
            println!("{}", pretty(&response));
            Ok(())
        }
        Command::Task(args) => {
            let mut dispatcher = dispatcher(&cli, load_config(&cli)?, args.scope.clone());
            let response = wait_for_task(
                &mut dispatcher,
                Some(args.task_id.as_str()),
                None,
                !args.no_wait,
                &args.poll_config(),
            )
            .await?;
            println!("{}", pretty(&response));

            if args.delete && !delete_task(&mut dispatcher, &args.task_id).await {
                eprintln!("Could not delete the result of task {}", args.task_id);
            }
            Ok(())
        }
        Command::Oauth(command) => {
            let config = load_config(&cli)?;
            let sessions = SessionManager::new(&config, http_client(), prompt(&cli));
            handle_oauth_command(&sessions, command).await
        }
    }
}

fn handle_hash_command(path: &Path, algorithm: HashAlgorithm, skip_hash: bool) -> ClientResult<()> {
    let result = if skip_hash {
        HashResult::skipped()
    } else {
        hashing::hash_file(path, algorithm, &HashConfig::default())?
    };
    println!("{}", pretty(&result));
    Ok(())
}

async fn handle_oauth_command(sessions: &SessionManager, command: &OauthCommand) -> ClientResult<()> {
    match command {
        OauthCommand::Authorise { scope } => {
            let session = sessions.authorise(scope).await?;
            println!("Authorised '{}' until {}", session.scope, format_expiry(session.expires_at));
            Ok(())
        }
        OauthCommand::Refresh => {
            let outcomes = sessions.refresh_all().await?;
            if outcomes.is_empty() {
                println!("No stored sessions to refresh");
            }

            let mut first_error = None;
            for outcome in outcomes {
                match outcome.result {
                    Ok(expires_at) => {
                        println!("Refreshed '{}' until {}", outcome.scope, format_expiry(expires_at));
                    }
                    Err(err) => {
                        println!("Could not refresh '{}': {}", outcome.scope, err);
                        first_error.get_or_insert(err);
                    }
                }
            }

            match first_error {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<Config> {
    let config = Config::load(cli.env, cli.profile.as_deref())?;
    if show_banner(&config, cli.quiet) {
        eprintln!("{} => {}", user_agent(), config.domain);
    }
    Ok(config)
}

fn show_banner(config: &Config, quiet: bool) -> bool {
    !(quiet || config.quiet || config.no_banner)
}

fn http_client() -> Arc<dyn HttpClient> {
    Arc::new(ReqwestHttpClient::new())
}

fn prompt(cli: &Cli) -> Box<TerminalPrompt> {
    Box::new(TerminalPrompt::new(!cli.no_interactive))
}

fn dispatcher(cli: &Cli, config: Config, active_scope: Option<String>) -> Dispatcher {
    let scheme = if cli.oauth {
        AuthScheme::Bearer
    } else {
        AuthScheme::SharedSecret
    };
    let ctx = ClientContext::new(config, scheme)
        .with_interactive(!cli.no_interactive)
        .with_sudo_as(cli.sudo_as.clone())
        .with_quiet(cli.quiet)
        .with_active_scope(active_scope);

    Dispatcher::new(ctx, http_client(), prompt(cli))
}

/// Parse a command-line JSON payload, which must be an object.
pub fn parse_payload(raw: &str, angry: bool) -> Result<Payload, UsageError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| UsageError::InvalidPayload {
        message: e.to_string(),
    })?;

    let Value::Object(mut payload) = value else {
        return Err(UsageError::InvalidPayload {
            message: "expected a JSON object".to_string(),
        });
    };

    if angry {
        payload.insert("angry".to_string(), Value::Bool(true));
    }
    Ok(payload)
}

fn format_expiry(expires_at: i64) -> String {
    chrono::DateTime::from_timestamp(expires_at, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| expires_at.to_string())
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
