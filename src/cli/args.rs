//! Command-line argument parsing for Ocarina.
//!
//! Global flags select the configuration source and authentication scheme;
//! the subcommand picks which component to drive.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::hashing::HashAlgorithm;
use crate::task::PollConfig;

/// Parsed command line.
///
/// # Examples
///
/// ```
/// use clap::Parser;
/// use ocarina::cli::args::{Cli, Command};
///
/// let cli = Cli::try_parse_from(["ocarina", "--oauth", "version"]).unwrap();
/// assert!(cli.oauth);
/// assert_eq!(cli.command, Command::Version);
/// ```
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "ocarina", version, about = "Client for the Majora metadata service")]
pub struct Cli {
    /// Read configuration from the environment instead of the config file
    #[arg(long, global = true)]
    pub env: bool,

    /// Configuration profile to overlay on the top-level keys
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Authenticate with a scoped bearer session
    #[arg(long, global = true)]
    pub oauth: bool,

    /// Never prompt for an authorization grant
    #[arg(long = "no-interactive", global = true)]
    pub no_interactive: bool,

    /// Act on behalf of another user
    #[arg(long = "sudo-as", global = true, value_name = "USER")]
    pub sudo_as: Option<String>,

    /// Suppress request and response echoes on success
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Fail when the service reports errors in a successful response
    #[arg(long, global = true)]
    pub angry: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Show version information
    Version,

    /// Compute the content digest of a local file
    Hash {
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = HashAlgorithm::Md5)]
        algorithm: HashAlgorithm,

        /// Report the "skipped" digest without reading the file
        #[arg(long = "skip-hash")]
        skip_hash: bool,
    },

    /// Send one registry endpoint a JSON payload
    Emit {
        /// Dotted endpoint name, e.g. api.artifact.biosample.get
        endpoint: String,

        /// JSON object to send
        #[arg(long, value_name = "PAYLOAD", default_value = "{}")]
        json: String,
    },

    /// Wait for an asynchronous task to finish
    Task(TaskArgs),

    /// Manage bearer sessions
    #[command(subcommand)]
    Oauth(OauthCommand),

    /// Print the resolved configuration with secrets masked
    Config,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct TaskArgs {
    pub task_id: String,

    /// Query the status once
    #[arg(long = "no-wait")]
    pub no_wait: bool,

    /// Maximum number of status queries
    #[arg(long, default_value_t = 30)]
    pub attempts: u32,

    /// Minutes between status queries
    #[arg(long, default_value_t = 1)]
    pub interval: u64,

    /// Delete the task result once it succeeds
    #[arg(long)]
    pub delete: bool,

    /// Bearer scope the task was created under
    #[arg(long)]
    pub scope: Option<String>,
}

impl TaskArgs {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            attempts: self.attempts,
            interval_minutes: self.interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum OauthCommand {
    /// Run an interactive grant for a scope
    #[command(alias = "authorize")]
    Authorise {
        #[arg(long)]
        scope: String,
    },

    /// Refresh every stored session
    Refresh,
}
