//! Charter CLI - governed change proposals from the terminal
//!
//! - list pending proposals and their quorum progress
//! - sign, approve or withdraw a proposal
//! - evaluate paths against the intent guard
//! - run enforcement checks against the repository
//! - generate approver keys and print approval tokens
//!
//! Every typed failure exits with status 1.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use charter_lifecycle::{EngineConfig, CONFIG_ENV};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::{keys, policy, proposal};
pub use output::OutputFormat;

/// Charter CLI application
#[derive(Debug, Parser)]
#[command(name = "charter")]
#[command(about = "Charter - constitutional change control", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine configuration file
    #[arg(short, long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Repository root (overrides the config file)
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Enforce blocking policy-tier rules
    #[arg(long)]
    pub strict: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List pending proposals
    List,

    /// Sign a proposal's current content
    Sign {
        /// Proposal name (cr-<id>)
        name: String,
        /// Approver identity
        #[arg(long)]
        identity: String,
        /// PKCS#8 PEM signing key
        #[arg(long)]
        key: PathBuf,
    },

    /// Validate, canary-test and apply a proposal
    Approve {
        name: String,
    },

    /// Delete a pending proposal
    Withdraw {
        name: String,
    },

    /// Evaluate paths against the intent guard
    Evaluate {
        #[arg(required = true)]
        paths: Vec<String>,
        /// The change only touches metadata
        #[arg(long)]
        metadata_only: bool,
    },

    /// Run enforcement checks declared in the policy store
    Check {
        /// Only run checks for this policy
        #[arg(long)]
        policy: Option<String>,
    },

    /// Generate an approver key pair
    Keygen {
        identity: String,
        /// Directory for `<identity>.pem` and `<identity>.pub.pem`
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Print the approval token of a proposal
    Token {
        name: String,
    },
}

/// Run using the current process arguments.
pub async fn run() -> anyhow::Result<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let filter = if cli.verbose { "debug" } else { "info" };
    // A subscriber may already be installed when run repeatedly in-process.
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .try_init();

    let config = load_config(&cli)?;
    let format = cli.output;

    match cli.command {
        Commands::List => proposal::list(&config, format),
        Commands::Sign {
            name,
            identity,
            key,
        } => proposal::sign(&config, &name, &identity, &key, format),
        Commands::Approve { name } => proposal::approve(&config, &name, format).await,
        Commands::Withdraw { name } => proposal::withdraw(&config, &name),
        Commands::Token { name } => proposal::token(&config, &name),
        Commands::Evaluate {
            paths,
            metadata_only,
        } => policy::evaluate(&config, &paths, metadata_only, format),
        Commands::Check { policy: only } => policy::check(&config, only.as_deref(), format).await,
        Commands::Keygen { identity, out_dir } => keys::keygen(&identity, &out_dir),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let path = cli.config.clone().unwrap_or_else(EngineConfig::default_path);
    let mut config = EngineConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    if let Some(repo) = &cli.repo {
        config.repo_root = repo.clone();
    }
    if cli.strict {
        config.strict_mode = true;
    }
    Ok(config)
}
