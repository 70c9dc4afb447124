//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "glance")]
#[command(
    author,
    version,
    about = "Glanceable glucose readings from a CGM share service",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (defaults to <config dir>/glance/config.toml)
    #[arg(short, long, global = true, env = "GLANCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Share account arguments, each overriding the `[account]` section
#[derive(Debug, Clone, Default, Args)]
pub struct AccountArgs {
    /// Share account username
    #[arg(short, long, env = "GLANCE_USERNAME")]
    pub username: Option<String>,

    /// Share account password
    #[arg(short, long, env = "GLANCE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Share server: "us", "non_us", or a base URL
    #[arg(short, long)]
    pub server: Option<String>,
}

/// Local store arguments
#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Reading database (overrides `[storage] path`)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Neither load nor save readings locally
    #[arg(long, conflicts_with = "database")]
    pub no_store: bool,
}

#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also list the readings behind the current value (0 for none)
    #[arg(long, default_value = "0")]
    pub history: usize,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch once and show the current reading
    Check {
        #[command(flatten)]
        account: AccountArgs,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Keep polling and print each new reading until interrupted
    Watch {
        #[command(flatten)]
        account: AccountArgs,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Show the last stored reading without touching the network
    Show {
        /// Reading database (overrides `[storage] path`)
        #[arg(long)]
        database: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show the placeholder display, then a fixed example reading
    Demo {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration (password hidden)
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
