use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use glance_cli::cli::{Cli, Commands};
use glance_cli::commands;
use glance_cli::config::{Config, default_config_path};
use glance_cli::format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.quiet {
        "glance=warn"
    } else if cli.verbose {
        "glance=debug"
    } else {
        "glance=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load_or_default(&config_path)?;
    let opts = FormatOptions::new(cli.no_color);

    match cli.command {
        Commands::Check {
            account,
            store,
            output,
        } => commands::cmd_check(&account, &store, &output, &config, &opts).await,
        Commands::Watch { account, store } => {
            commands::cmd_watch(&account, &store, &config, &opts).await
        }
        Commands::Show { database, output } => {
            commands::cmd_show(database, &output, &config, &opts).await
        }
        Commands::Demo { output } => commands::cmd_demo(&output, &config, &opts).await,
        Commands::Config { action } => commands::cmd_config(&action, &config_path, &config),
    }
}
