//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use time::OffsetDateTime;
use tracing::{info, warn};

use glance_core::{
    DisplayOptions, ExampleProvider, GlanceMetrics, GlanceOptions, GlucoseMonitor,
    GlucoseProvider, RETENTION_WINDOW, Reading, ShareClient, ShareServer, retain_window,
};
use glance_store::ReadingStore;

use crate::cli::{AccountArgs, ConfigAction, OutputArgs, OutputFormat, StoreArgs};
use crate::config::Config;
use crate::format::{FormatOptions, GlanceSnapshot, format_glance, format_history, format_json};

/// How often `watch` re-checks staleness between readings.
const WATCH_TICK: Duration = Duration::from_secs(15);

/// Share account details after command-line flags are applied over the config file.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub server: ShareServer,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

impl Credentials {
    /// Flags win over the `[account]` section. Username and password are required.
    pub fn resolve(args: &AccountArgs, config: &Config) -> Result<Self> {
        let username = args
            .username
            .clone()
            .or_else(|| config.account.username.clone())
            .filter(|u| !u.trim().is_empty())
            .context(
                "No share username: pass --username, set GLANCE_USERNAME, \
                 or add `username` to the [account] section of the config file",
            )?;
        let password = args
            .password
            .clone()
            .or_else(|| config.account.password.clone())
            .filter(|p| !p.is_empty())
            .context(
                "No share password: pass --password, set GLANCE_PASSWORD, \
                 or add `password` to the [account] section of the config file",
            )?;
        let server = args
            .server
            .as_deref()
            .unwrap_or(&config.account.server)
            .parse::<ShareServer>()?;

        Ok(Self {
            username,
            password,
            server,
        })
    }
}

/// Database to use, or `None` when local storage is off.
pub fn resolve_store_path(args: &StoreArgs, config: &Config) -> Option<PathBuf> {
    if args.no_store {
        return None;
    }
    match &args.database {
        Some(path) => Some(path.clone()),
        None if config.storage.enabled => Some(config.storage.path.clone()),
        None => None,
    }
}

fn monitor_options(config: &Config) -> Result<GlanceOptions> {
    config.validate()?;
    let options = config.to_options();
    options.validate()?;
    Ok(options)
}

fn build_monitor(
    provider: Arc<dyn GlucoseProvider>,
    options: GlanceOptions,
    store_path: Option<PathBuf>,
) -> Arc<GlucoseMonitor> {
    let monitor = match store_path {
        Some(path) => GlucoseMonitor::with_store(provider, options, ReadingStore::new(path)),
        None => GlucoseMonitor::new(provider, options),
    };
    Arc::new(monitor)
}

fn live_monitor(account: &AccountArgs, store: &StoreArgs, config: &Config) -> Result<Arc<GlucoseMonitor>> {
    let options = monitor_options(config)?;
    let credentials = Credentials::resolve(account, config)?;
    info!(
        "Using share server {} as {}",
        credentials.server, credentials.username
    );
    let client = ShareClient::from_options(
        credentials.username,
        credentials.password,
        credentials.server,
        &options.polling,
    )?;
    Ok(build_monitor(
        Arc::new(client),
        options,
        resolve_store_path(store, config),
    ))
}

fn print_glance(
    metrics: &GlanceMetrics,
    readings: &[Reading],
    last_error: Option<String>,
    output: &OutputArgs,
    display: &DisplayOptions,
    opts: &FormatOptions,
) -> Result<()> {
    let history: Vec<Reading> = readings.iter().take(output.history).copied().collect();
    match output.format {
        OutputFormat::Text => {
            println!("{}", format_glance(metrics, opts));
            if !history.is_empty() {
                print!("{}", format_history(&history, display, opts));
            }
        }
        OutputFormat::Json => {
            let snapshot = GlanceSnapshot::new(metrics)
                .with_history(history)
                .with_last_error(last_error);
            println!("{}", format_json(&snapshot)?);
        }
    }
    Ok(())
}

fn print_warning(message: &str, opts: &FormatOptions) {
    if opts.no_color {
        eprintln!("warning: {message}");
    } else {
        eprintln!("{} {message}", "warning:".yellow().bold());
    }
}

/// Fetch once, print the glance, and fail if the fetch did.
pub async fn cmd_check(
    account: &AccountArgs,
    store: &StoreArgs,
    output: &OutputArgs,
    config: &Config,
    opts: &FormatOptions,
) -> Result<()> {
    let monitor = live_monitor(account, store, config)?;
    monitor.start().await?;

    let last_error = monitor.last_error();
    print_glance(
        &monitor.metrics(),
        &monitor.readings(),
        last_error.clone(),
        output,
        &monitor.options().display,
        opts,
    )?;
    monitor.shutdown().await?;

    if let Some(error) = last_error {
        bail!("Fetch failed: {error}");
    }
    Ok(())
}

/// Poll until Ctrl-C, printing a line per new reading and when the
/// current one goes stale.
pub async fn cmd_watch(
    account: &AccountArgs,
    store: &StoreArgs,
    config: &Config,
    opts: &FormatOptions,
) -> Result<()> {
    let monitor = live_monitor(account, store, config)?;
    monitor.start().await?;

    let mut readings_rx = monitor.subscribe();
    let mut errors_rx = monitor.subscribe_errors();
    readings_rx.mark_unchanged();
    errors_rx.mark_unchanged();

    println!("{}", format_glance(&monitor.metrics(), opts));
    if let Some(error) = monitor.last_error() {
        print_warning(&error, opts);
    }
    let mut was_stale = monitor.is_stale();

    let mut tick = tokio::time::interval(WATCH_TICK);
    tick.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, stopping");
                break;
            }
            changed = readings_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                readings_rx.mark_unchanged();
                println!("{}", format_glance(&monitor.metrics(), opts));
                was_stale = monitor.is_stale();
            }
            changed = errors_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let error = errors_rx.borrow_and_update().clone();
                if let Some(error) = error {
                    print_warning(&error, opts);
                }
            }
            _ = tick.tick() => {
                let stale = monitor.is_stale();
                if stale != was_stale {
                    println!("{}", format_glance(&monitor.metrics(), opts));
                    was_stale = stale;
                }
            }
        }
    }

    monitor.shutdown().await?;
    Ok(())
}

/// Print what the local store holds, without any network access.
pub async fn cmd_show(
    database: Option<PathBuf>,
    output: &OutputArgs,
    config: &Config,
    opts: &FormatOptions,
) -> Result<()> {
    let options = monitor_options(config)?;
    let path = database.unwrap_or_else(|| config.storage.path.clone());

    let mut store = ReadingStore::new(&path);
    let stored = tokio::task::spawn_blocking(move || store.load())
        .await
        .context("Store task failed")?
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let now = OffsetDateTime::now_utc();
    let readings = retain_window(&stored, now, RETENTION_WINDOW);
    if readings.is_empty() {
        warn!("No readings from the last 24 hours in {}", path.display());
    }

    let metrics = GlanceMetrics::compute(&readings, now, &options.display);
    print_glance(&metrics, &readings, None, output, &options.display, opts)
}

/// Show the placeholder, then one fetch from the example provider.
pub async fn cmd_demo(output: &OutputArgs, config: &Config, opts: &FormatOptions) -> Result<()> {
    let options = monitor_options(config)?;
    let monitor = build_monitor(Arc::new(ExampleProvider::new()), options, None);

    if output.format == OutputFormat::Text {
        let label = "before first fetch:";
        if opts.no_color {
            println!("{label}");
        } else {
            println!("{}", label.dimmed());
        }
        println!("{}", format_glance(&monitor.metrics(), opts));
    }

    monitor.check_for_new_readings().await;

    if output.format == OutputFormat::Text {
        let label = "after first fetch:";
        if opts.no_color {
            println!("{label}");
        } else {
            println!("{}", label.dimmed());
        }
    }
    print_glance(
        &monitor.metrics(),
        &monitor.readings(),
        monitor.last_error(),
        output,
        &monitor.options().display,
        opts,
    )?;
    monitor.shutdown().await?;
    Ok(())
}

/// `config path`, `config show` and `config init`.
pub fn cmd_config(action: &ConfigAction, path: &Path, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => print!("{}", config.redacted().to_toml()?),
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
