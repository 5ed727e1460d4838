//! ddns-sync - dynamic DNS updater for Cloudflare and GoDaddy.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ddns_sync::config::Config;
use ddns_sync::detector::{IpDetector, IpSource};
use ddns_sync::providers::create_provider;
use ddns_sync::reconcile::{CycleOutcome, Reconciler};
use ddns_sync::resolver::SystemResolver;
use ddns_sync::server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ddns-sync")]
#[command(about = "Dynamic DNS updater for Cloudflare and GoDaddy")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the update loop (default)
    Run {
        /// Check interval in seconds (overrides the config file)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Status page listen address
        #[arg(long, default_value = server::DEFAULT_STATUS_ADDR)]
        status_addr: SocketAddr,

        /// Do not start the status page
        #[arg(long)]
        no_status: bool,
    },

    /// Run a single update pass and exit
    Once,

    /// Validate configuration
    Validate,

    /// Serve the "what is my IP" echo service
    Echo {
        /// Listen address
        #[arg(short, long, default_value = server::DEFAULT_ECHO_ADDR)]
        listen: SocketAddr,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Commands::Run {
        interval: None,
        status_addr: server::DEFAULT_STATUS_ADDR
            .parse()
            .context("invalid default status address")?,
        no_status: false,
    });

    match command {
        Commands::Run {
            interval,
            status_addr,
            no_status,
        } => {
            let Some(config) = load_or_bootstrap(cli.config)? else {
                return Ok(());
            };
            cmd_run(config, interval, (!no_status).then_some(status_addr)).await
        }
        Commands::Once => {
            let Some(config) = load_or_bootstrap(cli.config)? else {
                return Ok(());
            };
            cmd_once(config).await
        }
        Commands::Validate => {
            let Some(config) = load_or_bootstrap(cli.config)? else {
                return Ok(());
            };
            cmd_validate(config)
        }
        Commands::Echo { listen } => cmd_echo(listen).await,
    }
}

/// Load the config, or write a template and ask the operator to edit it.
fn load_or_bootstrap(cli_path: Option<PathBuf>) -> anyhow::Result<Option<Config>> {
    let path = cli_path.unwrap_or_else(Config::default_path);

    if !path.exists() {
        Config::template()
            .save_to(&path)
            .with_context(|| format!("writing template to {}", path.display()))?;
        println!("Please edit {} first!", path.display());
        return Ok(None);
    }

    tracing::debug!("Loading config from {}", path.display());
    Ok(Some(Config::load_from(&path)?))
}

fn build_reconciler(config: &Config, interval: Duration) -> anyhow::Result<Reconciler> {
    let source = IpSource::parse(&config.ip_server)?;
    let detector = IpDetector::new(source)?;
    let provider = create_provider(config)?;

    tracing::info!(
        "Managing {} via {} (source: {:?})",
        config.fqdn(),
        provider.name(),
        detector.source()
    );

    Ok(Reconciler::new(
        config.fqdn(),
        interval,
        Box::new(SystemResolver::new()),
        Box::new(detector),
        provider,
    ))
}

async fn cmd_run(
    config: Config,
    interval: Option<u64>,
    status_addr: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let interval = Duration::from_secs(interval.unwrap_or(config.interval_secs).max(1));
    let reconciler = build_reconciler(&config, interval)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!("Cannot install signal handlers: {}", e);
                // Keep the sender alive so the loop runs until the process is killed.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    if let Some(addr) = status_addr {
        server::spawn_status_page(addr, shutdown_rx.clone()).await;
    }

    reconciler.run(shutdown_rx).await;
    Ok(())
}

async fn cmd_once(config: Config) -> anyhow::Result<()> {
    let reconciler = build_reconciler(&config, Duration::from_secs(config.interval_secs))?;

    match reconciler.run_once().await {
        CycleOutcome::Unchanged { ip } => println!("{}: unchanged ({})", config.fqdn(), ip),
        CycleOutcome::Updated { previous, current } => {
            println!("{}: updated ({} -> {})", config.fqdn(), previous, current)
        }
        CycleOutcome::UpdateFailed { error, .. } => {
            anyhow::bail!("{}: update failed: {}", config.fqdn(), error)
        }
        CycleOutcome::SourceFailed { error } => {
            anyhow::bail!("{}: could not detect IP: {}", config.fqdn(), error)
        }
    }

    Ok(())
}

fn cmd_validate(config: Config) -> anyhow::Result<()> {
    let source = IpSource::parse(&config.ip_server)?;
    let provider = create_provider(&config)?;

    println!("Configuration OK");
    println!("  provider: {}", provider.name());
    println!("  record:   {} {}", config.record_type, config.fqdn());
    println!("  source:   {:?}", source);
    println!("  interval: {}s", config.interval_secs);
    Ok(())
}

async fn cmd_echo(listen: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding echo service to {}", listen))?;

    let stop = async {
        if let Err(e) = wait_for_shutdown().await {
            tracing::error!("Cannot install signal handlers: {}", e);
            std::future::pending::<()>().await;
        }
    };

    server::serve(listener, server::echo_router(), stop).await?;
    Ok(())
}

async fn wait_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C");
        Ok(())
    }
}
