//! Prometheus exporter for Smart Maic power meters.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use smart_maic_exporter::config::LogFormat;
use smart_maic_exporter::{DeviceClient, ExporterConfig, HttpServer, MetricRegistry};

/// Prometheus exporter for Smart Maic power meters.
#[derive(Parser, Debug)]
#[command(name = "smart-maic-exporter")]
#[command(about = "Export Smart Maic power meter readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Device data URL (overrides config).
    #[arg(long)]
    url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Apply CLI overrides, then re-check; a bad URL or listen address must
    // abort before any request is served.
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(url) = args.url {
        config.device.url = url;
    }
    config.validate()?;

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("smart_maic_exporter={}", log_level).parse()?)
        .add_directive(format!("reqwest={}", Level::WARN).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!("Starting Smart Maic exporter");
    info!(url = %config.device.url, "Device endpoint configured");

    // Parse listen address
    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create components
    let registry = Arc::new(MetricRegistry::new(config.prometheus.prefix.clone()));
    let client = Arc::new(DeviceClient::new(&config.device));
    let http_server = HttpServer::new(
        registry.clone(),
        client,
        listen_addr,
        config.prometheus.path.clone(),
        Duration::from_secs(config.cache.window_secs),
    );

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).unwrap();
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for the server to drain
    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!(
        scrapes = registry.scrape_count(),
        status = ?registry.status(),
        "Exporter stopped"
    );
    Ok(())
}
