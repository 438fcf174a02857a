use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dashwatch_grafana::GrafanaClient;
use dashwatch_kube::KubeConfigMapStore;
use dashwatch_server::DashboardController;
use dashwatch_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use dashwatch_server::observability;

#[derive(Parser)]
#[command(name = "dashwatch")]
#[command(about = "Sync Grafana dashboards from annotated Kubernetes ConfigMaps")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "DASHWATCH_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Log level (overrides logging.level)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();

    observability::init_tracing();

    let mut cfg = match load_config(Some(cli.config.as_str())) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(level) = cli.log_level {
        cfg.logging.level = level;
        if let Err(e) = cfg.validate() {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    }

    tracing::info!(path = %cli.config, "Configuration loaded");
    observability::apply_logging_level(&cfg.logging.level);

    let mut grafana = GrafanaClient::with_timeout(cfg.grafana.url.trim(), cfg.grafana.timeout())
        .context("failed to create Grafana client")?;
    if let Some(token) = cfg.grafana.api_token.as_deref().filter(|t| !t.is_empty()) {
        grafana = grafana.with_api_token(token);
    }
    tracing::info!(url = %grafana.base_url(), "Grafana client ready");

    let configmaps = KubeConfigMapStore::new(&cfg.kubernetes.client_config())
        .context("failed to create Kubernetes client")?;
    tracing::info!(api_server = %configmaps.base_url(), "Kubernetes client ready");

    let controller = DashboardController::spawn(
        Arc::new(configmaps),
        Arc::new(grafana),
        &cfg.controller.annotation,
        cfg.informer.informer_config(),
    );

    shutdown_signal().await;
    controller.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
