mod cli;
mod service;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use termhub_config::schema::HostConfig;
use termhub_session::{HostOptions, SessionHost};

/// Load config, honoring a `--config` path override.
fn load_config(path_override: Option<&str>) -> Result<HostConfig, termhub_common::ConfigError> {
    match path_override {
        Some(path) => termhub_config::toml_loader::load_from_path(Path::new(path)),
        None => termhub_config::load_config(),
    }
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    // Config feeds the default log filter, so load it before the subscriber
    // and hold any complaint until logging is up.
    let (config, config_err) = match load_config(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (HostConfig::default(), Some(e)),
    };

    let directive = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.filter.clone());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("termhub=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("termhub v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_err {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    if let Some(ref dir) = args.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            tracing::warn!("Failed to change directory to {dir}: {e}");
        }
    }

    let shell = (!config.terminal.shell.is_empty()).then(|| config.terminal.shell.clone());
    let host = SessionHost::new(HostOptions {
        shell,
        rows: config.terminal.rows,
        cols: config.terminal.cols,
        quiet_window: Duration::from_millis(config.agent.quiet_window_ms),
    });

    // Periodic silence check for question-capable sessions.
    let poll_host = Arc::clone(&host);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tick.tick().await;
            poll_host.poll_quiet_sessions();
        }
    });

    if config.service.enabled {
        let bind = args.bind.clone().unwrap_or_else(|| config.service.bind.clone());
        match TcpListener::bind(&bind).await {
            Ok(listener) => {
                tracing::info!(%bind, "WebSocket service listening");
                tokio::spawn(service::run_service(listener, Arc::clone(&host)));
            }
            Err(e) => {
                tracing::error!(%bind, error = %e, "Failed to bind WebSocket service");
            }
        }
    } else {
        tracing::info!("WebSocket service disabled by config");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }

    tracing::info!("Shutting down, closing all sessions");
    host.close_all();
    tracing::info!("Shutdown complete");
}
