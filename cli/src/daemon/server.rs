// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Daemon HTTP server implementation

use anyhow::{Context, Result};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, info, warn};

use nfsdriver_core::{
    application::volume_manager::{StandardVolumeService, VolumeService},
    domain::driver_config::DriverConfigManifest,
    infrastructure::{
        discovery::{write_driver_spec, Transport},
        event_bus::{EventBus, EventBusError},
        host_fs::LocalHostFilesystem,
        process::ProcessInvoker,
    },
    presentation::api,
};

use super::ServeOptions;

pub async fn start_daemon(config_path: Option<PathBuf>, options: ServeOptions) -> Result<()> {
    let pid = std::process::id();
    info!("nfsdriver starting (PID: {})", pid);

    let mut config = DriverConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    options.apply_to(&mut config);
    config
        .validate()
        .context("Configuration validation failed")?;

    let spec = &config.spec;
    info!(
        "Configuration loaded: driver={} listen={} drivers_path={:?}",
        spec.driver_name, spec.listen_address, spec.drivers_path
    );

    if let Some(debug_address) = &spec.debug_address {
        install_metrics_exporter(debug_address)?;
    }

    // Initialize services
    let event_bus = Arc::new(EventBus::with_default_capacity());
    let invoker = Arc::new(ProcessInvoker::with_timeout(spec.mount.command_timeout()));
    let volume_service = Arc::new(StandardVolumeService::from_config(
        &spec.mount,
        invoker,
        Arc::new(LocalHostFilesystem::new()),
        event_bus.clone(),
    ));

    spawn_event_audit(&event_bus);

    let spec_path = write_driver_spec(&spec.drivers_path, &spec.driver_name, &spec.listen_address)
        .context("Failed to write driver discovery file")?;
    debug!("Discovery file at {:?}", spec_path);

    let app = api::app(volume_service as Arc<dyn VolumeService>);

    match Transport::for_address(&spec.listen_address) {
        Transport::Tcp => serve_tcp(&spec.listen_address, app).await?,
        Transport::Unix => serve_unix(Path::new(&spec.listen_address), app).await?,
    }

    info!("nfsdriver shutting down");

    Ok(())
}

fn install_metrics_exporter(address: &str) -> Result<()> {
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("Invalid debug address: {}", address))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics endpoint listening on {}", addr);
    Ok(())
}

/// Log every volume lifecycle event until the bus closes
fn spawn_event_audit(event_bus: &EventBus) {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!(volume = event.volume_name(), "event: {}", json),
                    Err(e) => warn!("Failed to encode event: {}", e),
                },
                Err(EventBusError::Lagged(skipped)) => {
                    warn!("Event audit lagged; {} events skipped", skipped);
                }
                Err(_) => break,
            }
        }
    });
}

async fn serve_tcp(address: &str, app: Router) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;

    info!("Listening on tcp://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

#[cfg(unix)]
async fn serve_unix(path: &Path, app: Router) -> Result<()> {
    use tokio::net::UnixListener;

    remove_stale_socket(path)?;

    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind Unix socket {:?}", path))?;
    let _guard = SocketFileGuard(path.to_path_buf());

    info!("Listening on unix://{}", path.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

#[cfg(not(unix))]
async fn serve_unix(path: &Path, _app: Router) -> Result<()> {
    anyhow::bail!("Unix socket transport is not supported on this platform: {:?}", path)
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("Removed stale socket {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove stale socket {:?}", path)),
    }
}

struct SocketFileGuard(PathBuf);

impl Drop for SocketFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_stale_socket() {
        let temp_dir = TempDir::new().unwrap();
        let socket = temp_dir.path().join("nfsdriver.sock");

        // Missing file is not an error
        remove_stale_socket(&socket).unwrap();

        std::fs::write(&socket, b"").unwrap();
        remove_stale_socket(&socket).unwrap();
        assert!(!socket.exists());
    }

    #[test]
    fn test_socket_guard_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let socket = temp_dir.path().join("nfsdriver.sock");
        std::fs::write(&socket, b"").unwrap();

        drop(SocketFileGuard(socket.clone()));
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn test_invalid_debug_address_is_rejected() {
        assert!(install_metrics_exporter("not-an-address").is_err());
    }
}
