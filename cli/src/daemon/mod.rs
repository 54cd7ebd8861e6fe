// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Daemon mode implementation
//!
//! Handles:
//! - Configuration loading and CLI overrides
//! - Plugin discovery file
//! - TCP or Unix socket listener
//! - Graceful shutdown

use clap::Args;
use nfsdriver_core::domain::driver_config::DriverConfigManifest;
use std::path::PathBuf;
use tracing::info;

pub mod server;

pub use server::start_daemon;

/// Flags accepted by `nfsdriver serve`; each one overrides the loaded config
#[derive(Args, Debug, Clone, Default)]
pub struct ServeOptions {
    /// host:port to listen on, or a path ending in .sock for a Unix socket
    #[arg(long, value_name = "ADDRESS")]
    pub listen_address: Option<String>,

    /// Directory to write the plugin discovery file into
    #[arg(long, value_name = "DIR")]
    pub drivers_path: Option<PathBuf>,

    /// Name advertised in the discovery file
    #[arg(long, value_name = "NAME")]
    pub driver_name: Option<String>,

    /// host:port for the Prometheus metrics endpoint
    #[arg(long, value_name = "ADDRESS")]
    pub debug_address: Option<String>,
}

impl ServeOptions {
    pub fn apply_to(&self, config: &mut DriverConfigManifest) {
        let spec = &mut config.spec;

        if let Some(address) = &self.listen_address {
            info!("CLI override: listen_address={}", address);
            spec.listen_address = address.clone();
        }
        if let Some(path) = &self.drivers_path {
            info!("CLI override: drivers_path={:?}", path);
            spec.drivers_path = path.clone();
        }
        if let Some(name) = &self.driver_name {
            info!("CLI override: driver_name={}", name);
            spec.driver_name = name.clone();
        }
        if let Some(address) = &self.debug_address {
            info!("CLI override: debug_address={}", address);
            spec.debug_address = Some(address.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = DriverConfigManifest::default();
        let options = ServeOptions {
            listen_address: Some("/run/nfsdriver.sock".to_string()),
            driver_name: Some("nfs-test".to_string()),
            ..Default::default()
        };

        options.apply_to(&mut config);

        assert_eq!(config.spec.listen_address, "/run/nfsdriver.sock");
        assert_eq!(config.spec.driver_name, "nfs-test");
        assert_eq!(config.spec.drivers_path, PathBuf::from("/tmp/voldriver"));
        assert!(config.spec.debug_address.is_none());
    }
}
