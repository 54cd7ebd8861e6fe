// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

// Driver Configuration Types
//
// Defines the configuration schema for the volume driver daemon:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Listen address and plugin discovery directory
// - Mount utility commands and retry policy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "nfsdriver/v1";
pub const KIND: &str = "DriverConfig";

/// Top-level driver configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfigManifest {
    /// API version (must be "nfsdriver/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "DriverConfig")
    pub kind: String,

    #[serde(default)]
    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: DriverConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Default for ManifestMetadata {
    fn default() -> Self {
        Self {
            name: std::env::var("HOSTNAME").unwrap_or_else(|_| "nfsdriver-node".to_string()),
            version: Some("1.0.0".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfigSpec {
    /// Name advertised in the discovery artifact
    #[serde(default = "default_driver_name")]
    pub driver_name: String,

    /// `host:port` for TCP, or a path ending in `.sock` for a Unix socket
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Directory the discovery artifact is written into
    #[serde(default = "default_drivers_path")]
    pub drivers_path: PathBuf,

    /// Optional `host:port` for the Prometheus metrics endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_address: Option<String>,

    #[serde(default)]
    pub mount: MountConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    #[serde(default = "default_mount_command")]
    pub mount_command: String,

    #[serde(default = "default_unmount_command")]
    pub unmount_command: String,

    /// Total mount attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between mount attempts in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Deadline for a single mount/umount invocation
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: Option<u64>,
}

impl MountConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            mount_command: default_mount_command(),
            unmount_command: default_unmount_command(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Default for DriverConfigSpec {
    fn default() -> Self {
        Self {
            driver_name: default_driver_name(),
            listen_address: default_listen_address(),
            drivers_path: default_drivers_path(),
            debug_address: None,
            mount: MountConfig::default(),
        }
    }
}

impl Default for DriverConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata::default(),
            spec: DriverConfigSpec::default(),
        }
    }
}

impl DriverConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. NFSDRIVER_CONFIG_PATH environment variable
    /// 2. ./nfsdriver-config.yaml (working directory)
    /// 3. ~/.nfsdriver/config.yaml (user home)
    /// 4. /etc/nfsdriver/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("NFSDRIVER_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./nfsdriver-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".nfsdriver").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/nfsdriver/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NFSDRIVER_LISTEN_ADDRESS") {
            tracing::info!("Environment override: NFSDRIVER_LISTEN_ADDRESS={}", val);
            self.spec.listen_address = val;
        }

        if let Ok(val) = std::env::var("NFSDRIVER_DRIVERS_PATH") {
            tracing::info!("Environment override: NFSDRIVER_DRIVERS_PATH={}", val);
            self.spec.drivers_path = PathBuf::from(val);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        let spec = &self.spec;
        if spec.driver_name.is_empty() {
            anyhow::bail!("spec.driver_name cannot be empty");
        }

        if spec.listen_address.is_empty() {
            anyhow::bail!("spec.listen_address cannot be empty");
        }

        if spec.drivers_path.as_os_str().is_empty() {
            anyhow::bail!("spec.drivers_path cannot be empty");
        }

        if spec.mount.mount_command.is_empty() || spec.mount.unmount_command.is_empty() {
            anyhow::bail!("spec.mount commands cannot be empty");
        }

        if spec.mount.max_attempts == 0 {
            anyhow::bail!("spec.mount.max_attempts must be at least 1");
        }

        Ok(())
    }
}

fn default_driver_name() -> String {
    "nfsdriver".to_string()
}

fn default_listen_address() -> String {
    "0.0.0.0:5566".to_string()
}

fn default_drivers_path() -> PathBuf {
    PathBuf::from("/tmp/voldriver")
}

fn default_mount_command() -> String {
    "mount".to_string()
}

fn default_unmount_command() -> String {
    "umount".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_command_timeout() -> Option<u64> {
    Some(60)
}
