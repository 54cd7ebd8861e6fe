// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Plugin discovery artifact
//!
//! Written once at startup into the orchestrator's plugin directory so it can
//! locate the running daemon:
//! - TCP transport: `<driver>.json` containing `{"Name": ..., "Addr": "http://host:port"}`
//! - Unix transport: `<driver>.spec` containing `unix:///path/to/driver.sock`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const SOCKET_SUFFIX: &str = ".sock";

/// How the protocol listener is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Unix,
}

impl Transport {
    /// An address ending in `.sock` selects a Unix domain socket
    pub fn for_address(address: &str) -> Self {
        if address.ends_with(SOCKET_SUFFIX) {
            Self::Unix
        } else {
            Self::Tcp
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            Self::Tcp => "http",
            Self::Unix => "unix",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Tcp => "json",
            Self::Unix => "spec",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Unix => write!(f, "unix"),
        }
    }
}

/// Prefix `address` with `scheme://` unless it already carries it
pub fn rewrite_address(address: &str, scheme: &str) -> String {
    let prefix = format!("{}://", scheme);
    if address.starts_with(&prefix) {
        address.to_string()
    } else {
        format!("{}{}", prefix, address)
    }
}

/// JSON descriptor advertised for TCP transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSpec {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Addr")]
    pub address: String,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to create drivers directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write driver spec {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode driver spec: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Write the discovery artifact for `driver_name` listening on `address`.
///
/// Returns the path of the written file.
pub fn write_driver_spec(
    drivers_path: &Path,
    driver_name: &str,
    address: &str,
) -> Result<PathBuf, DiscoveryError> {
    let transport = Transport::for_address(address);
    let url = rewrite_address(address, transport.scheme());

    let contents = match transport {
        Transport::Tcp => serde_json::to_vec(&DriverSpec {
            name: driver_name.to_string(),
            address: url,
        })?,
        Transport::Unix => url.into_bytes(),
    };

    std::fs::create_dir_all(drivers_path).map_err(|source| DiscoveryError::CreateDir {
        path: drivers_path.to_path_buf(),
        source,
    })?;

    let spec_path = drivers_path.join(format!("{}.{}", driver_name, transport.extension()));
    std::fs::write(&spec_path, contents).map_err(|source| DiscoveryError::Write {
        path: spec_path.clone(),
        source,
    })?;

    info!("Wrote {} driver spec: {:?}", transport, spec_path);
    Ok(spec_path)
}
