// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Value Objects
// ============================================================================

/// NFS protocol dialect used to pick default mount options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NfsVersion {
    /// NFSv3 (`-t nfs`)
    V3,
    /// NFSv4.0 (`-t nfs4`)
    V4,
    /// NFSv4.1 (`-t nfs4`)
    V41,
    /// No version requested; the host's mount utility negotiates
    #[default]
    Unspecified,
}

impl NfsVersion {
    /// Parse a caller-supplied version string.
    ///
    /// Accepts the forms an orchestrator typically sends (`"3"`, `"3.0"`,
    /// `"4"`, `"4.0"`, `"4.1"`, optionally prefixed with `v`). Anything else
    /// maps to [`NfsVersion::Unspecified`] rather than failing the request.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        match trimmed.parse::<f32>() {
            Ok(v) if (v - 3.0).abs() < f32::EPSILON => Self::V3,
            Ok(v) if (v - 4.0).abs() < f32::EPSILON => Self::V4,
            Ok(v) if (v - 4.1).abs() < 1e-4 => Self::V41,
            _ => Self::Unspecified,
        }
    }

    /// Whether this version selects the `nfs4` filesystem type
    pub fn is_v4(&self) -> bool {
        matches!(self, Self::V4 | Self::V41)
    }
}

impl std::fmt::Display for NfsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V3 => write!(f, "3.0"),
            Self::V4 => write!(f, "4.0"),
            Self::V41 => write!(f, "4.1"),
            Self::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Parameters supplied by the caller when creating a volume
///
/// Produced once at the protocol boundary after validation; the registry
/// never sees an untyped options bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Remote server / export host
    pub remote_info: String,
    /// Path exported by the remote server
    pub remote_mount_point: String,
    /// Host path where the export is attached
    pub local_mount_point: PathBuf,
    /// Protocol version driving default option selection
    #[serde(default)]
    pub version: NfsVersion,
    /// Raw mount options; replaces the version defaults when non-empty
    #[serde(default)]
    pub opts: String,
}

impl VolumeSpec {
    pub fn new(
        remote_info: impl Into<String>,
        remote_mount_point: impl Into<String>,
        local_mount_point: impl Into<PathBuf>,
    ) -> Self {
        Self {
            remote_info: remote_info.into(),
            remote_mount_point: remote_mount_point.into(),
            local_mount_point: local_mount_point.into(),
            version: NfsVersion::Unspecified,
            opts: String::new(),
        }
    }

    pub fn with_version(mut self, version: NfsVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_opts(mut self, opts: impl Into<String>) -> Self {
        self.opts = opts.into();
        self
    }

    /// Two specs describe the same volume when their immutable fields match.
    ///
    /// `version` and `opts` are deliberately excluded: re-creating a volume
    /// with different options but the same source and target is idempotent.
    pub fn same_source(&self, other: &VolumeSpec) -> bool {
        self.local_mount_point == other.local_mount_point
            && self.remote_mount_point == other.remote_mount_point
            && self.remote_info == other.remote_info
    }

    /// `<remoteInfo>:<remoteMountPoint>` as passed to the mount utility
    pub fn source(&self) -> String {
        format!("{}:{}", self.remote_info, self.remote_mount_point)
    }
}

/// Observable mount state, derived from the holder count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountState {
    /// No holders; the local directory is not attached
    Unmounted,
    /// Exactly one holder
    Mounted,
    /// More than one holder sharing the same attachment
    MountedShared,
}

impl MountState {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Self::Unmounted,
            1 => Self::Mounted,
            _ => Self::MountedShared,
        }
    }
}

// ============================================================================
// Volume Record
// ============================================================================

/// Snapshot of a registered volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub spec: VolumeSpec,
    pub mount_count: usize,
}

impl Volume {
    pub fn new(name: impl Into<String>, spec: VolumeSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            mount_count: 0,
        }
    }

    pub fn state(&self) -> MountState {
        MountState::from_count(self.mount_count)
    }

    pub fn is_mounted(&self) -> bool {
        self.mount_count > 0
    }

    pub fn local_mount_point(&self) -> &Path {
        &self.spec.local_mount_point
    }

    /// Name plus the mount point, which is only reported while attached
    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            name: self.name.clone(),
            mountpoint: self
                .is_mounted()
                .then(|| self.spec.local_mount_point.clone()),
        }
    }
}

/// Name and (when attached) mount point of a volume, as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub mountpoint: Option<PathBuf>,
}

/// Result of a single unmount transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOutcome {
    /// Last holder released; the export was detached and the directory removed
    Detached,
    /// One holder released; the attachment is still shared by `remaining` holders
    Released { remaining: usize },
}

// ============================================================================
// Domain Errors
// ============================================================================

/// Caller input rejected before any registry mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing Mandatory '{0}' field in Opts")]
    MissingField(&'static str),

    #[error("Unable to string convert '{0}' field in Opts")]
    WrongType(&'static str),

    #[error("Missing metadata 'volume name'")]
    EmptyName,
}

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Volume '{name}' already exists with different Opts")]
    Conflict { name: String },

    #[error("Volume '{name}' not found")]
    NotFound { name: String },

    #[error("Volume '{name}' is not mounted")]
    NotMounted { name: String },

    #[error("Error mounting '{name}' ({reason})")]
    MountFailure { name: String, reason: String },

    #[error("Error unmounting '{name}' ({reason})")]
    UnmountFailure { name: String, reason: String },
}

impl VolumeError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}

// ============================================================================
// Tests
// ============================================================================
