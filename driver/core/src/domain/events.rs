// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Volume lifecycle domain events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VolumeEvent {
    VolumeCreated {
        name: String,
        source: String,
        local_mount_point: PathBuf,
        created_at: DateTime<Utc>,
    },
    VolumeMounted {
        name: String,
        mount_point: PathBuf,
        mount_count: usize,
        mounted_at: DateTime<Utc>,
    },
    VolumeMountFailed {
        name: String,
        attempts: u32,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    /// A holder released a shared attachment; the export stays attached
    VolumeReleased {
        name: String,
        remaining: usize,
        released_at: DateTime<Utc>,
    },
    VolumeUnmounted {
        name: String,
        unmounted_at: DateTime<Utc>,
    },
    VolumeRemoved {
        name: String,
        removed_at: DateTime<Utc>,
    },
}

impl VolumeEvent {
    /// Name of the volume the event concerns
    pub fn volume_name(&self) -> &str {
        match self {
            Self::VolumeCreated { name, .. }
            | Self::VolumeMounted { name, .. }
            | Self::VolumeMountFailed { name, .. }
            | Self::VolumeReleased { name, .. }
            | Self::VolumeUnmounted { name, .. }
            | Self::VolumeRemoved { name, .. } => name,
        }
    }
}
