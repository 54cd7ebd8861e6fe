// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Volume Manager Application Service
//!
//! Owns the in-memory volume registry and drives the reference-counted
//! mount/unmount state machine, coordinating:
//! - Domain layer: Volume records, mount argument mapping
//! - Infrastructure: CommandInvoker (mount/umount), HostFilesystem
//! - Event bus: Publishing VolumeEvents for observability
//!
//! Concurrency: the registry is a concurrent map from volume name to a
//! shared slot. Each slot carries its own transition lock, held for the whole
//! Mount/Unmount/Remove transition including the external command, so
//! transitions on one volume are serialized while requests for other volumes
//! proceed. Mount counts are atomics so Get/Path/List never wait on a slow
//! mount.

use crate::domain::driver_config::MountConfig;
use crate::domain::events::VolumeEvent;
use crate::domain::host_fs::HostFilesystem;
use crate::domain::invoker::CommandInvoker;
use crate::domain::mount_options::{build_mount_args, build_unmount_args};
use crate::domain::volume::{
    UnmountOutcome, ValidationError, Volume, VolumeError, VolumeInfo, VolumeSpec,
};
use crate::infrastructure::event_bus::EventBus;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait VolumeService: Send + Sync {
    /// Register a volume; idempotent for identical source and target
    async fn create_volume(&self, name: &str, spec: VolumeSpec) -> Result<(), VolumeError>;

    /// Name and (when attached) mount point of a volume
    async fn get_volume(&self, name: &str) -> Result<VolumeInfo, VolumeError>;

    /// Mount point of an attached volume
    async fn volume_path(&self, name: &str) -> Result<PathBuf, VolumeError>;

    /// Snapshot of every registered volume, sorted by name
    async fn list_volumes(&self) -> Vec<VolumeInfo>;

    /// Add a holder, attaching the export on the first one
    async fn mount_volume(&self, name: &str) -> Result<PathBuf, VolumeError>;

    /// Release a holder, detaching the export on the last one
    async fn unmount_volume(&self, name: &str) -> Result<UnmountOutcome, VolumeError>;

    /// Release every holder, then forget the volume
    async fn remove_volume(&self, name: &str) -> Result<(), VolumeError>;
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Mount retry policy; unmount is never retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &MountConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

// ============================================================================
// Registry Slot
// ============================================================================

struct VolumeSlot {
    name: String,
    spec: VolumeSpec,
    mount_count: AtomicUsize,
    /// Set once the volume has been removed; the slot may still be referenced
    /// by requests that looked it up before removal.
    retired: AtomicBool,
    transition: Mutex<()>,
}

impl VolumeSlot {
    fn new(name: &str, spec: VolumeSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
            mount_count: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
            transition: Mutex::new(()),
        }
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn mount_count(&self) -> usize {
        self.mount_count.load(Ordering::Acquire)
    }

    fn set_mount_count(&self, count: usize) {
        self.mount_count.store(count, Ordering::Release);
    }

    fn snapshot(&self) -> Volume {
        Volume {
            name: self.name.clone(),
            spec: self.spec.clone(),
            mount_count: self.mount_count(),
        }
    }

    /// Take the transition lock, failing if the volume was removed meanwhile
    async fn lock_live(&self) -> Result<MutexGuard<'_, ()>, VolumeError> {
        let guard = self.transition.lock().await;
        if self.is_retired() {
            return Err(VolumeError::not_found(&self.name));
        }
        Ok(guard)
    }
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardVolumeService {
    volumes: DashMap<String, Arc<VolumeSlot>>,
    invoker: Arc<dyn CommandInvoker>,
    host_fs: Arc<dyn HostFilesystem>,
    event_bus: Arc<EventBus>,
    retry_policy: RetryPolicy,
    mount_command: String,
    unmount_command: String,
}

impl StandardVolumeService {
    pub fn new(
        invoker: Arc<dyn CommandInvoker>,
        host_fs: Arc<dyn HostFilesystem>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            volumes: DashMap::new(),
            invoker,
            host_fs,
            event_bus,
            retry_policy: RetryPolicy::default(),
            mount_command: "mount".to_string(),
            unmount_command: "umount".to_string(),
        }
    }

    pub fn from_config(
        config: &MountConfig,
        invoker: Arc<dyn CommandInvoker>,
        host_fs: Arc<dyn HostFilesystem>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::new(invoker, host_fs, event_bus)
            .with_retry_policy(RetryPolicy::from_config(config))
            .with_commands(&config.mount_command, &config.unmount_command)
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_commands(mut self, mount_command: &str, unmount_command: &str) -> Self {
        self.mount_command = mount_command.to_string();
        self.unmount_command = unmount_command.to_string();
        self
    }

    /// Full record of a registered volume, including its holder count
    pub fn volume(&self, name: &str) -> Option<Volume> {
        self.volumes
            .get(name)
            .filter(|slot| !slot.is_retired())
            .map(|slot| slot.snapshot())
    }

    fn slot(&self, name: &str) -> Result<Arc<VolumeSlot>, VolumeError> {
        self.volumes
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|slot| !slot.is_retired())
            .ok_or_else(|| VolumeError::not_found(name))
    }

    /// Invoke the mount utility under the retry policy
    async fn mount_with_retry(&self, name: &str, args: &[String]) -> Result<(), VolumeError> {
        let attempts = self.retry_policy.max_attempts;
        let mut last_error = None;

        for attempt in 1..=attempts {
            metrics::counter!("nfsdriver_mount_attempts_total").increment(1);

            match self.invoker.invoke(&self.mount_command, args).await {
                Ok(_) => {
                    if attempt > 1 {
                        info!("Volume '{}' mounted on attempt {}/{}", name, attempt, attempts);
                    }
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Error mounting volume '{}' (attempt {}/{}): {}",
                        name, attempt, attempts, e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_policy.delay).await;
                    }
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no mount attempt made".to_string());

        metrics::counter!("nfsdriver_mount_failures_total").increment(1);
        self.event_bus.publish_volume_event(VolumeEvent::VolumeMountFailed {
            name: name.to_string(),
            attempts,
            reason: reason.clone(),
            failed_at: Utc::now(),
        });

        Err(VolumeError::MountFailure {
            name: name.to_string(),
            reason,
        })
    }

    /// Release one holder. Caller must hold the slot's transition lock and
    /// have checked that the count is non-zero.
    async fn release(&self, slot: &VolumeSlot) -> Result<UnmountOutcome, VolumeError> {
        let count = slot.mount_count();

        if count > 1 {
            let remaining = count - 1;
            slot.set_mount_count(remaining);
            warn!(
                "Volume '{}' released but may still be in use ({} holders remain)",
                slot.name, remaining
            );
            self.event_bus.publish_volume_event(VolumeEvent::VolumeReleased {
                name: slot.name.clone(),
                remaining,
                released_at: Utc::now(),
            });
            return Ok(UnmountOutcome::Released { remaining });
        }

        let mount_point = &slot.spec.local_mount_point;
        let args = build_unmount_args(&slot.spec);

        if let Err(e) = self.invoker.invoke(&self.unmount_command, &args).await {
            error!("Error unmounting volume '{}': {}", slot.name, e);
            return Err(VolumeError::UnmountFailure {
                name: slot.name.clone(),
                reason: e.to_string(),
            });
        }

        if let Err(e) = self.host_fs.remove_dir_all(mount_point).await {
            error!("Error deleting mount point {:?}: {}", mount_point, e);
            return Err(VolumeError::UnmountFailure {
                name: slot.name.clone(),
                reason: format!("unable to remove local mount point {:?}: {}", mount_point, e),
            });
        }

        slot.set_mount_count(0);
        metrics::counter!("nfsdriver_unmounts_total").increment(1);
        self.event_bus.publish_volume_event(VolumeEvent::VolumeUnmounted {
            name: slot.name.clone(),
            unmounted_at: Utc::now(),
        });

        info!("Volume '{}' unmounted from {:?}", slot.name, mount_point);
        Ok(UnmountOutcome::Detached)
    }
}

#[async_trait]
impl VolumeService for StandardVolumeService {
    async fn create_volume(&self, name: &str, spec: VolumeSpec) -> Result<(), VolumeError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let source = spec.source();
        let local_mount_point = spec.local_mount_point.clone();

        match self.volumes.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_retired() {
                    // Removal finished its transition but has not dropped the
                    // map entry yet
                    entry.insert(Arc::new(VolumeSlot::new(name, spec)));
                } else if entry.get().spec.same_source(&spec) {
                    info!("Volume '{}' already exists with identical options", name);
                    return Ok(());
                } else {
                    warn!(
                        "Volume '{}' already exists with different options (existing: {:?})",
                        name,
                        entry.get().spec
                    );
                    return Err(VolumeError::Conflict {
                        name: name.to_string(),
                    });
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(VolumeSlot::new(name, spec)));
            }
        }

        info!(
            "Created volume '{}' (source: {}, local mount point: {:?})",
            name, source, local_mount_point
        );
        self.event_bus.publish_volume_event(VolumeEvent::VolumeCreated {
            name: name.to_string(),
            source,
            local_mount_point,
            created_at: Utc::now(),
        });

        Ok(())
    }

    async fn get_volume(&self, name: &str) -> Result<VolumeInfo, VolumeError> {
        debug!("Fetching volume '{}'", name);
        let slot = self.slot(name)?;
        Ok(slot.snapshot().info())
    }

    async fn volume_path(&self, name: &str) -> Result<PathBuf, VolumeError> {
        let slot = self.slot(name)?;
        if slot.mount_count() == 0 {
            debug!("Volume '{}' is not mounted", name);
            return Err(VolumeError::NotMounted {
                name: name.to_string(),
            });
        }
        Ok(slot.spec.local_mount_point.clone())
    }

    async fn list_volumes(&self) -> Vec<VolumeInfo> {
        let mut volumes: Vec<VolumeInfo> = self
            .volumes
            .iter()
            .filter(|entry| !entry.value().is_retired())
            .map(|entry| entry.value().snapshot().info())
            .collect();
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        volumes
    }

    async fn mount_volume(&self, name: &str) -> Result<PathBuf, VolumeError> {
        let slot = self.slot(name)?;
        let _guard = slot.lock_live().await?;
        let mount_point = slot.spec.local_mount_point.clone();

        let count = slot.mount_count();
        if count > 0 {
            let count = count + 1;
            slot.set_mount_count(count);
            info!("Volume '{}' already mounted ({} holders)", name, count);
            self.event_bus.publish_volume_event(VolumeEvent::VolumeMounted {
                name: name.to_string(),
                mount_point: mount_point.clone(),
                mount_count: count,
                mounted_at: Utc::now(),
            });
            return Ok(mount_point);
        }

        if let Err(e) = self.host_fs.create_dir_all(&mount_point).await {
            error!("Failed to create mount point {:?}: {}", mount_point, e);
            return Err(VolumeError::MountFailure {
                name: name.to_string(),
                reason: format!("unable to create local mount point {:?}: {}", mount_point, e),
            });
        }

        let args = build_mount_args(&slot.spec);
        self.mount_with_retry(name, &args).await?;

        slot.set_mount_count(1);
        info!("Volume '{}' mounted at {:?}", name, mount_point);
        self.event_bus.publish_volume_event(VolumeEvent::VolumeMounted {
            name: name.to_string(),
            mount_point: mount_point.clone(),
            mount_count: 1,
            mounted_at: Utc::now(),
        });

        Ok(mount_point)
    }

    async fn unmount_volume(&self, name: &str) -> Result<UnmountOutcome, VolumeError> {
        let slot = self.slot(name)?;
        let _guard = slot.lock_live().await?;

        if slot.mount_count() == 0 {
            info!("Unmount requested for volume '{}' which is not mounted", name);
            return Err(VolumeError::not_found(name));
        }

        self.release(&slot).await
    }

    async fn remove_volume(&self, name: &str) -> Result<(), VolumeError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let slot = self.slot(name)?;
        let _guard = slot.lock_live().await?;

        while slot.mount_count() > 0 {
            self.release(&slot).await?;
        }

        slot.retired.store(true, Ordering::Release);
        self.volumes
            .remove_if(name, |_, current| Arc::ptr_eq(current, &slot));

        info!("Removed volume '{}'", name);
        self.event_bus.publish_volume_event(VolumeEvent::VolumeRemoved {
            name: name.to_string(),
            removed_at: Utc::now(),
        });

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
