// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Host filesystem seam for local mount point directories

use async_trait::async_trait;
use std::path::Path;

/// Creates and deletes the directories that exports are attached to
#[async_trait]
pub trait HostFilesystem: Send + Sync {
    /// Create `path` and any missing parents
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Remove `path` and everything under it; a missing path is not an error
    async fn remove_dir_all(&self, path: &Path) -> std::io::Result<()>;
}
