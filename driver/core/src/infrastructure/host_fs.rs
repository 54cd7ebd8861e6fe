// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::host_fs::HostFilesystem;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;

/// [`HostFilesystem`] backed by the local filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalHostFilesystem;

impl LocalHostFilesystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostFilesystem for LocalHostFilesystem {
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
