// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command Invoker Trait - Anti-Corruption Layer for host mount utilities
//!
//! Abstracts execution of external executables (`mount`, `umount`) so the
//! volume registry can be exercised without touching the host. The invoker
//! has no state and no retry behaviour of its own; retry is a policy owned by
//! the caller.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs an external executable to completion
#[async_trait]
pub trait CommandInvoker: Send + Sync {
    /// Run `executable` with `args` and wait for it to exit.
    ///
    /// # Returns
    /// * `Ok(CommandOutput)` if the process started and exited with status 0
    /// * `Err(InvokeError)` if it could not be started, exited non-zero, or
    ///   exceeded the invoker's deadline
    async fn invoke(&self, executable: &str, args: &[String]) -> Result<CommandOutput, InvokeError>;
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to start '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{executable}' exited with {status}: {stderr}")]
    ExitStatus {
        executable: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("'{executable}' did not finish within {timeout:?}")]
    Timeout {
        executable: String,
        timeout: Duration,
    },
}
