// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! External command execution
//!
//! [`ProcessInvoker`] runs the host's mount utilities through
//! `tokio::process`. [`MockInvoker`] records calls and fails on demand so the
//! registry's retry and reference-counting behaviour can be tested without
//! root privileges.

use crate::domain::invoker::{CommandInvoker, CommandOutput, InvokeError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

/// Runs executables on the host, capturing their output
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort (and kill) a command that runs longer than `timeout`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandInvoker for ProcessInvoker {
    async fn invoke(&self, executable: &str, args: &[String]) -> Result<CommandOutput, InvokeError> {
        debug!("Invoking {} {:?}", executable, args);

        let mut cmd = Command::new(executable);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, cmd.output())
                .await
                .map_err(|_| InvokeError::Timeout {
                    executable: executable.to_string(),
                    timeout,
                })?,
            None => cmd.output().await,
        }
        .map_err(|source| {
            error!("Failed to start {}: {}", executable, source);
            InvokeError::Spawn {
                executable: executable.to_string(),
                source,
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            error!("{} exited with {}: {}", executable, output.status, stderr);
            return Err(InvokeError::ExitStatus {
                executable: executable.to_string(),
                status: output.status.to_string(),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

// Re-export MockInvoker for testing
pub use mock::MockInvoker;

mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Recording invoker with scripted failures
    #[derive(Default)]
    pub struct MockInvoker {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        failures: Mutex<HashMap<String, usize>>,
        delay: Mutex<Option<Duration>>,
    }

    impl MockInvoker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next `times` invocations of `executable` fail
        pub fn fail_times(&self, executable: &str, times: usize) {
            self.failures.lock().insert(executable.to_string(), times);
        }

        /// Make every invocation of `executable` fail
        pub fn always_fail(&self, executable: &str) {
            self.fail_times(executable, usize::MAX);
        }

        /// Sleep for `delay` inside every invocation
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock() = Some(delay);
        }

        /// All recorded invocations in order
        pub fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().clone()
        }

        /// Number of times `executable` was invoked
        pub fn call_count(&self, executable: &str) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|(exe, _)| exe == executable)
                .count()
        }
    }

    #[async_trait]
    impl CommandInvoker for MockInvoker {
        async fn invoke(&self, executable: &str, args: &[String]) -> Result<CommandOutput, InvokeError> {
            self.calls
                .lock()
                .push((executable.to_string(), args.to_vec()));

            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let should_fail = {
                let mut failures = self.failures.lock();
                match failures.get_mut(executable) {
                    Some(remaining) if *remaining > 0 => {
                        if *remaining != usize::MAX {
                            *remaining -= 1;
                        }
                        true
                    }
                    _ => false,
                }
            };

            if should_fail {
                return Err(InvokeError::ExitStatus {
                    executable: executable.to_string(),
                    status: "exit status: 32".to_string(),
                    stdout: String::new(),
                    stderr: format!("{}: scripted failure", executable),
                });
            }

            Ok(CommandOutput::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command_captures_stdout() {
        let invoker = ProcessInvoker::new();
        let output = invoker
            .invoke("echo", &["mounted".to_string()])
            .await
            .expect("echo should succeed");
        assert_eq!(output.stdout, "mounted");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let invoker = ProcessInvoker::new();
        let err = invoker
            .invoke("sh", &["-c".to_string(), "echo nope >&2; exit 32".to_string()])
            .await
            .unwrap_err();
        match err {
            InvokeError::ExitStatus { stderr, .. } => assert_eq!(stderr, "nope"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let invoker = ProcessInvoker::new();
        let err = invoker
            .invoke("/nonexistent/mount.nfs-helper", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let invoker = ProcessInvoker::with_timeout(Some(Duration::from_millis(50)));
        let err = invoker
            .invoke("sleep", &["5".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_mock_scripted_failures() {
        let invoker = MockInvoker::new();
        invoker.fail_times("mount", 1);

        assert!(invoker.invoke("mount", &[]).await.is_err());
        assert!(invoker.invoke("mount", &[]).await.is_ok());
        assert!(invoker.invoke("umount", &[]).await.is_ok());
        assert_eq!(invoker.call_count("mount"), 2);
        assert_eq!(invoker.calls().len(), 3);
    }
}
