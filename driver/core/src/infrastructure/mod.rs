// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod process;
pub mod host_fs;
pub mod discovery;

pub use process::{MockInvoker, ProcessInvoker};
pub use host_fs::LocalHostFilesystem;
