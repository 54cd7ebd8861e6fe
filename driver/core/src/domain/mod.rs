// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain model for NFS-backed volumes
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Volume records, mount argument mapping, and the seams to the host

pub mod volume;
pub mod mount_options;
pub mod invoker;
pub mod host_fs;
pub mod events;
pub mod driver_config;
