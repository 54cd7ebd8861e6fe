// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0
//! nfsdriver CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Daemon bootstrap and configuration commands

pub mod daemon;
pub mod commands;
