// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0
//! nfsdriver core
//!
//! Volume lifecycle state machine and mount orchestration for the
//! nfsdriver volume plugin.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Registry, mount invocation, discovery artifact, and plugin protocol handler

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
