// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the nfsdriver CLI

pub mod config;

pub use self::config::ConfigCommand;
