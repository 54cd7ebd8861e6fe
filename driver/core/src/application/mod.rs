// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod volume_manager;

pub use volume_manager::{RetryPolicy, StandardVolumeService, VolumeService};
