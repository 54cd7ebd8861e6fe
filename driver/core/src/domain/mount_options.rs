// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Mount argument construction
//!
//! Maps a volume's protocol version and caller-supplied options onto the
//! argument list handed to the host's mount utility. Caller options replace
//! the version defaults outright; they are never merged.

use crate::domain::volume::{NfsVersion, VolumeSpec};

const NFS3_DEFAULT_OPTS: &str = "port=2049,nolock,proto=tcp";
const NFS4_DEFAULT_OPTS: &str = "vers=4,minorversion=1";
const FALLBACK_DEFAULT_OPTS: &str = "nolock";

/// Filesystem type passed with `-t`, if the version pins one
fn fs_type(version: NfsVersion) -> Option<&'static str> {
    match version {
        NfsVersion::V3 => Some("nfs"),
        NfsVersion::V4 | NfsVersion::V41 => Some("nfs4"),
        NfsVersion::Unspecified => None,
    }
}

fn default_opts(version: NfsVersion) -> &'static str {
    match version {
        NfsVersion::V3 => NFS3_DEFAULT_OPTS,
        NfsVersion::V4 | NfsVersion::V41 => NFS4_DEFAULT_OPTS,
        NfsVersion::Unspecified => FALLBACK_DEFAULT_OPTS,
    }
}

/// Build the full argument list for attaching `spec`.
pub fn build_mount_args(spec: &VolumeSpec) -> Vec<String> {
    let mut args = Vec::with_capacity(6);

    if let Some(fs_type) = fs_type(spec.version) {
        args.push("-t".to_string());
        args.push(fs_type.to_string());
    }

    let opts = if spec.opts.is_empty() {
        default_opts(spec.version)
    } else {
        spec.opts.as_str()
    };
    args.push("-o".to_string());
    args.push(opts.to_string());

    args.push(spec.source());
    args.push(spec.local_mount_point.to_string_lossy().into_owned());

    args
}

/// Argument list for detaching `spec`
pub fn build_unmount_args(spec: &VolumeSpec) -> Vec<String> {
    vec![spec.local_mount_point.to_string_lossy().into_owned()]
}
