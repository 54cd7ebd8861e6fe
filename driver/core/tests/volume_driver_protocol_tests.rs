// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the volume plugin protocol
//!
//! These tests drive the HTTP router end to end against the real volume
//! registry, with the host's mount utilities replaced by a recording invoker.
//! Local mount points live under a temporary directory so directory creation
//! and cleanup are exercised for real.

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use nfsdriver_core::application::volume_manager::{StandardVolumeService, VolumeService};
use nfsdriver_core::infrastructure::event_bus::EventBus;
use nfsdriver_core::infrastructure::host_fs::LocalHostFilesystem;
use nfsdriver_core::infrastructure::process::MockInvoker;
use nfsdriver_core::presentation::api::{
    app, ErrorResponse, GetResponse, ListResponse, MountpointResponse, WireVolume,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct Driver {
    router: Router,
    service: Arc<StandardVolumeService>,
    invoker: Arc<MockInvoker>,
    temp_dir: TempDir,
}

impl Driver {
    fn new() -> Self {
        let invoker = Arc::new(MockInvoker::new());
        let service = Arc::new(StandardVolumeService::new(
            invoker.clone(),
            Arc::new(LocalHostFilesystem::new()),
            Arc::new(EventBus::with_default_capacity()),
        ));
        let router = app(service.clone() as Arc<dyn VolumeService>);

        Self {
            router,
            service,
            invoker,
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn mount_point(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("mnt").join(name)
    }

    async fn call<T: DeserializeOwned>(&self, operation: &str, body: Value) -> T {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::post(format!("/{}", operation))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .expect("router failed");
        assert!(response.status().is_success(), "{} returned {}", operation, response.status());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).expect("response is not valid JSON")
    }

    async fn create(&self, name: &str, version: &str, opts: &str) -> ErrorResponse {
        self.call(
            "VolumeDriver.Create",
            json!({
                "Name": name,
                "Opts": {
                    "localmountpoint": self.mount_point(name),
                    "remotemountpoint": format!("/exports/{}", name),
                    "remoteinfo": "nfs.internal",
                    "opts": opts,
                    "version": version,
                }
            }),
        )
        .await
    }

    async fn mount(&self, name: &str) -> MountpointResponse {
        self.call("VolumeDriver.Mount", json!({"Name": name, "ID": "container-1"}))
            .await
    }

    async fn unmount(&self, name: &str) -> ErrorResponse {
        self.call("VolumeDriver.Unmount", json!({"Name": name, "ID": "container-1"}))
            .await
    }

    async fn path(&self, name: &str) -> MountpointResponse {
        self.call("VolumeDriver.Path", json!({"Name": name})).await
    }

    async fn remove(&self, name: &str) -> ErrorResponse {
        self.call("VolumeDriver.Remove", json!({"Name": name})).await
    }
}

#[tokio::test]
async fn test_full_volume_lifecycle() {
    let driver = Driver::new();
    let mount_point = driver.mount_point("shared");
    let mount_point_str = mount_point.to_string_lossy().into_owned();

    assert_eq!(driver.create("shared", "4.1", "").await.err, "");

    let get: GetResponse = driver.call("VolumeDriver.Get", json!({"Name": "shared"})).await;
    assert_eq!(get.err, "");
    assert_eq!(
        get.volume,
        Some(WireVolume {
            name: "shared".to_string(),
            mountpoint: String::new(),
        })
    );

    let mounted = driver.mount("shared").await;
    assert_eq!(mounted.err, "");
    assert_eq!(mounted.mountpoint, mount_point_str);
    assert!(mount_point.is_dir());

    let calls = driver.invoker.calls();
    assert_eq!(
        calls[0].1,
        vec![
            "-t",
            "nfs4",
            "-o",
            "vers=4,minorversion=1",
            "nfs.internal:/exports/shared",
            mount_point_str.as_str(),
        ]
    );

    assert_eq!(driver.path("shared").await.mountpoint, mount_point_str);

    let list: ListResponse = driver.call("VolumeDriver.List", json!({})).await;
    assert_eq!(list.volumes.len(), 1);
    assert_eq!(list.volumes[0].mountpoint, mount_point_str);

    assert_eq!(driver.unmount("shared").await.err, "");
    assert!(!mount_point.exists());

    let path = driver.path("shared").await;
    assert_eq!(path.mountpoint, "");
    assert_eq!(path.err, "Volume 'shared' is not mounted");

    assert_eq!(driver.remove("shared").await.err, "");
    let list: ListResponse = driver.call("VolumeDriver.List", json!({})).await;
    assert!(list.volumes.is_empty());
}

#[tokio::test]
async fn test_create_conflict_over_protocol() {
    let driver = Driver::new();
    assert_eq!(driver.create("data", "3", "").await.err, "");
    assert_eq!(driver.create("data", "3", "").await.err, "");

    let conflict: ErrorResponse = driver
        .call(
            "VolumeDriver.Create",
            json!({
                "Name": "data",
                "Opts": {
                    "localmountpoint": "/somewhere/else",
                    "remotemountpoint": "/exports/data",
                    "remoteinfo": "nfs.internal",
                    "opts": "",
                }
            }),
        )
        .await;
    assert_eq!(conflict.err, "Volume 'data' already exists with different Opts");

    let volume = driver.service.volume("data").unwrap();
    assert_eq!(volume.spec.local_mount_point, driver.mount_point("data"));
}

#[tokio::test]
async fn test_create_without_options_names_missing_field() {
    let driver = Driver::new();

    let response: ErrorResponse = driver
        .call("VolumeDriver.Create", json!({"Name": "bare", "Opts": null}))
        .await;
    assert_eq!(response.err, "Missing Mandatory 'localmountpoint' field in Opts");

    let list: ListResponse = driver.call("VolumeDriver.List", json!({})).await;
    assert!(list.volumes.is_empty());
}

#[tokio::test]
async fn test_shared_mounts_and_remove() {
    let driver = Driver::new();
    assert_eq!(driver.create("cache", "3.0", "").await.err, "");

    assert_eq!(driver.mount("cache").await.err, "");
    assert_eq!(driver.mount("cache").await.err, "");
    assert_eq!(driver.service.volume("cache").unwrap().mount_count, 2);
    assert_eq!(driver.invoker.call_count("mount"), 1);

    // Releasing a shared holder succeeds and keeps the export attached
    assert_eq!(driver.unmount("cache").await.err, "");
    assert_eq!(driver.service.volume("cache").unwrap().mount_count, 1);
    assert_eq!(driver.invoker.call_count("umount"), 0);

    assert_eq!(driver.mount("cache").await.err, "");
    assert_eq!(driver.remove("cache").await.err, "");
    assert_eq!(driver.invoker.call_count("umount"), 1);
    assert!(driver.service.volume("cache").is_none());
}

#[tokio::test]
async fn test_remove_keeps_record_when_unmount_fails() {
    let driver = Driver::new();
    assert_eq!(driver.create("logs", "", "ro,soft").await.err, "");
    assert_eq!(driver.mount("logs").await.err, "");
    assert_eq!(driver.mount("logs").await.err, "");
    driver.invoker.always_fail("umount");

    let response = driver.remove("logs").await;
    assert!(response.err.starts_with("Error unmounting 'logs'"), "{}", response.err);
    assert_eq!(driver.service.volume("logs").unwrap().mount_count, 1);
    assert_eq!(driver.path("logs").await.err, "");

    let calls = driver.invoker.calls();
    assert_eq!(
        calls[0].1,
        vec![
            "-o".to_string(),
            "ro,soft".to_string(),
            "nfs.internal:/exports/logs".to_string(),
            driver.mount_point("logs").to_string_lossy().into_owned(),
        ]
    );
}

#[tokio::test]
async fn test_unknown_volume_operations() {
    let driver = Driver::new();

    assert_eq!(driver.mount("ghost").await.err, "Volume 'ghost' not found");
    assert_eq!(driver.unmount("ghost").await.err, "Volume 'ghost' not found");
    assert_eq!(driver.path("ghost").await.err, "Volume 'ghost' not found");
    assert_eq!(driver.remove("ghost").await.err, "Volume 'ghost' not found");
    assert_eq!(driver.remove("").await.err, "Missing metadata 'volume name'");
    assert!(driver.invoker.calls().is_empty());
}

#[tokio::test]
async fn test_health_endpoint() {
    let driver = Driver::new();
    let response = driver
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
}
