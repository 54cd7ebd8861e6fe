// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Volume plugin protocol handler
//!
//! JSON over HTTP, one POST endpoint per operation. Every domain failure is
//! reported in the `Err` field of an HTTP 200 response; the protocol does not
//! use status codes to distinguish failure kinds.

use crate::application::volume_manager::VolumeService;
use crate::domain::volume::{NfsVersion, ValidationError, VolumeError, VolumeInfo, VolumeSpec};
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct AppState {
    pub volume_service: Arc<dyn VolumeService>,
    pub start_time: Instant,
}

pub fn app(service: Arc<dyn VolumeService>) -> Router {
    let state = Arc::new(AppState {
        volume_service: service,
        start_time: Instant::now(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Get", post(get_volume))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Remove", post(remove))
        .with_state(state)
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NameRequest {
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Caller (container) identifier sent with Mount/Unmount; informational only
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Sent as `null` when the caller passed no options
    #[serde(rename = "Opts", default, deserialize_with = "null_as_default")]
    pub opts: CreateOpts,
}

/// Options bag of a Create request, validated into a [`VolumeSpec`].
///
/// `None` means the key was absent; a key present with `null` is `Some(Value::Null)`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateOpts {
    #[serde(default, deserialize_with = "present")]
    pub localmountpoint: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub remotemountpoint: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub remoteinfo: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub opts: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub version: Option<Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn required_string(field: &'static str, value: Option<Value>) -> Result<String, ValidationError> {
    match value {
        None => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::WrongType(field)),
    }
}

fn parse_version(value: Option<Value>) -> NfsVersion {
    match value {
        Some(Value::String(s)) => NfsVersion::parse(&s),
        Some(Value::Number(n)) => NfsVersion::parse(&n.to_string()),
        _ => NfsVersion::Unspecified,
    }
}

impl TryFrom<CreateOpts> for VolumeSpec {
    type Error = ValidationError;

    fn try_from(opts: CreateOpts) -> Result<Self, Self::Error> {
        let local_mount_point = required_string("localmountpoint", opts.localmountpoint)?;
        let remote_mount_point = required_string("remotemountpoint", opts.remotemountpoint)?;
        let remote_info = required_string("remoteinfo", opts.remoteinfo)?;
        let mount_opts = required_string("opts", opts.opts)?;

        Ok(VolumeSpec::new(remote_info, remote_mount_point, local_mount_point)
            .with_version(parse_version(opts.version))
            .with_opts(mount_opts))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireVolume {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Mountpoint", default)]
    pub mountpoint: String,
}

impl From<VolumeInfo> for WireVolume {
    fn from(info: VolumeInfo) -> Self {
        Self {
            name: info.name,
            mountpoint: info.mountpoint.map(path_string).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Err", default)]
    pub err: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ActivateResponse {
    #[serde(rename = "Implements")]
    pub implements: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "Scope")]
    pub scope: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    #[serde(rename = "Capabilities")]
    pub capabilities: Capability,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(rename = "Volume", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<WireVolume>,
    #[serde(rename = "Err", default)]
    pub err: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MountpointResponse {
    #[serde(rename = "Mountpoint", default)]
    pub mountpoint: String,
    #[serde(rename = "Err", default)]
    pub err: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(rename = "Volumes", default)]
    pub volumes: Vec<WireVolume>,
    #[serde(rename = "Err", default)]
    pub err: String,
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

fn error_text(operation: &str, name: &str, err: &VolumeError) -> String {
    warn!("{} '{}' failed: {}", operation, name, err);
    err.to_string()
}

/// Decode a request body; an empty body decodes as `{}`
fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, String> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body.as_ref()
    };
    serde_json::from_slice(raw).map_err(|e| {
        warn!("Malformed request body: {}", e);
        format!("malformed request: {}", e)
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn activate() -> Json<ActivateResponse> {
    info!("Plugin activated");
    Json(ActivateResponse {
        implements: vec!["VolumeDriver".to_string()],
    })
}

async fn capabilities() -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        capabilities: Capability {
            scope: "global".to_string(),
        },
    })
}

async fn create(State(state): State<Arc<AppState>>, body: Bytes) -> Json<ErrorResponse> {
    let request: CreateRequest = match decode(&body) {
        Ok(request) => request,
        Err(err) => return Json(ErrorResponse { err }),
    };
    debug!("Create request: {:?}", request);

    let result = match VolumeSpec::try_from(request.opts) {
        Ok(spec) => state.volume_service.create_volume(&request.name, spec).await,
        Err(e) => Err(e.into()),
    };

    Json(ErrorResponse {
        err: result
            .err()
            .map(|e| error_text("Create", &request.name, &e))
            .unwrap_or_default(),
    })
}

async fn get_volume(State(state): State<Arc<AppState>>, body: Bytes) -> Json<GetResponse> {
    let request: NameRequest = match decode(&body) {
        Ok(request) => request,
        Err(err) => return Json(GetResponse { volume: None, err }),
    };

    Json(match state.volume_service.get_volume(&request.name).await {
        Ok(info) => GetResponse {
            volume: Some(info.into()),
            err: String::new(),
        },
        Err(e) => GetResponse {
            volume: None,
            err: error_text("Get", &request.name, &e),
        },
    })
}

async fn path(State(state): State<Arc<AppState>>, body: Bytes) -> Json<MountpointResponse> {
    let request: NameRequest = match decode(&body) {
        Ok(request) => request,
        Err(err) => return Json(MountpointResponse { mountpoint: String::new(), err }),
    };

    Json(match state.volume_service.volume_path(&request.name).await {
        Ok(mountpoint) => MountpointResponse {
            mountpoint: path_string(mountpoint),
            err: String::new(),
        },
        Err(e) => MountpointResponse {
            mountpoint: String::new(),
            err: error_text("Path", &request.name, &e),
        },
    })
}

async fn list(State(state): State<Arc<AppState>>) -> Json<ListResponse> {
    let volumes = state.volume_service.list_volumes().await;
    Json(ListResponse {
        volumes: volumes.into_iter().map(WireVolume::from).collect(),
        err: String::new(),
    })
}

async fn mount(State(state): State<Arc<AppState>>, body: Bytes) -> Json<MountpointResponse> {
    let request: NameRequest = match decode(&body) {
        Ok(request) => request,
        Err(err) => return Json(MountpointResponse { mountpoint: String::new(), err }),
    };
    debug!("Mount request for '{}' (caller: {:?})", request.name, request.id);

    Json(match state.volume_service.mount_volume(&request.name).await {
        Ok(mountpoint) => MountpointResponse {
            mountpoint: path_string(mountpoint),
            err: String::new(),
        },
        Err(e) => MountpointResponse {
            mountpoint: String::new(),
            err: error_text("Mount", &request.name, &e),
        },
    })
}

async fn unmount(State(state): State<Arc<AppState>>, body: Bytes) -> Json<ErrorResponse> {
    let request: NameRequest = match decode(&body) {
        Ok(request) => request,
        Err(err) => return Json(ErrorResponse { err }),
    };
    debug!("Unmount request for '{}' (caller: {:?})", request.name, request.id);

    let result = state.volume_service.unmount_volume(&request.name).await;
    Json(ErrorResponse {
        err: result
            .err()
            .map(|e| error_text("Unmount", &request.name, &e))
            .unwrap_or_default(),
    })
}

async fn remove(State(state): State<Arc<AppState>>, body: Bytes) -> Json<ErrorResponse> {
    let request: NameRequest = match decode(&body) {
        Ok(request) => request,
        Err(err) => return Json(ErrorResponse { err }),
    };

    let result = state.volume_service.remove_volume(&request.name).await;
    Json(ErrorResponse {
        err: result
            .err()
            .map(|e| error_text("Remove", &request.name, &e))
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::volume_manager::StandardVolumeService;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::host_fs::LocalHostFilesystem;
    use crate::infrastructure::process::MockInvoker;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn opts(value: Value) -> CreateOpts {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_create_opts_validation_order() {
        let err = VolumeSpec::try_from(opts(json!({}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("localmountpoint"));

        let err = VolumeSpec::try_from(opts(json!({
            "localmountpoint": "/mnt/v1",
            "remotemountpoint": "/exports/v1",
            "opts": "",
        })))
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("remoteinfo"));

        let err = VolumeSpec::try_from(opts(json!({
            "localmountpoint": "/mnt/v1",
            "remotemountpoint": 42,
            "remoteinfo": "10.0.0.5",
            "opts": "",
        })))
        .unwrap_err();
        assert_eq!(err, ValidationError::WrongType("remotemountpoint"));
    }

    #[test]
    fn test_null_option_values_are_wrong_type() {
        let err = VolumeSpec::try_from(opts(json!({
            "localmountpoint": "/mnt/v1",
            "remotemountpoint": "/exports/v1",
            "remoteinfo": "10.0.0.5",
            "opts": null,
        })))
        .unwrap_err();
        assert_eq!(err, ValidationError::WrongType("opts"));

        let err = VolumeSpec::try_from(opts(json!({"localmountpoint": null}))).unwrap_err();
        assert_eq!(err, ValidationError::WrongType("localmountpoint"));

        // A null version is simply unspecified
        let spec = VolumeSpec::try_from(opts(json!({
            "localmountpoint": "/mnt/v1",
            "remotemountpoint": "/exports/v1",
            "remoteinfo": "10.0.0.5",
            "opts": "",
            "version": null,
        })))
        .unwrap();
        assert_eq!(spec.version, NfsVersion::Unspecified);
    }

    #[test]
    fn test_null_opts_decodes_as_empty() {
        let request: CreateRequest =
            decode(&Bytes::from_static(br#"{"Name":"v1","Opts":null}"#)).unwrap();
        assert_eq!(request.name, "v1");
        assert!(request.opts.localmountpoint.is_none());

        let request: CreateRequest = decode(&Bytes::from_static(br#"{"Name":"v1"}"#)).unwrap();
        assert!(request.opts.opts.is_none());
    }

    #[test]
    fn test_create_opts_to_spec() {
        let spec = VolumeSpec::try_from(opts(json!({
            "localmountpoint": "/mnt/v1",
            "remotemountpoint": "/exports/v1",
            "remoteinfo": "10.0.0.5",
            "opts": "vers=4",
            "version": 4.1,
        })))
        .unwrap();

        assert_eq!(spec.local_mount_point, PathBuf::from("/mnt/v1"));
        assert_eq!(spec.source(), "10.0.0.5:/exports/v1");
        assert_eq!(spec.version, NfsVersion::V41);
        assert_eq!(spec.opts, "vers=4");

        let spec = VolumeSpec::try_from(opts(json!({
            "localmountpoint": "/mnt/v1",
            "remotemountpoint": "/exports/v1",
            "remoteinfo": "10.0.0.5",
            "opts": "",
        })))
        .unwrap();
        assert_eq!(spec.version, NfsVersion::Unspecified);
    }

    #[test]
    fn test_decode_empty_body() {
        let request: NameRequest = decode(&Bytes::new()).unwrap();
        assert!(request.name.is_empty());
        assert!(decode::<NameRequest>(&Bytes::from_static(b"{not json")).is_err());
    }

    async fn post_json(router: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/vnd.docker.plugins.v1.2+json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn router() -> Router {
        app(Arc::new(StandardVolumeService::new(
            Arc::new(MockInvoker::new()),
            Arc::new(LocalHostFilesystem::new()),
            Arc::new(EventBus::with_default_capacity()),
        )))
    }

    #[tokio::test]
    async fn test_activate_and_capabilities() {
        let (status, body) = post_json(router(), "/Plugin.Activate", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"Implements": ["VolumeDriver"]}));

        let (_, body) = post_json(router(), "/VolumeDriver.Capabilities", "").await;
        assert_eq!(body, json!({"Capabilities": {"Scope": "global"}}));
    }

    #[tokio::test]
    async fn test_errors_ride_in_err_field() {
        let (status, body) =
            post_json(router(), "/VolumeDriver.Create", r#"{"Name": "v1", "Opts": {}}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Err"], "Missing Mandatory 'localmountpoint' field in Opts");

        let (status, body) =
            post_json(router(), "/VolumeDriver.Create", r#"{"Name": "v1", "Opts": null}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Err"], "Missing Mandatory 'localmountpoint' field in Opts");

        let (_, body) = post_json(
            router(),
            "/VolumeDriver.Create",
            r#"{"Name": "v1", "Opts": {"localmountpoint": "/mnt/v1", "remotemountpoint": "/exports/v1", "remoteinfo": "10.0.0.5", "opts": null}}"#,
        )
        .await;
        assert_eq!(body["Err"], "Unable to string convert 'opts' field in Opts");

        let (status, body) = post_json(router(), "/VolumeDriver.Get", r#"{"Name": "ghost"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Err"], "Volume 'ghost' not found");
        assert!(body.get("Volume").is_none());

        let (status, body) = post_json(router(), "/VolumeDriver.Mount", "{broken").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["Err"].as_str().unwrap().starts_with("malformed request"));
    }

    #[tokio::test]
    async fn test_list_on_empty_registry() {
        let (_, body) = post_json(router(), "/VolumeDriver.List", "").await;
        assert_eq!(body, json!({"Volumes": [], "Err": ""}));
    }
}
