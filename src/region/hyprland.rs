use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;

use super::{ElementInfo, RegionSource, RegionSourceError, RegionSourceResult, WindowDescriptor};
use crate::geometry::{Point, Rect};

const SOCKET_TIMEOUT: Duration = Duration::from_millis(250);
const FLOATING_LAYER_BONUS: i32 = 50;
const FOCUS_HISTORY_DEPTH: i32 = 50;

#[derive(Deserialize)]
struct ClientStatus {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    mapped: Option<bool>,
    #[serde(default)]
    hidden: Option<bool>,
    #[serde(default)]
    floating: Option<bool>,
    #[serde(default)]
    pinned: Option<bool>,
    #[serde(default, rename = "focusHistoryID")]
    focus_history_id: Option<i32>,
    #[serde(default)]
    at: Option<[i32; 2]>,
    #[serde(default)]
    size: Option<[i32; 2]>,
    #[serde(default)]
    workspace: Option<WorkspaceStatus>,
}

#[derive(Deserialize)]
struct WorkspaceStatus {
    #[serde(default)]
    id: Option<i32>,
}

/// Window enumeration backed by Hyprland's client list.
#[derive(Debug, Default, Clone)]
pub struct HyprRegionSource;

impl HyprRegionSource {
    fn query(&self, request: &str) -> RegionSourceResult<String> {
        match request_over_socket(request) {
            Some(payload) => Ok(payload),
            None => query_with_hyprctl(request),
        }
    }
}

impl RegionSource for HyprRegionSource {
    fn windows(&self) -> RegionSourceResult<Vec<WindowDescriptor>> {
        let clients = self.query("clients")?;
        let workspace = self
            .query("activeworkspace")
            .ok()
            .and_then(|payload| parse_active_workspace_id(&payload));
        parse_window_descriptors(&clients, workspace)
    }

    fn element_at(&self, _point: Point) -> RegionSourceResult<Option<ElementInfo>> {
        Ok(None)
    }
}

fn request_socket_path() -> Option<PathBuf> {
    let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").ok()?;
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").ok()?;
    Some(
        PathBuf::from(runtime_dir)
            .join("hypr")
            .join(signature)
            .join(".socket.sock"),
    )
}

fn request_over_socket(request: &str) -> Option<String> {
    let path = request_socket_path()?;
    let mut stream = match UnixStream::connect(&path) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::debug!(path = %path.display(), ?err, "hyprland request socket unavailable");
            return None;
        }
    };
    if let Err(err) = stream.set_read_timeout(Some(SOCKET_TIMEOUT)) {
        tracing::debug!(path = %path.display(), ?err, "could not set hyprland socket read timeout");
    }
    stream.write_all(format!("j/{request}").as_bytes()).ok()?;
    let mut payload = String::new();
    stream.read_to_string(&mut payload).ok()?;
    (!payload.trim().is_empty()).then_some(payload)
}

fn query_with_hyprctl(request: &str) -> RegionSourceResult<String> {
    let output = Command::new("hyprctl")
        .args([request, "-j"])
        .output()
        .map_err(|err| RegionSourceError::WindowQueryFailed {
            message: format!("hyprctl {request}: {err}"),
        })?;
    if !output.status.success() {
        return Err(RegionSourceError::WindowQueryFailed {
            message: format!("hyprctl {request} exited with status {}", output.status),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn parse_active_workspace_id(payload: &str) -> Option<i32> {
    serde_json::from_str::<WorkspaceStatus>(payload)
        .ok()
        .and_then(|workspace| workspace.id)
}

fn z_layer(client: &ClientStatus) -> i32 {
    let floating = if client.floating.unwrap_or(false) {
        FLOATING_LAYER_BONUS
    } else {
        0
    };
    let recency = client
        .focus_history_id
        .unwrap_or(FOCUS_HISTORY_DEPTH)
        .clamp(0, FOCUS_HISTORY_DEPTH);
    floating + (FOCUS_HISTORY_DEPTH - recency)
}

/// Maps mapped, visible clients on `workspace` (plus pinned ones) to descriptors.
/// With no workspace known every visible client is kept.
pub fn parse_window_descriptors(
    clients_json: &str,
    workspace: Option<i32>,
) -> RegionSourceResult<Vec<WindowDescriptor>> {
    let clients: Vec<ClientStatus> =
        serde_json::from_str(clients_json).map_err(|err| RegionSourceError::WindowQueryFailed {
            message: err.to_string(),
        })?;

    let mut descriptors = Vec::new();
    for client in clients {
        if client.hidden.unwrap_or(false) || matches!(client.mapped, Some(false)) {
            continue;
        }
        let on_workspace = match workspace {
            Some(active) => {
                client.pinned.unwrap_or(false)
                    || client.workspace.as_ref().and_then(|ws| ws.id) == Some(active)
            }
            None => true,
        };
        if !on_workspace {
            continue;
        }
        let (Some([x, y]), Some([width, height])) = (client.at, client.size) else {
            continue;
        };
        if width <= 0 || height <= 0 {
            continue;
        }

        let layer = z_layer(&client);
        descriptors.push(WindowDescriptor {
            id: client.address.unwrap_or_default(),
            bounds: Rect::new(
                f64::from(x),
                f64::from(y),
                f64::from(width),
                f64::from(height),
            ),
            owner: client.class.unwrap_or_default(),
            title: client.title.unwrap_or_default(),
            z_layer: layer,
        });
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_window_descriptors_keeps_visible_clients_on_active_workspace() {
        let clients_json = r#"
[
  {"address":"0x1","title":"Browser","class":"firefox","mapped":true,"hidden":false,"floating":false,"focusHistoryID":0,"workspace":{"id":1},"at":[5,10],"size":[400,300]},
  {"address":"0x2","title":"Other","class":"kitty","mapped":true,"hidden":false,"workspace":{"id":2},"at":[8,9],"size":[500,600]},
  {"address":"0x3","title":"Hidden","class":"kitty","mapped":true,"hidden":true,"workspace":{"id":1},"at":[0,0],"size":[100,100]},
  {"address":"0x4","title":"Unmapped","mapped":false,"workspace":{"id":1},"at":[0,0],"size":[100,100]},
  {"address":"0x5","title":"Pinned","class":"pinshot","mapped":true,"pinned":true,"floating":true,"focusHistoryID":3,"workspace":{"id":7},"at":[20,20],"size":[280,150]},
  {"address":"0x6","title":"NoGeometry","mapped":true,"workspace":{"id":1}}
]
"#;
        let windows = parse_window_descriptors(clients_json, Some(1)).expect("clients parse");
        assert_eq!(
            windows,
            vec![
                WindowDescriptor {
                    id: "0x1".to_string(),
                    bounds: Rect::new(5.0, 10.0, 400.0, 300.0),
                    owner: "firefox".to_string(),
                    title: "Browser".to_string(),
                    z_layer: 50,
                },
                WindowDescriptor {
                    id: "0x5".to_string(),
                    bounds: Rect::new(20.0, 20.0, 280.0, 150.0),
                    owner: "pinshot".to_string(),
                    title: "Pinned".to_string(),
                    z_layer: 97,
                },
            ]
        );
    }

    #[test]
    fn z_layer_ranks_floating_and_recent_focus_higher() {
        let json = r#"
[
  {"address":"a","floating":false,"focusHistoryID":2,"at":[0,0],"size":[100,100]},
  {"address":"b","floating":true,"focusHistoryID":80,"at":[0,0],"size":[100,100]},
  {"address":"c","at":[0,0],"size":[100,100]}
]
"#;
        let layers: Vec<i32> = parse_window_descriptors(json, None)
            .expect("clients parse")
            .into_iter()
            .map(|window| window.z_layer)
            .collect();
        assert_eq!(layers, vec![48, 50, 0]);
    }

    #[test]
    fn parse_window_descriptors_rejects_malformed_payload() {
        let err = parse_window_descriptors("not json", None).expect_err("must fail");
        assert!(matches!(err, RegionSourceError::WindowQueryFailed { .. }));
    }

    #[test]
    fn parse_active_workspace_id_reads_id_field() {
        assert_eq!(
            parse_active_workspace_id(r#"{"id":4,"name":"4","monitor":"DP-1"}"#),
            Some(4)
        );
        assert_eq!(parse_active_workspace_id("[]"), None);
    }
}
