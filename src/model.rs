// Wire types for the robot hub HTTP and WebSocket endpoints.

use serde::{Deserialize, Serialize};

/// Image size assumed when a perception message carries none.
pub const DEFAULT_IMAGE_SIZE: [f64; 2] = [960.0, 540.0];

/// Thumbnail shown for robots that have none.
pub const DEFAULT_THUMBNAIL: &str = "/static/img/logo.png";

// ── Roster ───────────────────────────────────────────────────────────

/// One entry of `GET /api/robots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterResponse {
    #[serde(default)]
    pub robots: Vec<RobotSummary>,
}

// ── Detail ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotEndpoints {
    pub mjpeg: String,
    pub perception: String,
}

/// Response of `GET /api/robots/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotDetail {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    pub endpoints: RobotEndpoints,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl RobotDetail {
    /// Display title: the robot's name, or the requested id when the name is missing or empty.
    pub fn title<'a>(&'a self, requested_id: &'a str) -> &'a str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => requested_id,
        }
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Response of `GET /api/robots/{id}/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotStatus {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub ip: Option<String>,
}

// ── Demo actions ─────────────────────────────────────────────────────

/// Body of a demo action or fleet demo response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemoReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoStartRequest<'a> {
    pub kind: &'a str,
}

// ── Streams ──────────────────────────────────────────────────────────

/// One detection box in image pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionBox {
    /// Track id; backends send either numbers or strings.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    pub xywh: [f64; 4],
}

/// A message on the perception WebSocket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerceptionMessage {
    #[serde(default)]
    pub ts: Option<f64>,
    #[serde(default)]
    pub image_size: Option<[f64; 2]>,
    #[serde(default)]
    pub boxes: Vec<PerceptionBox>,
}

impl PerceptionMessage {
    pub fn image_size_or_default(&self) -> [f64; 2] {
        self.image_size.unwrap_or(DEFAULT_IMAGE_SIZE)
    }
}

/// A message on the visualizer WebSocket. Messages without `points` carry nothing to draw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloudMessage {
    #[serde(default)]
    pub points: Option<Vec<[f32; 3]>>,
}
