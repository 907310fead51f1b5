// Mock robot hub backend for integration tests, served by axum on an ephemeral port.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::time::Instant;
use url::Url;

use robot_hub_console::{Config, HubClient};

/// Robot whose status endpoint always answers 500.
pub const FLAKY_ROBOT: &str = "arm 2";
pub const SPOT: &str = "spot-001";
/// Robot whose perception socket closes shortly after each frame.
pub const FLAPPY_ROBOT: &str = "rover-3";

#[derive(Default)]
pub struct MockState {
    pub status_hits: AtomicUsize,
    pub demo_calls: Mutex<Vec<(String, String)>>,
    pub perception_connects: AtomicUsize,
    pub perception_connect_times: Mutex<Vec<Instant>>,
    pub visualizer_connects: AtomicUsize,
}

pub struct MockHub {
    pub base_url: Url,
    pub state: Arc<MockState>,
}

impl MockHub {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/robots", get(roster))
            .route("/api/robots/{id}", get(detail))
            .route("/api/robots/{id}/status", get(status))
            .route("/api/robots/{id}/battery", get(battery))
            .route("/api/robots/{id}/demo/{action}", post(demo))
            .route("/api/robots/{id}/launch-visualizer", post(launch_visualizer))
            .route("/api/robots/{id}/perception", get(perception))
            .route("/api/robots/{id}/visualizer", get(visualizer))
            .route("/api/robots/{id}/stream/mjpeg", get(mjpeg))
            .route("/demo/start", post(demo_start))
            .route("/demo/stop", post(demo_stop))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockHub {
            base_url: Url::parse(&format!("http://{addr}")).unwrap(),
            state,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            base_url: self.base_url.clone(),
            status_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(2),
            backoff_max: Duration::from_millis(200),
            ..Config::default()
        }
    }

    pub fn client(&self) -> HubClient {
        HubClient::new(&self.config()).unwrap()
    }
}

/// Client for a port nothing listens on.
pub fn unreachable_client() -> HubClient {
    let config = Config {
        base_url: Url::parse("http://127.0.0.1:9").unwrap(),
        request_timeout: Duration::from_millis(500),
        ..Config::default()
    };
    HubClient::new(&config).unwrap()
}

/// Poll `check` until it holds or the deadline passes.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// SOI, an APP0 stub and a baseline SOF0 header carrying the frame size.
pub fn fake_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

// ── Handlers ─────────────────────────────────────────────────────────

fn known(id: &str) -> bool {
    id == SPOT || id == FLAKY_ROBOT || id == FLAPPY_ROBOT
}

async fn roster() -> Json<Value> {
    Json(json!({
        "robots": [
            {"id": SPOT, "name": "Spot", "kind": "spot", "thumbnail": "/static/img/spot.png"},
            {"id": FLAKY_ROBOT, "name": "Arm", "kind": "arm"},
        ]
    }))
}

async fn detail(Path(id): Path<String>) -> Json<Value> {
    if !known(&id) {
        return Json(json!({"error": "not_found"}));
    }
    let name = if id == SPOT { json!("Spot") } else { Value::Null };
    let prefix = format!("/api/robots/{}", urlencode(&id));
    Json(json!({
        "id": id,
        "name": name,
        "kind": "spot",
        "endpoints": {
            "mjpeg": format!("{prefix}/stream/mjpeg"),
            "perception": format!("{prefix}/perception"),
        }
    }))
}

fn urlencode(id: &str) -> String {
    id.replace(' ', "%20")
}

async fn status(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    state.status_hits.fetch_add(1, Ordering::SeqCst);
    if id == FLAKY_ROBOT {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(json!({"online": true, "ip": "10.0.0.5"})).into_response()
}

async fn battery(Path(id): Path<String>) -> Response {
    if !known(&id) {
        return Json(json!({"error": "not_found"})).into_response();
    }
    if id == FLAKY_ROBOT {
        let body = Json(json!({"detail": "battery service down"}));
        return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
    }
    Json(json!({"percent": 87, "charging": false})).into_response()
}

async fn demo(
    State(state): State<Arc<MockState>>,
    Path((id, action)): Path<(String, String)>,
) -> Response {
    state
        .demo_calls
        .lock()
        .unwrap()
        .push((id.clone(), action.clone()));
    match action.as_str() {
        "busy" => (StatusCode::CONFLICT, Json(json!({"error": "robot busy"}))).into_response(),
        "stand" => Json(json!({"status": "ok"})).into_response(),
        "garbled" => (StatusCode::BAD_GATEWAY, "<html>").into_response(),
        _ => Json(json!({"message": format!("{action} ok")})).into_response(),
    }
}

async fn launch_visualizer(Path(id): Path<String>) -> Json<Value> {
    Json(json!({"message": format!("visualizer launched for {id}")}))
}

async fn demo_start(Json(body): Json<Value>) -> Response {
    let kind = body.get("kind").and_then(Value::as_str).unwrap_or("?");
    if kind == "drone" {
        let body = Json(json!({"error": "no drones registered"}));
        return (StatusCode::BAD_REQUEST, body).into_response();
    }
    Json(json!({"message": format!("demo started for {kind}")})).into_response()
}

async fn demo_stop() -> Json<Value> {
    Json(json!({"message": "demo stopped"}))
}

async fn perception(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    state.perception_connects.fetch_add(1, Ordering::SeqCst);
    state
        .perception_connect_times
        .lock()
        .unwrap()
        .push(Instant::now());
    ws.on_upgrade(move |mut socket| async move {
        let frame = json!({
            "ts": 1.5,
            "image_size": [960, 540],
            "boxes": [{"id": 1, "label": "person", "score": 0.91, "xywh": [100, 100, 50, 50]}]
        });
        if id == FLAPPY_ROBOT {
            let _ = socket.send(Message::Text(frame.to_string().into())).await;
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
        push_then_idle(socket, vec![frame]).await
    })
}

async fn visualizer(State(state): State<Arc<MockState>>, ws: WebSocketUpgrade) -> Response {
    state.visualizer_connects.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(|socket| {
        let frames = vec![
            json!({"points": [[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]}),
            json!({"points": [[0.1, 0.2, 0.3], [0.0, 0.0, 1.0], [-0.5, 0.2, 0.0]]}),
        ];
        push_then_idle(socket, frames)
    })
}

/// Send every frame, then hold the socket open until the client leaves.
async fn push_then_idle(mut socket: WebSocket, frames: Vec<Value>) {
    for frame in frames {
        if socket
            .send(Message::Text(frame.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

async fn mjpeg() -> Response {
    let jpg = fake_jpeg(640, 480);
    let mut body = Vec::new();
    for _ in 0..2 {
        body.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n");
        body.extend_from_slice(format!("Content-Length: {}\r\n\r\n", jpg.len()).as_bytes());
        body.extend_from_slice(&jpg);
        body.extend_from_slice(b"\r\n");
    }
    (
        [(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )],
        Body::from(body),
    )
        .into_response()
}
