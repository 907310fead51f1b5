// Prometheus metrics for the robot hub console.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// WebSocket channels currently open (perception + visualizer).
    pub static ref OPEN_WEBSOCKETS: IntGauge =
        IntGauge::new("robot_hub_open_websockets", "WebSocket channels currently open").unwrap();

    /// Points in the most recently committed point cloud.
    pub static ref POINT_CLOUD_POINTS: IntGauge =
        IntGauge::new("robot_hub_point_cloud_points", "Points in the committed cloud").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Status polls, by result (online, offline, failed).
    pub static ref STATUS_POLLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("robot_hub_status_polls_total", "Status polls"),
        &["result"],
    )
    .unwrap();

    /// Demo action requests, by outcome (ok, server_error, failed).
    pub static ref DEMO_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("robot_hub_demo_requests_total", "Demo action requests"),
        &["outcome"],
    )
    .unwrap();

    /// WebSocket messages received, by channel.
    pub static ref WEBSOCKET_MESSAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("robot_hub_websocket_messages_total", "WebSocket messages received"),
        &["channel"],
    )
    .unwrap();

    /// WebSocket reconnect attempts, by channel.
    pub static ref WEBSOCKET_RECONNECTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("robot_hub_websocket_reconnects_total", "WebSocket reconnect attempts"),
        &["channel"],
    )
    .unwrap();

    /// Overlay frames skipped because the transform was degenerate.
    pub static ref OVERLAY_FRAMES_SKIPPED_TOTAL: IntCounter = IntCounter::new(
        "robot_hub_overlay_frames_skipped_total",
        "Overlay frames skipped on a degenerate transform",
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(OPEN_WEBSOCKETS.clone()),
            Box::new(POINT_CLOUD_POINTS.clone()),
            Box::new(STATUS_POLLS_TOTAL.clone()),
            Box::new(DEMO_REQUESTS_TOTAL.clone()),
            Box::new(WEBSOCKET_MESSAGES_TOTAL.clone()),
            Box::new(WEBSOCKET_RECONNECTS_TOTAL.clone()),
            Box::new(OVERLAY_FRAMES_SKIPPED_TOTAL.clone()),
        ];

        for c in collectors {
            if let Err(e) = REGISTRY.register(c) {
                tracing::warn!("failed to register metric: {e}");
            }
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
