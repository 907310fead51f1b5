// Integration tests for the HTTP surface against a mock hub: roster,
// detail lookup, status, demo actions and the fleet demo endpoints.

mod common;

use common::{MockHub, FLAKY_ROBOT, SPOT};

use robot_hub_console::demo::{self, Feedback, Tone};
use robot_hub_console::views::{robot_id_from_href, Presence, RobotListView};
use robot_hub_console::HubError;

// ── Roster ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_roster_renders_one_card_per_robot() {
    let hub = MockHub::spawn().await;
    let client = hub.client();

    let mut view = RobotListView::new();
    view.load(&client).await.unwrap();

    let cards = view.cards();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].name, "Spot");
    assert_eq!(cards[0].href, "/robot?id=spot-001");
    assert_eq!(cards[0].thumbnail, "/static/img/spot.png");
    assert_eq!(cards[1].href, "/robot?id=arm+2");
    assert_eq!(cards[1].thumbnail, "/static/img/logo.png");
    assert_eq!(robot_id_from_href(&cards[1].href).as_deref(), Some(FLAKY_ROBOT));
}

#[tokio::test]
async fn test_failed_status_shows_offline() {
    let hub = MockHub::spawn().await;
    let client = hub.client();

    let mut view = RobotListView::new();
    view.load(&client).await.unwrap();

    assert_eq!(view.cards()[0].presence, Presence::Online);
    assert_eq!(view.cards()[1].presence, Presence::Offline);
    let text = view.render();
    assert!(text.contains("Online"));
    assert!(text.contains("Offline"));
}

#[tokio::test]
async fn test_reload_does_not_duplicate_cards() {
    let hub = MockHub::spawn().await;
    let client = hub.client();

    let mut view = RobotListView::new();
    view.load(&client).await.unwrap();
    view.load(&client).await.unwrap();
    assert_eq!(view.cards().len(), 2);
}

#[tokio::test]
async fn test_roster_unreachable_is_an_error() {
    let mut view = RobotListView::new();
    let err = view.load(&common::unreachable_client()).await.unwrap_err();
    assert!(matches!(err, HubError::Network(_)));
    assert!(view.cards().is_empty());
}

// ── Detail & status ──────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_robot_is_not_found() {
    let hub = MockHub::spawn().await;
    let err = hub.client().get_robot("ghost").await.unwrap_err();
    assert!(matches!(err, HubError::NotFound(ref id) if id == "ghost"));
}

#[tokio::test]
async fn test_detail_with_encoded_id() {
    let hub = MockHub::spawn().await;
    let detail = hub.client().get_robot(FLAKY_ROBOT).await.unwrap();
    assert_eq!(detail.title(FLAKY_ROBOT), FLAKY_ROBOT);
    assert_eq!(detail.endpoints.mjpeg, "/api/robots/arm%202/stream/mjpeg");
}

#[tokio::test]
async fn test_status_reports_ip() {
    let hub = MockHub::spawn().await;
    let client = hub.client();
    let status = client.get_status(SPOT).await.unwrap();
    assert!(status.online);
    assert_eq!(status.ip.as_deref(), Some("10.0.0.5"));

    let err = client.get_status(FLAKY_ROBOT).await.unwrap_err();
    assert!(matches!(err, HubError::Http { status: 500, .. }));
    assert!(!client.is_online(FLAKY_ROBOT).await);
}

#[tokio::test]
async fn test_battery() {
    let hub = MockHub::spawn().await;
    let client = hub.client();
    let battery = client.battery(SPOT).await.unwrap();
    assert_eq!(battery["percent"], 87);
    assert!(matches!(
        client.battery("ghost").await,
        Err(HubError::Server(_))
    ));
}

#[tokio::test]
async fn test_battery_json_error_status_is_http_error() {
    let hub = MockHub::spawn().await;
    let err = hub.client().battery(FLAKY_ROBOT).await.unwrap_err();
    assert!(matches!(err, HubError::Http { status: 500, .. }));
}

// ── Demo actions ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_demo_message_is_success() {
    let hub = MockHub::spawn().await;
    let feedback = demo::dispatch(&hub.client(), SPOT, "wiggle").await;
    assert_eq!(feedback.text, "wiggle ok");
    assert_eq!(feedback.tone, Tone::Success);

    let calls = hub.state.demo_calls.lock().unwrap().clone();
    assert_eq!(calls, vec![(SPOT.to_string(), "wiggle".to_string())]);
}

#[tokio::test]
async fn test_demo_without_message_reads_ok() {
    let hub = MockHub::spawn().await;
    let feedback = demo::dispatch(&hub.client(), SPOT, "stand").await;
    assert_eq!(feedback.text, "OK");
    assert!(!feedback.is_error());
}

#[tokio::test]
async fn test_demo_error_body_is_error_feedback() {
    let hub = MockHub::spawn().await;
    let feedback = demo::dispatch(&hub.client(), SPOT, "busy").await;
    assert_eq!(feedback.text, "robot busy");
    assert!(feedback.is_error());
}

#[tokio::test]
async fn test_demo_non_json_failure() {
    let hub = MockHub::spawn().await;
    let feedback = demo::dispatch(&hub.client(), SPOT, "garbled").await;
    assert!(feedback.is_error());
    assert!(feedback.text.starts_with("Error: HTTP 502"));
}

#[tokio::test]
async fn test_demo_network_failure() {
    let feedback = demo::dispatch(&common::unreachable_client(), SPOT, "sit").await;
    assert!(feedback.is_error());
    assert!(feedback.text.starts_with("Error: "));
}

#[tokio::test]
async fn test_fleet_demo_and_visualizer_launch() {
    let hub = MockHub::spawn().await;
    let client = hub.client();

    let reply = client.start_demo("spot").await.unwrap();
    assert_eq!(reply.message.as_deref(), Some("demo started for spot"));
    let reply = client.stop_demo().await.unwrap();
    assert_eq!(reply.message.as_deref(), Some("demo stopped"));
    let reply = client.launch_visualizer(SPOT).await.unwrap();
    assert_eq!(
        reply.message.as_deref(),
        Some("visualizer launched for spot-001")
    );
}

#[tokio::test]
async fn test_fleet_demo_error_reply_is_error_feedback() {
    let hub = MockHub::spawn().await;
    let reply = hub.client().start_demo("drone").await.unwrap();
    let feedback = Feedback::from_reply(&reply);
    assert!(feedback.is_error());
    assert_eq!(feedback.text, "no drones registered");
}
