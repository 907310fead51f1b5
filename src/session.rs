// Detail session: owns one robot's view state and every task feeding it.
//
// A session holds at most one status poller, one perception channel, one
// visualizer channel and one render loop. All of them share a cancellation
// token; `teardown` cancels it and waits for the tasks to finish.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::ws::{self, Channel, ChannelEvent, ReconnectPolicy};
use crate::api::HubClient;
use crate::config::Config;
use crate::demo::{self, Feedback};
use crate::error::{HubError, HubResult};
use crate::mjpeg;
use crate::pointcloud::{self, AsciiRenderer, Visualizer, FRAME_INTERVAL};
use crate::status::{self, StatusUpdate};
use crate::views::{LinkState, Pane, RobotDetailView};

/// First reconnect delay for WebSocket channels.
const RECONNECT_BASE: Duration = Duration::from_millis(500);

/// Per-session switches and timings, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub status_interval: Duration,
    pub reconnect_base: Duration,
    pub backoff_max: Duration,
    pub overlay: bool,
    pub visualizer: bool,
    pub display_size: Option<(u32, u32)>,
    /// Size of the ASCII point-cloud frame, in terminal cells.
    pub viz_cells: (usize, usize),
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            status_interval: config.status_interval,
            reconnect_base: RECONNECT_BASE,
            backoff_max: config.backoff_max,
            overlay: config.overlay,
            visualizer: config.visualizer,
            display_size: config.display_size,
            viz_cells: (60, 20),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct DetailSession {
    client: HubClient,
    robot_id: String,
    options: SessionOptions,
    view: Arc<Mutex<RobotDetailView>>,
    visualizer: Arc<Mutex<Visualizer>>,
    renderer: Arc<Mutex<AsciiRenderer>>,
    /// Count of status polls applied to the view.
    status_polls: watch::Receiver<u64>,
    cancel: CancellationToken,
    poller: Option<JoinHandle<()>>,
    perception: Option<JoinHandle<()>>,
    stream_probe: Option<JoinHandle<()>>,
    visualizer_feed: Option<JoinHandle<()>>,
    render_loop: Option<JoinHandle<()>>,
}

impl DetailSession {
    /// Fetch the robot's detail record and start the session's background tasks:
    /// status polling, the perception channel and (without a configured
    /// display size) a probe of the first MJPEG frame.
    pub async fn open(client: HubClient, robot_id: &str, options: SessionOptions) -> HubResult<Self> {
        let detail = client.get_robot(robot_id).await?;
        let stream_url = client.resolve(&detail.endpoints.mjpeg)?;
        let perception_url = ws::websocket_url(client.base_url(), &detail.endpoints.perception)?;

        let mut view = RobotDetailView::new(robot_id);
        view.apply_detail(&detail, stream_url.clone());
        view.overlay_enabled = options.overlay;
        if let Some((w, h)) = options.display_size {
            view.overlay.resize(w, h);
        }
        tracing::info!("opened session for {} ({robot_id})", view.title);

        let (cols, rows) = options.viz_cells;
        let (status_tx, status_polls) = watch::channel(0u64);
        let mut session = Self {
            client,
            robot_id: robot_id.to_string(),
            options,
            view: Arc::new(Mutex::new(view)),
            visualizer: Arc::new(Mutex::new(Visualizer::new())),
            renderer: Arc::new(Mutex::new(AsciiRenderer::new(cols, rows))),
            status_polls,
            cancel: CancellationToken::new(),
            poller: None,
            perception: None,
            stream_probe: None,
            visualizer_feed: None,
            render_loop: None,
        };

        session.start_poller(status_tx);
        session.start_perception(perception_url);
        if session.options.display_size.is_none() {
            session.start_stream_probe(stream_url);
        }
        Ok(session)
    }

    pub fn robot_id(&self) -> &str {
        &self.robot_id
    }

    /// A copy of the current view state.
    pub fn view(&self) -> RobotDetailView {
        lock(&self.view).clone()
    }

    pub fn render(&self) -> String {
        let mut out = lock(&self.view).render();
        if lock(&self.view).pane == Pane::Visualizer {
            let viz = lock(&self.visualizer);
            match viz.current() {
                Some(cloud) => out.push_str(&format!("  point cloud: {} points\n", cloud.len())),
                None => out.push_str("  point cloud: waiting for data\n"),
            }
            drop(viz);
            for line in lock(&self.renderer).last_frame() {
                out.push_str(&format!("  |{line}|\n"));
            }
        }
        out
    }

    /// Wait until the first status poll, successful or not, reached the view.
    /// Returns `false` if none did within `timeout`.
    pub async fn first_status(&self, timeout: Duration) -> bool {
        let mut polls = self.status_polls.clone();
        let reached = matches!(
            tokio::time::timeout(timeout, polls.wait_for(|n| *n > 0)).await,
            Ok(Ok(_))
        );
        reached
    }

    /// Point-cloud scene shared with the render loop.
    pub fn visualizer(&self) -> Arc<Mutex<Visualizer>> {
        self.visualizer.clone()
    }

    /// Resize the overlay canvas to a new display box.
    pub fn resize_viewport(&self, width: u32, height: u32) {
        lock(&self.view).overlay.resize(width, height);
    }

    /// Switch panes. The visualizer channel and render loop start the first
    /// time the visualizer pane is shown and keep running afterwards.
    pub fn show_pane(&mut self, pane: Pane) -> HubResult<()> {
        if pane == Pane::Visualizer {
            if !self.options.visualizer {
                return Err(HubError::Config("the visualizer is disabled".into()));
            }
            if self.visualizer_feed.is_none() {
                let url = self.client.visualizer_url(&self.robot_id)?;
                self.start_visualizer(url);
            }
        }
        lock(&self.view).pane = pane;
        Ok(())
    }

    /// Dispatch a demo action and show its feedback.
    ///
    /// Requests are not serialized: whichever response resolves last owns the
    /// feedback line.
    pub async fn demo(&self, action: &str) -> Feedback {
        let feedback = demo::dispatch(&self.client, &self.robot_id, action).await;
        lock(&self.view).set_feedback(feedback.clone());
        feedback
    }

    /// Fire-and-forget variant of [`DetailSession::demo`] for interactive use.
    pub fn spawn_demo(&self, action: String) -> JoinHandle<Feedback> {
        let client = self.client.clone();
        let robot_id = self.robot_id.clone();
        let view = self.view.clone();
        tokio::spawn(async move {
            let feedback = demo::dispatch(&client, &robot_id, &action).await;
            lock(&view).set_feedback(feedback.clone());
            feedback
        })
    }

    /// Whether each background task is still running, in the order
    /// poller, perception, visualizer, render loop.
    pub fn running_tasks(&self) -> [bool; 4] {
        let alive = |h: &Option<JoinHandle<()>>| h.as_ref().is_some_and(|h| !h.is_finished());
        [
            alive(&self.poller),
            alive(&self.perception),
            alive(&self.visualizer_feed),
            alive(&self.render_loop),
        ]
    }

    /// Cancel every task of this session and wait for them to stop.
    pub async fn teardown(mut self) {
        self.cancel.cancel();
        let handles = [
            self.poller.take(),
            self.perception.take(),
            self.stream_probe.take(),
            self.visualizer_feed.take(),
            self.render_loop.take(),
        ];
        for handle in handles.into_iter().flatten() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("session task for {} ended abnormally: {e}", self.robot_id);
                }
            }
        }
        tracing::info!("closed session for {}", self.robot_id);
    }

    // ── Task wiring ──────────────────────────────────────────────────

    fn start_poller(&mut self, polls: watch::Sender<u64>) {
        if self.poller.is_some() {
            return;
        }
        let view = self.view.clone();
        self.poller = Some(tokio::spawn(status::run_status_poller(
            self.client.clone(),
            self.robot_id.clone(),
            self.options.status_interval,
            self.options.backoff_max,
            self.cancel.child_token(),
            move |update: StatusUpdate| {
                lock(&view).set_status(update.status.as_ref());
                polls.send_modify(|n| *n += 1);
            },
        )));
    }

    fn start_perception(&mut self, url: Url) {
        if self.perception.is_some() {
            return;
        }
        let view = self.view.clone();
        let policy = ReconnectPolicy::new(self.options.reconnect_base, self.options.backoff_max);
        self.perception = Some(tokio::spawn(ws::run_channel(
            url,
            Channel::Perception,
            policy,
            self.cancel.child_token(),
            move |event| {
                let mut view = lock(&view);
                match event {
                    ChannelEvent::Open => view.set_link(LinkState::Connected),
                    ChannelEvent::Closed => view.set_link(LinkState::Closed),
                    ChannelEvent::Text(text) => {
                        view.apply_perception_text(&text);
                    }
                }
            },
        )));
    }

    fn start_stream_probe(&mut self, url: Url) {
        let client = self.client.clone();
        let view = self.view.clone();
        let cancel = self.cancel.child_token();
        self.stream_probe = Some(tokio::spawn(async move {
            let probe = async {
                let response = client.open_stream(url).await?;
                mjpeg::first_frame_size(response).await
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                result = probe => match result {
                    Ok((w, h)) => {
                        tracing::debug!("first MJPEG frame is {w}x{h}");
                        lock(&view).on_first_frame(w, h);
                    }
                    Err(e) => tracing::warn!("could not read the MJPEG stream: {e}"),
                },
            }
        }));
    }

    fn start_visualizer(&mut self, url: Url) {
        let visualizer = self.visualizer.clone();
        let policy = ReconnectPolicy::new(self.options.reconnect_base, self.options.backoff_max);
        self.visualizer_feed = Some(tokio::spawn(ws::run_channel(
            url,
            Channel::Visualizer,
            policy,
            self.cancel.child_token(),
            move |event| {
                if let ChannelEvent::Text(text) = event {
                    lock(&visualizer).apply_text(&text);
                }
            },
        )));
        self.render_loop = Some(tokio::spawn(pointcloud::run_render_loop(
            self.visualizer.clone(),
            self.renderer.clone(),
            FRAME_INTERVAL,
            self.cancel.child_token(),
        )));
    }
}

impl Drop for DetailSession {
    fn drop(&mut self) {
        // Dropping without `teardown` still stops the tasks.
        self.cancel.cancel();
    }
}
