// Robot detail: title, stream binding, link state, status dot, demo feedback, overlay.

use chrono::{DateTime, Utc};
use url::Url;

use super::Presence;
use crate::demo::{Feedback, Tone};
use crate::model::{PerceptionMessage, RobotDetail, RobotStatus};
use crate::overlay::OverlayCanvas;

/// Perception socket state shown next to the title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Connecting,
    Connected,
    Closed,
}

impl LinkState {
    pub fn text(self) -> &'static str {
        match self {
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Closed => "closed",
        }
    }
}

/// Which half of the detail screen is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Camera,
    Visualizer,
}

/// Last polled status. No history is kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusIndicator {
    pub presence: Presence,
    pub ip: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl StatusIndicator {
    pub fn label(&self) -> &'static str {
        self.presence.label()
    }
}

#[derive(Debug, Clone)]
pub struct RobotDetailView {
    pub robot_id: String,
    pub title: String,
    pub stream_url: Option<Url>,
    pub link: LinkState,
    pub status: StatusIndicator,
    pub feedback: Option<Feedback>,
    pub pane: Pane,
    pub overlay: OverlayCanvas,
    pub overlay_enabled: bool,
    /// Native size of the first video frame, once known.
    pub frame_size: Option<(u32, u32)>,
}

impl RobotDetailView {
    pub fn new(robot_id: &str) -> Self {
        Self {
            robot_id: robot_id.to_string(),
            title: robot_id.to_string(),
            stream_url: None,
            link: LinkState::default(),
            status: StatusIndicator::default(),
            feedback: None,
            pane: Pane::default(),
            overlay: OverlayCanvas::new(),
            overlay_enabled: true,
            frame_size: None,
        }
    }

    /// Apply the detail record: title and bound stream.
    pub fn apply_detail(&mut self, detail: &RobotDetail, stream_url: Url) {
        self.title = detail.title(&self.robot_id).to_string();
        self.stream_url = Some(stream_url);
    }

    pub fn set_link(&mut self, link: LinkState) {
        self.link = link;
    }

    /// Record one status poll. Failed polls pass `None` and read as offline.
    pub fn set_status(&mut self, status: Option<&RobotStatus>) {
        self.status = StatusIndicator {
            presence: Presence::from_online(status.is_some_and(|s| s.online)),
            ip: status.and_then(|s| s.ip.clone()),
            checked_at: Some(Utc::now()),
        };
    }

    pub fn set_feedback(&mut self, feedback: Feedback) {
        self.feedback = Some(feedback);
    }

    /// First frame of the stream arrived. Sizes the canvas if nothing else has.
    pub fn on_first_frame(&mut self, width: u32, height: u32) {
        self.frame_size = Some((width, height));
        if !self.overlay.is_sized() {
            self.overlay.resize(width, height);
        }
    }

    /// Parse a perception frame and draw it when the overlay is enabled.
    pub fn apply_perception_text(&mut self, text: &str) -> bool {
        if !self.overlay_enabled {
            return false;
        }
        match serde_json::from_str::<PerceptionMessage>(text) {
            Ok(msg) => self.overlay.draw(&msg),
            Err(e) => {
                tracing::debug!("dropping malformed perception frame: {e}");
                false
            }
        }
    }

    /// Render the detail screen as terminal text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} ({})\n", self.title, self.link.text()));
        out.push_str(&format!(
            "  {} {}",
            self.status.presence.dot(),
            self.status.label()
        ));
        if let Some(ip) = &self.status.ip {
            out.push_str(&format!("  {ip}"));
        }
        if let Some(at) = self.status.checked_at {
            out.push_str(&format!("  (checked {})", at.format("%H:%M:%S")));
        }
        out.push('\n');

        match &self.stream_url {
            Some(url) => out.push_str(&format!("  stream: {url}\n")),
            None => out.push_str("  stream: -\n"),
        }

        if self.pane == Pane::Camera && self.overlay_enabled {
            let (w, h) = self.overlay.size();
            let frame = self.overlay.frame();
            out.push_str(&format!(
                "  overlay {w}x{h}: {} boxes, line width {:.2}\n",
                frame.boxes.len(),
                frame.line_width
            ));
            for b in &frame.boxes {
                let [x, y, bw, bh] = b.rect.rounded();
                let label = b.label.as_deref().unwrap_or("box");
                match b.score {
                    Some(score) => out.push_str(&format!(
                        "    {label} {score:.2} at ({x}, {y}) {bw}x{bh}\n"
                    )),
                    None => out.push_str(&format!("    {label} at ({x}, {y}) {bw}x{bh}\n")),
                }
            }
        }

        if let Some(feedback) = &self.feedback {
            let marker = match feedback.tone {
                Tone::Success => "ok",
                Tone::Error => "!!",
            };
            out.push_str(&format!("  [{marker}] {}\n", feedback.text));
        }
        out
    }
}
