// Demo actions: canned robot behaviours triggered by a single POST.

use std::str::FromStr;

use crate::api::HubClient;
use crate::error::HubError;
use crate::metrics;
use crate::model::DemoReply;

/// Canned behaviours offered on the control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemoAction {
    Hello,
    Lay,
    PowerOn,
    PowerOff,
    Rollover,
    Stand,
    Sit,
    Fiducial,
    IncreaseHeight,
    DecreaseHeight,
    BodyRoll,
    SnakeHead,
    Stop,
    EStop,
    Wiggle,
    SelfRight,
}

impl DemoAction {
    pub const ALL: [DemoAction; 16] = [
        DemoAction::Hello,
        DemoAction::Lay,
        DemoAction::PowerOn,
        DemoAction::PowerOff,
        DemoAction::Rollover,
        DemoAction::Stand,
        DemoAction::Sit,
        DemoAction::Fiducial,
        DemoAction::IncreaseHeight,
        DemoAction::DecreaseHeight,
        DemoAction::BodyRoll,
        DemoAction::SnakeHead,
        DemoAction::Stop,
        DemoAction::EStop,
        DemoAction::Wiggle,
        DemoAction::SelfRight,
    ];

    /// Path segment used in `/demo/{action}`.
    pub fn as_str(self) -> &'static str {
        match self {
            DemoAction::Hello => "hello",
            DemoAction::Lay => "lay",
            DemoAction::PowerOn => "poweron",
            DemoAction::PowerOff => "poweroff",
            DemoAction::Rollover => "rollover",
            DemoAction::Stand => "stand",
            DemoAction::Sit => "sit",
            DemoAction::Fiducial => "fiducial",
            DemoAction::IncreaseHeight => "increase_height",
            DemoAction::DecreaseHeight => "decrease_height",
            DemoAction::BodyRoll => "bodyroll",
            DemoAction::SnakeHead => "snakehead",
            DemoAction::Stop => "stop",
            DemoAction::EStop => "estop",
            DemoAction::Wiggle => "wiggle",
            DemoAction::SelfRight => "selfright",
        }
    }
}

impl std::fmt::Display for DemoAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemoAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DemoAction::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown demo action '{s}'"))
    }
}

/// Visual style of the feedback line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
}

/// The text shown after a demo request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub text: String,
    pub tone: Tone,
}

impl Feedback {
    /// Feedback for a decoded reply: `message`, else `error`, else `"OK"`;
    /// error tone whenever `error` is present.
    pub fn from_reply(reply: &DemoReply) -> Self {
        let text = reply
            .message
            .clone()
            .or_else(|| reply.error.clone())
            .unwrap_or_else(|| "OK".to_string());
        let tone = if reply.error.is_some() {
            Tone::Error
        } else {
            Tone::Success
        };
        Feedback { text, tone }
    }

    /// Feedback for a request that never produced a usable reply.
    pub fn from_failure(err: &HubError) -> Self {
        Feedback {
            text: format!("Error: {err}"),
            tone: Tone::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.tone == Tone::Error
    }
}

/// Fire one demo action and turn the outcome into feedback. Never fails.
///
/// `action` is sent as-is so backends can expose actions beyond [`DemoAction`].
pub async fn dispatch(client: &HubClient, robot_id: &str, action: &str) -> Feedback {
    tracing::info!("demo action '{action}' -> {robot_id}");
    match client.call_demo(robot_id, action).await {
        Ok(reply) => {
            let feedback = Feedback::from_reply(&reply);
            let outcome = if feedback.is_error() { "server_error" } else { "ok" };
            metrics::DEMO_REQUESTS_TOTAL
                .with_label_values(&[outcome])
                .inc();
            feedback
        }
        Err(e) => {
            tracing::warn!("demo action '{action}' on {robot_id} failed: {e}");
            metrics::DEMO_REQUESTS_TOTAL
                .with_label_values(&["failed"])
                .inc();
            Feedback::from_failure(&e)
        }
    }
}
