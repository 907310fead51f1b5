// Console configuration, loaded from environment variables and CLI flags.

use std::time::Duration;

use url::Url;

use crate::error::{HubError, HubResult};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STATUS_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Console configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin. WebSocket URLs are derived from its scheme and host.
    pub base_url: Url,
    /// Fixed delay between successful status polls.
    pub status_interval: Duration,
    /// Per-request timeout for HTTP calls.
    pub request_timeout: Duration,
    /// Upper bound for reconnect and failed-poll backoff.
    pub backoff_max: Duration,
    /// Draw perception boxes onto the overlay canvas.
    pub overlay: bool,
    /// Allow the point-cloud visualizer pane.
    pub visualizer: bool,
    /// Display box of the video element. When unset, the first MJPEG frame's
    /// native size is used.
    pub display_size: Option<(u32, u32)>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            // Constant literal, always parses.
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL"),
            status_interval: Duration::from_millis(DEFAULT_STATUS_INTERVAL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            overlay: true,
            visualizer: true,
            display_size: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `ROBOT_HUB_URL` - backend origin (default: `http://127.0.0.1:8000`)
    /// - `ROBOT_HUB_STATUS_INTERVAL_MS` - status poll interval (default: 5000)
    /// - `ROBOT_HUB_REQUEST_TIMEOUT_MS` - HTTP timeout (default: 5000)
    /// - `ROBOT_HUB_BACKOFF_MAX_MS` - backoff ceiling (default: 30000)
    /// - `ROBOT_HUB_OVERLAY` - `false`/`0` disables box drawing
    /// - `ROBOT_HUB_VISUALIZER` - `false`/`0` disables the point-cloud pane
    /// - `ROBOT_HUB_DISPLAY_SIZE` - video display box as `WxH`
    pub fn load() -> HubResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> HubResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("ROBOT_HUB_URL") {
            config.base_url = parse_base_url(&url)?;
        }
        if let Some(ms) = lookup("ROBOT_HUB_STATUS_INTERVAL_MS") {
            config.status_interval = parse_millis("ROBOT_HUB_STATUS_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = lookup("ROBOT_HUB_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("ROBOT_HUB_REQUEST_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("ROBOT_HUB_BACKOFF_MAX_MS") {
            config.backoff_max = parse_millis("ROBOT_HUB_BACKOFF_MAX_MS", &ms)?;
        }
        if let Some(v) = lookup("ROBOT_HUB_OVERLAY") {
            config.overlay = parse_flag(&v);
        }
        if let Some(v) = lookup("ROBOT_HUB_VISUALIZER") {
            config.visualizer = parse_flag(&v);
        }
        if let Some(v) = lookup("ROBOT_HUB_DISPLAY_SIZE") {
            config.display_size = Some(parse_size(&v)?);
        }

        Ok(config)
    }
}

/// Parse a backend origin. Only `http` and `https` are accepted.
pub fn parse_base_url(raw: &str) -> HubResult<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HubError::Config(format!(
            "unsupported scheme '{other}' in {raw}"
        ))),
    }
}

/// Parse a `WxH` display size such as `960x540`.
pub fn parse_size(raw: &str) -> HubResult<(u32, u32)> {
    let (w, h) = raw
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| HubError::Config(format!("expected WxH, got '{raw}'")))?;
    let w = w
        .trim()
        .parse()
        .map_err(|_| HubError::Config(format!("invalid width in '{raw}'")))?;
    let h = h
        .trim()
        .parse()
        .map_err(|_| HubError::Config(format!("invalid height in '{raw}'")))?;
    Ok((w, h))
}

fn parse_millis(key: &str, raw: &str) -> HubResult<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| HubError::Config(format!("{key} must be milliseconds, got '{raw}'")))
}

fn parse_flag(raw: &str) -> bool {
    !(raw.eq_ignore_ascii_case("false") || raw == "0" || raw.eq_ignore_ascii_case("off"))
}
