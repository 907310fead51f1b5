// HTTP client for the robot hub API (roster, detail, status, demo actions).

pub mod ws;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::error::{HubError, HubResult};
use crate::model::{
    DemoReply, DemoStartRequest, RobotDetail, RobotStatus, RobotSummary, RosterResponse,
};

/// Thin async client over the robot hub backend.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: Client,
    /// No overall timeout: MJPEG responses never finish.
    stream_http: Client,
    base_url: Url,
}

impl HubClient {
    pub fn new(config: &Config) -> HubResult<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        let stream_http = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            stream_http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Roster & detail ──────────────────────────────────────────────

    /// `GET /api/robots`.
    pub async fn list_robots(&self) -> HubResult<Vec<RobotSummary>> {
        let url = self.endpoint(&["api", "robots"])?;
        let roster: RosterResponse = self.get_json(url).await?;
        Ok(roster.robots)
    }

    /// `GET /api/robots/{id}`. A body of `{"error": "not_found"}` maps to [`HubError::NotFound`].
    pub async fn get_robot(&self, id: &str) -> HubResult<RobotDetail> {
        let url = self.endpoint(&["api", "robots", id])?;
        let body: Value = self.get_json(url).await?;
        if let Some(err) = body.get("error").and_then(Value::as_str) {
            return Err(if err == "not_found" {
                HubError::NotFound(id.to_string())
            } else {
                HubError::Server(err.to_string())
            });
        }
        Ok(serde_json::from_value(body)?)
    }

    // ── Status ───────────────────────────────────────────────────────

    /// `GET /api/robots/{id}/status`, surfacing every failure.
    pub async fn get_status(&self, id: &str) -> HubResult<RobotStatus> {
        let url = self.endpoint(&["api", "robots", id, "status"])?;
        self.get_json(url).await
    }

    /// Online check that never fails: any error reads as offline.
    pub async fn is_online(&self, id: &str) -> bool {
        match self.get_status(id).await {
            Ok(status) => status.online,
            Err(e) => {
                tracing::debug!("status check for {id} failed: {e}");
                false
            }
        }
    }

    /// `GET /api/robots/{id}/battery`. The payload shape is robot-specific.
    ///
    /// An `error` field wins over the HTTP status; any other non-2xx reply is
    /// [`HubError::Http`] even when its body is JSON.
    pub async fn battery(&self, id: &str) -> HubResult<Value> {
        let url = self.endpoint(&["api", "robots", id, "battery"])?;
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        let body: Value = decode_body(response, &url, status).await?;
        if let Some(err) = body.get("error").and_then(Value::as_str) {
            return Err(HubError::Server(err.to_string()));
        }
        if !status.is_success() {
            return Err(HubError::Http {
                status: status.as_u16(),
                path: url.path().to_string(),
            });
        }
        Ok(body)
    }

    // ── Demo actions ─────────────────────────────────────────────────

    /// `POST /api/robots/{id}/demo/{action}`.
    ///
    /// The body is decoded whatever the HTTP status, so a server-reported
    /// `error` reaches the caller as part of the reply rather than as an `Err`.
    pub async fn call_demo(&self, id: &str, action: &str) -> HubResult<DemoReply> {
        let url = self.endpoint(&["api", "robots", id, "demo", action])?;
        let response = self.http.post(url.clone()).send().await?;
        let status = response.status();
        decode_body(response, &url, status).await
    }

    /// `POST /demo/start` with `{"kind": kind}`.
    pub async fn start_demo(&self, kind: &str) -> HubResult<DemoReply> {
        let url = self.endpoint(&["demo", "start"])?;
        let response = self
            .http
            .post(url.clone())
            .json(&DemoStartRequest { kind })
            .send()
            .await?;
        let status = response.status();
        decode_body(response, &url, status).await
    }

    /// `POST /demo/stop`.
    pub async fn stop_demo(&self) -> HubResult<DemoReply> {
        let url = self.endpoint(&["demo", "stop"])?;
        let response = self.http.post(url.clone()).send().await?;
        let status = response.status();
        decode_body(response, &url, status).await
    }

    /// `POST /api/robots/{id}/launch-visualizer`.
    pub async fn launch_visualizer(&self, id: &str) -> HubResult<DemoReply> {
        let url = self.endpoint(&["api", "robots", id, "launch-visualizer"])?;
        let response = self.http.post(url.clone()).send().await?;
        let status = response.status();
        decode_body(response, &url, status).await
    }

    // ── Streams ──────────────────────────────────────────────────────

    /// Resolve an endpoint path from a detail record against the backend origin.
    pub fn resolve(&self, path: &str) -> HubResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// WebSocket URL of the visualizer channel for `id`.
    pub fn visualizer_url(&self, id: &str) -> HubResult<Url> {
        let url = self.endpoint(&["api", "robots", id, "visualizer"])?;
        ws::to_websocket_url(url)
    }

    /// Open the MJPEG stream; the caller reads the body incrementally.
    pub async fn open_stream(&self, url: Url) -> HubResult<Response> {
        let response = self.stream_http.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(HubError::Http {
                status: response.status().as_u16(),
                path: url.path().to_string(),
            });
        }
        Ok(response)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Build `base/<seg>/<seg>...`, percent-encoding every segment.
    pub fn endpoint(&self, segments: &[&str]) -> HubResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HubError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> HubResult<T> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HubError::Http {
                status: status.as_u16(),
                path: url.path().to_string(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Decode a JSON body regardless of status; a non-2xx response whose body
/// does not decode is reported as an HTTP error instead of a decode error.
async fn decode_body<T: DeserializeOwned>(
    response: Response,
    url: &Url,
    status: StatusCode,
) -> HubResult<T> {
    let bytes = response.bytes().await?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(_) if !status.is_success() => Err(HubError::Http {
            status: status.as_u16(),
            path: url.path().to_string(),
        }),
        Err(e) => Err(HubError::Decode(e)),
    }
}
