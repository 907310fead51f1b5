// WebSocket channels (perception, visualizer) with reconnect and cancellation.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backoff::Backoff;
use crate::error::{HubError, HubResult};
use crate::metrics;

/// Derive the WebSocket URL for an HTTP(S) URL: `https` becomes `wss`,
/// anything else becomes `ws`. Host, port and path are kept.
pub fn to_websocket_url(mut url: Url) -> HubResult<Url> {
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| HubError::InvalidUrl(format!("cannot use {scheme} for {url}")))?;
    Ok(url)
}

/// Resolve `path` against the backend origin and switch to the matching WebSocket scheme.
pub fn websocket_url(base: &Url, path: &str) -> HubResult<Url> {
    to_websocket_url(base.join(path)?)
}

/// Which server push channel a task is attached to. Used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Perception,
    Visualizer,
}

impl Channel {
    pub fn label(self) -> &'static str {
        match self {
            Channel::Perception => "perception",
            Channel::Visualizer => "visualizer",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle and payload events delivered to a channel handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Open,
    Text(String),
    Closed,
}

/// Reconnect policy for a channel.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    /// A connection that stays up this long resets the backoff. Shorter ones
    /// count as failures, so a server that accepts and drops keeps escalating.
    pub stable_after: Duration,
    /// Stop after the first disconnect instead of reconnecting.
    pub once: bool,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            stable_after: max,
            once: false,
        }
    }
}

/// Keep a WebSocket channel open until `cancel` fires.
///
/// Every connection reports [`ChannelEvent::Open`], then one
/// [`ChannelEvent::Text`] per text frame, then [`ChannelEvent::Closed`]. A
/// failed connect also reports `Closed`. Between attempts the task waits on a
/// jittered exponential backoff that resets only after a connection stayed
/// up for [`ReconnectPolicy::stable_after`].
pub async fn run_channel<F>(
    url: Url,
    channel: Channel,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
    mut on_event: F,
) where
    F: FnMut(ChannelEvent) + Send,
{
    let mut backoff = Backoff::new(policy.base, policy.max);

    loop {
        let connect = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = connect_async(url.as_str()) => result,
        };

        match connect {
            Ok((mut stream, _)) => {
                tracing::info!("{channel} channel connected to {url}");
                let connected_at = Instant::now();
                metrics::OPEN_WEBSOCKETS.inc();
                on_event(ChannelEvent::Open);

                let cancelled = loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break true,
                        next = stream.next() => next,
                    };
                    match next {
                        Some(Ok(Message::Text(text))) => {
                            metrics::WEBSOCKET_MESSAGES_TOTAL
                                .with_label_values(&[channel.label()])
                                .inc();
                            on_event(ChannelEvent::Text(text.to_string()));
                        }
                        Some(Ok(Message::Close(_))) | None => break false,
                        Some(Ok(_)) => {
                            // Binary, ping and pong frames carry nothing we render.
                        }
                        Some(Err(e)) => {
                            tracing::warn!("{channel} channel read error: {e}");
                            break false;
                        }
                    }
                };

                metrics::OPEN_WEBSOCKETS.dec();
                if cancelled {
                    let _ = stream.close(None).await;
                    tracing::debug!("{channel} channel closed on teardown");
                    on_event(ChannelEvent::Closed);
                    return;
                }
                tracing::info!("{channel} channel closed by server");
                on_event(ChannelEvent::Closed);
                if connected_at.elapsed() >= policy.stable_after {
                    backoff.reset();
                }
            }
            Err(e) => {
                tracing::warn!("{channel} channel failed to connect to {url}: {e}");
                on_event(ChannelEvent::Closed);
            }
        }

        if policy.once {
            return;
        }

        let delay = backoff.next_delay();
        metrics::WEBSOCKET_RECONNECTS_TOTAL
            .with_label_values(&[channel.label()])
            .inc();
        tracing::debug!(
            "{channel} channel reconnecting in {delay:?} (attempt {})",
            backoff.attempt()
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_becomes_ws() {
        let base = Url::parse("http://hub.local:8000").unwrap();
        let url = websocket_url(&base, "/api/robots/spot-001/perception").unwrap();
        assert_eq!(url.as_str(), "ws://hub.local:8000/api/robots/spot-001/perception");
    }

    #[test]
    fn test_https_becomes_wss() {
        let base = Url::parse("https://hub.example.com").unwrap();
        let url = websocket_url(&base, "/api/robots/spot-001/perception").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("hub.example.com"));
    }

    #[test]
    fn test_same_host_even_for_absolute_urls_on_base() {
        let base = Url::parse("http://hub.local:8000/console/").unwrap();
        let url = websocket_url(&base, "/api/robots/x/perception").unwrap();
        assert_eq!(url.host_str(), Some("hub.local"));
        assert_eq!(url.port(), Some(8000));
    }

    #[test]
    fn test_channel_labels() {
        assert_eq!(Channel::Perception.to_string(), "perception");
        assert_eq!(Channel::Visualizer.label(), "visualizer");
    }

    #[tokio::test]
    async fn test_cancelled_channel_returns() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let url = Url::parse("ws://127.0.0.1:9/none").unwrap();
        let mut events = Vec::new();
        run_channel(
            url,
            Channel::Perception,
            ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(10)),
            cancel,
            |e| events.push(e),
        )
        .await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_failed_connect_reports_closed_once_policy() {
        let url = Url::parse("ws://127.0.0.1:9/none").unwrap();
        let mut events = Vec::new();
        let policy = ReconnectPolicy {
            once: true,
            ..ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(10))
        };
        run_channel(
            url,
            Channel::Visualizer,
            policy,
            CancellationToken::new(),
            |e| events.push(e),
        )
        .await;
        assert_eq!(events, vec![ChannelEvent::Closed]);
    }
}
