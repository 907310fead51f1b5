// Status poller: fetch once, then on a fixed interval, forever.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::HubClient;
use crate::backoff::Backoff;
use crate::metrics;
use crate::model::RobotStatus;

/// Result of one poll as seen by the view.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// `None` when the poll failed; the view shows offline.
    pub status: Option<RobotStatus>,
    /// Failures in a row, including this one. Zero after a success.
    pub consecutive_failures: u32,
}

impl StatusUpdate {
    pub fn online(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.online)
    }
}

/// Poll `GET /api/robots/{id}/status` until `cancel` fires.
///
/// The first poll happens immediately. After a success the next poll waits
/// `interval`; after a failure the wait grows with jittered exponential
/// backoff (never below `interval`, never above `backoff_max`). A failure
/// never ends the loop.
pub async fn run_status_poller<F>(
    client: HubClient,
    robot_id: String,
    interval: Duration,
    backoff_max: Duration,
    cancel: CancellationToken,
    mut on_update: F,
) where
    F: FnMut(StatusUpdate) + Send,
{
    let mut backoff = Backoff::new(interval, backoff_max);

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = client.get_status(&robot_id) => result,
        };

        let delay = match result {
            Ok(status) => {
                let label = if status.online { "online" } else { "offline" };
                metrics::STATUS_POLLS_TOTAL.with_label_values(&[label]).inc();
                backoff.reset();
                on_update(StatusUpdate {
                    status: Some(status),
                    consecutive_failures: 0,
                });
                interval
            }
            Err(e) => {
                metrics::STATUS_POLLS_TOTAL.with_label_values(&["failed"]).inc();
                let delay = backoff.next_delay().max(interval);
                tracing::debug!(
                    "status poll for {robot_id} failed ({} in a row): {e}",
                    backoff.attempt()
                );
                on_update(StatusUpdate {
                    status: None,
                    consecutive_failures: backoff.attempt(),
                });
                delay
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    tracing::debug!("status poller for {robot_id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::{Arc, Mutex};
    use url::Url;

    fn unreachable_client() -> HubClient {
        let config = Config {
            // Port 9 (discard) is closed on test machines; every poll fails fast.
            base_url: Url::parse("http://127.0.0.1:9").unwrap(),
            request_timeout: Duration::from_millis(200),
            ..Config::default()
        };
        HubClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_polling_survives_consecutive_failures() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let sink = updates.clone();

        let task = tokio::spawn(run_status_poller(
            unreachable_client(),
            "spot-001".into(),
            Duration::from_millis(5),
            Duration::from_millis(10),
            cancel.clone(),
            move |u| sink.lock().unwrap().push(u),
        ));

        tokio::time::timeout(Duration::from_secs(10), async {
            while updates.lock().unwrap().len() < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poller stopped polling");
        cancel.cancel();
        task.await.unwrap();

        let updates = updates.lock().unwrap();
        assert!(updates.iter().all(|u| !u.online()));
        let failures: Vec<u32> = updates.iter().map(|u| u.consecutive_failures).collect();
        assert_eq!(&failures[..5], &[1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_cancel_before_first_poll() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut count = 0;
        run_status_poller(
            unreachable_client(),
            "spot-001".into(),
            Duration::from_millis(5),
            Duration::from_millis(5),
            cancel,
            |_| count += 1,
        )
        .await;
        assert_eq!(count, 0);
    }
}
