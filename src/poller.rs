//! Background refresh of the users currently out riding.
//!
//! Every poll retries failures on an exponential schedule (see
//! [`retry_delay`]). Once retries run out the failure is logged and the
//! previous snapshot stays published until the next tick succeeds.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::RetryConfig;
use crate::error::ApiResult;
use crate::http::TrackerClient;
use crate::GpsPoint;

/// Entry of `GET /active-users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

impl ActiveUser {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Delay before retry `attempt` (0-based) of a failed poll.
pub fn retry_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    retry.delay_for(attempt)
}

/// Polls the active users endpoint on a fixed interval.
#[derive(Debug, Clone)]
pub struct ActiveUsersPoller {
    client: TrackerClient,
    interval: Duration,
    retry: RetryConfig,
}

impl ActiveUsersPoller {
    /// Poller using the client's configured interval and retry schedule.
    pub fn new(client: TrackerClient) -> Self {
        let interval = client.config().poll_interval;
        let retry = client.config().retry.clone();
        Self { client, interval, retry }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// One poll including retries.
    pub async fn poll_once(&self) -> ApiResult<Vec<ActiveUser>> {
        let mut attempt = 0;
        loop {
            match self.client.fetch_active_users().await {
                Ok(users) => return Ok(users),
                Err(err) if attempt < self.retry.max_retries => {
                    let delay = retry_delay(&self.retry, attempt);
                    warn!(
                        "[ActiveUsersPoller] poll failed ({}), retry {} in {:?}",
                        err,
                        attempt + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Start polling on the current tokio runtime.
    ///
    /// The first poll runs immediately. Polling stops when the returned
    /// handle is stopped or dropped.
    pub fn spawn(self) -> ActiveUsersHandle {
        let (sender, receiver) = watch::channel(Vec::new());
        info!("[ActiveUsersPoller] polling every {:?}", self.interval);
        let task = tokio::spawn(self.run(sender));
        ActiveUsersHandle { receiver, task }
    }

    async fn run(self, sender: watch::Sender<Vec<ActiveUser>>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(users) => {
                    debug!("[ActiveUsersPoller] {} active users", users.len());
                    if sender.send(users).is_err() {
                        debug!("[ActiveUsersPoller] no subscribers left, stopping");
                        break;
                    }
                }
                Err(err) => warn!("[ActiveUsersPoller] giving up until next poll: {}", err),
            }
        }
    }
}

/// Subscription to a running poller.
pub struct ActiveUsersHandle {
    receiver: watch::Receiver<Vec<ActiveUser>>,
    task: JoinHandle<()>,
}

impl ActiveUsersHandle {
    /// Most recent successful snapshot. Empty until the first poll succeeds.
    pub fn latest(&self) -> Vec<ActiveUser> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next successful poll. `false` once polling has stopped.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ActiveUsersHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
