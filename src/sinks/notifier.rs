//! Webhook alert notifier for primary-channel results.
//!
//! Delivery runs on its own task behind a bounded queue. The sink hub only
//! ever `try_send`s into it, so a slow or hung webhook costs dropped alerts,
//! never sink throughput.

use crate::models::TamperingResult;
use crate::runtime::stats::PipelineStats;
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_SUBJECT: &str = "NBA Tampering Detect";

/// Pending alerts held before new ones are dropped.
pub const ALERT_QUEUE_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Notifier {
    http: Client,
    webhook_url: String,
    subject: String,
}

impl Notifier {
    pub fn new(webhook_url: impl Into<String>, subject: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("tampering-detector/0.1 (alerts)")
            .build()
            .context("Failed to build notifier HTTP client")?;
        Ok(Self {
            http,
            webhook_url: webhook_url.into(),
            subject: subject.into(),
        })
    }

    pub fn payload(&self, result: &TamperingResult) -> Value {
        json!({
            "subject": self.subject,
            "message": result.summary(),
            "result": result,
        })
    }

    pub async fn notify(&self, result: &TamperingResult) -> Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&self.payload(result))
            .send()
            .await
            .context("alert webhook request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("alert webhook returned {}", status);
        }
        debug!(team = %result.team, counterpart = %result.counterpart, "alert sent");
        Ok(())
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// Move the notifier onto a delivery task. The task ends once every
    /// `AlertSender` is dropped and the queue is drained.
    pub fn spawn(self, capacity: usize, stats: Arc<PipelineStats>) -> (AlertSender, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<TamperingResult>(capacity.max(1));
        let task_stats = stats.clone();
        let task = tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match self.notify(&result).await {
                    Ok(()) => PipelineStats::incr(&task_stats.notifications_sent),
                    Err(e) => warn!(team = %result.team, error = %e, "alert delivery failed"),
                }
            }
            debug!("alert queue drained");
        });
        (AlertSender { tx, stats }, task)
    }
}

/// Non-blocking handle onto the alert delivery task.
#[derive(Clone)]
pub struct AlertSender {
    tx: mpsc::Sender<TamperingResult>,
    stats: Arc<PipelineStats>,
}

impl AlertSender {
    /// Queue an alert without waiting. Returns `false` when it was dropped.
    pub fn offer(&self, result: &TamperingResult) -> bool {
        match self.tx.try_send(result.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                PipelineStats::incr(&self.stats.notifications_dropped);
                warn!(team = %dropped.team, "alert queue full; alert dropped");
                false
            }
            Err(TrySendError::Closed(dropped)) => {
                PipelineStats::incr(&self.stats.notifications_dropped);
                debug!(team = %dropped.team, "alert task gone; alert dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TamperingResult {
        TamperingResult {
            team: "LAL".into(),
            counterpart: "Kyrie Irving".into(),
            total: 2,
            players: Default::default(),
            window_start: 0,
            window_end: 60_000,
        }
    }

    #[test]
    fn test_full_queue_drops_without_waiting() {
        let stats = Arc::new(PipelineStats::default());
        let (tx, _rx) = mpsc::channel(1);
        let sender = AlertSender {
            tx,
            stats: stats.clone(),
        };

        assert!(sender.offer(&sample()));
        assert!(!sender.offer(&sample()));
        assert_eq!(stats.snapshot().notifications_dropped, 1);
    }

    #[test]
    fn test_closed_queue_drops() {
        let stats = Arc::new(PipelineStats::default());
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sender = AlertSender {
            tx,
            stats: stats.clone(),
        };
        assert!(!sender.offer(&sample()));
        assert_eq!(stats.snapshot().notifications_dropped, 1);
    }

    #[test]
    fn test_payload_shape() {
        let notifier = Notifier::new("http://127.0.0.1:9/hook", DEFAULT_SUBJECT).unwrap();
        let result = TamperingResult {
            team: "LAL".into(),
            counterpart: "Kyrie Irving".into(),
            total: 3,
            players: ["Lebron James".to_string()].into_iter().collect(),
            window_start: 0,
            window_end: 60_000,
        };
        let payload = notifier.payload(&result);
        assert_eq!(payload["subject"], "NBA Tampering Detect");
        assert!(payload["message"]
            .as_str()
            .unwrap()
            .contains("made 3 cross-team mentions of Kyrie Irving"));
        assert_eq!(payload["result"]["tamperingPlayer"], "Kyrie Irving");
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_an_error() {
        let notifier = Notifier::new("http://127.0.0.1:9/hook", DEFAULT_SUBJECT).unwrap();
        let result = TamperingResult {
            team: "LAL".into(),
            counterpart: "Kyrie Irving".into(),
            total: 2,
            players: Default::default(),
            window_start: 0,
            window_end: 60_000,
        };
        assert!(notifier.notify(&result).await.is_err());
    }
}
