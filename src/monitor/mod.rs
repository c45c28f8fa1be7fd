//! Background status monitor.
//!
//! Runs independently of any watch session: polls the relay status
//! endpoint on a fixed interval (plus one immediate poll) and raises the
//! live notification on the offline→live edge. All per-cycle failures are
//! logged and swallowed; nothing here may terminate the polling loop.

pub mod notify;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::errors::WatchError;
use notify::{LiveNotification, LiveNotifier};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Inbound messages from the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorMessage {
    /// One meaningful delivery per monitor lifetime; repeats are idempotent.
    SetRelayUrl(String),
}

/// Single-instance monitor state. Owned by the monitor task; a restarted
/// monitor starts from scratch, so a stream already live at restart
/// produces one notification on the first poll (documented behavior).
#[derive(Debug, Default)]
pub struct MonitorContext {
    relay_url: Option<String>,
    was_streaming: bool,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    streaming: bool,
}

pub struct StatusMonitor {
    client: reqwest::Client,
    ctx: MonitorContext,
    notifier: Arc<dyn LiveNotifier>,
    poll_interval: Duration,
}

impl StatusMonitor {
    pub fn new(notifier: Arc<dyn LiveNotifier>, poll_interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            ctx: MonitorContext::default(),
            notifier,
            poll_interval,
        }
    }

    pub fn relay_url(&self) -> Option<&str> {
        self.ctx.relay_url.as_deref()
    }

    pub fn handle_message(&mut self, message: MonitorMessage) {
        match message {
            MonitorMessage::SetRelayUrl(url) => {
                let url = url.trim_end_matches('/').to_string();
                match &self.ctx.relay_url {
                    None => {
                        log::info!("Relay url set to {url}");
                        self.ctx.relay_url = Some(url);
                    }
                    Some(current) if *current == url => {}
                    Some(current) => {
                        log::warn!("Relay url already set to {current}, ignoring {url}");
                    }
                }
            }
        }
    }

    /// Fold one observed status into the context. Returns true when the
    /// offline→live edge fired; the stored flag is updated unconditionally.
    fn observe(&mut self, streaming: bool) -> bool {
        let fired = streaming && !self.ctx.was_streaming;
        self.ctx.was_streaming = streaming;
        fired
    }

    /// One poll cycle. Unset relay url and non-success responses are
    /// silent skips, not failures.
    pub async fn poll_once(&mut self) -> Result<(), WatchError> {
        let Some(relay_url) = self.ctx.relay_url.clone() else {
            return Ok(());
        };

        let response = self
            .client
            .get(format!("{relay_url}/api/status"))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            log::debug!(
                "Status endpoint returned {}, skipping cycle",
                response.status()
            );
            return Ok(());
        }

        let status: StatusResponse = response.json().await?;
        if self.observe(status.streaming) {
            log::info!("Stream went live, raising notification");
            self.notifier.show(&LiveNotification::live_now());
        }

        Ok(())
    }

    /// Run until the message channel closes. Cycles are fixed-interval and
    /// not overlap-guarded; each is expected to finish well within the
    /// interval.
    pub async fn run(mut self, mut rx: mpsc::Receiver<MonitorMessage>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        log::warn!("Stream check failed: {e}");
                    }
                }
                message = rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => {
                            log::info!("Monitor channel closed, stopping");
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingNotifier {
        shown: Mutex<Vec<LiveNotification>>,
    }

    impl LiveNotifier for CountingNotifier {
        fn show(&self, notification: &LiveNotification) {
            self.shown.lock().unwrap().push(notification.clone());
        }
    }

    fn monitor_with_counter() -> (StatusMonitor, Arc<CountingNotifier>) {
        let notifier = Arc::new(CountingNotifier::default());
        let monitor = StatusMonitor::new(notifier.clone(), DEFAULT_POLL_INTERVAL);
        (monitor, notifier)
    }

    #[tokio::test]
    async fn unset_relay_url_polls_are_silent() {
        let _ = env_logger::try_init();
        let (mut monitor, notifier) = monitor_with_counter();
        for _ in 0..10 {
            monitor.poll_once().await.expect("poll must not fail");
        }
        assert!(notifier.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn notification_fires_once_per_offline_to_live_edge() {
        let (mut monitor, notifier) = monitor_with_counter();
        let sequence = [false, true, true, false, true];
        let mut fired_on = Vec::new();
        for (cycle, streaming) in sequence.iter().enumerate() {
            if monitor.observe(*streaming) {
                monitor.notifier.show(&LiveNotification::live_now());
                fired_on.push(cycle + 1);
            }
        }
        assert_eq!(fired_on, vec![2, 5]);
        assert_eq!(notifier.shown.lock().unwrap().len(), 2);
    }

    #[test]
    fn initial_unset_counts_as_offline() {
        let (mut monitor, _) = monitor_with_counter();
        assert!(monitor.observe(true));
        assert!(!monitor.observe(true));
    }

    #[test]
    fn relay_url_is_set_once() {
        let (mut monitor, _) = monitor_with_counter();
        monitor.handle_message(MonitorMessage::SetRelayUrl(
            "http://relay.test/".to_string(),
        ));
        assert_eq!(monitor.relay_url(), Some("http://relay.test"));

        // Repeats are idempotent, a different url does not replace the first.
        monitor.handle_message(MonitorMessage::SetRelayUrl(
            "http://relay.test".to_string(),
        ));
        monitor.handle_message(MonitorMessage::SetRelayUrl(
            "http://other.test".to_string(),
        ));
        assert_eq!(monitor.relay_url(), Some("http://relay.test"));
    }

    #[test]
    fn status_response_tolerates_extra_fields() {
        let status: StatusResponse =
            serde_json::from_str(r#"{"streaming": true, "viewers": 42}"#).unwrap();
        assert!(status.streaming);

        let status: StatusResponse = serde_json::from_str("{}").unwrap();
        assert!(!status.streaming);
    }
}
