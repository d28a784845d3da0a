//! Handling of messages and tokens delivered by the push platform

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::platform::PushPlatform;
use crate::alerting::{self, NotificationDispatcher, Suppression, Verdict};
use crate::error::Result;
use crate::models::{Notification, Payload};
use crate::token::TokenStore;

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// A notification was shown
    Alerted(Notification),
    /// The payload did not warrant an alert
    Suppressed(Suppression),
    /// An alert was warranted but could not be shown
    DispatchFailed(String),
}

/// Serializable summary of a [`MessageOutcome`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageReport {
    /// Whether a notification was shown
    pub alerted: bool,
    /// Id of the shown notification
    pub notification_id: Option<i32>,
    /// Why no notification was shown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&MessageOutcome> for MessageReport {
    fn from(outcome: &MessageOutcome) -> Self {
        match outcome {
            MessageOutcome::Alerted(n) => Self {
                alerted: true,
                notification_id: Some(n.id),
                reason: None,
            },
            MessageOutcome::Suppressed(s) => Self {
                alerted: false,
                notification_id: None,
                reason: Some(s.to_string()),
            },
            MessageOutcome::DispatchFailed(e) => Self {
                alerted: false,
                notification_id: None,
                reason: Some(e.clone()),
            },
        }
    }
}

/// Receives push messages and registration tokens
pub struct MessagingService {
    dispatcher: NotificationDispatcher,
    tokens: Arc<dyn TokenStore>,
    platform: Arc<dyn PushPlatform>,
}

impl MessagingService {
    /// Create a service dispatching through `dispatcher`
    pub fn new(
        dispatcher: NotificationDispatcher,
        tokens: Arc<dyn TokenStore>,
        platform: Arc<dyn PushPlatform>,
    ) -> Self {
        Self {
            dispatcher,
            tokens,
            platform,
        }
    }

    /// Evaluate a received payload and show a notification if the car is speeding.
    ///
    /// Never fails: malformed payloads and presentation errors are logged and
    /// reported in the outcome.
    pub async fn on_message_received(&self, payload: &Payload) -> MessageOutcome {
        if !payload.is_empty() {
            info!(data = ?payload.data(), "Message received");
        }

        match alerting::assess(payload) {
            Verdict::Alert(alert) => match self.dispatcher.dispatch(alert).await {
                Ok(notification) => {
                    metrics::counter!("rentalcar_alerts_dispatched_total").increment(1);
                    MessageOutcome::Alerted(notification)
                }
                Err(e) => {
                    error!(error = %e, "Failed to show speed alert");
                    metrics::counter!("rentalcar_alerts_failed_total").increment(1);
                    MessageOutcome::DispatchFailed(e.to_string())
                }
            },
            Verdict::Suppressed(suppression) => {
                debug!(reason = suppression.reason(), detail = %suppression, "No alert for message");
                metrics::counter!(
                    "rentalcar_payloads_suppressed_total",
                    "reason" => suppression.reason()
                )
                .increment(1);
                MessageOutcome::Suppressed(suppression)
            }
        }
    }

    /// Store a token newly issued by the platform
    pub fn on_new_token(&self, token: String) -> Result<()> {
        self.tokens.set(token)?;
        info!("Registration token updated");
        Ok(())
    }

    /// Ask the platform for the current token and store it.
    ///
    /// Failure is logged and otherwise ignored.
    pub async fn refresh_token(&self) -> Option<String> {
        let token = match self.platform.fetch_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Fetching registration token failed");
                return None;
            }
        };

        if let Err(e) = self.tokens.set(token.clone()) {
            warn!(error = %e, "Failed to persist registration token");
        }
        info!("Registration token: {token}");
        Some(token)
    }

    /// The stored token, `""` if none
    pub fn token(&self) -> String {
        self.tokens.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::RecordingSink;
    use crate::config::ChannelConfig;
    use crate::messaging::subscription::tests::FakePlatform;
    use crate::models::{ChannelSpec, CAR_MAX_PERMITTED_SPEED, CAR_SPEED, TITLE};
    use crate::token::MemoryTokenStore;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    struct Harness {
        service: MessagingService,
        sink: Arc<RecordingSink>,
        platform: Arc<FakePlatform>,
        tokens: Arc<MemoryTokenStore>,
    }

    fn harness(sink: RecordingSink) -> Harness {
        let sink = Arc::new(sink);
        let platform = Arc::new(FakePlatform::default());
        let tokens = Arc::new(MemoryTokenStore::new());
        let dispatcher =
            NotificationDispatcher::new(sink.clone(), ChannelSpec::from(&ChannelConfig::default()));

        Harness {
            service: MessagingService::new(dispatcher, tokens.clone(), platform.clone()),
            sink,
            platform,
            tokens,
        }
    }

    #[tokio::test]
    async fn test_speeding_payload_shows_notification() {
        let h = harness(RecordingSink::default());
        let payload: Payload = [(CAR_SPEED, "90"), (CAR_MAX_PERMITTED_SPEED, "60"), (TITLE, "Warn")]
            .into_iter()
            .collect();

        let outcome = h.service.on_message_received(&payload).await;

        let MessageOutcome::Alerted(notification) = outcome else {
            panic!("expected an alert, got {outcome:?}");
        };
        assert_eq!(notification.title, "Warn");
        assert_eq!(h.sink.presented.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_silent() {
        let h = harness(RecordingSink::default());
        let payload: Payload = [(CAR_SPEED, "fast"), (CAR_MAX_PERMITTED_SPEED, "60")]
            .into_iter()
            .collect();

        let outcome = h.service.on_message_received(&payload).await;

        assert_eq!(outcome, MessageOutcome::Suppressed(Suppression::Malformed(CAR_SPEED)));
        assert!(h.sink.presented.lock().is_empty());
        assert!(h.sink.channels.lock().is_empty());
    }

    #[test]
    fn test_suppression_counted_by_reason() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let h = harness(RecordingSink::default());
        let payload: Payload = [(CAR_SPEED, "fast"), (CAR_MAX_PERMITTED_SPEED, "60")]
            .into_iter()
            .collect();

        // The local recorder is thread-bound, so drive the future on this thread.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(h.service.on_message_received(&payload));
        });

        let counters: Vec<_> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, ..)| key.key().name() == "rentalcar_payloads_suppressed_total")
            .collect();
        assert_eq!(counters.len(), 1);

        let (key, _, _, value) = &counters[0];
        let labels: Vec<_> = key
            .key()
            .labels()
            .map(|l| (l.key().to_string(), l.value().to_string()))
            .collect();
        assert_eq!(labels, vec![("reason".to_string(), "malformed".to_string())]);
        assert_eq!(*value, DebugValue::Counter(1));
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_reported_not_raised() {
        let h = harness(RecordingSink {
            fail_present: true,
            ..Default::default()
        });
        let payload: Payload = [(CAR_SPEED, "60"), (CAR_MAX_PERMITTED_SPEED, "60")]
            .into_iter()
            .collect();

        let outcome = h.service.on_message_received(&payload).await;

        assert!(matches!(outcome, MessageOutcome::DispatchFailed(_)));
        assert!(!MessageReport::from(&outcome).alerted);
    }

    #[tokio::test]
    async fn test_new_token_overwrites_store() {
        let h = harness(RecordingSink::default());

        h.service.on_new_token("one".to_string()).unwrap();
        h.service.on_new_token("two".to_string()).unwrap();

        assert_eq!(h.tokens.get(), "two");
        assert_eq!(h.service.token(), "two");
    }

    #[tokio::test]
    async fn test_refresh_token_stores_platform_token() {
        let h = harness(RecordingSink::default());

        assert_eq!(h.service.refresh_token().await.as_deref(), Some("fake-token"));
        assert_eq!(h.tokens.get(), "fake-token");
    }

    #[tokio::test]
    async fn test_refresh_token_failure_keeps_old_token() {
        let h = harness(RecordingSink::default());
        h.tokens.set("old".to_string()).unwrap();
        h.platform.fail.store(true, Ordering::SeqCst);

        assert_eq!(h.service.refresh_token().await, None);
        assert_eq!(h.tokens.get(), "old");
    }
}
