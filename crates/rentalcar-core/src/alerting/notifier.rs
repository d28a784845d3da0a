//! Notification delivery for speed alerts

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{AlertRequest, ChannelSpec, Notification};

/// Somewhere notifications can be shown
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Register a channel. Called once, before the first notification on it.
    async fn create_channel(&self, channel: &ChannelSpec) -> Result<()>;

    /// Show a notification
    async fn present(&self, notification: &Notification) -> Result<()>;
}

/// Turns alert requests into notifications on a single channel
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    channel: ChannelSpec,
    channel_ready: OnceCell<()>,
    next_id: AtomicI32,
}

impl NotificationDispatcher {
    /// Create a dispatcher posting to `channel` through `sink`
    pub fn new(sink: Arc<dyn NotificationSink>, channel: ChannelSpec) -> Self {
        Self {
            sink,
            channel,
            channel_ready: OnceCell::new(),
            next_id: AtomicI32::new(rand::random()),
        }
    }

    /// The channel alerts are posted to
    pub fn channel(&self) -> &ChannelSpec {
        &self.channel
    }

    /// Present an alert, creating the channel first if this is the first dispatch.
    pub async fn dispatch(&self, alert: AlertRequest) -> Result<Notification> {
        self.channel_ready
            .get_or_try_init(|| async {
                debug!(channel = %self.channel.id, "Creating notification channel");
                self.sink.create_channel(&self.channel).await
            })
            .await?;

        // fetch_add wraps on overflow, ids stay unique until 2^32 dispatches
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = Notification::from_alert(id, self.channel.id.clone(), alert);

        self.sink.present(&notification).await?;

        info!(
            notification_id = notification.id,
            channel = %notification.channel_id,
            "Speed alert dispatched"
        );
        Ok(notification)
    }
}

/// Writes notifications to the log. Used on hosts without a display.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
        info!(
            channel = %channel.id,
            name = %channel.name,
            importance = ?channel.importance,
            "Notification channel ready"
        );
        Ok(())
    }

    async fn present(&self, notification: &Notification) -> Result<()> {
        info!(
            notification_id = notification.id,
            channel = %notification.channel_id,
            title = %notification.title,
            body = %notification.body,
            tap_action = ?notification.tap_action,
            "Notification"
        );
        Ok(())
    }
}

/// Posts channels and notifications as JSON to a webhook
pub struct WebhookSink {
    client: Client,
    base_url: String,
}

impl WebhookSink {
    /// Create a sink posting under `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: serde::Serialize + Sync>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!(
                "Webhook returned {status}: {body}"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
        self.post("channels", channel).await
    }

    async fn present(&self, notification: &Notification) -> Result<()> {
        self.post("notifications", notification).await?;
        info!(notification_id = notification.id, url = %self.base_url, "Webhook notification sent");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ChannelConfig;

    /// Sink that remembers everything it was asked to do
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub channels: Mutex<Vec<ChannelSpec>>,
        pub presented: Mutex<Vec<Notification>>,
        pub fail_present: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
            self.channels.lock().push(channel.clone());
            Ok(())
        }

        async fn present(&self, notification: &Notification) -> Result<()> {
            if self.fail_present {
                return Err(Error::Notification("display unavailable".to_string()));
            }
            self.presented.lock().push(notification.clone());
            Ok(())
        }
    }

    fn alert(title: &str) -> AlertRequest {
        AlertRequest {
            title: title.to_string(),
            body: "Too fast".to_string(),
        }
    }

    fn channel() -> ChannelSpec {
        ChannelSpec::from(&ChannelConfig::default())
    }

    #[tokio::test]
    async fn test_channel_created_once() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = NotificationDispatcher::new(sink.clone(), channel());

        for i in 0..3 {
            dispatcher.dispatch(alert(&format!("alert {i}"))).await.unwrap();
        }

        assert_eq!(sink.channels.lock().len(), 1);
        assert_eq!(sink.presented.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_first_dispatch_creates_channel_once() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(sink.clone(), channel()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.dispatch(alert(&i.to_string())).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(sink.channels.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = NotificationDispatcher::new(sink.clone(), channel());

        let mut ids = HashSet::new();
        for _ in 0..50 {
            ids.insert(dispatcher.dispatch(alert("x")).await.unwrap().id);
        }

        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn test_present_failure_is_returned() {
        let sink = Arc::new(RecordingSink {
            fail_present: true,
            ..Default::default()
        });
        let dispatcher = NotificationDispatcher::new(sink, channel());

        let result = dispatcher.dispatch(alert("x")).await;

        assert!(matches!(result, Err(Error::Notification(_))));
    }

    #[tokio::test]
    async fn test_webhook_sink_posts_channel_then_notification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let sink = WebhookSink::new(server.uri(), Duration::from_secs(5)).unwrap();
        let dispatcher = NotificationDispatcher::new(Arc::new(sink), channel());

        dispatcher.dispatch(alert("one")).await.unwrap();
        dispatcher.dispatch(alert("two")).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_sink_reports_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let sink = WebhookSink::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = sink.create_channel(&channel()).await.unwrap_err();

        assert!(err.to_string().contains("503"));
    }
}
