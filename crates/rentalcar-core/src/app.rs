//! Service wiring
//!
//! Builds the token store, push platform client, notification dispatcher and
//! subscription manager from configuration, and runs the HTTP server.

use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

use crate::alerting::{LogSink, NotificationDispatcher, NotificationSink, WebhookSink};
use crate::api::{AppState, HttpServer};
use crate::config::{Config, SinkKind};
use crate::error::{Error, Result};
use crate::messaging::{FcmPlatform, MessagingService, PushPlatform, SubscriptionManager};
use crate::models::{ChannelSpec, Topic};
use crate::token::{self, TokenStore};

/// The assembled service
pub struct App {
    config: Config,
    tokens: Arc<dyn TokenStore>,
    platform: Arc<dyn PushPlatform>,
    service: Arc<MessagingService>,
    subscriptions: Arc<SubscriptionManager>,
    metrics: Option<PrometheusHandle>,
}

impl App {
    /// Build every component from configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let tokens = token::open(&config.token)?;
        let platform: Arc<dyn PushPlatform> =
            Arc::new(FcmPlatform::new(&config.platform, tokens.clone())?);
        let sink = notification_sink(&config)?;

        Ok(Self::with_parts(config, tokens, platform, sink))
    }

    /// Build around externally provided collaborators
    pub fn with_parts(
        config: Config,
        tokens: Arc<dyn TokenStore>,
        platform: Arc<dyn PushPlatform>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let dispatcher =
            NotificationDispatcher::new(sink, ChannelSpec::from(&config.notifications.channel));
        let service = Arc::new(MessagingService::new(
            dispatcher,
            tokens.clone(),
            platform.clone(),
        ));
        let topics = config.topics.iter().map(Topic::from).collect();
        let subscriptions = Arc::new(SubscriptionManager::new(platform.clone(), topics));

        Self {
            config,
            tokens,
            platform,
            service,
            subscriptions,
            metrics: None,
        }
    }

    /// Install the process-wide Prometheus recorder and expose it on `/metrics`.
    ///
    /// Fails if another recorder is already installed.
    pub fn install_metrics(&mut self) -> Result<()> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| Error::internal(format!("failed to install metrics recorder: {e}")))?;
        self.metrics = Some(handle);
        Ok(())
    }

    /// Expose an existing Prometheus handle on `/metrics`
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Shared state for the HTTP handlers
    pub fn state(&self) -> AppState {
        AppState {
            service: self.service.clone(),
            subscriptions: self.subscriptions.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Message and token handling
    pub fn service(&self) -> &Arc<MessagingService> {
        &self.service
    }

    /// Topic subscription state
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Push platform client
    pub fn platform(&self) -> &Arc<dyn PushPlatform> {
        &self.platform
    }

    /// Registration token store
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Install metrics, fetch the registration token, then serve HTTP until Ctrl+C
    pub async fn run(mut self) -> Result<()> {
        info!("Starting RentalCar alert service...");

        if self.metrics.is_none() {
            if let Err(e) = self.install_metrics() {
                warn!(error = %e, "Metrics disabled");
            }
        }

        self.service.refresh_token().await;

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let server = HttpServer::new(self.state());

        server
            .serve(&addr, async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl+C received, shutting down...");
                }
            })
            .await?;

        info!("RentalCar stopped");
        Ok(())
    }
}

fn notification_sink(config: &Config) -> Result<Arc<dyn NotificationSink>> {
    match config.notifications.sink {
        SinkKind::Log => Ok(Arc::new(LogSink)),
        SinkKind::Webhook => {
            let url = config
                .notifications
                .webhook_url
                .as_deref()
                .ok_or_else(|| Error::config("notifications.webhook_url is not set"))?;
            Ok(Arc::new(WebhookSink::new(url, config.platform.timeout)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::FakePlatform;
    use crate::models::Membership;
    use crate::alerting::RecordingSink;
    use crate::token::MemoryTokenStore;

    #[test]
    fn test_from_config_with_memory_store() {
        let mut config = Config::default();
        config.token.in_memory = true;

        let app = App::from_config(config).unwrap();

        assert_eq!(app.tokens().get(), "");
        assert_eq!(app.subscriptions().list().len(), 2);
    }

    #[test]
    fn test_webhook_sink_without_url_is_config_error() {
        let mut config = Config::default();
        config.token.in_memory = true;
        config.notifications.sink = SinkKind::Webhook;

        assert!(matches!(App::from_config(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_state_carries_metrics_handle() {
        let app = App::with_parts(
            Config::default(),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(FakePlatform::default()),
            Arc::new(RecordingSink::default()),
        );
        assert!(app.state().metrics.is_none());

        let handle = PrometheusBuilder::new().build_recorder().handle();
        let app = app.with_metrics(handle);

        assert!(app.state().metrics.is_some());
    }

    #[tokio::test]
    async fn test_parts_share_platform() {
        let platform = Arc::new(FakePlatform::default());
        let app = App::with_parts(
            Config::default(),
            Arc::new(MemoryTokenStore::new()),
            platform.clone(),
            Arc::new(RecordingSink::default()),
        );

        app.subscriptions().toggle("CarA").await.unwrap();

        assert_eq!(platform.calls.lock()[0].1, Membership::Subscribed);
    }
}
