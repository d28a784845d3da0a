//! Push platform client

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlatformConfig;
use crate::error::{Error, Result};
use crate::models::Topic;
use crate::token::TokenStore;

/// Operations delegated to the push-messaging platform
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Start receiving messages sent to `topic`
    async fn subscribe(&self, topic: &Topic) -> Result<()>;

    /// Stop receiving messages sent to `topic`
    async fn unsubscribe(&self, topic: &Topic) -> Result<()>;

    /// Current registration token for this installation
    async fn fetch_token(&self) -> Result<String>;
}

/// Client for the FCM Instance ID topic management API
pub struct FcmPlatform {
    client: Client,
    base_url: String,
    server_key: String,
    registration_token: Option<String>,
    tokens: Arc<dyn TokenStore>,
}

impl FcmPlatform {
    /// Create a client. Without a configured registration token, the token store's value is used.
    pub fn new(config: &PlatformConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            server_key: config.server_key.clone(),
            registration_token: config
                .registration_token
                .clone()
                .filter(|t| !t.is_empty()),
            tokens,
        })
    }

    fn token(&self) -> Result<String> {
        if let Some(token) = &self.registration_token {
            return Ok(token.clone());
        }

        let stored = self.tokens.get();
        if stored.is_empty() {
            return Err(Error::Token("no registration token issued yet".to_string()));
        }
        Ok(stored)
    }

    fn authorization(&self) -> String {
        format!("key={}", self.server_key)
    }
}

#[async_trait]
impl PushPlatform for FcmPlatform {
    async fn subscribe(&self, topic: &Topic) -> Result<()> {
        let token = self.token()?;
        let url = format!("{}/iid/v1/{}/rel/topics/{}", self.base_url, token, topic.name);

        debug!(topic = %topic, "Subscribing to topic");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.authorization())
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        check_status(response, "subscribe").await?;

        info!(topic = %topic, "Subscribed to topic");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &Topic) -> Result<()> {
        let token = self.token()?;
        let url = format!("{}/iid/v1:batchRemove", self.base_url);
        let request = BatchRequest {
            to: format!("/topics/{}", topic.name),
            registration_tokens: vec![token],
        };

        debug!(topic = %topic, "Unsubscribing from topic");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.authorization())
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, "unsubscribe").await?;

        // Per-token failures come back as 200 with an error entry.
        let batch: BatchResponse = match response.json().await {
            Ok(batch) => batch,
            Err(e) => {
                debug!(topic = %topic, error = %e, "Unreadable batchRemove body, assuming success");
                BatchResponse::default()
            }
        };
        if let Some(error) = batch.results.into_iter().find_map(|r| r.error) {
            return Err(Error::platform(format!("unsubscribe rejected: {error}")));
        }

        info!(topic = %topic, "Unsubscribed from topic");
        Ok(())
    }

    async fn fetch_token(&self) -> Result<String> {
        self.token()
    }
}

async fn check_status(response: Response, operation: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::platform(format!("{operation} returned {status}: {body}")))
}

#[derive(Debug, Serialize)]
struct BatchRequest {
    to: String,
    registration_tokens: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<BatchResult>,
}

#[derive(Debug, Deserialize)]
struct BatchResult {
    error: Option<String>,
}
