//! Configuration management for RentalCar

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable prefix, e.g. `RENTALCAR__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "RENTALCAR";

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Push platform configuration
    pub platform: PlatformConfig,

    /// Notification presentation configuration
    pub notifications: NotificationConfig,

    /// Topics the operator can toggle
    pub topics: Vec<TopicConfig>,

    /// Token persistence configuration
    pub token: TokenConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            platform: PlatformConfig::default(),
            notifications: NotificationConfig::default(),
            topics: default_topics(),
            token: TokenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file, then `RENTALCAR__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| Error::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later at runtime
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for topic in &self.topics {
            if topic.name.trim().is_empty() {
                return Err(Error::config("topic name must not be empty"));
            }
            if !seen.insert(topic.name.as_str()) {
                return Err(Error::config(format!("duplicate topic: {}", topic.name)));
            }
        }

        if self.notifications.sink == SinkKind::Webhook && self.notifications.webhook_url.is_none() {
            return Err(Error::config("notifications.webhook_url is required for the webhook sink"));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Push platform (FCM Instance ID API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL of the Instance ID API
    pub base_url: String,
    /// Server key sent as `Authorization: key=...`
    pub server_key: String,
    /// Registration token issued to this installation, if known up front
    pub registration_token: Option<String>,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "https://iid.googleapis.com".to_string(),
            server_key: String::new(),
            registration_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Where notifications are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Structured log record
    #[default]
    Log,
    /// JSON webhook
    Webhook,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Channel alerts are posted to
    pub channel: ChannelConfig,
    /// Presentation backend
    pub sink: SinkKind,
    /// Base URL for the webhook sink
    pub webhook_url: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            sink: SinkKind::Log,
            webhook_url: None,
        }
    }
}

/// Notification channel definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel id
    pub id: String,
    /// Channel name
    pub name: String,
    /// Channel description
    pub description: String,
    /// Enable the notification light
    pub lights: bool,
    /// Notification light color
    pub light_color: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            id: "my_channel".to_string(),
            name: "rentalCarChannel".to_string(),
            description: "The top rental car service available".to_string(),
            lights: true,
            light_color: "blue".to_string(),
        }
    }
}

/// A push topic and its display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name on the push platform
    pub name: String,
    /// Label used in user-facing messages
    pub label: String,
}

/// The two rental cars the app ships with
pub fn default_topics() -> Vec<TopicConfig> {
    vec![
        TopicConfig {
            name: "CarA".to_string(),
            label: "Car A".to_string(),
        },
        TopicConfig {
            name: "CarB".to_string(),
            label: "Car B".to_string(),
        },
    ]
}

/// Token persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// File the token is persisted to (platform data dir if unset)
    pub path: Option<PathBuf>,
    /// Keep the token in memory only
    pub in_memory: bool,
}

impl TokenConfig {
    /// Resolve the token file, falling back to the platform data directory
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "aks", "rentalcar")
                .map(|dirs| dirs.data_dir().join("token.json"))
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = Config::load(None).unwrap();

        assert_eq!(config.topics, default_topics());
        assert_eq!(config.notifications.channel.id, "my_channel");
        assert_eq!(config.platform.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[platform]
server_key = "abc"
timeout = "5s"

[[topics]]
name = "CarC"
label = "Car C"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.platform.server_key, "abc");
        assert_eq!(config.platform.timeout, Duration::from_secs(5));
        assert_eq!(config.topics.len(), 1);
        assert_eq!(config.topics[0].label, "Car C");
    }

    #[test]
    fn test_validate_rejects_duplicate_topics() {
        let mut config = Config::default();
        config.topics = vec![default_topics()[0].clone(), default_topics()[0].clone()];

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_webhook_sink_requires_url() {
        let mut config = Config::default();
        config.notifications.sink = SinkKind::Webhook;

        assert!(config.validate().is_err());

        config.notifications.webhook_url = Some("http://localhost:9000".to_string());
        assert!(config.validate().is_ok());
    }
}
