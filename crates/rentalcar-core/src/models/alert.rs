//! Alert and notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to show a speed alert. Produced by the evaluator, consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRequest {
    /// Notification title, empty if the payload had none
    pub title: String,
    /// Notification body, empty if the payload had none
    pub body: String,
}

/// What happens when the user taps a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapAction {
    /// Bring the primary screen to the front
    #[default]
    OpenMainScreen,
}

/// Notification priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Normal ordering
    Default,
    /// Shown ahead of other notifications
    #[default]
    High,
}

/// A notification as handed to a presentation sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Dispatch-unique identifier
    pub id: i32,

    /// Channel the notification is posted to
    pub channel_id: String,

    /// Title line
    pub title: String,

    /// Short text
    pub body: String,

    /// Expanded text, same as the body for speed alerts
    pub big_text: String,

    /// Always high for speed alerts
    pub priority: Priority,

    /// Dismiss when tapped
    pub auto_cancel: bool,

    /// Action on tap
    pub tap_action: TapAction,

    /// When the notification was handed to the sink
    pub posted_at: DateTime<Utc>,
}

impl Notification {
    /// Build the notification for an alert
    pub fn from_alert(id: i32, channel_id: impl Into<String>, alert: AlertRequest) -> Self {
        Self {
            id,
            channel_id: channel_id.into(),
            big_text: alert.body.clone(),
            title: alert.title,
            body: alert.body,
            priority: Priority::High,
            auto_cancel: true,
            tap_action: TapAction::OpenMainScreen,
            posted_at: Utc::now(),
        }
    }
}

/// Importance of a notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Normal importance
    Default,
    /// Sound and heads-up display
    #[default]
    High,
}

/// A notification channel that must exist before the first notification is posted to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Stable channel id
    pub id: String,
    /// User-visible name
    pub name: String,
    /// User-visible description
    pub description: String,
    /// Channel importance
    pub importance: Importance,
    /// Blink the notification light
    pub lights: bool,
    /// Light color name
    pub light_color: String,
}

impl From<&crate::config::ChannelConfig> for ChannelSpec {
    fn from(config: &crate::config::ChannelConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            importance: Importance::High,
            lights: config.lights,
            light_color: config.light_color.clone(),
        }
    }
}
