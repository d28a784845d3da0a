//! Push topics and subscription state

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TopicConfig;

/// A named broadcast channel on the push platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    /// Name on the push platform, e.g. `CarA`
    pub name: String,
    /// Label shown to the user, e.g. `Car A`
    pub label: String,
}

impl Topic {
    /// Create a topic
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

impl From<&TopicConfig> for Topic {
    fn from(config: &TopicConfig) -> Self {
        Self::new(config.name.clone(), config.label.clone())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Whether this installation receives messages for a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// Receiving the topic's messages
    Subscribed,
    /// Not receiving them
    #[default]
    Unsubscribed,
}

impl Membership {
    /// The other state
    pub fn toggled(self) -> Self {
        match self {
            Self::Subscribed => Self::Unsubscribed,
            Self::Unsubscribed => Self::Subscribed,
        }
    }

    /// Verb used in user-facing messages
    pub fn verb(self) -> &'static str {
        match self {
            Self::Subscribed => "subscribe",
            Self::Unsubscribed => "unsubscribe",
        }
    }
}

/// Subscription state of one topic.
///
/// A toggle moves `Idle(current)` to `Pending(target)`; the platform's answer
/// resolves it back to `Idle(target)` or `Idle(current)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "membership", rename_all = "lowercase")]
pub enum SubscriptionState {
    /// No request outstanding
    Idle(Membership),
    /// Request for `target` sent, answer not yet received
    Pending(Membership),
}

impl Default for SubscriptionState {
    fn default() -> Self {
        Self::Idle(Membership::Unsubscribed)
    }
}

impl SubscriptionState {
    /// Membership as the user sees it; pending changes are shown optimistically
    pub fn displayed(self) -> Membership {
        match self {
            Self::Idle(m) | Self::Pending(m) => m,
        }
    }

    /// Whether a toggle is in flight
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_toggle() {
        assert_eq!(Membership::Subscribed.toggled(), Membership::Unsubscribed);
        assert_eq!(Membership::Unsubscribed.toggled(), Membership::Subscribed);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(SubscriptionState::Pending(Membership::Subscribed)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "pending", "membership": "subscribed"}));
    }
}
