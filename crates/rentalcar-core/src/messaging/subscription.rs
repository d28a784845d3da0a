//! Topic subscription toggling
//!
//! Toggles are optimistic: the topic is shown in its new state while the
//! platform request is in flight, and rolled back if the platform refuses.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use super::platform::PushPlatform;
use crate::error::{Error, Result};
use crate::models::{Membership, SubscriptionState, Topic};

/// Result of one toggle, including the message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    /// Topic that was toggled
    pub topic: Topic,
    /// State after the platform answered
    pub state: SubscriptionState,
    /// Whether the platform accepted the change
    pub succeeded: bool,
    /// Message for the user, e.g. `Car A subscribe successfully.`
    pub message: String,
}

/// A topic and where it currently stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicStatus {
    /// The topic
    pub topic: Topic,
    /// Its current state
    pub state: SubscriptionState,
}

/// Tracks subscription state for a fixed set of topics
pub struct SubscriptionManager {
    platform: Arc<dyn PushPlatform>,
    topics: Vec<Topic>,
    states: Mutex<HashMap<String, SubscriptionState>>,
}

impl SubscriptionManager {
    /// All topics start unsubscribed
    pub fn new(platform: Arc<dyn PushPlatform>, topics: Vec<Topic>) -> Self {
        let states = topics
            .iter()
            .map(|t| (t.name.clone(), SubscriptionState::default()))
            .collect();

        Self {
            platform,
            topics,
            states: Mutex::new(states),
        }
    }

    /// Every topic with its state, in configuration order
    pub fn list(&self) -> Vec<TopicStatus> {
        let states = self.states.lock();
        self.topics
            .iter()
            .map(|topic| TopicStatus {
                topic: topic.clone(),
                state: states.get(&topic.name).copied().unwrap_or_default(),
            })
            .collect()
    }

    /// State of a single topic
    pub fn state(&self, name: &str) -> Result<SubscriptionState> {
        self.topic(name)?;
        Ok(self.states.lock().get(name).copied().unwrap_or_default())
    }

    /// Flip a topic's membership through the push platform.
    ///
    /// Fails with [`Error::InFlight`] if the previous toggle has not resolved.
    /// A platform failure is not an error here: the topic reverts to its prior
    /// state and the outcome reports `succeeded: false`.
    pub async fn toggle(&self, name: &str) -> Result<ToggleOutcome> {
        let topic = self.topic(name)?.clone();

        let previous = {
            let mut states = self.states.lock();
            let state = states.entry(topic.name.clone()).or_default();
            match *state {
                SubscriptionState::Pending(_) => return Err(Error::InFlight(topic.name)),
                SubscriptionState::Idle(current) => {
                    *state = SubscriptionState::Pending(current.toggled());
                    current
                }
            }
        };
        let target = previous.toggled();
        let mut pending = PendingGuard::new(self, topic.name.clone(), previous);

        let result = match target {
            Membership::Subscribed => self.platform.subscribe(&topic).await,
            Membership::Unsubscribed => self.platform.unsubscribe(&topic).await,
        };

        let succeeded = match &result {
            Ok(()) => {
                info!(topic = %topic, membership = ?target, "Subscription changed");
                true
            }
            Err(e) => {
                warn!(topic = %topic, membership = ?target, error = %e, "Subscription change failed, reverting");
                false
            }
        };
        let resolved = if succeeded { target } else { previous };
        let state = pending.resolve(resolved);

        let message = format!(
            "{} {} {}.",
            topic.label,
            target.verb(),
            if succeeded { "successfully" } else { "failed" }
        );

        Ok(ToggleOutcome {
            topic,
            state,
            succeeded,
            message,
        })
    }

    fn topic(&self, name: &str) -> Result<&Topic> {
        self.topics
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::not_found("Topic", name))
    }

    fn set_idle(&self, name: &str, membership: Membership) -> SubscriptionState {
        let state = SubscriptionState::Idle(membership);
        self.states.lock().insert(name.to_string(), state);
        state
    }
}

/// Reverts a pending toggle if the request future is dropped before it resolves
struct PendingGuard<'a> {
    manager: &'a SubscriptionManager,
    name: String,
    previous: Membership,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(manager: &'a SubscriptionManager, name: String, previous: Membership) -> Self {
        Self {
            manager,
            name,
            previous,
            armed: true,
        }
    }

    fn resolve(&mut self, membership: Membership) -> SubscriptionState {
        self.armed = false;
        self.manager.set_idle(&self.name, membership)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.set_idle(&self.name, self.previous);
        }
    }
}
