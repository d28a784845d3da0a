//! Push messaging
//!
//! Talks to the push platform, tracks topic subscriptions, and handles
//! inbound messages and token updates.

mod platform;
mod service;
mod subscription;

pub use platform::{FcmPlatform, PushPlatform};
pub use service::{MessageOutcome, MessageReport, MessagingService};
pub use subscription::{SubscriptionManager, TopicStatus, ToggleOutcome};

#[cfg(test)]
pub(crate) use subscription::tests::FakePlatform;
