//! Speed alerting
//!
//! Evaluates inbound payloads for speed breaches and delivers the resulting notifications.

mod evaluator;
mod notifier;

pub use evaluator::{assess, evaluate, Suppression, Verdict};
pub use notifier::{LogSink, NotificationDispatcher, NotificationSink, WebhookSink};

#[cfg(test)]
pub(crate) use notifier::tests::RecordingSink;
