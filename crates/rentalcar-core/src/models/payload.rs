//! Inbound push message payloads

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Payload key carrying the car's current speed
pub const CAR_SPEED: &str = "carSpeed";
/// Payload key carrying the car's permitted maximum speed
pub const CAR_MAX_PERMITTED_SPEED: &str = "carMaxPermittedSpeed";
/// Payload key carrying the notification title
pub const TITLE: &str = "title";
/// Payload key carrying the notification body
pub const BODY: &str = "body";

/// Application data carried by one push message.
///
/// Immutable once received. No key is guaranteed to be present and values are
/// untrusted text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    data: HashMap<String, String>,
}

impl Payload {
    /// Wrap a received key/value map
    pub fn new(data: HashMap<String, String>) -> Self {
        Self { data }
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Whether the payload has no entries
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Borrow the underlying map
    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }
}

impl From<HashMap<String, String>> for Payload {
    fn from(data: HashMap<String, String>) -> Self {
        Self::new(data)
    }
}

impl<K, V> FromIterator<(K, V)> for Payload
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A push message as relayed by the messaging platform.
///
/// Accepts either the envelope form (`{"data": {...}, "from": ..., "messageId": ...}`)
/// or a bare data object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    /// Platform envelope with metadata
    Envelope {
        /// Application data
        data: Payload,
        /// Sender, e.g. `/topics/CarA`
        #[serde(default)]
        from: Option<String>,
        /// Platform message id
        #[serde(default, rename = "messageId")]
        message_id: Option<String>,
    },
    /// Data object only
    Data(Payload),
}

impl InboundMessage {
    /// The application payload, regardless of form
    pub fn payload(&self) -> &Payload {
        match self {
            Self::Envelope { data, .. } => data,
            Self::Data(data) => data,
        }
    }

    /// Platform message id, when the relay supplied one
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Envelope { message_id, .. } => message_id.as_deref(),
            Self::Data(_) => None,
        }
    }

    /// Take the data map
    pub fn into_payload(self) -> Payload {
        match self {
            Self::Envelope { data, .. } => data,
            Self::Data(data) => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_envelope_form() {
        let msg: InboundMessage = serde_json::from_str(
            r#"{"data": {"carSpeed": "80"}, "from": "/topics/CarA", "messageId": "0:1"}"#,
        )
        .unwrap();

        assert_eq!(msg.message_id(), Some("0:1"));
        assert_eq!(msg.payload().get(CAR_SPEED), Some("80"));
    }

    #[test]
    fn test_bare_data_form() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"carSpeed": "80", "title": "Warn"}"#).unwrap();

        assert!(msg.message_id().is_none());
        assert_eq!(msg.payload().len(), 2);
        assert_eq!(msg.payload().get(TITLE), Some("Warn"));
    }

    #[test]
    fn test_non_string_values_rejected() {
        let result = serde_json::from_str::<InboundMessage>(r#"{"carSpeed": 80}"#);
        assert!(result.is_err());
    }
}
