//! Speed breach evaluation
//!
//! Decides, from one inbound payload, whether the car has reached or exceeded
//! its permitted maximum speed. Evaluation is pure: no I/O, no shared state,
//! safe to call from any delivery thread.

use std::fmt;

use crate::models::{AlertRequest, Payload, BODY, CAR_MAX_PERMITTED_SPEED, CAR_SPEED, TITLE};

/// Why a payload did not produce an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// A speed key is absent
    MissingField(&'static str),
    /// A speed key is present but empty
    EmptyField(&'static str),
    /// A speed value is not a base-10 integer
    Malformed(&'static str),
    /// Speed is below the permitted maximum
    UnderLimit {
        /// Reported speed
        speed: i32,
        /// Permitted maximum
        max_permitted: i32,
    },
}

impl Suppression {
    /// Stable label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::EmptyField(_) => "empty_field",
            Self::Malformed(_) => "malformed",
            Self::UnderLimit { .. } => "under_limit",
        }
    }
}

impl fmt::Display for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(key) => write!(f, "payload has no {key}"),
            Self::EmptyField(key) => write!(f, "{key} is empty"),
            Self::Malformed(key) => write!(f, "{key} is not an integer"),
            Self::UnderLimit {
                speed,
                max_permitted,
            } => write!(f, "speed {speed} is under the limit of {max_permitted}"),
        }
    }
}

/// Outcome of evaluating a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Show this alert
    Alert(AlertRequest),
    /// Drop the payload silently
    Suppressed(Suppression),
}

impl Verdict {
    /// The alert, if any
    pub fn into_alert(self) -> Option<AlertRequest> {
        match self {
            Self::Alert(alert) => Some(alert),
            Self::Suppressed(_) => None,
        }
    }

    /// Whether an alert is warranted
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Alert(_))
    }
}

/// Decide whether `payload` warrants a speed alert.
///
/// Returns an alert iff both speed keys are present, non-empty, parse as
/// integers, and the permitted maximum is less than or equal to the speed.
/// Malformed input yields `None`, never an error.
pub fn evaluate(payload: &Payload) -> Option<AlertRequest> {
    assess(payload).into_alert()
}

/// Same decision as [`evaluate`], keeping the reason an alert was suppressed
pub fn assess(payload: &Payload) -> Verdict {
    let speed = match speed_field(payload, CAR_SPEED) {
        Ok(v) => v,
        Err(s) => return Verdict::Suppressed(s),
    };
    let max_permitted = match speed_field(payload, CAR_MAX_PERMITTED_SPEED) {
        Ok(v) => v,
        Err(s) => return Verdict::Suppressed(s),
    };

    // Both keys are checked for presence and emptiness before either is parsed.
    let parsed = (
        parse(speed, CAR_SPEED),
        parse(max_permitted, CAR_MAX_PERMITTED_SPEED),
    );
    let (speed, max_permitted) = match parsed {
        (Ok(speed), Ok(max)) => (speed, max),
        (Err(s), _) | (_, Err(s)) => return Verdict::Suppressed(s),
    };

    if max_permitted <= speed {
        Verdict::Alert(AlertRequest {
            title: payload.get(TITLE).unwrap_or_default().to_string(),
            body: payload.get(BODY).unwrap_or_default().to_string(),
        })
    } else {
        Verdict::Suppressed(Suppression::UnderLimit {
            speed,
            max_permitted,
        })
    }
}

fn speed_field<'a>(payload: &'a Payload, key: &'static str) -> Result<&'a str, Suppression> {
    match payload.get(key) {
        None => Err(Suppression::MissingField(key)),
        Some("") => Err(Suppression::EmptyField(key)),
        Some(value) => Ok(value),
    }
}

fn parse(value: &str, key: &'static str) -> Result<i32, Suppression> {
    // ASCII digits only
    value.parse::<i32>().map_err(|_| Suppression::Malformed(key))
}
