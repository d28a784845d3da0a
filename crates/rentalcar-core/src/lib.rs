//! # RentalCar
//!
//! Speed-limit alerting for rental cars.
//!
//! Cars publish telemetry to per-car push topics. This service subscribes to
//! the topics an operator selects, evaluates each inbound payload, and shows a
//! notification when a car reaches or exceeds its permitted maximum speed.
//!
//! ## Architecture
//!
//! - **Alerting**: pure breach evaluation plus notification dispatch
//! - **Messaging**: push platform client, topic subscriptions, message handling
//! - **Token**: persisted registration token
//! - **API**: REST surface for the push relay and the operator
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the service
//! rentalcar serve
//!
//! # Check a payload without running the service
//! echo '{"carSpeed": "80", "carMaxPermittedSpeed": "60"}' | rentalcar evaluate
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod messaging;
pub mod models;
pub mod token;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{evaluate, NotificationDispatcher, NotificationSink};
    pub use crate::app::App;
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::messaging::{MessagingService, PushPlatform, SubscriptionManager};
    pub use crate::models::*;
    pub use crate::token::TokenStore;
}
