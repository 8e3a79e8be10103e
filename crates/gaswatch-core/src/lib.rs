//! # GasWatch
//!
//! Gas price threshold alerts delivered over Telegram.
//!
//! Users register a Telegram username and the highest gas price they are
//! willing to pay. Every few minutes the current price is read from the
//! Etherscan gas oracle and everyone whose threshold is at or above it gets a
//! Telegram message, at most once per cooldown window.
//!
//! ## Architecture
//!
//! - **Oracle**: Etherscan gas oracle client with dual-schema parsing
//! - **Alerting**: scheduler, eligibility filter, cooldown gate, dispatcher
//! - **Notify**: Telegram sink and bot command handling
//! - **API**: registration, gas price and stats endpoints
//! - **Storage**: PostgreSQL, or in-memory for development
//!
//! ## Quick Start
//!
//! ```bash
//! # Apply migrations and start everything
//! gaswatch db migrate
//! gaswatch serve
//!
//! # Without a database
//! gaswatch serve --in-memory
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod oracle;
pub mod ratelimit;
pub mod registration;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertScheduler, CooldownGate, EligibilityFilter, StatsAggregator};
    pub use crate::config::Config;
    pub use crate::db::{AlertRecordStore, RecipientStore};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::notify::NotificationSink;
    pub use crate::oracle::PriceOracle;
}
