//! Alerting for GasWatch
//!
//! [`AlertScheduler`] runs the periodic cycle: price from the oracle,
//! recipients from [`EligibilityFilter`], pruning by [`CooldownGate`],
//! delivery through [`NotificationDispatcher`]. [`StatsAggregator`] reads the
//! resulting alert log on demand.

mod dispatcher;
mod eligibility;
mod scheduler;
mod stats;

pub use dispatcher::{DispatchOutcome, NotificationDispatcher};
pub use eligibility::{CooldownGate, EligibilityFilter, DEFAULT_COOLDOWN};
pub use scheduler::{AlertScheduler, CycleOutcome, CycleReport};
pub use stats::StatsAggregator;
