//! Periodic alert cycle
//!
//! A cycle fetches the gas price, selects eligible recipients, drops those
//! still cooling down and dispatches to the rest. Cycles never overlap: a
//! tick that arrives while one is running is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::dispatcher::{DispatchOutcome, NotificationDispatcher};
use super::eligibility::{CooldownGate, EligibilityFilter};
use crate::error::Result;
use crate::oracle::PriceOracle;

/// Summary of a completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Gas price the cycle ran against
    pub price: i32,
    /// Recipients whose threshold matched
    pub eligible: usize,
    /// Eligible recipients still in cooldown
    pub cooling_down: usize,
    /// Alerts the sink accepted
    pub delivered: usize,
    /// Alerts the sink rejected
    pub failed: usize,
    /// Recipients without a chat
    pub skipped: usize,
    /// Recipients whose processing raised an error
    pub errors: usize,
}

/// How a call to [`AlertScheduler::run_cycle`] ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Another cycle was running; nothing was done
    Overlapped,
    /// The oracle had no price; nothing was dispatched
    NoPrice,
    /// The cycle ran to the end
    Completed(CycleReport),
}

/// Drives alert cycles on a fixed period
pub struct AlertScheduler {
    oracle: Arc<dyn PriceOracle>,
    filter: EligibilityFilter,
    gate: CooldownGate,
    dispatcher: NotificationDispatcher,
    check_interval: Duration,
    running: AtomicBool,
}

/// Clears the running flag when a cycle ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AlertScheduler {
    /// Create a scheduler
    pub fn new(
        oracle: Arc<dyn PriceOracle>,
        filter: EligibilityFilter,
        gate: CooldownGate,
        dispatcher: NotificationDispatcher,
        check_interval: Duration,
    ) -> Self {
        Self {
            oracle,
            filter,
            gate,
            dispatcher,
            check_interval,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a cycle is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run cycles forever. Each tick spawns its cycle so a slow cycle never
    /// delays the cadence; ticks that find a cycle running are skipped.
    pub async fn start(self: Arc<Self>) {
        info!(interval = ?self.check_interval, "Starting alert scheduler");

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = scheduler.run_cycle().await {
                    error!(error = %e, "Alert cycle failed");
                    metrics::counter!("gaswatch_cycles_total", "result" => "error").increment(1);
                }
            });
        }
    }

    /// Run one cycle unless one is already running
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Previous alert cycle still running, skipping tick");
            metrics::counter!("gaswatch_cycles_total", "result" => "overlapped").increment(1);
            return Ok(CycleOutcome::Overlapped);
        }
        let _guard = RunningGuard(&self.running);

        let Some(price) = self.oracle.fetch_current_price().await else {
            warn!("No gas price available, skipping alert cycle");
            metrics::counter!("gaswatch_cycles_total", "result" => "no_price").increment(1);
            return Ok(CycleOutcome::NoPrice);
        };

        let candidates = self.filter.eligible(price).await?;
        let mut report = CycleReport {
            price,
            eligible: candidates.len(),
            ..CycleReport::default()
        };

        debug!(price, eligible = report.eligible, "Evaluating recipients");

        for recipient in candidates {
            if !self.gate.should_notify(&recipient) {
                debug!(recipient = %recipient.identity, "Recipient in cooldown");
                report.cooling_down += 1;
                continue;
            }

            match self.dispatcher.dispatch(&recipient, price).await {
                Ok(DispatchOutcome::Delivered) => report.delivered += 1,
                Ok(DispatchOutcome::Failed) => report.failed += 1,
                Ok(DispatchOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!(recipient = %recipient.identity, error = %e, "Error processing recipient");
                    report.errors += 1;
                }
            }
        }

        info!(
            price,
            eligible = report.eligible,
            cooling_down = report.cooling_down,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            errors = report.errors,
            "Alert cycle complete"
        );
        metrics::counter!("gaswatch_cycles_total", "result" => "completed").increment(1);

        Ok(CycleOutcome::Completed(report))
    }
}
