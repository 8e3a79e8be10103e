#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gaswatch::alerting::{
    AlertScheduler, CooldownGate, EligibilityFilter, NotificationDispatcher, StatsAggregator,
};
use gaswatch::api::AppState;
use gaswatch::db::{MemoryAlertRecordStore, MemoryRecipientStore};
use gaswatch::models::ChatId;
use gaswatch::notify::NotificationSink;
use gaswatch::oracle::PriceOracle;
use gaswatch::ratelimit::IngressRateLimiter;
use gaswatch::registration::RegistrationService;
use parking_lot::Mutex;

/// Oracle returning whatever price the test sets
#[derive(Default)]
pub struct ManualOracle {
    price: Mutex<Option<i32>>,
}

impl ManualOracle {
    pub fn set(&self, price: Option<i32>) {
        *self.price.lock() = price;
    }
}

#[async_trait]
impl PriceOracle for ManualOracle {
    async fn fetch_current_price(&self) -> Option<i32> {
        *self.price.lock()
    }
}

/// Sink that records messages; its verdict can be flipped mid-test
pub struct ToggleSink {
    accept: AtomicBool,
    sent: Mutex<Vec<(ChatId, String)>>,
}

impl ToggleSink {
    pub fn new(accept: bool) -> Self {
        Self {
            accept: AtomicBool::new(accept),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for ToggleSink {
    async fn send(&self, chat_id: ChatId, text: &str) -> bool {
        self.sent.lock().push((chat_id, text.to_string()));
        self.accept.load(Ordering::SeqCst)
    }
}

/// Every component wired over in-memory stores
pub struct TestApp {
    pub recipients: Arc<MemoryRecipientStore>,
    pub records: Arc<MemoryAlertRecordStore>,
    pub oracle: Arc<ManualOracle>,
    pub sink: Arc<ToggleSink>,
    pub registration: RegistrationService,
    pub scheduler: AlertScheduler,
    pub stats: StatsAggregator,
}

impl TestApp {
    pub fn new() -> Self {
        let recipients = Arc::new(MemoryRecipientStore::new());
        let records = Arc::new(MemoryAlertRecordStore::new());
        let oracle = Arc::new(ManualOracle::default());
        let sink = Arc::new(ToggleSink::new(true));

        let scheduler = AlertScheduler::new(
            oracle.clone(),
            EligibilityFilter::new(recipients.clone()),
            CooldownGate::default(),
            NotificationDispatcher::new(sink.clone(), recipients.clone(), records.clone()),
            Duration::from_secs(300),
        );

        Self {
            registration: RegistrationService::new(recipients.clone(), "GasWatchBot"),
            stats: StatsAggregator::new(recipients.clone(), records.clone()),
            scheduler,
            recipients,
            records,
            oracle,
            sink,
        }
    }

    pub fn app_state(&self, limiter: IngressRateLimiter) -> AppState {
        AppState {
            registration: self.registration.clone(),
            limiter: Arc::new(limiter),
            oracle: self.oracle.clone(),
            stats: self.stats.clone(),
        }
    }
}
