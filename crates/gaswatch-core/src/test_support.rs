//! Test doubles shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::ChatId;
use crate::notify::NotificationSink;
use crate::oracle::PriceOracle;

/// Sink that records every message and answers with a fixed verdict
pub struct RecordingSink {
    accept: bool,
    sent: Mutex<Vec<(ChatId, String)>>,
}

impl RecordingSink {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, chat_id: ChatId, text: &str) -> bool {
        self.sent.lock().push((chat_id, text.to_string()));
        self.accept
    }
}

/// Oracle returning a settable price
pub struct StubOracle {
    price: Mutex<Option<i32>>,
    calls: AtomicUsize,
}

impl StubOracle {
    pub fn new(price: Option<i32>) -> Self {
        Self {
            price: Mutex::new(price),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, price: Option<i32>) {
        *self.price.lock() = price;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for StubOracle {
    async fn fetch_current_price(&self) -> Option<i32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.price.lock()
    }
}
