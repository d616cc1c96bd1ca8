//! Injected time source.
//!
//! Every component that reads "now" (poller scheduling, clustering windows,
//! the status transitioner's breaking/backfill windows, the summarizer's
//! cost-meter rollover) takes a `Clock` rather than calling `Utc::now()`
//! directly, so the time-dependent scenarios in the spec (breaking-window
//! promotion, a significance bump "four hours later", the backfill cutoff)
//! are deterministically testable without real sleeps.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that can be advanced manually from tests.
#[derive(Clone)]
pub struct FixedClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(instant)),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.current.write().expect("clock lock poisoned");
        *guard = *guard + delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.write().expect("clock lock poisoned") = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().expect("clock lock poisoned")
    }
}

pub type SharedClock = Arc<dyn Clock>;
