//! Shared rotation countdown.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::codes::{CodeRegistry, RotationScope};

/// Counts down the current rotation window and rotates codes when it ends.
///
/// One instance drives booth rotation for the whole process; a second one
/// exists only when talk codes run on their own period.
#[derive(Debug)]
pub struct CountdownClock {
    remaining: AtomicU64,
    period: u64,
    scope: RotationScope,
    registry: Arc<CodeRegistry>,
}

impl CountdownClock {
    /// `period` is in seconds and must be non-zero
    pub fn new(period: u64, scope: RotationScope, registry: Arc<CodeRegistry>) -> Self {
        debug_assert!(period > 0);
        Self {
            remaining: AtomicU64::new(period),
            period,
            scope,
            registry,
        }
    }

    /// Seconds left in the current window
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Advance by one second. Returns true when this tick rotated the codes.
    pub fn tick(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                Some(if left > 1 { left - 1 } else { self.period })
            })
            .unwrap_or(self.period);

        if previous > 1 {
            return false;
        }
        self.registry.rotate(self.scope);
        debug!(scope = ?self.scope, period = self.period, "codes rotated");
        true
    }

    /// Tick once per second for the lifetime of the runtime
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let second = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + second, second);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick();
            }
        })
    }
}
