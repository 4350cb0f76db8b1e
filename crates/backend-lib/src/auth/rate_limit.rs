// ============================
// labpass-backend/src/auth/rate_limit.rs
// ============================
//! Lockout after repeated wrong code submissions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::counter;
use tracing::warn;

use crate::metrics::CODE_LOCKOUT;

/// Failed attempts are forgotten after this long without another one
const FORGET_AFTER: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct AttemptEntry {
    failed_attempts: u32,
    last_failure: Instant,
    lockout_expiry: Option<Instant>,
}

/// Per-student wrong-code counter with a temporary lockout
#[derive(Debug, Clone)]
pub struct CodeAttemptLimiter {
    attempts: Arc<DashMap<String, AttemptEntry>>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl CodeAttemptLimiter {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    /// Record a wrong code. Returns true when this attempt triggered a lockout.
    pub fn record_failure(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptEntry {
                failed_attempts: 0,
                last_failure: now,
                lockout_expiry: None,
            });

        if entry.lockout_expiry.is_some_and(|expiry| now >= expiry) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.lockout_expiry.is_none() {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            counter!(CODE_LOCKOUT).increment(1);
            warn!(key = %key, attempts = entry.failed_attempts, "code submissions locked out");
            return true;
        }
        false
    }

    /// An accepted code clears the counter
    pub fn record_success(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Whether `key` may submit a code right now
    pub fn check(&self, key: &str) -> bool {
        match self.attempts.get(key) {
            Some(entry) => !entry
                .lockout_expiry
                .is_some_and(|expiry| Instant::now() < expiry),
            None => true,
        }
    }

    /// Forget expired lockouts and stale counters
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(expiry) => now < expiry,
            None => now.duration_since(entry.last_failure) < FORGET_AFTER,
        });
    }
}
