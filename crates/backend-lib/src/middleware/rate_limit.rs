//! Per-client fixed-window request limiter.
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use metrics::counter;
use tracing::debug;

use crate::error::AppError;
use crate::metrics::REQUESTS_THROTTLED;
use crate::AppState;

/// Header set by the reverse proxy in front of the server
pub const CLIENT_IP_HEADER: &str = "x-real-ip";

/// Rate limit entry for a client
#[derive(Debug)]
struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

#[derive(Debug, Clone)]
pub struct RequestLimiter {
    clients: Arc<DashMap<String, RateLimitEntry>>,
    window: Duration,
    max_requests: u32,
}

impl RequestLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            window,
            max_requests,
        }
    }

    /// Count one request from `client`. Returns false once the window is full.
    pub fn allow(&self, client: &str) -> bool {
        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| RateLimitEntry {
                requests: 0,
                window_start: Instant::now(),
            });

        if entry.window_start.elapsed() > self.window {
            entry.requests = 0;
            entry.window_start = Instant::now();
        }

        if entry.requests >= self.max_requests {
            return false;
        }
        entry.requests += 1;
        true
    }

    /// Drop clients whose window has long passed
    pub fn cleanup(&self) {
        let window = self.window;
        self.clients.retain(|_, entry| entry.window_start.elapsed() <= window * 2);
    }
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = request
        .headers()
        .get(CLIENT_IP_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    if !state.request_limiter.allow(&client_ip) {
        counter!(REQUESTS_THROTTLED).increment(1);
        debug!(client = %client_ip, "request throttled");
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}
