// ============================
// labpass-backend/src/auth/session.rs
// ============================
//! Session token handling and management.
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use labpass_common::Role;
use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::metrics::{SESSIONS_ACTIVE, SESSION_CREATED, SESSION_EXPIRED};

/// How often expired sessions are swept
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 10);

/// Session information
#[derive(Clone, Debug)]
pub struct Session {
    /// Account key: subject hash for students, username for lab heads
    pub sub_id: String,
    pub role: Role,
    /// Lab bound to a lab head session
    pub lab: Option<String>,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl Session {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// Session manager for handling bearer tokens
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        SessionManager {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Create a new session and return its token
    pub async fn new_session(&self, sub_id: String, role: Role, lab: Option<String>) -> String {
        let token = Uuid::new_v4().to_string();
        let now = SystemTime::now();
        let session = Session {
            sub_id,
            role,
            lab,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session);

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSIONS_ACTIVE).set(sessions.len() as f64);

        token
    }

    /// Get a live session by token
    pub async fn get(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| !s.is_expired(SystemTime::now()))
            .cloned()
    }

    /// End a session. Returns whether it existed.
    pub async fn remove(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(token).is_some();
        gauge!(SESSIONS_ACTIVE).set(sessions.len() as f64);
        removed
    }

    /// Drop every expired session and return how many went
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = SystemTime::now();
        let before_count = sessions.len();

        sessions.retain(|_, session| !session.is_expired(now));

        let removed = before_count - sessions.len();
        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSIONS_ACTIVE).set(sessions.len() as f64);
            debug!(removed, "expired sessions removed");
        }
        removed
    }

    /// Periodic sweep of expired sessions
    pub fn spawn_cleanup(&self, every: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                manager.cleanup_expired().await;
            }
        })
    }
}
