// ============================
// labpass-backend/src/lib.rs
// ============================
//! Core backend functionality for the `labpass` event check-in server.

pub mod auth;
pub mod catalog;
pub mod checklist;
pub mod codes;
pub mod config;
pub mod countdown;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod validation;
pub mod watchdog;

use std::sync::Arc;
use std::time::Duration;

use labpass_common::{Account, CodeKind};
use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::session::CLEANUP_INTERVAL;
use crate::auth::{hash_password, CodeAttemptLimiter, Session, SessionManager};
use crate::catalog::LabCatalog;
use crate::checklist::ChecklistSync;
use crate::codes::{CodeRegistry, RotationScope};
use crate::config::Settings;
use crate::countdown::CountdownClock;
use crate::error::AppError;
use crate::middleware::RequestLimiter;
use crate::storage::Storage;
use crate::watchdog::ActivationTimer;

pub use crate::router::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Storage backend
    pub storage: Arc<dyn Storage>,
    pub sessions: SessionManager,
    pub registry: Arc<CodeRegistry>,
    /// Rotates booth codes, or every code when talk codes share its period
    pub booth_clock: Arc<CountdownClock>,
    /// Present only when talk codes rotate on their own period
    pub talk_clock: Option<Arc<CountdownClock>>,
    pub watchdog: ActivationTimer,
    pub catalog: Arc<LabCatalog>,
    pub request_limiter: RequestLimiter,
    pub code_attempts: CodeAttemptLimiter,
}

impl AppState {
    /// Build every service from validated settings.
    ///
    /// Reads the catalog (seeding it when empty), creates one code entry per
    /// lab and starts the watchdog. The countdown clocks are created but not
    /// started; see [`AppState::start_background`].
    pub async fn new<S: Storage + 'static>(storage: Arc<S>, settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;

        let records = catalog::load_records(storage.as_ref(), &settings.event.seed_labs).await?;
        let registry = Arc::new(CodeRegistry::new(
            records.iter().filter(|r| r.active).map(|r| r.name.clone()),
        ));
        let watchdog = ActivationTimer::start(registry.clone(), settings.codes.heartbeat());

        let (booth_clock, talk_clock) = match settings.codes.talk_countdown_secs {
            Some(talk_period) => (
                CountdownClock::new(settings.codes.countdown_period_secs, RotationScope::Booth, registry.clone()),
                Some(Arc::new(CountdownClock::new(talk_period, RotationScope::Talk, registry.clone()))),
            ),
            None => (
                CountdownClock::new(settings.codes.countdown_period_secs, RotationScope::All, registry.clone()),
                None,
            ),
        };

        let catalog = LabCatalog::new(
            records,
            storage.clone(),
            storage.clone(),
            registry.clone(),
            watchdog.clone(),
            ChecklistSync::new(storage.clone()),
        );

        let state = Self {
            sessions: SessionManager::new(Duration::from_secs(settings.event.session_ttl_secs)),
            request_limiter: RequestLimiter::new(
                Duration::from_secs(settings.rate_limit.window_secs),
                settings.rate_limit.max_requests,
            ),
            code_attempts: CodeAttemptLimiter::new(
                settings.attempts.max_attempts,
                Duration::from_secs(settings.attempts.lockout_secs),
            ),
            settings: Arc::new(settings),
            storage,
            registry,
            booth_clock: Arc::new(booth_clock),
            talk_clock,
            watchdog,
            catalog: Arc::new(catalog),
        };
        state.bootstrap_officers().await?;

        info!(labs = state.catalog.list().len(), "application state ready");
        Ok(state)
    }

    /// Start the countdown clocks and periodic cleanups
    pub fn start_background(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.booth_clock.clone().start()];
        if let Some(talk_clock) = &self.talk_clock {
            handles.push(talk_clock.clone().start());
        }
        handles.push(self.sessions.spawn_cleanup(CLEANUP_INTERVAL));

        let request_limiter = self.request_limiter.clone();
        let code_attempts = self.code_attempts.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                request_limiter.cleanup();
                code_attempts.cleanup();
            }
        }));
        handles
    }

    /// The clock whose countdown a lab head sees for `kind`
    pub fn clock_for(&self, kind: CodeKind) -> &CountdownClock {
        match (kind, &self.talk_clock) {
            (CodeKind::Talk, Some(talk_clock)) => talk_clock,
            _ => &self.booth_clock,
        }
    }

    /// Whether the session belongs to the officers account
    pub fn is_officer(&self, session: &Session) -> bool {
        session.lab.as_deref() == Some(self.settings.event.officers_name.as_str())
    }

    async fn bootstrap_officers(&self) -> Result<(), AppError> {
        let Some(officers) = &self.settings.officers else {
            return Ok(());
        };
        let hash = hash_password(&officers.password)?;
        let account = Account::lab_head(&officers.username, &self.settings.event.officers_name, hash);
        let (_, created) = self.storage.create_if_absent(account).await?;
        if created {
            info!(username = %officers.username, "officers account created");
        }
        Ok(())
    }
}
