// ============================
// labpass-backend/src/watchdog.rs
// ============================
//! Activation heartbeat.
//!
//! A lab stays activated only while its lab head keeps the booth page open:
//! every render pings the watchdog, which (re)arms a deactivation that fires
//! after `heartbeat` without another ping. Pings, expiries and cancellations
//! all pass through one actor loop, so a ping and a firing deactivation are
//! always applied in a definite order.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codes::CodeRegistry;
use crate::error::AppError;
use crate::metrics::{LAB_ACTIVATED, LAB_DEACTIVATED};

/// Message sent *into* the actor
#[derive(Debug)]
pub enum WatchdogMsg {
    /// Activate a lab and re-arm its deactivation
    Ping {
        lab: String,
        resp_tx: oneshot::Sender<Result<(), AppError>>,
    },
    /// A scheduled deactivation came due
    Expire { lab: String, generation: u64 },
    /// Cancel any pending deactivation without touching the registry
    Forget { lab: String },
    /// Whether a deactivation is currently scheduled
    Pending {
        lab: String,
        resp_tx: oneshot::Sender<bool>,
    },
}

/// Handle that other components keep
#[derive(Clone, Debug)]
pub struct ActivationTimer {
    cmd_tx: mpsc::UnboundedSender<WatchdogMsg>,
    heartbeat: Duration,
}

impl ActivationTimer {
    /// Spawn the watchdog actor on the current runtime
    pub fn start(registry: Arc<CodeRegistry>, heartbeat: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let actor = WatchdogActor {
            registry,
            heartbeat,
            pending: HashMap::new(),
            next_generation: 0,
            self_tx: cmd_tx.downgrade(),
        };
        tokio::spawn(actor.run(cmd_rx));
        Self { cmd_tx, heartbeat }
    }

    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    /// Keep `lab` live for another heartbeat window.
    ///
    /// Fails with `UnknownLab` (and schedules nothing) when the lab has no
    /// registry entry.
    pub async fn ping(&self, lab: &str) -> Result<(), AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(WatchdogMsg::Ping {
            lab: lab.to_string(),
            resp_tx,
        })?;
        resp_rx.await?
    }

    /// Drop the pending deactivation of a removed lab
    pub fn forget(&self, lab: &str) -> Result<(), AppError> {
        self.cmd_tx.send(WatchdogMsg::Forget {
            lab: lab.to_string(),
        })?;
        Ok(())
    }

    /// Whether a deactivation is scheduled for `lab`
    pub async fn is_pending(&self, lab: &str) -> Result<bool, AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(WatchdogMsg::Pending {
            lab: lab.to_string(),
            resp_tx,
        })?;
        Ok(resp_rx.await?)
    }
}

/// A scheduled deactivation
struct PendingDeactivation {
    generation: u64,
    handle: JoinHandle<()>,
}

struct WatchdogActor {
    registry: Arc<CodeRegistry>,
    heartbeat: Duration,
    pending: HashMap<String, PendingDeactivation>,
    next_generation: u64,
    /// Lets sleeper tasks report back without keeping the actor alive
    self_tx: mpsc::WeakUnboundedSender<WatchdogMsg>,
}

impl WatchdogActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WatchdogMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                WatchdogMsg::Ping { lab, resp_tx } => {
                    let result = self.handle_ping(&lab);
                    if let Err(e) = &result {
                        warn!(lab = %lab, error = %e, "ping rejected");
                    }
                    let _ = resp_tx.send(result);
                }
                WatchdogMsg::Expire { lab, generation } => self.handle_expire(&lab, generation),
                WatchdogMsg::Forget { lab } => {
                    if let Some(pending) = self.pending.remove(&lab) {
                        pending.handle.abort();
                        debug!(lab = %lab, "pending deactivation cancelled");
                    }
                }
                WatchdogMsg::Pending { lab, resp_tx } => {
                    let _ = resp_tx.send(self.pending.contains_key(&lab));
                }
            }
        }
        debug!("watchdog stopped");
    }

    fn handle_ping(&mut self, lab: &str) -> Result<(), AppError> {
        if !self.registry.contains(lab) {
            return Err(AppError::UnknownLab(lab.to_string()));
        }

        if let Some(previous) = self.pending.remove(lab) {
            previous.handle.abort();
        }

        let was_active = self.registry.is_activated(lab);
        self.registry.activate(lab)?;

        self.next_generation += 1;
        let generation = self.next_generation;
        let handle = self.schedule(lab.to_string(), generation);
        self.pending.insert(lab.to_string(), PendingDeactivation { generation, handle });

        if !was_active {
            counter!(LAB_ACTIVATED).increment(1);
            info!(lab = %lab, "lab activated");
        }
        Ok(())
    }

    fn schedule(&self, lab: String, generation: u64) -> JoinHandle<()> {
        let heartbeat = self.heartbeat;
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(heartbeat).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(WatchdogMsg::Expire { lab, generation });
            }
        })
    }

    fn handle_expire(&mut self, lab: &str, generation: u64) {
        // A ping may have re-armed the lab after this expiry was queued
        let current = self.pending.get(lab).map(|p| p.generation);
        if current != Some(generation) {
            debug!(lab = %lab, generation, "stale expiry ignored");
            return;
        }
        self.pending.remove(lab);

        match self.registry.deactivate(lab) {
            Ok(()) => {
                counter!(LAB_DEACTIVATED).increment(1);
                info!(lab = %lab, "lab deactivated after missed heartbeat");
            }
            Err(e) => warn!(lab = %lab, error = %e, "deactivation skipped"),
        }
    }
}
