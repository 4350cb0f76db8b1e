//! Keeps every stored checklist in step with the lab catalog.
use std::sync::Arc;

use labpass_common::{Checklist, SyncReport, KEYNOTE, TALK_ENTRY};
use metrics::counter;
use tracing::{info, warn};

use crate::error::AppError;
use crate::metrics::CHECKLIST_SYNC_FAILED;
use crate::storage::ChecklistStore;

/// Propagates catalog membership changes into student checklists.
///
/// Each checklist is patched on its own; a failure is logged and counted and
/// the sweep moves on to the next one.
#[derive(Clone)]
pub struct ChecklistSync {
    store: Arc<dyn ChecklistStore>,
}

impl ChecklistSync {
    pub fn new(store: Arc<dyn ChecklistStore>) -> Self {
        Self { store }
    }

    /// Store a fresh checklist for a newly registered student
    pub async fn create(&self, id_num: &str, labs: Vec<String>) -> Result<Checklist, AppError> {
        let checklist = Checklist::for_labs(id_num, labs);
        self.store.upsert(&checklist).await?;
        Ok(checklist)
    }

    /// Give every checklist lacking `lab` an unvisited entry for it
    pub async fn on_lab_added(&self, lab: &str) -> Result<SyncReport, AppError> {
        self.sweep(lab, SweepKind::Add).await
    }

    /// Drop the `lab` entry from every checklist that has one
    pub async fn on_lab_removed(&self, lab: &str) -> Result<SyncReport, AppError> {
        if is_synthetic(lab) {
            return Err(AppError::ReservedLab(lab.to_string()));
        }
        self.sweep(lab, SweepKind::Remove).await
    }

    async fn sweep(&self, lab: &str, kind: SweepKind) -> Result<SyncReport, AppError> {
        let scan = self.store.find_all().await?;
        let mut report = SyncReport {
            scanned: scan.checklists.len() + scan.unreadable.len(),
            ..SyncReport::default()
        };

        for id_num in &scan.unreadable {
            report.failed += 1;
            counter!(CHECKLIST_SYNC_FAILED).increment(1);
            warn!(
                id_num = %id_num,
                lab = %lab,
                action = kind.as_str(),
                "checklist unreadable, not updated"
            );
        }

        for checklist in scan.checklists {
            let needs_patch = match kind {
                SweepKind::Add => !checklist.contains(lab),
                SweepKind::Remove => checklist.contains(lab),
            };
            if !needs_patch {
                continue;
            }

            let result = match kind {
                SweepKind::Add => self.store.add_entry(&checklist.id_num, lab).await,
                SweepKind::Remove => self.store.remove_entry(&checklist.id_num, lab).await,
            };
            match result {
                Ok(true) => report.patched += 1,
                Ok(false) => {},
                Err(e) => {
                    report.failed += 1;
                    counter!(CHECKLIST_SYNC_FAILED).increment(1);
                    warn!(
                        id_num = %checklist.id_num,
                        lab = %lab,
                        action = kind.as_str(),
                        error = %e,
                        "checklist update failed"
                    );
                },
            }
        }

        info!(
            lab = %lab,
            action = kind.as_str(),
            scanned = report.scanned,
            patched = report.patched,
            failed = report.failed,
            "checklist sweep finished"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy)]
enum SweepKind {
    Add,
    Remove,
}

impl SweepKind {
    fn as_str(self) -> &'static str {
        match self {
            SweepKind::Add => "add",
            SweepKind::Remove => "remove",
        }
    }
}

fn is_synthetic(lab: &str) -> bool {
    lab == TALK_ENTRY || lab == KEYNOTE
}
