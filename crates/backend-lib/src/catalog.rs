// ============================
// labpass-backend/src/catalog.rs
// ============================
//! The lab catalog: the persisted list of booths and the cascade that keeps
//! codes, lab-head accounts and checklists in step with it.
use std::sync::Arc;

use labpass_common::{Account, Checklist, LabHeadCredentials, LabRecord, SyncReport, KEYNOTE, TALK_ENTRY, TALK_LAB};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::checklist::ChecklistSync;
use crate::codes::CodeRegistry;
use crate::error::AppError;
use crate::storage::{AccountStore, LabStore};
use crate::validation::{self, canonical_lab_name};
use crate::watchdog::ActivationTimer;

/// Result of an add or remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogChange {
    pub name: String,
    pub checklists: SyncReport,
    /// False when a downstream step failed after the catalog was saved
    pub cascade_complete: bool,
}

/// Read the catalog file.
///
/// An empty file is seeded with `seed_labs` and written back. Names are
/// canonicalised and duplicates dropped with a warning. Inactive records are
/// returned too so that later saves keep them.
pub async fn load_records(
    store: &dyn LabStore,
    seed_labs: &[String],
) -> Result<Vec<LabRecord>, AppError> {
    let mut records = store.load_labs().await?;

    if records.is_empty() && !seed_labs.is_empty() {
        records = seed_labs
            .iter()
            .map(|name| LabRecord::new(canonical_lab_name(name)))
            .collect();
        store.save_labs(&records).await?;
        info!(count = records.len(), "lab catalog seeded");
    }

    let mut seen: Vec<LabRecord> = Vec::with_capacity(records.len());
    for mut record in records {
        let canonical = canonical_lab_name(&record.name);
        if canonical != record.name {
            warn!(stored = %record.name, canonical = %canonical, "lab name canonicalised");
            record.name = canonical;
        }
        if seen.iter().any(|r| r.name == record.name) {
            warn!(lab = %record.name, "duplicate catalog record ignored");
            continue;
        }
        seen.push(record);
    }
    Ok(seen)
}

/// Owner of the lab list.
///
/// `add` and `remove` save the new list first and only then run the cascade.
/// Cascade steps are independent: a failing step is logged and the rest
/// still run, and the catalog change is never rolled back.
pub struct LabCatalog {
    store: Arc<dyn LabStore>,
    accounts: Arc<dyn AccountStore>,
    registry: Arc<CodeRegistry>,
    watchdog: ActivationTimer,
    sync: ChecklistSync,
    /// Every record on disk, inactive ones included
    records: RwLock<Vec<LabRecord>>,
    /// Serialises add/remove across the save and the cascade
    write_lock: Mutex<()>,
}

impl LabCatalog {
    pub fn new(
        records: Vec<LabRecord>,
        store: Arc<dyn LabStore>,
        accounts: Arc<dyn AccountStore>,
        registry: Arc<CodeRegistry>,
        watchdog: ActivationTimer,
        sync: ChecklistSync,
    ) -> Self {
        Self {
            store,
            accounts,
            registry,
            watchdog,
            sync,
            records: RwLock::new(records),
            write_lock: Mutex::new(()),
        }
    }

    /// Current members in catalog order
    pub fn list(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .filter(|r| r.active)
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.read().iter().any(|r| r.active && r.name == name)
    }

    /// Create a student's checklist from the current members.
    ///
    /// Runs under the write lock so that an add or remove either completes
    /// before the list is read or sweeps the new checklist afterwards.
    pub async fn create_checklist(&self, id_num: &str) -> Result<Checklist, AppError> {
        let _guard = self.write_lock.lock().await;
        self.sync.create(id_num, self.list()).await
    }

    /// Add a lab, optionally with credentials for its lab head
    pub async fn add(
        &self,
        raw_name: &str,
        head: Option<&LabHeadCredentials>,
    ) -> Result<CatalogChange, AppError> {
        let name = validation::validate_lab_name(raw_name)?;
        if let Some(head) = head {
            validation::validate_username(&head.username)?;
            validation::validate_password(&head.password)?;
        }

        let _guard = self.write_lock.lock().await;

        let mut next = self.records.read().clone();
        match next.iter_mut().find(|r| r.name == name) {
            Some(record) if record.active => return Err(AppError::DuplicateLab(name)),
            Some(record) => record.active = true,
            None => next.push(LabRecord::new(name.clone())),
        }
        self.store.save_labs(&next).await?;
        *self.records.write() = next;
        info!(lab = %name, "lab added to catalog");

        let mut cascade_complete = true;

        if !self.registry.insert(&name) {
            warn!(lab = %name, "code registry already had an entry");
        }

        if let Some(head) = head {
            if let Err(e) = self.create_lab_head(&name, head).await {
                cascade_complete = false;
                warn!(lab = %name, username = %head.username, error = %e, "lab head account not created");
            }
        }

        let checklists = match self.sync.on_lab_added(&name).await {
            Ok(report) => report,
            Err(e) => {
                cascade_complete = false;
                warn!(lab = %name, error = %e, "checklist sweep failed");
                SyncReport::default()
            }
        };
        cascade_complete &= checklists.failed == 0;

        Ok(CatalogChange {
            name,
            checklists,
            cascade_complete,
        })
    }

    /// Remove a lab and everything derived from it
    pub async fn remove(&self, raw_name: &str) -> Result<CatalogChange, AppError> {
        let name = canonical_lab_name(raw_name);
        if name == KEYNOTE || name == TALK_LAB || name == TALK_ENTRY.to_uppercase() {
            return Err(AppError::ReservedLab(name));
        }

        let _guard = self.write_lock.lock().await;

        if !self.contains(&name) {
            return Err(AppError::UnknownLab(name));
        }
        let next: Vec<LabRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.name != name)
            .cloned()
            .collect();
        self.store.save_labs(&next).await?;
        *self.records.write() = next;
        info!(lab = %name, "lab removed from catalog");

        let mut cascade_complete = true;

        // Leave the registry first so a ping racing the cancellation is refused
        if !self.registry.remove(&name) {
            warn!(lab = %name, "code registry had no entry");
        }

        if let Err(e) = self.watchdog.forget(&name) {
            cascade_complete = false;
            warn!(lab = %name, error = %e, "pending deactivation not cancelled");
        }

        match self.accounts.remove_lab_heads(&name).await {
            Ok(0) => {}
            Ok(removed) => info!(lab = %name, removed, "lab head accounts removed"),
            Err(e) => {
                cascade_complete = false;
                warn!(lab = %name, error = %e, "lab head accounts not removed");
            }
        }

        let checklists = match self.sync.on_lab_removed(&name).await {
            Ok(report) => report,
            Err(e) => {
                cascade_complete = false;
                warn!(lab = %name, error = %e, "checklist sweep failed");
                SyncReport::default()
            }
        };
        cascade_complete &= checklists.failed == 0;

        Ok(CatalogChange {
            name,
            checklists,
            cascade_complete,
        })
    }

    async fn create_lab_head(&self, lab: &str, head: &LabHeadCredentials) -> Result<(), AppError> {
        let hash = hash_password(&head.password)?;
        let (_, created) = self
            .accounts
            .create_if_absent(Account::lab_head(&head.username, lab, hash))
            .await?;
        if !created {
            return Err(AppError::InvalidInput(format!(
                "username {} is already taken",
                head.username
            )));
        }
        info!(lab = %lab, username = %head.username, "lab head account created");
        Ok(())
    }
}
