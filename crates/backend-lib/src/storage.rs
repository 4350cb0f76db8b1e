// ============================
// labpass-backend/src/storage.rs
// ============================
//! Storage abstraction with flat-file and in-memory implementations.
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labpass_common::{Account, Checklist, ChecklistEntry, LabRecord};
use serde::{de::DeserializeOwned, Serialize};
use tokio::{fs as tokio_fs, sync::Mutex};
use tracing::warn;

use crate::error::AppError;

/// Durable list of lab records
#[async_trait]
pub trait LabStore: Send + Sync {
    /// Read every record, inactive ones included. A missing catalog is empty.
    async fn load_labs(&self) -> Result<Vec<LabRecord>, AppError>;

    /// Replace the stored catalog
    async fn save_labs(&self, labs: &[LabRecord]) -> Result<(), AppError>;
}

/// Student and lab head accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_subject(&self, sub_id: &str) -> Result<Option<Account>, AppError>;

    async fn find_by_id_num(&self, id_num: &str) -> Result<Option<Account>, AppError>;

    /// Store `account` unless one with the same `sub_id` exists.
    /// Returns the stored account and whether it was created.
    async fn create_if_absent(&self, account: Account) -> Result<(Account, bool), AppError>;

    /// Replace an existing account. ID numbers are unique across accounts.
    async fn save(&self, account: &Account) -> Result<(), AppError>;

    /// Delete lab head accounts bound to `lab`, returning how many went
    async fn remove_lab_heads(&self, lab: &str) -> Result<usize, AppError>;
}

/// Every stored checklist, plus the records that exist but could not be read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecklistScan {
    pub checklists: Vec<Checklist>,
    /// ID numbers of unreadable records
    pub unreadable: Vec<String>,
}

/// Student checklists
#[async_trait]
pub trait ChecklistStore: Send + Sync {
    async fn find_by_student(&self, id_num: &str) -> Result<Option<Checklist>, AppError>;

    /// List every checklist. A record that cannot be read is reported in
    /// [`ChecklistScan::unreadable`] rather than failing the whole listing.
    async fn find_all(&self) -> Result<ChecklistScan, AppError>;

    async fn upsert(&self, checklist: &Checklist) -> Result<(), AppError>;

    /// Mark one entry visited. Returns false when the student has no such entry.
    async fn mark_visited(
        &self,
        id_num: &str,
        lab_name: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Append an unvisited entry. Returns false when it was already there.
    async fn add_entry(&self, id_num: &str, lab_name: &str) -> Result<bool, AppError>;

    /// Remove an entry. Returns false when there was none.
    async fn remove_entry(&self, id_num: &str, lab_name: &str) -> Result<bool, AppError>;
}

/// Everything the server persists
pub trait Storage: LabStore + AccountStore + ChecklistStore {}

impl<T: LabStore + AccountStore + ChecklistStore> Storage for T {}

// ---------------------------------------------------------------------------
// Checklist edits shared by both implementations
// ---------------------------------------------------------------------------

fn apply_mark_visited(checklist: &mut Checklist, lab_name: &str, at: DateTime<Utc>) -> bool {
    match checklist.lab_list.iter_mut().find(|e| e.lab_name == lab_name) {
        Some(entry) => {
            entry.visited = true;
            entry.visit_time = Some(at);
            true
        },
        None => false,
    }
}

fn apply_add_entry(checklist: &mut Checklist, lab_name: &str) -> bool {
    if checklist.contains(lab_name) {
        return false;
    }
    checklist.lab_list.push(ChecklistEntry::unvisited(lab_name));
    true
}

fn apply_remove_entry(checklist: &mut Checklist, lab_name: &str) -> bool {
    let before = checklist.lab_list.len();
    checklist.lab_list.retain(|e| e.lab_name != lab_name);
    checklist.lab_list.len() != before
}

fn ensure_id_num_free(accounts: &[Account], account: &Account) -> Result<(), AppError> {
    let Some(id_num) = account.id_num.as_deref() else {
        return Ok(());
    };
    let taken = accounts
        .iter()
        .any(|a| a.sub_id != account.sub_id && a.id_num.as_deref() == Some(id_num));
    if taken {
        return Err(AppError::InvalidInput("ID Number already registered.".to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Flat files
// ---------------------------------------------------------------------------

/// Flat-file implementation of the storage traits.
///
/// Layout under `root`: `labs.json`, `accounts.json` and one
/// `checklists/<idNum>.json` per student. Every write replaces the target
/// through a temp file in the same directory.
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    labs_lock: Arc<Mutex<()>>,
    accounts_lock: Arc<Mutex<()>>,
    checklists_lock: Arc<Mutex<()>>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("checklists"))?;
        Ok(Self {
            root,
            labs_lock: Arc::new(Mutex::new(())),
            accounts_lock: Arc::new(Mutex::new(())),
            checklists_lock: Arc::new(Mutex::new(())),
        })
    }

    fn labs_path(&self) -> PathBuf {
        self.root.join("labs.json")
    }

    fn accounts_path(&self) -> PathBuf {
        self.root.join("accounts.json")
    }

    fn checklists_dir(&self) -> PathBuf {
        self.root.join("checklists")
    }

    fn checklist_path(&self, id_num: &str) -> Result<PathBuf, AppError> {
        if id_num.is_empty() || !id_num.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::InvalidInput(format!("invalid ID number {id_num:?}")));
        }
        Ok(self.checklists_dir().join(format!("{id_num}.json")))
    }

    async fn read_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(read_json(&self.accounts_path()).await?.unwrap_or_default())
    }

    /// Read-modify-write one checklist file under the checklist lock
    async fn edit_checklist<F>(&self, id_num: &str, edit: F) -> Result<bool, AppError>
    where
        F: FnOnce(&mut Checklist) -> bool + Send,
    {
        let path = self.checklist_path(id_num)?;
        let _guard = self.checklists_lock.lock().await;
        let mut checklist: Checklist = read_json(&path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("checklist for {id_num}")))?;
        if !edit(&mut checklist) {
            return Ok(false);
        }
        write_json_atomic(&path, &checklist).await?;
        Ok(true)
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    match tokio_fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let json = serde_json::to_vec_pretty(value)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), AppError> {
        let dir = path
            .parent()
            .ok_or_else(|| AppError::Persistence(format!("{} has no parent", path.display())))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| {
            AppError::Persistence(format!("failed to replace {}: {}", path.display(), e.error))
        })?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Internal(format!("write task failed: {e}")))?
}

#[async_trait]
impl LabStore for FlatFileStorage {
    async fn load_labs(&self) -> Result<Vec<LabRecord>, AppError> {
        let _guard = self.labs_lock.lock().await;
        Ok(read_json(&self.labs_path()).await?.unwrap_or_default())
    }

    async fn save_labs(&self, labs: &[LabRecord]) -> Result<(), AppError> {
        let _guard = self.labs_lock.lock().await;
        write_json_atomic(&self.labs_path(), labs).await
    }
}

#[async_trait]
impl AccountStore for FlatFileStorage {
    async fn find_by_subject(&self, sub_id: &str) -> Result<Option<Account>, AppError> {
        let _guard = self.accounts_lock.lock().await;
        let accounts = self.read_accounts().await?;
        Ok(accounts.into_iter().find(|a| a.sub_id == sub_id))
    }

    async fn find_by_id_num(&self, id_num: &str) -> Result<Option<Account>, AppError> {
        let _guard = self.accounts_lock.lock().await;
        let accounts = self.read_accounts().await?;
        Ok(accounts
            .into_iter()
            .find(|a| a.id_num.as_deref() == Some(id_num)))
    }

    async fn create_if_absent(&self, account: Account) -> Result<(Account, bool), AppError> {
        let _guard = self.accounts_lock.lock().await;
        let mut accounts = self.read_accounts().await?;
        if let Some(existing) = accounts.iter().find(|a| a.sub_id == account.sub_id) {
            return Ok((existing.clone(), false));
        }
        ensure_id_num_free(&accounts, &account)?;
        accounts.push(account.clone());
        write_json_atomic(&self.accounts_path(), &accounts).await?;
        Ok((account, true))
    }

    async fn save(&self, account: &Account) -> Result<(), AppError> {
        let _guard = self.accounts_lock.lock().await;
        let mut accounts = self.read_accounts().await?;
        ensure_id_num_free(&accounts, account)?;
        let slot = accounts
            .iter_mut()
            .find(|a| a.sub_id == account.sub_id)
            .ok_or_else(|| AppError::NotFound(format!("account {}", account.sub_id)))?;
        *slot = account.clone();
        write_json_atomic(&self.accounts_path(), &accounts).await
    }

    async fn remove_lab_heads(&self, lab: &str) -> Result<usize, AppError> {
        let _guard = self.accounts_lock.lock().await;
        let mut accounts = self.read_accounts().await?;
        let before = accounts.len();
        accounts.retain(|a| {
            !(a.role == labpass_common::Role::LabHead && a.name.as_deref() == Some(lab))
        });
        let removed = before - accounts.len();
        if removed > 0 {
            write_json_atomic(&self.accounts_path(), &accounts).await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl ChecklistStore for FlatFileStorage {
    async fn find_by_student(&self, id_num: &str) -> Result<Option<Checklist>, AppError> {
        let path = self.checklist_path(id_num)?;
        read_json(&path).await
    }

    async fn find_all(&self) -> Result<ChecklistScan, AppError> {
        let mut scan = ChecklistScan::default();
        let mut entries = tokio_fs::read_dir(self.checklists_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id_num) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match read_json::<Checklist>(&path).await {
                Ok(Some(checklist)) => scan.checklists.push(checklist),
                Ok(None) => {},
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable checklist");
                    scan.unreadable.push(id_num);
                },
            }
        }
        scan.checklists.sort_by(|a, b| a.id_num.cmp(&b.id_num));
        scan.unreadable.sort();
        Ok(scan)
    }

    async fn upsert(&self, checklist: &Checklist) -> Result<(), AppError> {
        let path = self.checklist_path(&checklist.id_num)?;
        let _guard = self.checklists_lock.lock().await;
        write_json_atomic(&path, checklist).await
    }

    async fn mark_visited(
        &self,
        id_num: &str,
        lab_name: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self
            .edit_checklist(id_num, |c| apply_mark_visited(c, lab_name, at))
            .await
        {
            Err(AppError::NotFound(_)) => Ok(false),
            other => other,
        }
    }

    async fn add_entry(&self, id_num: &str, lab_name: &str) -> Result<bool, AppError> {
        self.edit_checklist(id_num, |c| apply_add_entry(c, lab_name)).await
    }

    async fn remove_entry(&self, id_num: &str, lab_name: &str) -> Result<bool, AppError> {
        self.edit_checklist(id_num, |c| apply_remove_entry(c, lab_name)).await
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// In-memory implementation of the storage traits, for tests and ephemeral runs
#[derive(Clone, Default)]
pub struct MemoryStorage {
    labs: Arc<parking_lot::Mutex<Vec<LabRecord>>>,
    accounts: Arc<parking_lot::Mutex<Vec<Account>>>,
    checklists: Arc<parking_lot::Mutex<HashMap<String, Checklist>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose catalog already holds `labs`
    pub fn with_labs<I, S>(labs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let storage = Self::default();
        *storage.labs.lock() = labs.into_iter().map(LabRecord::new).collect();
        storage
    }

    fn edit_checklist<F>(&self, id_num: &str, edit: F) -> Result<bool, AppError>
    where
        F: FnOnce(&mut Checklist) -> bool,
    {
        let mut checklists = self.checklists.lock();
        let checklist = checklists
            .get_mut(id_num)
            .ok_or_else(|| AppError::NotFound(format!("checklist for {id_num}")))?;
        Ok(edit(checklist))
    }
}

#[async_trait]
impl LabStore for MemoryStorage {
    async fn load_labs(&self) -> Result<Vec<LabRecord>, AppError> {
        Ok(self.labs.lock().clone())
    }

    async fn save_labs(&self, labs: &[LabRecord]) -> Result<(), AppError> {
        *self.labs.lock() = labs.to_vec();
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStorage {
    async fn find_by_subject(&self, sub_id: &str) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.lock().iter().find(|a| a.sub_id == sub_id).cloned())
    }

    async fn find_by_id_num(&self, id_num: &str) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .lock()
            .iter()
            .find(|a| a.id_num.as_deref() == Some(id_num))
            .cloned())
    }

    async fn create_if_absent(&self, account: Account) -> Result<(Account, bool), AppError> {
        let mut accounts = self.accounts.lock();
        if let Some(existing) = accounts.iter().find(|a| a.sub_id == account.sub_id) {
            return Ok((existing.clone(), false));
        }
        ensure_id_num_free(&accounts, &account)?;
        accounts.push(account.clone());
        Ok((account, true))
    }

    async fn save(&self, account: &Account) -> Result<(), AppError> {
        let mut accounts = self.accounts.lock();
        ensure_id_num_free(&accounts, account)?;
        let slot = accounts
            .iter_mut()
            .find(|a| a.sub_id == account.sub_id)
            .ok_or_else(|| AppError::NotFound(format!("account {}", account.sub_id)))?;
        *slot = account.clone();
        Ok(())
    }

    async fn remove_lab_heads(&self, lab: &str) -> Result<usize, AppError> {
        let mut accounts = self.accounts.lock();
        let before = accounts.len();
        accounts.retain(|a| {
            !(a.role == labpass_common::Role::LabHead && a.name.as_deref() == Some(lab))
        });
        Ok(before - accounts.len())
    }
}

#[async_trait]
impl ChecklistStore for MemoryStorage {
    async fn find_by_student(&self, id_num: &str) -> Result<Option<Checklist>, AppError> {
        Ok(self.checklists.lock().get(id_num).cloned())
    }

    async fn find_all(&self) -> Result<ChecklistScan, AppError> {
        let mut checklists: Vec<Checklist> = self.checklists.lock().values().cloned().collect();
        checklists.sort_by(|a, b| a.id_num.cmp(&b.id_num));
        Ok(ChecklistScan {
            checklists,
            unreadable: Vec::new(),
        })
    }

    async fn upsert(&self, checklist: &Checklist) -> Result<(), AppError> {
        self.checklists
            .lock()
            .insert(checklist.id_num.clone(), checklist.clone());
        Ok(())
    }

    async fn mark_visited(
        &self,
        id_num: &str,
        lab_name: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.edit_checklist(id_num, |c| apply_mark_visited(c, lab_name, at)) {
            Err(AppError::NotFound(_)) => Ok(false),
            other => other,
        }
    }

    async fn add_entry(&self, id_num: &str, lab_name: &str) -> Result<bool, AppError> {
        self.edit_checklist(id_num, |c| apply_add_entry(c, lab_name))
    }

    async fn remove_entry(&self, id_num: &str, lab_name: &str) -> Result<bool, AppError> {
        self.edit_checklist(id_num, |c| apply_remove_entry(c, lab_name))
    }
}
