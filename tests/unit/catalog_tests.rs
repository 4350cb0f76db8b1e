// =========================
// tests/unit/catalog_tests.rs
// =========================
//! Catalog changes commit before their cascade, and a failing cascade step
//! does not undo them.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use labpass_backend::catalog::{load_records, LabCatalog};
use labpass_backend::checklist::ChecklistSync;
use labpass_backend::codes::CodeRegistry;
use labpass_backend::error::AppError;
use labpass_backend::storage::{AccountStore, ChecklistStore, FlatFileStorage, LabStore, MemoryStorage};
use labpass_backend::watchdog::ActivationTimer;
use labpass_common::{Account, Checklist, LabRecord, KEYNOTE};

/// Lab store that can be switched to refuse writes
struct SwitchableLabs {
    inner: MemoryStorage,
    fail_saves: AtomicBool,
}

#[async_trait]
impl LabStore for SwitchableLabs {
    async fn load_labs(&self) -> Result<Vec<LabRecord>, AppError> {
        self.inner.load_labs().await
    }

    async fn save_labs(&self, labs: &[LabRecord]) -> Result<(), AppError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("disk full".to_string()));
        }
        self.inner.save_labs(labs).await
    }
}

/// Lab store whose saves wait until the test releases them
struct GatedLabs {
    inner: MemoryStorage,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl LabStore for GatedLabs {
    async fn load_labs(&self) -> Result<Vec<LabRecord>, AppError> {
        self.inner.load_labs().await
    }

    async fn save_labs(&self, labs: &[LabRecord]) -> Result<(), AppError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.save_labs(labs).await
    }
}

/// Account store that cannot delete
struct StickyAccounts {
    inner: MemoryStorage,
}

#[async_trait]
impl AccountStore for StickyAccounts {
    async fn find_by_subject(&self, sub_id: &str) -> Result<Option<Account>, AppError> {
        self.inner.find_by_subject(sub_id).await
    }

    async fn find_by_id_num(&self, id_num: &str) -> Result<Option<Account>, AppError> {
        self.inner.find_by_id_num(id_num).await
    }

    async fn create_if_absent(&self, account: Account) -> Result<(Account, bool), AppError> {
        self.inner.create_if_absent(account).await
    }

    async fn save(&self, account: &Account) -> Result<(), AppError> {
        self.inner.save(account).await
    }

    async fn remove_lab_heads(&self, _lab: &str) -> Result<usize, AppError> {
        Err(AppError::Persistence("accounts locked".to_string()))
    }
}

struct Fixture {
    catalog: LabCatalog,
    registry: Arc<CodeRegistry>,
    watchdog: ActivationTimer,
    labs: Arc<SwitchableLabs>,
    storage: MemoryStorage,
}

async fn fixture() -> Fixture {
    let storage = MemoryStorage::with_labs(["CAR", "GAMELAB"]);
    storage
        .upsert(&Checklist::for_labs("1001", ["CAR", "GAMELAB"]))
        .await
        .unwrap();
    let labs = Arc::new(SwitchableLabs {
        inner: storage.clone(),
        fail_saves: AtomicBool::new(false),
    });
    let accounts = Arc::new(StickyAccounts {
        inner: storage.clone(),
    });

    let records = load_records(labs.as_ref(), &[]).await.unwrap();
    let registry = Arc::new(CodeRegistry::new(records.iter().map(|r| r.name.clone())));
    let watchdog = ActivationTimer::start(registry.clone(), Duration::from_secs(90));
    let catalog = LabCatalog::new(
        records,
        labs.clone(),
        accounts,
        registry.clone(),
        watchdog.clone(),
        ChecklistSync::new(Arc::new(storage.clone())),
    );
    Fixture {
        catalog,
        registry,
        watchdog,
        labs,
        storage,
    }
}

#[tokio::test]
async fn test_failed_save_changes_nothing() {
    let f = fixture().await;
    f.labs.fail_saves.store(true, Ordering::SeqCst);

    assert!(matches!(
        f.catalog.add("NEWLAB", None).await,
        Err(AppError::Persistence(_))
    ));
    assert!(matches!(
        f.catalog.remove("CAR").await,
        Err(AppError::Persistence(_))
    ));

    assert_eq!(f.catalog.list(), vec!["CAR", "GAMELAB"]);
    assert!(!f.registry.contains("NEWLAB"));
    assert!(f.registry.contains("CAR"));
    let checklist = f.storage.find_by_student("1001").await.unwrap().unwrap();
    assert!(!checklist.contains("NEWLAB"));
    assert!(checklist.contains("CAR"));
}

#[tokio::test]
async fn test_failing_cascade_step_does_not_stop_the_rest() {
    let f = fixture().await;

    let change = f.catalog.remove("CAR").await.unwrap();
    assert!(!change.cascade_complete);
    assert_eq!(change.checklists.patched, 1);

    // The catalog change stays committed and the other steps still ran
    assert_eq!(f.catalog.list(), vec!["GAMELAB"]);
    assert!(!f.registry.contains("CAR"));
    let checklist = f.storage.find_by_student("1001").await.unwrap().unwrap();
    assert!(!checklist.contains("CAR"));
}

#[tokio::test]
async fn test_registry_tracks_catalog() {
    let f = fixture().await;
    f.catalog.add("ROBOTICS", None).await.unwrap();
    f.catalog.remove("GAMELAB").await.unwrap();
    f.catalog.add("gamelab", None).await.unwrap();

    let mut expected = f.catalog.list();
    expected.push(KEYNOTE.to_string());
    expected.sort();
    assert_eq!(f.registry.labs(), expected);
}

#[tokio::test]
async fn test_removed_lab_refuses_pings() {
    let f = fixture().await;
    f.watchdog.ping("CAR").await.unwrap();
    assert!(f.watchdog.is_pending("CAR").await.unwrap());

    f.catalog.remove("CAR").await.unwrap();
    assert!(matches!(
        f.watchdog.ping("CAR").await,
        Err(AppError::UnknownLab(_))
    ));
    assert!(!f.watchdog.is_pending("CAR").await.unwrap());

    // A re-added lab starts inactive with nothing scheduled
    f.catalog.add("CAR", None).await.unwrap();
    assert!(!f.registry.is_activated("CAR"));
    assert!(!f.watchdog.is_pending("CAR").await.unwrap());
}

#[tokio::test]
async fn test_unreadable_checklist_marks_cascade_incomplete() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let storage = Arc::new(FlatFileStorage::new(temp_dir.path()).unwrap());
    let records = load_records(storage.as_ref(), &["CAR".to_string()])
        .await
        .unwrap();
    storage
        .upsert(&Checklist::for_labs("1001", ["CAR"]))
        .await
        .unwrap();
    std::fs::write(
        temp_dir.path().join("checklists").join("1002.json"),
        r#"{"idNum":"1002","#,
    )
    .unwrap();

    let registry = Arc::new(CodeRegistry::new(records.iter().map(|r| r.name.clone())));
    let catalog = LabCatalog::new(
        records,
        storage.clone(),
        storage.clone(),
        registry.clone(),
        ActivationTimer::start(registry, Duration::from_secs(90)),
        ChecklistSync::new(storage.clone()),
    );

    let change = catalog.add("GAMELAB", None).await.unwrap();
    assert!(!change.cascade_complete);
    assert_eq!(change.checklists.scanned, 2);
    assert_eq!(change.checklists.failed, 1);
    assert!(catalog.contains("GAMELAB"));
    let healthy = storage.find_by_student("1001").await.unwrap().unwrap();
    assert!(healthy.contains("GAMELAB"));
}

#[tokio::test]
async fn test_checklist_created_during_add_includes_new_lab() {
    let storage = MemoryStorage::with_labs(["CAR"]);
    let labs = Arc::new(GatedLabs {
        inner: storage.clone(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let records = load_records(labs.as_ref(), &[]).await.unwrap();
    let registry = Arc::new(CodeRegistry::new(records.iter().map(|r| r.name.clone())));
    let catalog = Arc::new(LabCatalog::new(
        records,
        labs.clone(),
        Arc::new(storage.clone()),
        registry.clone(),
        ActivationTimer::start(registry, Duration::from_secs(90)),
        ChecklistSync::new(Arc::new(storage.clone())),
    ));

    let adding = tokio::spawn({
        let catalog = catalog.clone();
        async move { catalog.add("GAMELAB", None).await }
    });
    labs.entered.notified().await;

    let registering = tokio::spawn({
        let catalog = catalog.clone();
        async move { catalog.create_checklist("1001").await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!registering.is_finished(), "checklist written while the catalog was changing");

    labs.release.notify_one();
    let change = adding.await.unwrap().unwrap();
    assert!(change.cascade_complete);

    let created = registering.await.unwrap().unwrap();
    assert!(created.contains("GAMELAB"));
    let stored = storage.find_by_student("1001").await.unwrap().unwrap();
    assert!(stored.contains("CAR"));
    assert!(stored.contains("GAMELAB"));
}
