//! Persistent routing key → sheet identifier registry.
//!
//! `get_or_create` holds a per-key async lock across lookup, provisioning
//! and persistence, so two concurrent exports never both create a sheet for
//! the same key. Keys are independent of each other.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use cvroute_core::{
    Error, Result, RoutingLabel, SheetProvisioner, SheetRegistry, SheetResolution, SheetTarget,
};
use cvroute_core::defaults::SINGLE_SHEET_KEY;

/// Per-key async locks.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Process-local registry for tests and deployments without a registry URL.
#[derive(Default)]
pub struct InMemorySheetRegistry {
    entries: RwLock<BTreeMap<String, String>>,
    locks: KeyLocks,
}

impl InMemorySheetRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SheetRegistry for InMemorySheetRegistry {
    async fn lookup(&self, key: &str) -> Result<Option<SheetTarget>> {
        Ok(self.entries.read().await.get(key).map(|id| SheetTarget {
            key: key.to_string(),
            sheet_id: id.clone(),
        }))
    }

    async fn get_or_create(
        &self,
        key: &str,
        provisioner: &dyn SheetProvisioner,
    ) -> Result<SheetResolution> {
        let _guard = self.locks.acquire(key).await;
        if let Some(target) = self.lookup(key).await? {
            return Ok(SheetResolution {
                target,
                created: false,
            });
        }
        let sheet_id = provisioner.provision(key).await?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), sheet_id.clone());
        Ok(SheetResolution {
            target: SheetTarget {
                key: key.to_string(),
                sheet_id,
            },
            created: true,
        })
    }

    async fn seed(&self, key: &str, sheet_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), sheet_id.to_string());
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<SheetTarget>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .map(|(key, id)| SheetTarget {
                key: key.clone(),
                sheet_id: id.clone(),
            })
            .collect())
    }
}

// =============================================================================
// SQLITE
// =============================================================================

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sheet_targets (
    key TEXT PRIMARY KEY NOT NULL,
    sheet_id TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

/// SQLite-backed registry; mappings survive restarts.
pub struct SqliteSheetRegistry {
    pool: SqlitePool,
    locks: KeyLocks,
}

impl SqliteSheetRegistry {
    /// Connect (creating the database file if needed) and ensure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Config(format!("Invalid SHEET_REGISTRY_URL: {}", e)))?
            .create_if_missing(true);

        // Every connection to an in-memory database is a separate database,
        // so it gets exactly one connection that is never recycled.
        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| Error::Registry(format!("Failed to open registry: {}", e)))?;

        let registry = Self::from_pool(pool);
        registry.migrate().await?;
        info!(
            subsystem = "export",
            component = "registry",
            op = "connect",
            "Sheet registry ready"
        );
        Ok(registry)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: KeyLocks::default(),
        }
    }

    /// Create the mapping table if it does not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Registry(e.to_string()))?;
        Ok(())
    }

    /// Insert unless present; returns true when this call inserted.
    async fn insert_if_absent(&self, key: &str, sheet_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO sheet_targets (key, sheet_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(sheet_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Registry(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SheetRegistry for SqliteSheetRegistry {
    async fn lookup(&self, key: &str) -> Result<Option<SheetTarget>> {
        let row = sqlx::query("SELECT key, sheet_id FROM sheet_targets WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Registry(e.to_string()))?;

        Ok(row.map(|r| SheetTarget {
            key: r.get("key"),
            sheet_id: r.get("sheet_id"),
        }))
    }

    async fn get_or_create(
        &self,
        key: &str,
        provisioner: &dyn SheetProvisioner,
    ) -> Result<SheetResolution> {
        let _guard = self.locks.acquire(key).await;
        if let Some(target) = self.lookup(key).await? {
            debug!(key, sheet_id = %target.sheet_id, "Registry hit");
            return Ok(SheetResolution {
                target,
                created: false,
            });
        }

        let sheet_id = provisioner.provision(key).await?;
        if self.insert_if_absent(key, &sheet_id).await? {
            return Ok(SheetResolution {
                target: SheetTarget {
                    key: key.to_string(),
                    sheet_id,
                },
                created: true,
            });
        }

        // Another process mapped the key first; its sheet wins.
        let target = self.lookup(key).await?.ok_or_else(|| {
            Error::Registry(format!("Mapping for '{}' vanished after conflict", key))
        })?;
        Ok(SheetResolution {
            target,
            created: false,
        })
    }

    async fn seed(&self, key: &str, sheet_id: &str) -> Result<bool> {
        self.insert_if_absent(key, sheet_id).await
    }

    async fn list(&self) -> Result<Vec<SheetTarget>> {
        let rows = sqlx::query("SELECT key, sheet_id FROM sheet_targets ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Registry(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| SheetTarget {
                key: r.get("key"),
                sheet_id: r.get("sheet_id"),
            })
            .collect())
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// SQLite registry when `SHEET_REGISTRY_URL` is set, otherwise in-memory.
pub async fn registry_from_env() -> Result<Arc<dyn SheetRegistry>> {
    match std::env::var("SHEET_REGISTRY_URL") {
        Ok(url) if !url.trim().is_empty() => {
            Ok(Arc::new(SqliteSheetRegistry::connect(url.trim()).await?))
        }
        _ => {
            info!(
                subsystem = "export",
                component = "registry",
                "SHEET_REGISTRY_URL not set, sheet mappings will not survive restarts"
            );
            Ok(Arc::new(InMemorySheetRegistry::new()))
        }
    }
}

/// Pre-provisioned sheet identifiers from `SHEET_ID_<LABEL>` and `EXPORT_SHEET_ID`.
pub fn preprovisioned_from_env() -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = RoutingLabel::ALL
        .iter()
        .filter_map(|label| {
            std::env::var(label.sheet_env_var())
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|id| (label.as_str().to_string(), id.trim().to_string()))
        })
        .collect();
    if let Some(id) = std::env::var("EXPORT_SHEET_ID")
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        pairs.push((SINGLE_SHEET_KEY.to_string(), id.trim().to_string()));
    }
    pairs
}

/// Seed mappings without overwriting existing ones; returns how many were inserted.
pub async fn seed_registry(
    registry: &dyn SheetRegistry,
    pairs: &[(String, String)],
) -> Result<usize> {
    let mut inserted = 0;
    for (key, sheet_id) in pairs {
        if registry.seed(key, sheet_id).await? {
            info!(key = %key, sheet_id = %sheet_id, "Seeded pre-provisioned sheet");
            inserted += 1;
        } else {
            debug!(key = %key, "Registry already maps key, seed ignored");
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Provisioner that counts calls and yields to let races happen.
    #[derive(Default)]
    struct CountingProvisioner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SheetProvisioner for CountingProvisioner {
        async fn provision(&self, key: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(format!("{}-sheet-{}", key, n))
        }
    }

    struct FailingProvisioner;

    #[async_trait]
    impl SheetProvisioner for FailingProvisioner {
        async fn provision(&self, _key: &str) -> Result<String> {
            Err(Error::Export("quota exceeded".to_string()))
        }
    }

    async fn sqlite() -> SqliteSheetRegistry {
        SqliteSheetRegistry::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_memory_get_or_create_reuses_mapping() {
        let registry = InMemorySheetRegistry::new();
        let provisioner = CountingProvisioner::default();

        let first = registry.get_or_create("actuarial", &provisioner).await.unwrap();
        let second = registry.get_or_create("actuarial", &provisioner).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.target, second.target);
        assert_eq!(provisioner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_memory_concurrent_creation_happens_once() {
        let registry = Arc::new(InMemorySheetRegistry::new());
        let provisioner = Arc::new(CountingProvisioner::default());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let provisioner = provisioner.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .get_or_create("general", provisioner.as_ref())
                    .await
                    .unwrap()
                    .target
                    .sheet_id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        assert_eq!(provisioner.calls.load(Ordering::SeqCst), 1);
        assert!(ids.iter().all(|id| id == &ids[0]));
    }

    #[tokio::test]
    async fn test_failed_provisioning_persists_nothing() {
        let registry = InMemorySheetRegistry::new();
        let err = registry
            .get_or_create("actuarial", &FailingProvisioner)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(registry.lookup("actuarial").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seed_does_not_overwrite() {
        let registry = InMemorySheetRegistry::new();
        assert!(registry.seed("general", "abc").await.unwrap());
        assert!(!registry.seed("general", "xyz").await.unwrap());
        assert_eq!(
            registry.lookup("general").await.unwrap().unwrap().sheet_id,
            "abc"
        );
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_and_reuse() {
        let registry = sqlite().await;
        let provisioner = CountingProvisioner::default();

        let created = registry.get_or_create("actuarial", &provisioner).await.unwrap();
        let reused = registry.get_or_create("actuarial", &provisioner).await.unwrap();

        assert!(created.created);
        assert!(!reused.created);
        assert_eq!(reused.target.sheet_id, "actuarial-sheet-0");
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_concurrent_creation_happens_once() {
        let registry = Arc::new(sqlite().await);
        let provisioner = Arc::new(CountingProvisioner::default());

        let a = {
            let (r, p) = (registry.clone(), provisioner.clone());
            tokio::spawn(async move { r.get_or_create("general", p.as_ref()).await.unwrap() })
        };
        let b = {
            let (r, p) = (registry.clone(), provisioner.clone());
            tokio::spawn(async move { r.get_or_create("general", p.as_ref()).await.unwrap() })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.target, b.target);
        assert_eq!(provisioner.calls.load(Ordering::SeqCst), 1);
        assert!(a.created ^ b.created);
    }

    #[tokio::test]
    async fn test_sqlite_seed_keeps_existing_mapping() {
        let registry = sqlite().await;
        let pairs = vec![
            ("actuarial".to_string(), "pre-1".to_string()),
            ("all_candidates".to_string(), "pre-2".to_string()),
        ];
        assert_eq!(seed_registry(&registry, &pairs).await.unwrap(), 2);
        assert_eq!(seed_registry(&registry, &pairs).await.unwrap(), 0);

        let provisioner = CountingProvisioner::default();
        let resolved = registry.get_or_create("actuarial", &provisioner).await.unwrap();
        assert_eq!(resolved.target.sheet_id, "pre-1");
        assert_eq!(provisioner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sqlite_file_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("registry.db").display());

        {
            let registry = SqliteSheetRegistry::connect(&url).await.unwrap();
            registry.seed("general", "persisted").await.unwrap();
        }

        let reopened = SqliteSheetRegistry::connect(&url).await.unwrap();
        let target = reopened.lookup("general").await.unwrap().unwrap();
        assert_eq!(target.sheet_id, "persisted");
    }
}
