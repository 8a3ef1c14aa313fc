//! SQLite-backed resource store
//!
//! Persists Redfish-style resources as opaque bodies keyed by `(table, key)`.
//! The database lives at `$XDG_DATA_HOME/fleet-managers/store.db` unless the
//! configuration names another path.
//!
//! # Database Schema
//!
//! - `resources`: one row per stored body
//! - `schema_version`: migration tracking
//!
//! Every operation runs on the blocking pool so a slow disk never stalls
//! the async workers serving other requests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use directories::ProjectDirs;
use fleet_managers_core::{ManagerError, ResourceStore};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// SQLite implementation of [`ResourceStore`].
///
/// The connection is wrapped in a `Mutex` to satisfy the `Sync` requirement
/// and is shared with blocking tasks through an `Arc`.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the store at the default location, creating it if needed.
    pub fn open() -> Result<Self> {
        let db_path = Self::default_db_path()?;
        Self::open_at(&db_path)
    }

    /// Open the store at a specific path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {:?}", parent))?;
        }

        info!("Opening resource store at: {:?}", path);

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("", "fleet-managers", "fleet-managers")
            .context("Failed to determine project directories")?;

        Ok(project_dirs.data_dir().join("store.db"))
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )
        .context("Failed to create schema_version table")?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .context("Failed to read schema version")?;

        debug!("Current schema version: {}", current_version);

        if current_version < 1 {
            Self::migrate_to_v1(conn)?;
        }

        Ok(())
    }

    /// Migration to version 1: Initial schema.
    fn migrate_to_v1(conn: &Connection) -> Result<()> {
        info!("Running migration to schema version 1");

        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS resources (
                 table_name TEXT NOT NULL,
                 key TEXT NOT NULL,
                 body TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 PRIMARY KEY (table_name, key)
             );
             INSERT INTO schema_version (version) VALUES (1);
             COMMIT;",
        )
        .context("Failed to apply schema version 1")?;

        info!("Successfully migrated to schema version 1");
        Ok(())
    }

    /// Run `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> fleet_managers_core::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| ManagerError::Store("store connection poisoned".to_string()))?;
            op(&conn).map_err(store_error)
        })
        .await
        .map_err(|e| ManagerError::Store(format!("store task failed: {}", e)))?
    }
}

fn store_error(err: rusqlite::Error) -> ManagerError {
    ManagerError::Store(err.to_string())
}

#[async_trait]
impl ResourceStore for SqliteStore {
    async fn get(&self, table: &str, key: &str) -> fleet_managers_core::Result<String> {
        let (owned_table, owned_key) = (table.to_string(), key.to_string());
        let body = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT body FROM resources WHERE table_name = ?1 AND key = ?2",
                    params![owned_table, owned_key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
            })
            .await?;

        body.ok_or_else(|| ManagerError::NotFound(format!("{}/{}", table, key)))
    }

    async fn put(&self, table: &str, key: &str, body: &str) -> fleet_managers_core::Result<()> {
        let (table, key, body) = (table.to_string(), key.to_string(), body.to_string());
        let updated_at = Utc::now().to_rfc3339();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO resources (table_name, key, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(table_name, key) DO UPDATE SET
                     body = excluded.body,
                     updated_at = excluded.updated_at",
                params![table, key, body, updated_at],
            )
            .map(|_| ())
        })
        .await
    }

    async fn list_keys(&self, table: &str) -> fleet_managers_core::Result<Vec<String>> {
        let table = table.to_string();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT key FROM resources WHERE table_name = ?1 ORDER BY key")?;
            let keys = stmt
                .query_map([table], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_managers_core::{MANAGERS_TABLE, PLUGIN_TABLE};
    use tempfile::TempDir;

    fn create_test_store() -> Result<(SqliteStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("test.db");
        let store = SqliteStore::open_at(&path)?;
        Ok((store, temp_dir))
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() -> Result<()> {
        let (store, _dir) = create_test_store()?;
        let err = store
            .get(MANAGERS_TABLE, "/redfish/v1/Managers/uuid1:1/Ethernet")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_put_get_and_overwrite() -> Result<()> {
        let (store, _dir) = create_test_store()?;
        store.put(PLUGIN_TABLE, "CFM", r#"{"ID":"CFM"}"#).await?;
        assert_eq!(store.get(PLUGIN_TABLE, "CFM").await?, r#"{"ID":"CFM"}"#);

        store.put(PLUGIN_TABLE, "CFM", r#"{"ID":"CFM","Port":"9091"}"#).await?;
        assert_eq!(
            store.get(PLUGIN_TABLE, "CFM").await?,
            r#"{"ID":"CFM","Port":"9091"}"#
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_tables_are_isolated() -> Result<()> {
        let (store, _dir) = create_test_store()?;
        store.put(PLUGIN_TABLE, "shared", "plugin").await?;
        store.put(MANAGERS_TABLE, "shared", "manager").await?;

        assert_eq!(store.get(PLUGIN_TABLE, "shared").await?, "plugin");
        assert_eq!(store.get(MANAGERS_TABLE, "shared").await?, "manager");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_keys_sorted() -> Result<()> {
        let (store, _dir) = create_test_store()?;
        store.put(MANAGERS_TABLE, "/redfish/v1/Managers/b:1", "{}").await?;
        store.put(MANAGERS_TABLE, "/redfish/v1/Managers/a:1", "{}").await?;
        store.put(PLUGIN_TABLE, "CFM", "{}").await?;

        assert_eq!(
            store.list_keys(MANAGERS_TABLE).await?,
            vec!["/redfish/v1/Managers/a:1", "/redfish/v1/Managers/b:1"]
        );
        assert!(store.list_keys("Unknown").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_keeps_data_and_schema() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("store.db");

        {
            let store = SqliteStore::open_at(&path)?;
            store.put(PLUGIN_TABLE, "CFM", "{}").await?;
        }

        let store = SqliteStore::open_at(&path)?;
        assert_eq!(store.get(PLUGIN_TABLE, "CFM").await?, "{}");
        Ok(())
    }
}
