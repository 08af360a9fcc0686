// ============================================================================
// ClientDb — Embedded Database (redb)
// ============================================================================
// Persistent local settings for the supply chain client.
// Default path: ~/.supplychain/client.redb
// ============================================================================

use redb::{Database, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::KeyValueStore;
use crate::error::{Result, SupplyChainError};

// Table definitions
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

fn storage_err(context: &str, e: impl std::fmt::Display) -> SupplyChainError {
    SupplyChainError::Storage(format!("{}: {}", context, e))
}

/// Default database location under the home directory
pub fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SupplyChainError::Storage("Cannot determine home directory".into()))?;
    Ok(home.join(".supplychain").join("client.redb"))
}

/// Embedded database for client settings
pub struct ClientDb {
    db: Database,
    path: PathBuf,
}

impl ClientDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses ~/.supplychain/client.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_db_path()?,
        };

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| storage_err("Failed to create database directory", e))?;
            }
        }

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path).map_err(|e| storage_err("Failed to open database", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| storage_err("Failed to begin write", e))?;
        {
            let _ = write_txn
                .open_table(SETTINGS)
                .map_err(|e| storage_err("Failed to create settings table", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| storage_err("Failed to commit init", e))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for ClientDb {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| storage_err("Failed to begin read", e))?;
        let table = read_txn
            .open_table(SETTINGS)
            .map_err(|e| storage_err("Failed to open settings table", e))?;

        let value = table
            .get(key)
            .map_err(|e| storage_err("Failed to get setting", e))?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| storage_err("Failed to begin write", e))?;
        {
            let mut table = write_txn
                .open_table(SETTINGS)
                .map_err(|e| storage_err("Failed to open settings table", e))?;
            table
                .insert(key, value)
                .map_err(|e| storage_err("Failed to insert setting", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| storage_err("Failed to commit", e))?;

        debug!("Stored setting: {}", key);
        Ok(())
    }
}
