//! SQLite-backed item storage.
//!
//! Connections are opened per operation and dropped with it, so no connection
//! is shared across concurrent requests. rusqlite work runs on the blocking
//! thread pool so handlers never block the async runtime.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Item storage failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A persisted item.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Fields for creating an item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub description: String,
}

/// Handle to the items table.
#[derive(Debug, Clone)]
pub struct ItemStore {
    path: PathBuf,
}

impl ItemStore {
    /// Open the store, creating the database file and table if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { path })
    }

    /// Insert an item and return it with its assigned id.
    pub async fn create(&self, new_item: NewItem) -> Result<Item, DbError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            conn.execute(
                "INSERT INTO items (name, description) VALUES (?1, ?2)",
                rusqlite::params![new_item.name, new_item.description],
            )?;
            let id = conn.last_insert_rowid();
            Ok(Item {
                id,
                name: new_item.name,
                description: new_item.description,
            })
        })
        .await?
    }

    /// Fetch a single item by id.
    pub async fn get(&self, id: i64) -> Result<Option<Item>, DbError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            let mut stmt =
                conn.prepare("SELECT id, name, description FROM items WHERE id = ?1")?;
            let mut rows = stmt.query_map([id], row_to_item)?;
            match rows.next() {
                Some(item) => Ok(Some(item?)),
                None => Ok(None),
            }
        })
        .await?
    }

    /// List items with pagination.
    pub async fn list(&self, skip: u32, limit: u32) -> Result<Vec<Item>, DbError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            let mut stmt = conn.prepare(
                "SELECT id, name, description FROM items ORDER BY id LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map([limit, skip], row_to_item)?;
            let mut items = Vec::new();
            for item in rows {
                items.push(item?);
            }
            Ok(items)
        })
        .await?
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}
