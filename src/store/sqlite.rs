//! SQLite-backed [`ItemStore`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, error, info};

use super::migrations::apply_migrations;
use super::{Item, ItemChanges, ItemId, ItemStore, NewItem, StoreError, StoreResult};

const ITEM_SELECT_SQL: &str = "SELECT id, title, description, completed, created FROM items";

/// Item store over a single SQLite connection.
///
/// The connection is serialized behind a mutex, so concurrent writers to the
/// same id are ordered by lock acquisition.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

impl SqliteItemStore {
    /// Opens (or creates) the database file at `path` and applies migrations.
    ///
    /// # Errors
    ///
    /// [`StoreError::Sqlite`] if the file cannot be opened or migrated,
    /// [`StoreError::UnsupportedSchemaVersion`] if it is newer than this binary.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::bootstrap("file", || Connection::open(path))
    }

    /// Opens a private in-memory database with the schema applied.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap("memory", Connection::open_in_memory)
    }

    fn bootstrap(
        mode: &'static str,
        open: impl FnOnce() -> rusqlite::Result<Connection>,
    ) -> StoreResult<Self> {
        let started_at = Instant::now();
        info!(event = "store_open", mode, status = "start");

        let result = open().map_err(StoreError::from).and_then(|mut conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            apply_migrations(&mut conn)?;
            Ok(conn)
        });

        let duration_ms = started_at.elapsed().as_millis() as u64;
        match result {
            Ok(conn) => {
                info!(event = "store_open", mode, status = "ok", duration_ms);
                Ok(Self {
                    conn: Mutex::new(conn),
                })
            }
            Err(err) => {
                error!(event = "store_open", mode, status = "error", duration_ms, error = %err);
                Err(err)
            }
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves no partial state behind in SQLite.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fetch(conn: &Connection, id: ItemId) -> StoreResult<Item> {
        let item = conn
            .query_row(
                &format!("{ITEM_SELECT_SQL} WHERE id = ?1"),
                params![id.get()],
                read_row,
            )
            .optional()?;
        item.ok_or(StoreError::NotFound(id))?
    }
}

impl ItemStore for SqliteItemStore {
    fn create(&self, item: &NewItem) -> StoreResult<Item> {
        let created = Utc::now().trunc_subsecs(6);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO items (title, description, completed, created) VALUES (?1, ?2, 0, ?3)",
            params![item.title, item.description, encode_timestamp(&created)],
        )?;
        let id = ItemId::new(conn.last_insert_rowid());
        debug!(event = "item_create", %id);

        Ok(Item {
            id,
            title: item.title.clone(),
            description: item.description.clone(),
            completed: false,
            created,
        })
    }

    fn get(&self, id: ItemId) -> StoreResult<Item> {
        Self::fetch(&self.conn(), id)
    }

    fn list(&self) -> StoreResult<Vec<Item>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} ORDER BY id"))?;
        let rows = stmt.query_map([], read_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    fn update(&self, id: ItemId, changes: &ItemChanges) -> StoreResult<Item> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE items SET title = ?1, description = ?2, completed = ?3 WHERE id = ?4",
            params![changes.title, changes.description, changes.completed, id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(event = "item_update", %id, completed = changes.completed);
        Self::fetch(&conn, id)
    }

    fn delete(&self, id: ItemId) -> StoreResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM items WHERE id = ?1", params![id.get()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(event = "item_delete", %id);
        Ok(())
    }
}

fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| StoreError::InvalidData(format!("created `{raw}`: {err}")))
}

// The outer result carries SQLite errors, the inner one decoding errors.
fn read_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<Item>> {
    let id: i64 = row.get(0)?;
    let title: String = row.get(1)?;
    let description: Option<String> = row.get(2)?;
    let completed: bool = row.get(3)?;
    let created: String = row.get(4)?;

    Ok(decode_timestamp(&created).map(|created| Item {
        id: ItemId::new(id),
        title,
        description,
        completed,
        created,
    }))
}
