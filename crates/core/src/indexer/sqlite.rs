//! SQLite-backed indexer store.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::registry::{check_descriptor, sort_descriptors, IndexerStore, RegistryError};
use super::types::{Credentials, IndexerDescriptor};

/// Persistent indexer store.
pub struct SqliteIndexerStore {
    conn: Mutex<Connection>,
}

impl SqliteIndexerStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, RegistryError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RegistryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS indexers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                protocol TEXT NOT NULL,
                privacy TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 25,
                enabled INTEGER NOT NULL DEFAULT 1,
                base_url TEXT NOT NULL,
                mirrors TEXT NOT NULL DEFAULT '[]',
                credentials TEXT NOT NULL DEFAULT '{}',
                category_map TEXT NOT NULL,
                supported_categories TEXT NOT NULL DEFAULT '[]',
                remote_id TEXT,
                rate_limit_rpm INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_indexers_priority ON indexers(priority, id);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    /// Seed from configuration. Existing rows are replaced, so the config
    /// file stays authoritative for the indexers it names.
    pub fn import(&self, descriptors: &[IndexerDescriptor]) -> Result<usize, RegistryError> {
        for d in descriptors {
            self.upsert(d.clone())?;
        }
        Ok(descriptors.len())
    }

    fn row_to_descriptor(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            protocol: row.get(3)?,
            privacy: row.get(4)?,
            priority: row.get(5)?,
            enabled: row.get(6)?,
            base_url: row.get(7)?,
            mirrors: row.get(8)?,
            credentials: row.get(9)?,
            category_map: row.get(10)?,
            supported_categories: row.get(11)?,
            remote_id: row.get(12)?,
            rate_limit_rpm: row.get(13)?,
        })
    }

    fn update_column(
        &self,
        id: &str,
        sql: &str,
        value: impl rusqlite::ToSql,
    ) -> Result<(), RegistryError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(sql, params![value, id]).map_err(db_err)?;
        if changed == 0 {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, kind, protocol, privacy, priority, enabled, base_url,
        mirrors, credentials, category_map, supported_categories, remote_id, rate_limit_rpm
     FROM indexers";

/// Row as stored; enum and JSON columns are decoded afterwards.
struct RawRow {
    id: String,
    name: String,
    kind: String,
    protocol: String,
    privacy: String,
    priority: i32,
    enabled: bool,
    base_url: String,
    mirrors: String,
    credentials: String,
    category_map: String,
    supported_categories: String,
    remote_id: Option<String>,
    rate_limit_rpm: Option<u32>,
}

impl RawRow {
    fn decode(self) -> Result<IndexerDescriptor, RegistryError> {
        let credentials: Credentials = from_json(&self.credentials)?;
        Ok(IndexerDescriptor {
            kind: from_json(&quoted(&self.kind))?,
            protocol: from_json(&quoted(&self.protocol))?,
            privacy: from_json(&quoted(&self.privacy))?,
            mirrors: from_json(&self.mirrors)?,
            category_map: from_json(&self.category_map)?,
            supported_categories: from_json(&self.supported_categories)?,
            credentials,
            id: self.id,
            name: self.name,
            priority: self.priority,
            enabled: self.enabled,
            base_url: self.base_url,
            remote_id: self.remote_id,
            rate_limit_rpm: self.rate_limit_rpm,
        })
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s)
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, RegistryError> {
    serde_json::from_str(s).map_err(|e| RegistryError::Serialization(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RegistryError> {
    serde_json::to_string(value).map_err(|e| RegistryError::Serialization(e.to_string()))
}

/// Enum as its bare serde name.
fn enum_name<T: serde::Serialize>(value: &T) -> Result<String, RegistryError> {
    Ok(to_json(value)?.trim_matches('"').to_string())
}

fn db_err(e: rusqlite::Error) -> RegistryError {
    RegistryError::Database(e.to_string())
}

impl IndexerStore for SqliteIndexerStore {
    fn list(&self) -> Result<Vec<IndexerDescriptor>, RegistryError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("{} ORDER BY priority, id", SELECT_COLUMNS))
            .map_err(db_err)?;
        let rows = stmt.query_map([], Self::row_to_descriptor).map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?.decode()?);
        }
        sort_descriptors(&mut out);
        Ok(out)
    }

    fn get(&self, id: &str) -> Result<IndexerDescriptor, RegistryError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_COLUMNS),
                params![id],
                Self::row_to_descriptor,
            )
            .optional()
            .map_err(db_err)?;
        row.ok_or_else(|| RegistryError::NotFound(id.to_string()))?
            .decode()
    }

    fn upsert(&self, d: IndexerDescriptor) -> Result<(), RegistryError> {
        check_descriptor(&d)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO indexers (id, name, kind, protocol, privacy, priority, enabled, base_url,
                mirrors, credentials, category_map, supported_categories, remote_id, rate_limit_rpm)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, kind = excluded.kind, protocol = excluded.protocol,
                privacy = excluded.privacy, priority = excluded.priority,
                enabled = excluded.enabled, base_url = excluded.base_url,
                mirrors = excluded.mirrors, credentials = excluded.credentials,
                category_map = excluded.category_map,
                supported_categories = excluded.supported_categories,
                remote_id = excluded.remote_id, rate_limit_rpm = excluded.rate_limit_rpm",
            params![
                d.id,
                d.name,
                enum_name(&d.kind)?,
                enum_name(&d.protocol)?,
                enum_name(&d.privacy)?,
                d.priority,
                d.enabled,
                d.base_url,
                to_json(&d.mirrors)?,
                to_json(&d.credentials)?,
                to_json(&d.category_map)?,
                to_json(&d.supported_categories)?,
                d.remote_id,
                d.rate_limit_rpm,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.update_column(id, "UPDATE indexers SET enabled = ?1 WHERE id = ?2", enabled)
    }

    fn set_priority(&self, id: &str, priority: i32) -> Result<(), RegistryError> {
        self.update_column(id, "UPDATE indexers SET priority = ?1 WHERE id = ?2", priority)
    }

    fn remove(&self, id: &str) -> Result<(), RegistryError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM indexers WHERE id = ?", params![id])
            .map_err(db_err)?;
        if changed == 0 {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
