use crate::error::{StorageError, StorageResult};
use crate::LocalStore;
use acctsync_model::{AccountRecord, Schema};
use acctsync_types::AccountId;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, info};

/// [`LocalStore`] backed by a SQLite file.
pub struct SqliteStore {
    conn: Connection,
    schema: Schema,
}

impl SqliteStore {
    /// Opens (or creates) the store at the given path.
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StorageError::Open {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "opened local store");
        Self::with_connection(conn, schema, &path.display().to_string())
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory(schema: Schema) -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Self::with_connection(conn, schema, ":memory:")
    }

    fn with_connection(conn: Connection, schema: Schema, path: &str) -> StorageResult<Self> {
        let store = Self { conn, schema };
        store.init_schema().map_err(|source| StorageError::Open {
            path: path.to_string(),
            source,
        })?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                record TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS misc (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            ",
        )
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn decode(&self, id: &str, json: &str) -> StorageResult<AccountRecord> {
        AccountRecord::from_json_str(&self.schema, json).map_err(|source| StorageError::Corrupt {
            id: id.to_string(),
            source,
        })
    }

    fn encode(&self, record: &AccountRecord) -> StorageResult<(AccountId, String)> {
        let id = record
            .id()
            .ok_or_else(|| StorageError::InvalidData(format!("record {record} has no valid id")))?;
        Ok((id, record.to_json_string(&self.schema)?))
    }

    fn write(conn: &Connection, id: &AccountId, json: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO accounts (id, record) VALUES (?1, ?2)",
            params![id.as_str(), json],
        )?;
        Ok(())
    }
}

impl LocalStore for SqliteStore {
    fn load_all(&self) -> StorageResult<BTreeMap<AccountId, AccountRecord>> {
        let mut stmt = self.conn.prepare("SELECT id, record FROM accounts")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = BTreeMap::new();
        let mut skipped = 0;
        for row in rows {
            let (id, json) = row?;
            let key = match AccountId::parse(&id) {
                Ok(key) => key,
                Err(e) => {
                    error!(id = %id, error = %e, "skipping row with invalid id");
                    skipped += 1;
                    continue;
                }
            };
            match self.decode(&id, &json) {
                Ok(record) => {
                    records.insert(key, record);
                }
                Err(e) => {
                    error!(id = %id, error = %e, "skipping undecodable record");
                    skipped += 1;
                }
            }
        }
        debug!(count = records.len(), skipped, "loaded local records");
        Ok(records)
    }

    fn get(&self, id: &AccountId) -> StorageResult<Option<AccountRecord>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT record FROM accounts WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| self.decode(id.as_str(), &j)).transpose()
    }

    fn put(&self, record: &AccountRecord) -> StorageResult<()> {
        let (id, json) = self.encode(record)?;
        Self::write(&self.conn, &id, &json)?;
        debug!(id = %id, "stored record");
        Ok(())
    }

    fn put_many(&self, records: &[AccountRecord]) -> StorageResult<()> {
        let encoded = records
            .iter()
            .map(|r| self.encode(r))
            .collect::<StorageResult<Vec<_>>>()?;
        let tx = self.conn.unchecked_transaction()?;
        for (id, json) in &encoded {
            Self::write(&tx, id, json)?;
        }
        tx.commit()?;
        debug!(count = encoded.len(), "stored records");
        Ok(())
    }

    fn delete(&self, id: &AccountId) -> StorageResult<bool> {
        let n = self
            .conn
            .execute("DELETE FROM accounts WHERE id = ?1", params![id.as_str()])?;
        debug!(id = %id, existed = n > 0, "deleted record");
        Ok(n > 0)
    }

    fn put_data(&self, namespace: &str, key: &str, data: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO misc (namespace, key, data) VALUES (?1, ?2, ?3)",
            params![namespace, key, data],
        )?;
        Ok(())
    }

    fn get_data(&self, namespace: &str, key: &str) -> StorageResult<Option<String>> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM misc WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    fn remove_data(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM misc WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(n > 0)
    }

    fn list_data(&self, namespace: &str) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, data FROM misc WHERE namespace = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![namespace], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
