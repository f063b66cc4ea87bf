//! SQLite record backend.
//!
//! One `records` table; replace happens as a single upsert statement so a
//! failed write leaves the previous row intact.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, StoreError};
use crate::types::{EncryptedRecord, KeyId};

use super::RecordBackend;

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(map_sqlite)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                storage_key      TEXT PRIMARY KEY,
                key_id           TEXT NOT NULL,
                blob             BLOB NOT NULL,
                digest           BLOB,
                created_at       TEXT NOT NULL,
                last_modified_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_records_key_id ON records(key_id);",
        )
        .map_err(map_sqlite)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn map_sqlite(err: rusqlite::Error) -> StoreError {
    StoreError::StorageOperationFailed(err.to_string())
}

/// Escape LIKE metacharacters so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn row_to_record(row: &Row<'_>) -> std::result::Result<EncryptedRecord, rusqlite::Error> {
    let key_id: String = row.get(1)?;
    let created_at: String = row.get(4)?;
    let last_modified_at: String = row.get(5)?;
    Ok(EncryptedRecord {
        storage_key: row.get(0)?,
        key_id: KeyId::from(key_id.as_str()),
        blob: row.get(2)?,
        digest: row.get(3)?,
        created_at: parse_timestamp(&created_at)?,
        last_modified_at: parse_timestamp(&last_modified_at)?,
    })
}

impl RecordBackend for SqliteBackend {
    fn get(&self, storage_key: &str) -> Result<Option<EncryptedRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT storage_key, key_id, blob, digest, created_at, last_modified_at
             FROM records WHERE storage_key = ?1",
            params![storage_key],
            row_to_record,
        )
        .optional()
        .map_err(map_sqlite)
    }

    fn put(&self, record: &EncryptedRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO records
                 (storage_key, key_id, blob, digest, created_at, last_modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(storage_key) DO UPDATE SET
                 key_id = excluded.key_id,
                 blob = excluded.blob,
                 digest = excluded.digest,
                 last_modified_at = excluded.last_modified_at",
            params![
                record.storage_key,
                record.key_id.as_str(),
                record.blob,
                record.digest,
                record.created_at.to_rfc3339(),
                record.last_modified_at.to_rfc3339(),
            ],
        )
        .map_err(map_sqlite)?;
        Ok(())
    }

    fn delete(&self, storage_key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM records WHERE storage_key = ?1",
            params![storage_key],
        )
        .map_err(map_sqlite)?;
        Ok(())
    }

    fn clear(&self, prefix: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM records WHERE storage_key LIKE ?1 ESCAPE '\\'",
            params![like_prefix(prefix)],
        )
        .map_err(map_sqlite)?;
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT storage_key FROM records
                 WHERE storage_key LIKE ?1 ESCAPE '\\'
                 ORDER BY storage_key",
            )
            .map_err(map_sqlite)?;
        let keys = stmt
            .query_map(params![like_prefix(prefix)], |row| row.get::<_, String>(0))
            .map_err(map_sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;
        Ok(keys)
    }

    fn keys_for(&self, key_id: &KeyId, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT storage_key FROM records
                 WHERE key_id = ?1 AND storage_key LIKE ?2 ESCAPE '\\'
                 ORDER BY storage_key",
            )
            .map_err(map_sqlite)?;
        let keys = stmt
            .query_map(params![key_id.as_str(), like_prefix(prefix)], |row| {
                row.get::<_, String>(0)
            })
            .map_err(map_sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(storage_key: &str, key_id: &KeyId, blob: Vec<u8>) -> EncryptedRecord {
        let now = Utc::now();
        EncryptedRecord {
            storage_key: storage_key.to_string(),
            key_id: key_id.clone(),
            blob,
            digest: Some(vec![0xab; 32]),
            created_at: now,
            last_modified_at: now,
        }
    }

    #[test]
    fn put_get_round_trip() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let key_id = KeyId::generate();
        let original = record("ns/a", &key_id, vec![1, 2, 3]);
        backend.put(&original).unwrap();

        let fetched = backend.get("ns/a").unwrap().unwrap();
        assert_eq!(fetched.storage_key, "ns/a");
        assert_eq!(fetched.key_id, key_id);
        assert_eq!(fetched.blob, vec![1, 2, 3]);
        assert_eq!(fetched.digest, Some(vec![0xab; 32]));
        assert_eq!(fetched.created_at, original.created_at);
    }

    #[test]
    fn put_replaces_existing_row() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let key_id = KeyId::generate();
        backend.put(&record("ns/a", &key_id, vec![1])).unwrap();
        backend.put(&record("ns/a", &key_id, vec![2])).unwrap();

        let fetched = backend.get("ns/a").unwrap().unwrap();
        assert_eq!(fetched.blob, vec![2]);
        assert_eq!(backend.list_keys("ns/").unwrap().len(), 1);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let key_id = KeyId::generate();
        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.put(&record("ns/a", &key_id, vec![7])).unwrap();
        }
        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(backend.get("ns/a").unwrap().unwrap().blob, vec![7]);
    }

    #[test]
    fn clear_and_list_respect_prefix() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let key_id = KeyId::generate();
        backend.put(&record("ns/a", &key_id, vec![1])).unwrap();
        backend.put(&record("ns/b", &key_id, vec![2])).unwrap();
        backend.put(&record("other/c", &key_id, vec![3])).unwrap();

        assert_eq!(backend.list_keys("ns/").unwrap(), vec!["ns/a", "ns/b"]);
        backend.clear("ns/").unwrap();
        assert!(backend.list_keys("ns/").unwrap().is_empty());
        assert!(backend.get("other/c").unwrap().is_some());
    }

    #[test]
    fn keys_for_filters_by_key_id() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let key_a = KeyId::generate();
        let key_b = KeyId::generate();
        backend.put(&record("ns/1", &key_a, vec![1])).unwrap();
        backend.put(&record("ns/2", &key_b, vec![2])).unwrap();

        assert_eq!(backend.keys_for(&key_a, "ns/").unwrap(), vec!["ns/1"]);
    }
}
