//! Gateway SQLite.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{PersistenceGateway, RecordSet, SnapshotKind, StoredRecord, StoredSnapshot, SCHEMA_VERSION};
use crate::{LoreError, LoreResult};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS patterns (
        id TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS outcomes (
        id TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS recommendations_log (
        id TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS feedback (
        id TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS model_snapshots (
        kind TEXT PRIMARY KEY,
        schema_version INTEGER NOT NULL,
        payload TEXT NOT NULL,
        saved_at TEXT NOT NULL
    );
"#;

/// Gateway sobre um único arquivo SQLite.
///
/// As queries rodam no pool de bloqueio, então a conexão nunca trava o
/// runtime async.
#[derive(Clone)]
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGateway {
    /// Abre ou cria o banco, criando os diretórios pai.
    pub fn open(db_path: &Path) -> LoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    /// Abre um banco privado em memória.
    pub fn open_in_memory() -> LoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> LoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> LoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> LoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| LoreError::persistence("sqlite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| LoreError::persistence(format!("sqlite task failed: {}", e)))?
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert_records(&self, set: RecordSet, records: Vec<StoredRecord>) -> LoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.run(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            {
                let sql = format!(
                    "INSERT OR REPLACE INTO {} (id, payload, updated_at) VALUES (?1, ?2, ?3)",
                    set.table()
                );
                let mut stmt = tx.prepare(&sql)?;
                for record in &records {
                    stmt.execute(params![record.id, record.payload, now])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_records(&self, set: RecordSet, ids: Vec<String>) -> LoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.run(move |conn| {
            let tx = conn.transaction()?;
            {
                let sql = format!("DELETE FROM {} WHERE id = ?1", set.table());
                let mut stmt = tx.prepare(&sql)?;
                for id in &ids {
                    stmt.execute(params![id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_record(&self, set: RecordSet, id: &str) -> LoreResult<Option<StoredRecord>> {
        let id = id.to_string();
        self.run(move |conn| {
            let sql = format!("SELECT payload FROM {} WHERE id = ?1", set.table());
            let payload: Option<String> = conn
                .query_row(&sql, params![id], |row| row.get(0))
                .optional()?;
            Ok(payload.map(|p| StoredRecord::new(id, p)))
        })
        .await
    }

    async fn load_records(&self, set: RecordSet) -> LoreResult<Vec<StoredRecord>> {
        self.run(move |conn| {
            let sql = format!("SELECT id, payload FROM {} ORDER BY id", set.table());
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map([], |row| {
                    Ok(StoredRecord {
                        id: row.get(0)?,
                        payload: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    async fn count_records(&self, set: RecordSet) -> LoreResult<usize> {
        self.run(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", set.table());
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn save_snapshot(&self, kind: SnapshotKind, payload: String) -> LoreResult<()> {
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO model_snapshots (kind, schema_version, payload, saved_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind.as_str(), SCHEMA_VERSION, payload, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_snapshot(&self, kind: SnapshotKind) -> LoreResult<Option<StoredSnapshot>> {
        self.run(move |conn| {
            let row: Option<(u32, String, String)> = conn
                .query_row(
                    "SELECT schema_version, payload, saved_at FROM model_snapshots WHERE kind = ?1",
                    params![kind.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            Ok(row.map(|(schema_version, payload, saved_at)| StoredSnapshot {
                schema_version,
                payload,
                saved_at: DateTime::parse_from_rfc3339(&saved_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            }))
        })
        .await
    }
}
