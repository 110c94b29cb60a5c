//! Gateway em processo.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{PersistenceGateway, RecordSet, SnapshotKind, StoredRecord, StoredSnapshot, SCHEMA_VERSION};
use crate::{LoreError, LoreResult};

/// Gateway sobre mapas ordenados; nada sobrevive ao processo.
///
/// As escritas podem ser forçadas a falhar, o que permite aos chamadores
/// exercitar seus caminhos de retry.
#[derive(Default)]
pub struct MemoryGateway {
    records: RwLock<BTreeMap<RecordSet, BTreeMap<String, String>>>,
    snapshots: RwLock<BTreeMap<SnapshotKind, StoredSnapshot>>,
    fail_writes: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faz toda escrita seguinte falhar (ou voltar a funcionar).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Armazena um snapshot como veio, qualquer que seja a versão ou o payload.
    pub async fn put_raw_snapshot(&self, kind: SnapshotKind, snapshot: StoredSnapshot) {
        self.snapshots.write().await.insert(kind, snapshot);
    }

    fn check_writable(&self) -> LoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LoreError::persistence("memory gateway is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert_records(&self, set: RecordSet, records: Vec<StoredRecord>) -> LoreResult<()> {
        self.check_writable()?;
        let mut all = self.records.write().await;
        let table = all.entry(set).or_default();
        for record in records {
            table.insert(record.id, record.payload);
        }
        Ok(())
    }

    async fn delete_records(&self, set: RecordSet, ids: Vec<String>) -> LoreResult<()> {
        self.check_writable()?;
        if let Some(table) = self.records.write().await.get_mut(&set) {
            for id in ids {
                table.remove(&id);
            }
        }
        Ok(())
    }

    async fn get_record(&self, set: RecordSet, id: &str) -> LoreResult<Option<StoredRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&set)
            .and_then(|table| table.get(id))
            .map(|payload| StoredRecord::new(id, payload.clone())))
    }

    async fn load_records(&self, set: RecordSet) -> LoreResult<Vec<StoredRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&set)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, payload)| StoredRecord::new(id.clone(), payload.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_records(&self, set: RecordSet) -> LoreResult<usize> {
        Ok(self.records.read().await.get(&set).map_or(0, |t| t.len()))
    }

    async fn save_snapshot(&self, kind: SnapshotKind, payload: String) -> LoreResult<()> {
        self.check_writable()?;
        self.snapshots.write().await.insert(
            kind,
            StoredSnapshot {
                schema_version: SCHEMA_VERSION,
                payload,
                saved_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn load_snapshot(&self, kind: SnapshotKind) -> LoreResult<Option<StoredSnapshot>> {
        Ok(self.snapshots.read().await.get(&kind).cloned())
    }
}
