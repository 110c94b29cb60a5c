//! Armazenamento durável de registros e snapshots do modelo.
//!
//! O gateway é passivo: a base de conhecimento decide quando ler e escrever,
//! o gateway só move texto JSON para dentro e para fora.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryGateway;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteGateway;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::config::{StorageBackend, StorageConfig};
use crate::{LoreError, LoreResult};

/// Versão atual do schema dos payloads de snapshot.
pub const SCHEMA_VERSION: u32 = 1;

/// Conjuntos de registros indexados.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSet {
    Patterns,
    Outcomes,
    RecommendationsLog,
    Feedback,
}

impl RecordSet {
    pub const ALL: [RecordSet; 4] = [
        RecordSet::Patterns,
        RecordSet::Outcomes,
        RecordSet::RecommendationsLog,
        RecordSet::Feedback,
    ];

    /// Nome da tabela.
    pub fn table(&self) -> &'static str {
        match self {
            RecordSet::Patterns => "patterns",
            RecordSet::Outcomes => "outcomes",
            RecordSet::RecommendationsLog => "recommendations_log",
            RecordSet::Feedback => "feedback",
        }
    }
}

impl std::fmt::Display for RecordSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Snapshots versionados dos mapas de pesos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    PatternFrequencies,
    Correlations,
    PredictorWeights,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 3] = [
        SnapshotKind::PatternFrequencies,
        SnapshotKind::Correlations,
        SnapshotKind::PredictorWeights,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::PatternFrequencies => "pattern_frequencies",
            SnapshotKind::Correlations => "correlations",
            SnapshotKind::PredictorWeights => "predictor_weights",
        }
    }
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot como armazenado; o payload é validado por quem lê.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub schema_version: u32,
    pub payload: String,
    pub saved_at: DateTime<Utc>,
}

/// Um registro armazenado.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub payload: String,
}

impl StoredRecord {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }

    /// Serializa `value` em um registro.
    pub fn from_value<T: Serialize>(id: impl Into<String>, value: &T) -> LoreResult<Self> {
        Ok(Self::new(id, serde_json::to_string(value)?))
    }
}

/// CRUD de registros mais leitura/gravação de snapshots.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Retorna o nome do backend.
    fn name(&self) -> &str;

    /// Insere ou substitui registros em uma transação.
    async fn upsert_records(&self, set: RecordSet, records: Vec<StoredRecord>) -> LoreResult<()>;

    /// Remove registros por id; ids desconhecidos são ignorados.
    async fn delete_records(&self, set: RecordSet, ids: Vec<String>) -> LoreResult<()>;

    /// Lê um registro.
    async fn get_record(&self, set: RecordSet, id: &str) -> LoreResult<Option<StoredRecord>>;

    /// Lê todos os registros de um conjunto, ordenados por id.
    async fn load_records(&self, set: RecordSet) -> LoreResult<Vec<StoredRecord>>;

    /// Conta os registros de um conjunto.
    async fn count_records(&self, set: RecordSet) -> LoreResult<usize>;

    /// Substitui o snapshot de `kind`, marcado com [`SCHEMA_VERSION`].
    async fn save_snapshot(&self, kind: SnapshotKind, payload: String) -> LoreResult<()>;

    /// Lê o snapshot de `kind`, se existir.
    async fn load_snapshot(&self, kind: SnapshotKind) -> LoreResult<Option<StoredSnapshot>>;

    /// Insere ou substitui um registro.
    async fn upsert_record(&self, set: RecordSet, record: StoredRecord) -> LoreResult<()> {
        self.upsert_records(set, vec![record]).await
    }
}

/// Abre o gateway configurado.
pub fn open_gateway(config: &StorageConfig) -> LoreResult<Arc<dyn PersistenceGateway>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryGateway::new())),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => Ok(Arc::new(SqliteGateway::open(&config.db_path)?)),
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => Err(LoreError::config(
            "storage.backend = \"sqlite\" requires the `sqlite` feature",
        )),
    }
}

/// Aguarda uma chamada ao gateway sob `deadline`.
pub async fn with_deadline<T, F>(
    deadline: std::time::Duration,
    operation: &str,
    fut: F,
) -> LoreResult<T>
where
    F: std::future::Future<Output = LoreResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(LoreError::persistence(format!(
            "{} timed out after {:?}",
            operation, deadline
        ))),
    }
}
