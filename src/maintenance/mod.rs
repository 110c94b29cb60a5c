//! Manutenção em background.
//!
//! Três jobs periódicos mantêm a base de conhecimento saudável: re-análise das
//! amostras na fila, persistência dos deltas pendentes e poda de patterns de
//! baixo valor. Todo job é idempotente, então uma execução que falhou ou foi
//! pulada é simplesmente refeita no próximo tick.

mod scheduler;

pub use scheduler::{MaintenanceScheduler, SchedulerHandle};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::LoreResult;

/// Um job de manutenção.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceJob {
    /// Minera patterns das amostras enfileiradas desde a última execução.
    Reanalysis,
    /// Faz flush dos deltas de patterns/outcomes/feedback e dos snapshots de pesos.
    Persist,
    /// Remove patterns raros, malsucedidos e antigos.
    Prune,
}

impl MaintenanceJob {
    pub const ALL: [MaintenanceJob; 3] = [
        MaintenanceJob::Reanalysis,
        MaintenanceJob::Persist,
        MaintenanceJob::Prune,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceJob::Reanalysis => "reanalysis",
            MaintenanceJob::Persist => "persist",
            MaintenanceJob::Prune => "prune",
        }
    }
}

impl std::fmt::Display for MaintenanceJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algo contra o qual o scheduler pode executar jobs.
#[async_trait]
pub trait MaintenanceTarget: Send + Sync {
    /// Executa um job; retorna quantos itens ele tocou.
    async fn run_job(&self, job: MaintenanceJob) -> LoreResult<usize>;
}
