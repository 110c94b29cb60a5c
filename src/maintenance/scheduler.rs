//! Executor de jobs periódicos.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{MaintenanceJob, MaintenanceTarget};
use crate::types::config::MaintenanceConfig;
use crate::LoreResult;

/// Dispara os três jobs de manutenção em intervalos fixos.
pub struct MaintenanceScheduler {
    target: Arc<dyn MaintenanceTarget>,
    config: MaintenanceConfig,
    shutdown_token: CancellationToken,
}

impl MaintenanceScheduler {
    pub fn new(target: Arc<dyn MaintenanceTarget>, config: MaintenanceConfig) -> Self {
        Self {
            target,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token que encerra todos os loops de jobs quando cancelado.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    fn period(&self, job: MaintenanceJob) -> Duration {
        let secs = match job {
            MaintenanceJob::Reanalysis => self.config.reanalysis_interval_secs,
            MaintenanceJob::Persist => self.config.persist_interval_secs,
            MaintenanceJob::Prune => self.config.prune_interval_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    /// Cria uma task por job. A primeira execução de cada job acontece um
    /// período inteiro após o início.
    pub fn start(self) -> SchedulerHandle {
        if !self.config.enabled {
            info!("Maintenance scheduler is disabled");
            return SchedulerHandle {
                token: self.shutdown_token,
                tasks: Vec::new(),
                target: self.target,
            };
        }

        let tasks = MaintenanceJob::ALL
            .into_iter()
            .map(|job| {
                let period = self.period(job);
                let target = Arc::clone(&self.target);
                let token = self.shutdown_token.clone();
                info!(job = %job, period_secs = period.as_secs(), "Starting maintenance job");
                tokio::spawn(run_job_loop(target, job, period, token))
            })
            .collect();

        SchedulerHandle {
            token: self.shutdown_token,
            tasks,
            target: self.target,
        }
    }
}

async fn run_job_loop(
    target: Arc<dyn MaintenanceTarget>,
    job: MaintenanceJob,
    period: Duration,
    token: CancellationToken,
) {
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                debug!(job = %job, "Running maintenance job");
                match target.run_job(job).await {
                    Ok(touched) => debug!(job = %job, touched, "Maintenance job completed"),
                    Err(e) => warn!(job = %job, error = %e, "Maintenance job failed"),
                }
            }
            _ = token.cancelled() => {
                break;
            }
        }
    }

    debug!(job = %job, "Maintenance job stopped");
}

/// Scheduler em execução.
pub struct SchedulerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    target: Arc<dyn MaintenanceTarget>,
}

impl SchedulerHandle {
    /// Número de loops de jobs em execução.
    pub fn job_count(&self) -> usize {
        self.tasks.len()
    }

    /// Para todos os jobs, aguarda execuções em andamento e faz um persist
    /// final para que nada aprendido se perca.
    pub async fn shutdown(self) -> LoreResult<usize> {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Maintenance task ended abnormally");
            }
        }

        let flushed = self.target.run_job(MaintenanceJob::Persist).await?;
        info!(flushed, "Maintenance scheduler stopped");
        Ok(flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoreError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct CountingTarget {
        runs: Mutex<HashMap<MaintenanceJob, usize>>,
        fail_prune: bool,
    }

    impl CountingTarget {
        async fn runs(&self, job: MaintenanceJob) -> usize {
            self.runs.lock().await.get(&job).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl MaintenanceTarget for CountingTarget {
        async fn run_job(&self, job: MaintenanceJob) -> LoreResult<usize> {
            *self.runs.lock().await.entry(job).or_insert(0) += 1;
            if self.fail_prune && job == MaintenanceJob::Prune {
                return Err(LoreError::persistence("disk full"));
            }
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_run_on_their_intervals() {
        let target = Arc::new(CountingTarget::default());
        let handle =
            MaintenanceScheduler::new(target.clone(), MaintenanceConfig::default()).start();
        assert_eq!(handle.job_count(), 3);

        tokio::time::sleep(Duration::from_secs(1801)).await;

        assert_eq!(target.runs(MaintenanceJob::Reanalysis).await, 6);
        assert_eq!(target.runs(MaintenanceJob::Prune).await, 1);
        assert_eq!(target.runs(MaintenanceJob::Persist).await, 0);

        handle.shutdown().await.unwrap();
        assert_eq!(target.runs(MaintenanceJob::Persist).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let target = Arc::new(CountingTarget {
            fail_prune: true,
            ..CountingTarget::default()
        });
        let config = MaintenanceConfig {
            prune_interval_secs: 10,
            ..MaintenanceConfig::default()
        };
        let handle = MaintenanceScheduler::new(target.clone(), config).start();

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(target.runs(MaintenanceJob::Prune).await, 3);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_scheduler_still_flushes_on_shutdown() {
        let target = Arc::new(CountingTarget::default());
        let config = MaintenanceConfig {
            enabled: false,
            ..MaintenanceConfig::default()
        };
        let handle = MaintenanceScheduler::new(target.clone(), config).start();
        assert_eq!(handle.job_count(), 0);

        tokio::time::sleep(Duration::from_secs(4000)).await;
        assert_eq!(target.runs(MaintenanceJob::Reanalysis).await, 0);

        handle.shutdown().await.unwrap();
        assert_eq!(target.runs(MaintenanceJob::Persist).await, 1);
    }
}
