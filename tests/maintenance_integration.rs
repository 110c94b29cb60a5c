//! Testes de integração para a manutenção em background.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use lore::knowledge::{CodePattern, KnowledgeExport, PatternSignature, EXPORT_FORMAT_VERSION};
use lore::maintenance::{MaintenanceJob, MaintenanceScheduler};
use lore::storage::RecordSet;
use lore::types::requests::ProjectContext;
use lore::{Config, KnowledgeBase};

fn fast_config() -> Config {
    let mut config = Config::default_config();
    config.maintenance.reanalysis_interval_secs = 10;
    config.maintenance.persist_interval_secs = 60;
    config.maintenance.prune_interval_secs = 30;
    config
}

fn stale_pattern(snippet: &str, frequency: u64, success_rate: f64) -> CodePattern {
    let seen = Utc::now() - chrono::Duration::days(90);
    CodePattern {
        id: PatternSignature::pattern_id(snippet),
        pattern_type: "function".to_string(),
        snippet: snippet.to_string(),
        description: "imported".to_string(),
        frequency,
        success_rate,
        technologies: BTreeSet::new(),
        contexts: BTreeSet::new(),
        metrics: Default::default(),
        created_at: seen,
        last_seen: seen,
    }
}

fn bundle(patterns: Vec<CodePattern>) -> KnowledgeExport {
    KnowledgeExport {
        version: EXPORT_FORMAT_VERSION.to_string(),
        exported_at: Utc::now(),
        patterns,
        outcomes: Vec::new(),
        correlations: Default::default(),
        predictor_weights: Default::default(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_analyzes_queued_samples_and_persists() {
    let kb = Arc::new(KnowledgeBase::in_memory(fast_config()).await.unwrap());
    kb.queue_samples(
        vec!["def handler(event):\n    return event\n".to_string()],
        &ProjectContext::new().with_technologies(["python"]),
    )
    .await
    .unwrap();

    let handle = MaintenanceScheduler::new(kb.clone(), kb.config().maintenance.clone()).start();
    assert_eq!(handle.job_count(), 3);

    // Nada roda antes do primeiro período.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(kb.stats().await.patterns, 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(kb.stats().await.patterns, 1);
    assert_eq!(kb.get_metrics().await.buffered_samples, 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let stored = kb.gateway().count_records(RecordSet::Patterns).await.unwrap();
    assert_eq!(stored, 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_flushes_pending_changes() {
    let mut config = fast_config();
    config.maintenance.persist_interval_secs = 3600;
    let kb = Arc::new(KnowledgeBase::in_memory(config).await.unwrap());

    let handle = MaintenanceScheduler::new(kb.clone(), kb.config().maintenance.clone()).start();
    kb.analyze_patterns(
        &["class Repo:\n    items = []\n".to_string()],
        &ProjectContext::new(),
    )
    .await
    .unwrap();

    handle.shutdown().await.unwrap();

    let stored = kb.gateway().count_records(RecordSet::Patterns).await.unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn test_disabled_scheduler_spawns_nothing() {
    let mut config = fast_config();
    config.maintenance.enabled = false;
    let kb = Arc::new(KnowledgeBase::in_memory(config).await.unwrap());

    let handle = MaintenanceScheduler::new(kb.clone(), kb.config().maintenance.clone()).start();
    assert_eq!(handle.job_count(), 0);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_prune_job_keeps_valuable_patterns() {
    let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
    let doomed = stale_pattern("fn rarely_used() {}", 1, 0.1);
    let frequent = stale_pattern("fn used_a_lot() {}", 9, 0.1);
    let successful = stale_pattern("fn works_well() {}", 1, 0.9);

    let result = kb
        .import_bundle(bundle(vec![doomed.clone(), frequent.clone(), successful.clone()]))
        .await
        .unwrap();
    assert_eq!(result.imported, 3);
    kb.persist().await.unwrap();

    let removed = kb.run_maintenance(MaintenanceJob::Prune).await.unwrap();
    assert_eq!(removed, 1);

    let remaining: Vec<String> = kb
        .export_bundle()
        .await
        .patterns
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert!(!remaining.contains(&doomed.id));
    assert!(remaining.contains(&frequent.id));
    assert!(remaining.contains(&successful.id));

    // A remoção chega ao storage no próximo flush.
    kb.run_maintenance(MaintenanceJob::Persist).await.unwrap();
    let gateway = kb.gateway();
    assert!(gateway
        .get_record(RecordSet::Patterns, &doomed.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(gateway.count_records(RecordSet::Patterns).await.unwrap(), 2);
}

#[tokio::test]
async fn test_every_job_is_idempotent() {
    let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();

    for job in MaintenanceJob::ALL {
        kb.run_maintenance(job).await.unwrap();
        let second = kb.run_maintenance(job).await.unwrap();
        assert_eq!(second, 0, "{} touched items on an idle run", job);
    }
}
