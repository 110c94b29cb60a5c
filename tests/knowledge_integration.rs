//! Testes de integração para a base de conhecimento.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use proptest::prelude::*;
use tempfile::TempDir;

use lore::extract::{CodeExtractor, StructuralExtractor};
use lore::inference::InferenceService;
use lore::knowledge::{CodePattern, PatternSignature, PatternStore, PrunePolicy};
use lore::storage::MemoryGateway;
use lore::types::config::StorageBackend;
use lore::types::requests::{Feedback, ProjectContext, ProjectOutcome};
use lore::types::responses::RecommendationKind;
use lore::{Config, KnowledgeBase, LoreError, LoreResult};

const HANDLER: &str = "def handler(event):\n    return event\n";

/// Backend de inferência que responde todo prompt com uma resposta fixa.
struct StubInference {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl StubInference {
    fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl InferenceService for StubInference {
    fn name(&self) -> &str {
        "stub"
    }

    async fn is_available(&self) -> bool {
        self.reply.is_some()
    }

    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> LoreResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| LoreError::InferenceUnavailable("connection refused".to_string()))
    }
}

async fn with_inference(config: Config, inference: Arc<StubInference>) -> KnowledgeBase {
    let extractor: Arc<dyn CodeExtractor> =
        Arc::new(StructuralExtractor::new(config.learning.max_sample_bytes));
    KnowledgeBase::with_parts(
        config,
        Arc::new(MemoryGateway::new()),
        Some(inference as Arc<dyn InferenceService>),
        extractor,
    )
    .await
    .unwrap()
}

fn rust_context() -> ProjectContext {
    ProjectContext::new().with_technologies(["rust"])
}

fn sqlite_config(dir: &TempDir) -> Config {
    let mut config = Config::default_config();
    config.storage.backend = StorageBackend::Sqlite;
    config.storage.db_path = dir.path().join("lore.db");
    config
}

// ═══════════════════════════════════════════════════════════════════════════
// Poda
// ═══════════════════════════════════════════════════════════════════════════

fn aged_pattern(index: usize, frequency: u64, success_rate: f64, age_days: i64) -> CodePattern {
    let snippet = format!("fn pattern_{}() {{}}", index);
    let now = Utc::now();
    CodePattern {
        id: PatternSignature::pattern_id(&snippet),
        pattern_type: "function".to_string(),
        description: format!("Function: pattern_{}", index),
        snippet,
        frequency,
        success_rate,
        technologies: BTreeSet::new(),
        contexts: BTreeSet::new(),
        metrics: Default::default(),
        created_at: now - Duration::days(age_days),
        last_seen: now - Duration::days(age_days),
    }
}

proptest! {
    #[test]
    fn prune_removes_exactly_the_low_value_patterns(
        specs in prop::collection::vec((1u64..6, 0.0f64..1.0, 0i64..90), 1..40)
    ) {
        let mut store = PatternStore::new();
        let mut expected = BTreeSet::new();

        for (i, (frequency, success_rate, age_days)) in specs.iter().enumerate() {
            let pattern = aged_pattern(i, *frequency, *success_rate, *age_days);
            if *frequency < 2 && *success_rate < 0.5 && *age_days > 30 {
                expected.insert(pattern.id.clone());
            }
            store.insert(pattern);
        }
        let before = store.len();

        let removed: BTreeSet<String> = store
            .prune(&PrunePolicy::default(), Utc::now())
            .into_iter()
            .collect();

        prop_assert_eq!(&removed, &expected);
        prop_assert_eq!(store.len(), before - expected.len());
        prop_assert!(store.iter().all(|p| !expected.contains(&p.id)));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Isolamento de falhas da inferência
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_enrichment_rewrites_descriptions() {
    let mut config = Config::default_config();
    config.learning.enrich_patterns = true;
    let stub = StubInference::answering("Sure:\n[\"Entry point that echoes the event\"]");
    let kb = with_inference(config, stub.clone()).await;

    let report = kb
        .analyze_patterns(&[HANDLER.to_string()], &rust_context())
        .await
        .unwrap();

    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.new_patterns.len(), 1);
    assert_eq!(
        report.new_patterns[0].description,
        "Entry point that echoes the event"
    );
}

#[tokio::test]
async fn test_enrichment_failure_keeps_original_descriptions() {
    let mut config = Config::default_config();
    config.learning.enrich_patterns = true;

    let plain = KnowledgeBase::in_memory(Config::default_config())
        .await
        .unwrap()
        .analyze_patterns(&[HANDLER.to_string()], &rust_context())
        .await
        .unwrap();

    for stub in [
        StubInference::failing(),
        StubInference::answering("no json here"),
        StubInference::answering("[\"one\", \"two\", \"three\"]"),
    ] {
        let kb = with_inference(config.clone(), stub).await;
        let report = kb
            .analyze_patterns(&[HANDLER.to_string()], &rust_context())
            .await
            .unwrap();

        assert_eq!(report.new_patterns.len(), 1);
        assert_eq!(
            report.new_patterns[0].description,
            plain.new_patterns[0].description
        );
    }
}

#[tokio::test]
async fn test_architecture_suggestions_from_inference() {
    let stub = StubInference::answering(
        r#"```json
[{"title": "Split read and write paths", "description": "CQRS", "implementation_steps": ["a", "b"], "estimated_impact": "high"},
 {"title": "Add a cache layer", "description": "Redis", "estimated_impact": "whatever"}]
```"#,
    );
    let kb = with_inference(Config::default_config(), stub).await;

    let recommendations = kb
        .get_recommendations(&rust_context().with_project_type("api_service"))
        .await
        .unwrap();

    assert_eq!(recommendations.len(), 2);
    assert!(recommendations
        .iter()
        .all(|r| r.kind == RecommendationKind::Architecture && r.confidence == 0.75));
    assert_eq!(recommendations[0].implementation_steps, vec!["a", "b"]);
}

#[tokio::test]
async fn test_unavailable_inference_degrades_to_static_sources() {
    let kb = with_inference(Config::default_config(), StubInference::failing()).await;
    for i in 0..6 {
        kb.learn_from_project(
            ProjectOutcome::new(format!("p{}", i), 1.0).with_technologies(["rust", "tokio"]),
        )
        .await
        .unwrap();
    }

    let recommendations = kb.get_recommendations(&rust_context()).await.unwrap();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].id, "tech_rust_tokio");
}

#[tokio::test]
async fn test_malformed_inference_keeps_pattern_and_technology_sources() {
    let stub = StubInference::answering("not json, sorry");
    let kb = with_inference(Config::default_config(), stub.clone()).await;

    let mut pattern_id = String::new();
    for _ in 0..4 {
        let report = kb
            .analyze_patterns(&[HANDLER.to_string()], &rust_context())
            .await
            .unwrap();
        pattern_id = report.patterns_found[0].pattern_id.clone();
    }
    for i in 0..6 {
        kb.learn_from_project(
            ProjectOutcome::new(format!("p{}", i), 1.0).with_technologies(["rust", "tokio"]),
        )
        .await
        .unwrap();
    }

    let recommendations = kb.get_recommendations(&rust_context()).await.unwrap();
    let ids: Vec<&str> = recommendations.iter().map(|r| r.id.as_str()).collect();

    assert!(stub.calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(ids, vec!["tech_rust_tokio".to_string(), format!("pattern_{}", pattern_id)]);
    assert!(recommendations
        .iter()
        .all(|r| r.kind != RecommendationKind::Architecture));
}

// ═══════════════════════════════════════════════════════════════════════════
// Recomendações e previsões
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_recommendations_ranked_by_confidence() {
    let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();

    let mut pattern_id = String::new();
    for _ in 0..4 {
        let report = kb
            .analyze_patterns(&[HANDLER.to_string()], &rust_context())
            .await
            .unwrap();
        pattern_id = report.patterns_found[0].pattern_id.clone();
    }
    for i in 0..6 {
        kb.learn_from_project(
            ProjectOutcome::new(format!("p{}", i), 1.0).with_technologies(["rust", "tokio"]),
        )
        .await
        .unwrap();
    }

    let recommendations = kb.get_recommendations(&rust_context()).await.unwrap();
    let ids: Vec<&str> = recommendations.iter().map(|r| r.id.as_str()).collect();

    assert_eq!(ids, vec!["tech_rust_tokio".to_string(), format!("pattern_{}", pattern_id)]);
    assert!((recommendations[1].confidence - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn test_repeated_query_is_served_from_cache() {
    let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
    for i in 0..6 {
        kb.learn_from_project(
            ProjectOutcome::new(format!("p{}", i), 1.0).with_technologies(["rust", "serde"]),
        )
        .await
        .unwrap();
    }

    let first = kb.get_recommendations(&rust_context()).await.unwrap();
    let second = kb.get_recommendations(&rust_context()).await.unwrap();
    assert_eq!(first, second);

    let metrics = kb.get_metrics().await;
    assert_eq!(metrics.recommendations_made, first.len() as u64);
    assert!(metrics.cache.hit_rate > 0.0);
}

#[tokio::test]
async fn test_empty_knowledge_base_predicts_baseline() {
    let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
    let context = ProjectContext::new()
        .with_technologies(["react", "node", "postgres"])
        .with_project_type("web_application");

    let prediction = kb.predict_outcome(&context).await.unwrap();

    assert_eq!(prediction.predicted_success_score, 0.5);
    assert_eq!(prediction.confidence, 0.5);
    assert!(prediction.similar_projects.is_empty());
    assert!(prediction.risk_factors.is_empty());
    assert_eq!(prediction.estimated_completion_time, 40.0);
}

#[tokio::test]
async fn test_prediction_reports_history() {
    let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
    kb.learn_from_project(
        ProjectOutcome::new("legacy", 0.4)
            .with_technologies(["php", "mysql"])
            .with_project_type("web_application")
            .with_completion_time(80.0)
            .with_issue("slow queries"),
    )
    .await
    .unwrap();

    let context = ProjectContext::new()
        .with_technologies(["php", "mysql", "redis", "nginx", "docker", "varnish"])
        .with_project_type("web_application");
    let prediction = kb.predict_outcome(&context).await.unwrap();

    assert_eq!(prediction.similar_projects.len(), 1);
    assert_eq!(prediction.potential_issues, vec!["slow queries"]);
    assert!(prediction
        .risk_factors
        .contains(&"High technology complexity".to_string()));
    assert!(prediction
        .risk_factors
        .contains(&"Historical issues in similar projects".to_string()));
    assert_ne!(prediction.confidence, 0.5);
}

#[tokio::test]
async fn test_correlations_stay_symmetric() {
    let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
    let stacks: [&[&str]; 3] = [
        &["rust", "tokio", "serde"],
        &["python", "django", "postgres"],
        &["rust", "postgres"],
    ];
    for (i, stack) in stacks.iter().enumerate() {
        kb.learn_from_project(
            ProjectOutcome::new(format!("p{}", i), 0.3 * (i + 1) as f64)
                .with_technologies(stack.iter().copied()),
        )
        .await
        .unwrap();
    }

    let matrix = kb.export_bundle().await.correlations;
    assert!(!matrix.is_empty());
    for (t1, row) in &matrix {
        assert!(!row.contains_key(t1));
        for (t2, score) in row {
            assert_eq!(matrix[t2][t1], *score, "{} / {}", t1, t2);
        }
    }
}

#[tokio::test]
async fn test_relearning_a_project_replaces_it() {
    let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
    kb.learn_from_project(ProjectOutcome::new("shop", 0.2).with_technologies(["vue"]))
        .await
        .unwrap();
    kb.learn_from_project(ProjectOutcome::new("shop", 0.9).with_technologies(["vue"]))
        .await
        .unwrap();

    assert_eq!(kb.stats().await.project_outcomes, 1);

    let prediction = kb
        .predict_outcome(&ProjectContext::new().with_technologies(["vue"]))
        .await
        .unwrap();
    assert_eq!(prediction.similar_projects.len(), 1);
    assert_eq!(prediction.similar_projects[0].success_score, 0.9);
}

// ═══════════════════════════════════════════════════════════════════════════
// Persistência
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_sqlite_state_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let (pattern_id, prediction) = {
        let kb = KnowledgeBase::open(sqlite_config(&dir)).await.unwrap();
        let report = kb
            .analyze_patterns(&[HANDLER.to_string()], &rust_context())
            .await
            .unwrap();
        kb.learn_from_project(
            ProjectOutcome::new("api", 0.8)
                .with_technologies(["rust", "axum"])
                .with_patterns_used([report.patterns_found[0].pattern_id.clone()]),
        )
        .await
        .unwrap();
        kb.submit_feedback(Feedback::new("tech_rust_axum", 5))
            .await
            .unwrap();

        kb.persist().await.unwrap();
        let prediction = kb.predict_outcome(&rust_context()).await.unwrap();
        (report.patterns_found[0].pattern_id.clone(), prediction)
    };

    let kb = KnowledgeBase::open(sqlite_config(&dir)).await.unwrap();
    let stats = kb.stats().await;
    assert_eq!(stats.patterns, 1);
    assert_eq!(stats.project_outcomes, 1);
    assert_eq!(stats.feedback_entries, 1);
    assert_eq!(stats.technology_correlations, 2);

    let bundle = kb.export_bundle().await;
    let pattern = bundle.patterns.iter().find(|p| p.id == pattern_id).unwrap();
    assert!(pattern.technologies.contains("axum"));

    let reloaded = kb.predict_outcome(&rust_context()).await.unwrap();
    assert!((reloaded.predicted_success_score - prediction.predicted_success_score).abs() < 1e-9);
    assert_eq!(kb.get_metrics().await.recommendation_accuracy, 1.0);
}

#[test]
fn test_metrics_on_fresh_knowledge_base() {
    let metrics = tokio_test::block_on(async {
        let kb = KnowledgeBase::in_memory(Config::default_config())
            .await
            .unwrap();
        kb.get_metrics().await
    });

    assert_eq!(metrics.patterns_learned, 0);
    assert_eq!(metrics.projects_analyzed, 0);
    assert_eq!(metrics.model_version, "1.0");
    assert_eq!(metrics.learning_rate, 0.01);
}
