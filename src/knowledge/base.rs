//! KnowledgeBase - o serviço de aprendizado de longa duração.
//!
//! Um único valor por processo é dono de todos os mapas aprendidos. Handlers de
//! requisição e os jobs de manutenção o compartilham via `Arc`. Cada mapa fica
//! atrás do seu próprio lock, adquirido na ordem patterns, outcomes, correlations,
//! predictor, feedback. Os handlers terminam todos os awaits (extração,
//! enriquecimento) antes de pegar locks de escrita e gravam em uma seção
//! síncrona, então uma chamada cancelada nunca deixa uma atualização pela metade.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extract::{CodeExtractor, PatternCandidate, StructuralExtractor};
use crate::inference::{self, extract_json_array, InferenceService};
use crate::maintenance::{MaintenanceJob, MaintenanceTarget};
use crate::storage::{
    self, with_deadline, PersistenceGateway, RecordSet, SnapshotKind, StoredRecord,
    SCHEMA_VERSION,
};
use crate::types::config::Config;
use crate::types::requests::{Feedback, LearningTask, ProjectContext, ProjectOutcome};
use crate::types::responses::{
    AnalysisReport, CacheMetrics, FeedbackReceipt, KnowledgeBaseStats, LearnReport,
    LearningMetrics, NewPattern, PatternHit, PatternImprovement, PatternSuggestion, Prediction,
    QueueReceipt, Recommendation, SimilarProject, SkippedSample, TaskResponse,
};
use crate::{LoreError, LoreResult};

use super::correlation::{CorrelationLearner, CorrelationMatrix};
use super::outcomes::OutcomeStore;
use super::patterns::{CodePattern, PatternStore, PrunePolicy};
use super::predictor::{
    config_features, outcome_features, PredictorWeights, SuccessPredictor, USES_PREFIX,
};
use super::recommend::RecommendationEngine;

/// Versão reportada por `get_metrics`.
pub const MODEL_VERSION: &str = "1.0";

/// Número de patterns conhecidos semelhantes sugeridos após uma análise.
const ANALYSIS_SUGGESTIONS: usize = 3;

const ENRICHMENT_SYSTEM_PROMPT: &str = "You are an experienced software architect \
skilled at code analysis. Improve the description of each code pattern: say what it is \
for, when to use it and how good a practice it is.";

/// Amostra aguardando o job de re-análise.
#[derive(Debug, Clone)]
struct QueuedSample {
    code: String,
    context: ProjectContext,
}

/// Feedback armazenado mais os ids ainda não gravados.
#[derive(Debug, Default)]
pub(super) struct FeedbackLog {
    entries: BTreeMap<String, Feedback>,
    dirty: BTreeSet<String>,
}

impl FeedbackLog {
    fn from_entries(entries: impl IntoIterator<Item = Feedback>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|f| (f.feedback_id.clone(), f))
                .collect(),
            dirty: BTreeSet::new(),
        }
    }

    fn record(&mut self, feedback: Feedback) {
        self.dirty.insert(feedback.feedback_id.clone());
        self.entries.insert(feedback.feedback_id.clone(), feedback);
    }

    /// Fração das notas 4 ou mais.
    fn accuracy(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let positive = self.entries.values().filter(|f| f.is_positive()).count();
        positive as f64 / self.entries.len() as f64
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn take_dirty(&mut self) -> Vec<Feedback> {
        std::mem::take(&mut self.dirty)
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    fn requeue<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        self.dirty.extend(ids.into_iter().map(str::to_string));
    }
}

#[derive(Debug, Default)]
struct Counters {
    patterns_learned: AtomicU64,
    projects_analyzed: AtomicU64,
    recommendations_made: AtomicU64,
}

/// O que uma execução de persist gravou.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistReport {
    pub patterns_written: usize,
    pub patterns_deleted: usize,
    pub outcomes_written: usize,
    pub feedback_written: usize,
    pub snapshots_written: usize,
}

impl PersistReport {
    pub fn total(&self) -> usize {
        self.patterns_written
            + self.patterns_deleted
            + self.outcomes_written
            + self.feedback_written
            + self.snapshots_written
    }
}

/// O serviço adaptativo de conhecimento e recomendações.
pub struct KnowledgeBase {
    pub(super) config: Config,
    gateway: Arc<dyn PersistenceGateway>,
    extractor: Arc<dyn CodeExtractor>,
    inference: Option<Arc<dyn InferenceService>>,
    engine: RecommendationEngine,
    pub(super) patterns: RwLock<PatternStore>,
    pub(super) outcomes: RwLock<OutcomeStore>,
    pub(super) correlations: RwLock<CorrelationLearner>,
    pub(super) predictor: RwLock<SuccessPredictor>,
    feedback: RwLock<FeedbackLog>,
    samples: RwLock<VecDeque<QueuedSample>>,
    counters: Counters,
    pub(super) snapshots_dirty: AtomicBool,
    storage_timeout: Duration,
    inference_timeout: Duration,
}

impl KnowledgeBase {
    /// Abre o gateway e o backend de inferência configurados e carrega
    /// tudo que foi persistido antes.
    pub async fn open(config: Config) -> LoreResult<Self> {
        config.validate()?;
        let gateway = storage::open_gateway(&config.storage)?;
        let inference = inference::from_config(&config.inference)?;
        let extractor: Arc<dyn CodeExtractor> =
            Arc::new(StructuralExtractor::new(config.learning.max_sample_bytes));
        Self::with_parts(config, gateway, inference, extractor).await
    }

    /// Monta o serviço a partir de colaboradores explícitos.
    ///
    /// Registros indecodificáveis são ignorados; um snapshot ausente, corrompido
    /// ou desatualizado começa aquele mapa vazio. Ambos viram warnings no log.
    pub async fn with_parts(
        config: Config,
        gateway: Arc<dyn PersistenceGateway>,
        inference: Option<Arc<dyn InferenceService>>,
        extractor: Arc<dyn CodeExtractor>,
    ) -> LoreResult<Self> {
        let storage_timeout = Duration::from_secs(config.storage.timeout_secs);
        let inference_timeout = Duration::from_secs(config.inference.timeout_secs);
        let gw = gateway.as_ref();

        let patterns: Vec<CodePattern> =
            load_records(gw, RecordSet::Patterns, storage_timeout).await?;
        let outcomes: Vec<ProjectOutcome> =
            load_records(gw, RecordSet::Outcomes, storage_timeout).await?;
        let feedback: Vec<Feedback> =
            load_records(gw, RecordSet::Feedback, storage_timeout).await?;

        let frequencies: BTreeMap<String, u64> =
            load_snapshot(gw, SnapshotKind::PatternFrequencies, storage_timeout).await;
        let matrix: CorrelationMatrix =
            load_snapshot(gw, SnapshotKind::Correlations, storage_timeout).await;
        let weights: PredictorWeights =
            load_snapshot(gw, SnapshotKind::PredictorWeights, storage_timeout).await;

        info!(
            gateway = gateway.name(),
            patterns = patterns.len(),
            outcomes = outcomes.len(),
            feedback = feedback.len(),
            correlations = matrix.len(),
            predictors = weights.len(),
            inference = inference.as_ref().map(|i| i.name()).unwrap_or("disabled"),
            "Knowledge base loaded"
        );

        let counters = Counters::default();
        counters
            .patterns_learned
            .store(patterns.len() as u64, Ordering::Relaxed);
        counters
            .projects_analyzed
            .store(outcomes.len() as u64, Ordering::Relaxed);

        let engine = RecommendationEngine::new(
            config.recommendations.clone(),
            &config.cache,
            inference.clone(),
            inference_timeout,
        );

        Ok(Self {
            patterns: RwLock::new(PatternStore::from_parts(patterns, frequencies)),
            outcomes: RwLock::new(OutcomeStore::from_outcomes(outcomes)),
            correlations: RwLock::new(CorrelationLearner::from_matrix(
                matrix,
                config.learning.correlation_step,
            )),
            predictor: RwLock::new(SuccessPredictor::from_weights(
                weights,
                config.learning.learning_rate,
            )),
            feedback: RwLock::new(FeedbackLog::from_entries(feedback)),
            samples: RwLock::new(VecDeque::new()),
            counters,
            snapshots_dirty: AtomicBool::new(false),
            config,
            gateway,
            extractor,
            inference,
            engine,
            storage_timeout,
            inference_timeout,
        })
    }

    /// Serviço em memória sem inferência, para testes e execuções avulsas.
    pub async fn in_memory(config: Config) -> LoreResult<Self> {
        let extractor: Arc<dyn CodeExtractor> =
            Arc::new(StructuralExtractor::new(config.learning.max_sample_bytes));
        Self::with_parts(
            config,
            Arc::new(storage::MemoryGateway::new()),
            None,
            extractor,
        )
        .await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    pub fn inference(&self) -> Option<&Arc<dyn InferenceService>> {
        self.inference.as_ref()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Aprendizado de patterns
    // ═══════════════════════════════════════════════════════════════════════

    /// Extrai e aprende patterns de todas as amostras.
    ///
    /// Amostras inutilizáveis são reportadas em `skipped_samples`; o resto do
    /// lote é aprendido mesmo assim.
    pub async fn analyze_patterns(
        &self,
        code_samples: &[String],
        context: &ProjectContext,
    ) -> LoreResult<AnalysisReport> {
        context.validate()?;

        let mut report = AnalysisReport {
            samples_analyzed: code_samples.len(),
            ..AnalysisReport::default()
        };

        let mut extracted: Vec<(usize, Vec<PatternCandidate>)> = Vec::new();
        for (index, sample) in code_samples.iter().enumerate() {
            match self.extractor.extract(sample) {
                Ok(candidates) => extracted.push((index, candidates)),
                Err(e) => {
                    debug!(sample_index = index, error = %e, "Skipping sample");
                    report.skipped_samples.push(SkippedSample {
                        sample_index: index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if self.config.learning.enrich_patterns {
            if let Some(inference) = &self.inference {
                for (_, candidates) in extracted.iter_mut() {
                    let original = std::mem::take(candidates);
                    *candidates = self.enrich(inference.as_ref(), original, context).await;
                }
            }
        }

        let mut candidate_types = BTreeSet::new();
        {
            let mut patterns = self.patterns.write().await;

            for (index, candidates) in &extracted {
                for candidate in candidates {
                    let upserted = patterns.upsert(candidate, context);
                    candidate_types.insert(candidate.pattern_type.clone());

                    report.patterns_found.push(PatternHit {
                        pattern_id: upserted.id.clone(),
                        pattern_type: candidate.pattern_type.clone(),
                        sample_index: *index,
                    });

                    if upserted.created {
                        report.new_patterns.push(NewPattern {
                            pattern_id: upserted.id,
                            pattern_type: candidate.pattern_type.clone(),
                            description: candidate.description.clone(),
                        });
                    } else {
                        report.pattern_improvements.push(PatternImprovement {
                            pattern_id: upserted.id,
                            frequency: upserted.frequency,
                            success_rate: upserted.success_rate,
                        });
                    }
                }
            }

            report.recommendations = patterns
                .find_similar(&candidate_types, context)
                .into_iter()
                .take(ANALYSIS_SUGGESTIONS)
                .map(|pattern| PatternSuggestion {
                    pattern_id: pattern.id.clone(),
                    kind: "similar_pattern".to_string(),
                    title: format!("Consider pattern: {}", pattern.description),
                    description: format!(
                        "Similar to patterns in use, with a {:.0}% success rate",
                        pattern.success_rate * 100.0
                    ),
                    confidence: pattern.success_rate * 0.8,
                })
                .collect();
        }

        self.counters
            .patterns_learned
            .fetch_add(report.new_patterns.len() as u64, Ordering::Relaxed);
        if !report.patterns_found.is_empty() {
            self.snapshots_dirty.store(true, Ordering::SeqCst);
        }

        info!(
            samples = report.samples_analyzed,
            found = report.patterns_found.len(),
            new = report.new_patterns.len(),
            skipped = report.skipped_samples.len(),
            "Patterns analyzed"
        );

        Ok(report)
    }

    /// Análise de patterns com o foco do contexto em segurança.
    pub async fn security_pattern_analysis(
        &self,
        code_samples: &[String],
        context: &ProjectContext,
    ) -> LoreResult<AnalysisReport> {
        let context = context
            .clone()
            .with_requirement("focus", Value::from("security"));
        self.analyze_patterns(code_samples, &context).await
    }

    /// Coloca amostras no buffer do job de re-análise, descartando as mais antigas quando cheio.
    pub async fn queue_samples(
        &self,
        code_samples: Vec<String>,
        context: &ProjectContext,
    ) -> LoreResult<QueueReceipt> {
        context.validate()?;

        let accepted = code_samples.len();
        let limit = self.config.learning.max_samples_buffered;
        let mut dropped = 0;

        let mut buffer = self.samples.write().await;
        for code in code_samples {
            buffer.push_back(QueuedSample {
                code,
                context: context.clone(),
            });
        }
        while buffer.len() > limit {
            buffer.pop_front();
            dropped += 1;
        }

        if dropped > 0 {
            warn!(dropped, limit, "Sample buffer full, dropped oldest samples");
        }

        Ok(QueueReceipt {
            accepted,
            dropped,
            buffered: buffer.len(),
        })
    }

    /// Analisa todas as amostras na fila; retorna quantos patterns foram vistos.
    pub async fn reanalyze(&self) -> LoreResult<usize> {
        let queued: Vec<QueuedSample> = self.samples.write().await.drain(..).collect();
        if queued.is_empty() {
            debug!("No queued samples to analyze");
            return Ok(0);
        }

        let mut found = 0;
        for sample in &queued {
            match self
                .analyze_patterns(std::slice::from_ref(&sample.code), &sample.context)
                .await
            {
                Ok(report) => found += report.patterns_found.len(),
                Err(e) => warn!(error = %e, "Queued sample could not be analyzed"),
            }
        }

        info!(samples = queued.len(), found, "Queued samples analyzed");
        Ok(found)
    }

    async fn enrich(
        &self,
        inference: &dyn InferenceService,
        candidates: Vec<PatternCandidate>,
        context: &ProjectContext,
    ) -> Vec<PatternCandidate> {
        if candidates.is_empty() {
            return candidates;
        }

        match self.request_enrichment(inference, &candidates, context).await {
            Ok(descriptions) if descriptions.len() == candidates.len() => candidates
                .into_iter()
                .zip(descriptions)
                .map(|(mut candidate, description)| {
                    if let Some(description) = description {
                        candidate.description = description;
                    }
                    candidate
                })
                .collect(),
            Ok(descriptions) => {
                warn!(
                    expected = candidates.len(),
                    received = descriptions.len(),
                    "Enrichment answer does not line up, keeping original descriptions"
                );
                candidates
            }
            Err(e) => {
                warn!(backend = inference.name(), error = %e, "Pattern enrichment unavailable");
                candidates
            }
        }
    }

    async fn request_enrichment(
        &self,
        inference: &dyn InferenceService,
        candidates: &[PatternCandidate],
        context: &ProjectContext,
    ) -> LoreResult<Vec<Option<String>>> {
        let user_prompt = format!(
            "Patterns:\n{}\n\nContext:\n{}\n\n\
             Answer with a JSON array holding one improved description string per \
             pattern, in the same order.",
            serde_json::to_string_pretty(candidates)?,
            serde_json::to_string_pretty(context)?
        );

        let raw = tokio::time::timeout(
            self.inference_timeout,
            inference.complete(ENRICHMENT_SYSTEM_PROMPT, &user_prompt),
        )
        .await
        .map_err(|_| {
            LoreError::InferenceUnavailable(format!(
                "no answer within {:?}",
                self.inference_timeout
            ))
        })??;

        Ok(extract_json_array(&raw)?
            .into_iter()
            .map(|item| match item {
                Value::String(text) if !text.trim().is_empty() => Some(text),
                Value::Object(map) => map
                    .get("description")
                    .and_then(Value::as_str)
                    .filter(|text| !text.trim().is_empty())
                    .map(str::to_string),
                _ => None,
            })
            .collect())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Outcomes de projetos
    // ═══════════════════════════════════════════════════════════════════════

    /// Registra um projeto concluído e atualiza os modelos de correlação e
    /// do preditor.
    ///
    /// Registrar um `project_id` existente substitui o outcome anterior.
    pub async fn learn_from_project(&self, outcome: ProjectOutcome) -> LoreResult<LearnReport> {
        outcome.validate()?;

        let features = outcome_features(&outcome);
        let record = StoredRecord::from_value(outcome.project_id.clone(), &outcome)?;
        let report = LearnReport {
            project_id: outcome.project_id.clone(),
            patterns_updated: 0,
            success_score: outcome.success_score,
        };

        let patterns_updated = {
            let mut patterns = self.patterns.write().await;
            let mut outcomes = self.outcomes.write().await;
            let mut correlations = self.correlations.write().await;
            let mut predictor = self.predictor.write().await;

            let linked = outcome
                .patterns_used
                .iter()
                .filter(|id| {
                    patterns.link_outcome(id, &outcome.technologies, &outcome.project_type)
                })
                .count();
            correlations.observe(&outcome);
            predictor.update(&features, outcome.success_score);
            if outcomes.record(outcome).is_some() {
                debug!(project_id = %report.project_id, "Replaced earlier outcome");
            }
            linked
        };

        self.counters
            .projects_analyzed
            .fetch_add(1, Ordering::Relaxed);
        self.snapshots_dirty.store(true, Ordering::SeqCst);
        self.write_in_background(RecordSet::Outcomes, record);

        info!(
            project_id = %report.project_id,
            success_score = report.success_score,
            patterns_updated,
            "Learned from project"
        );

        Ok(LearnReport {
            patterns_updated,
            ..report
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Consultas
    // ═══════════════════════════════════════════════════════════════════════

    /// Recomendações ranqueadas para `context`, no máximo `max_results`.
    pub async fn get_recommendations(
        &self,
        context: &ProjectContext,
    ) -> LoreResult<Vec<Recommendation>> {
        context.validate()?;

        let result = self
            .engine
            .recommend(context, &self.patterns, &self.correlations)
            .await?;

        if result.fresh {
            self.counters
                .recommendations_made
                .fetch_add(result.recommendations.len() as u64, Ordering::Relaxed);
            self.log_recommendations(context, &result.recommendations);
        }

        Ok(result.recommendations)
    }

    /// Prevê como um projeto planejado vai se sair.
    pub async fn predict_outcome(&self, config: &ProjectContext) -> LoreResult<Prediction> {
        config.validate()?;

        let features = config_features(config);
        let outcomes = self.outcomes.read().await;
        let correlations = self.correlations.read().await;
        let predictor = self.predictor.read().await;

        let (predicted_success_score, confidence) = predictor.predict(&features);
        let similar_projects = outcomes.find_similar(config);

        let mut risk_factors = Vec::new();
        if config.technologies.len() > 5 {
            risk_factors.push("High technology complexity".to_string());
        }
        if similar_projects
            .iter()
            .any(|p| !p.issues_encountered.is_empty())
        {
            risk_factors.push("Historical issues in similar projects".to_string());
        }

        let proven: Vec<&str> = config
            .technologies
            .iter()
            .filter(|t| predictor.weight(&format!("{USES_PREFIX}{t}")) > 0.7)
            .map(String::as_str)
            .collect();
        let success_factors = if proven.is_empty() {
            Vec::new()
        } else {
            vec![format!("Using proven technologies: {}", proven.join(", "))]
        };

        let mut recommended = BTreeSet::new();
        for tech in &config.technologies {
            if let Some(row) = correlations.get_correlated(tech) {
                recommended.extend(
                    row.iter()
                        .filter(|(other, score)| {
                            **score > self.config.recommendations.technology_min_correlation
                                && !config.technologies.contains(*other)
                        })
                        .map(|(other, _)| other.clone()),
                );
            }
        }

        let mut potential_issues: Vec<String> = Vec::new();
        for issue in similar_projects.iter().flat_map(|p| &p.issues_encountered) {
            if !potential_issues.contains(issue) {
                potential_issues.push(issue.clone());
            }
        }

        Ok(Prediction {
            predicted_success_score,
            confidence,
            risk_factors,
            success_factors,
            estimated_completion_time: estimate_completion_time(config, &similar_projects),
            similar_projects,
            recommended_technologies: recommended.into_iter().collect(),
            potential_issues,
        })
    }

    /// Armazena uma nota para uma recomendação.
    pub async fn submit_feedback(&self, feedback: Feedback) -> LoreResult<FeedbackReceipt> {
        feedback.validate()?;

        let record = StoredRecord::from_value(feedback.feedback_id.clone(), &feedback)?;
        let receipt = {
            let mut log = self.feedback.write().await;
            let receipt = FeedbackReceipt {
                feedback_id: feedback.feedback_id.clone(),
                recommendation_id: feedback.recommendation_id.clone(),
                recommendation_accuracy: 0.0,
            };
            log.record(feedback);
            FeedbackReceipt {
                recommendation_accuracy: log.accuracy(),
                ..receipt
            }
        };

        self.write_in_background(RecordSet::Feedback, record);
        info!(
            feedback_id = %receipt.feedback_id,
            recommendation_id = %receipt.recommendation_id,
            "Feedback recorded"
        );

        Ok(receipt)
    }

    /// Contagem de entradas de cada mapa aprendido.
    pub async fn stats(&self) -> KnowledgeBaseStats {
        let patterns = self.patterns.read().await;
        let outcomes = self.outcomes.read().await;
        let correlations = self.correlations.read().await;
        let predictor = self.predictor.read().await;
        let feedback = self.feedback.read().await;

        KnowledgeBaseStats {
            patterns: patterns.len(),
            project_outcomes: outcomes.len(),
            technology_correlations: correlations.len(),
            success_predictors: predictor.len(),
            feedback_entries: feedback.len(),
        }
    }

    /// Métricas de aprendizado e estatísticas da base de conhecimento.
    pub async fn get_metrics(&self) -> LearningMetrics {
        let cache = self.engine.cache_stats().await;
        let buffered_samples = self.samples.read().await.len();
        let recommendation_accuracy = self.feedback.read().await.accuracy();
        let knowledge_base_stats = self.stats().await;

        let pattern_distribution = self.patterns.read().await.distribution();
        let technology_success_rates = self.outcomes.read().await.technology_success_rates();

        LearningMetrics {
            patterns_learned: self.counters.patterns_learned.load(Ordering::Relaxed),
            projects_analyzed: self.counters.projects_analyzed.load(Ordering::Relaxed),
            recommendations_made: self.counters.recommendations_made.load(Ordering::Relaxed),
            recommendation_accuracy,
            knowledge_base_size: knowledge_base_stats.patterns
                + knowledge_base_stats.project_outcomes,
            learning_rate: self.config.learning.learning_rate,
            model_version: MODEL_VERSION.to_string(),
            knowledge_base_stats,
            pattern_distribution,
            technology_success_rates,
            cache: CacheMetrics {
                size: cache.size,
                capacity: cache.capacity,
                hit_rate: cache.hit_rate(),
            },
            buffered_samples,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Manutenção
    // ═══════════════════════════════════════════════════════════════════════

    /// Faz flush dos deltas pendentes e dos snapshots de pesos.
    ///
    /// Tudo que falhar ao gravar volta a ficar pendente e é tentado de novo na
    /// próxima execução; o estado em memória continua sendo a referência.
    pub async fn persist(&self) -> LoreResult<PersistReport> {
        // Payloads e a flag de sujo são capturados sob os mesmos locks; um
        // commit depois deste bloco marca a flag de novo.
        let (snapshots, snapshots_due, changes, outcomes, feedback) = {
            let mut patterns = self.patterns.write().await;
            let mut outcomes = self.outcomes.write().await;
            let correlations = self.correlations.read().await;
            let predictor = self.predictor.read().await;
            let mut feedback = self.feedback.write().await;

            let snapshots = snapshot_payloads(&patterns, &correlations, &predictor)?;
            let changes = patterns.take_changes();
            let due = self.snapshots_dirty.swap(false, Ordering::SeqCst) || !changes.is_empty();
            (snapshots, due, changes, outcomes.take_dirty(), feedback.take_dirty())
        };

        let mut report = PersistReport::default();
        let mut failures: Vec<String> = Vec::new();

        let upserted = self
            .write_records(RecordSet::Patterns, &changes.upserts, |p| &p.id)
            .await;
        let deleted = if changes.removed.is_empty() {
            Ok(())
        } else {
            with_deadline(
                self.storage_timeout,
                "pattern delete",
                self.gateway
                    .delete_records(RecordSet::Patterns, changes.removed.clone()),
            )
            .await
        };
        match (upserted, deleted) {
            (Ok(written), Ok(())) => {
                report.patterns_written = written;
                report.patterns_deleted = changes.removed.len();
            }
            (upserted, deleted) => {
                for e in [upserted.err(), deleted.err()].into_iter().flatten() {
                    failures.push(e.to_string());
                }
                self.patterns.write().await.requeue(&changes);
            }
        }

        match self
            .write_records(RecordSet::Outcomes, &outcomes, |o| &o.project_id)
            .await
        {
            Ok(written) => report.outcomes_written = written,
            Err(e) => {
                failures.push(e.to_string());
                self.outcomes
                    .write()
                    .await
                    .requeue(outcomes.iter().map(|o| o.project_id.as_str()));
            }
        }

        match self
            .write_records(RecordSet::Feedback, &feedback, |f| &f.feedback_id)
            .await
        {
            Ok(written) => report.feedback_written = written,
            Err(e) => {
                failures.push(e.to_string());
                self.feedback
                    .write()
                    .await
                    .requeue(feedback.iter().map(|f| f.feedback_id.as_str()));
            }
        }

        if snapshots_due {
            for (kind, payload) in snapshots {
                match with_deadline(
                    self.storage_timeout,
                    "snapshot save",
                    self.gateway.save_snapshot(kind, payload),
                )
                .await
                {
                    Ok(()) => report.snapshots_written += 1,
                    Err(e) => {
                        failures.push(format!("{}: {}", kind, e));
                        self.snapshots_dirty.store(true, Ordering::SeqCst);
                    }
                }
            }
        }

        if failures.is_empty() {
            debug!(written = report.total(), "Knowledge base persisted");
            Ok(report)
        } else {
            Err(LoreError::persistence(failures.join("; ")))
        }
    }

    /// Remove patterns de baixo valor considerando o instante atual.
    pub async fn prune(&self) -> usize {
        self.prune_at(Utc::now()).await
    }

    /// Remove patterns de baixo valor considerando `now`.
    pub async fn prune_at(&self, now: DateTime<Utc>) -> usize {
        let policy = PrunePolicy::from_config(&self.config.maintenance);
        let removed = self.patterns.write().await.prune(&policy, now);
        let expired = self.engine.cleanup_cache().await;

        if !removed.is_empty() {
            info!(count = removed.len(), "Pruned patterns");
        }
        debug!(expired, "Dropped expired recommendation cache entries");
        removed.len()
    }

    /// Executa um job de manutenção agora.
    pub async fn run_maintenance(&self, job: MaintenanceJob) -> LoreResult<usize> {
        match job {
            MaintenanceJob::Reanalysis => self.reanalyze().await,
            MaintenanceJob::Persist => self.persist().await.map(|r| r.total()),
            MaintenanceJob::Prune => Ok(self.prune().await),
        }
    }

    async fn write_records<T: Serialize>(
        &self,
        set: RecordSet,
        items: &[T],
        id_of: impl Fn(&T) -> &String,
    ) -> LoreResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let records = items
            .iter()
            .map(|item| StoredRecord::from_value(id_of(item).clone(), item))
            .collect::<LoreResult<Vec<_>>>()?;
        let count = records.len();

        with_deadline(
            self.storage_timeout,
            "record flush",
            self.gateway.upsert_records(set, records),
        )
        .await?;
        Ok(count)
    }

    /// Grava um registro fora do caminho da requisição. O registro continua pendente
    /// em memória, então uma falha aqui é refeita pelo job de persist.
    fn write_in_background(&self, set: RecordSet, record: StoredRecord) {
        let gateway = Arc::clone(&self.gateway);
        let deadline = self.storage_timeout;
        tokio::spawn(async move {
            let id = record.id.clone();
            if let Err(e) = with_deadline(deadline, "record write", gateway.upsert_record(set, record)).await {
                warn!(set = %set, id = %id, error = %e, "Write failed, will retry on next persist");
            }
        });
    }

    fn log_recommendations(&self, context: &ProjectContext, recommendations: &[Recommendation]) {
        let entry = json!({
            "context": context,
            "recommendation_ids": recommendations.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            "logged_at": Utc::now(),
        });
        match StoredRecord::from_value(Uuid::new_v4().to_string(), &entry) {
            Ok(record) => {
                let gateway = Arc::clone(&self.gateway);
                let deadline = self.storage_timeout;
                tokio::spawn(async move {
                    if let Err(e) = with_deadline(
                        deadline,
                        "recommendation log",
                        gateway.upsert_record(RecordSet::RecommendationsLog, record),
                    )
                    .await
                    {
                        warn!(error = %e, "Could not log recommendations");
                    }
                });
            }
            Err(e) => warn!(error = %e, "Could not encode recommendation log entry"),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Despacho de tarefas
    // ═══════════════════════════════════════════════════════════════════════

    /// Executa uma tarefa e embrulha o resultado; nunca falha.
    pub async fn dispatch(&self, task: LearningTask) -> TaskResponse {
        let task_type = task.task_type();

        let result = match task {
            LearningTask::AnalyzePatterns {
                code_samples,
                context,
            } => self
                .analyze_patterns(&code_samples, &context)
                .await
                .map(|r| TaskResponse::ok("Pattern analysis completed", &r)),
            LearningTask::SecurityPatternAnalysis {
                code_samples,
                context,
            } => self
                .security_pattern_analysis(&code_samples, &context)
                .await
                .map(|r| TaskResponse::ok("Security pattern analysis completed", &r)),
            LearningTask::QueueSamples {
                code_samples,
                context,
            } => self
                .queue_samples(code_samples, &context)
                .await
                .map(|r| TaskResponse::ok("Samples queued for analysis", &r)),
            LearningTask::LearnFromProject { project_data } => self
                .learn_from_project(project_data)
                .await
                .map(|r| TaskResponse::ok("Project learning completed", &r)),
            LearningTask::GetRecommendations { context } => self
                .get_recommendations(&context)
                .await
                .map(|r| TaskResponse::ok("Recommendations generated", &r)),
            LearningTask::PredictOutcome { project_config } => self
                .predict_outcome(&project_config)
                .await
                .map(|r| TaskResponse::ok("Project outcome prediction completed", &r)),
            LearningTask::SubmitFeedback { feedback } => self
                .submit_feedback(feedback)
                .await
                .map(|r| TaskResponse::ok("Feedback recorded", &r)),
            LearningTask::GetMetrics => Ok(TaskResponse::ok(
                "Learning metrics retrieved",
                &self.get_metrics().await,
            )),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                warn!(task_type, error = %e, "Task failed");
                TaskResponse::from_error(&e)
            }
        }
    }

    /// Interpreta uma tarefa bruta com tag e a executa.
    pub async fn dispatch_value(&self, value: Value) -> TaskResponse {
        match LearningTask::from_value(value) {
            Ok(task) => self.dispatch(task).await,
            Err(e) => {
                warn!(error = %e, "Rejected task");
                TaskResponse::from_error(&e)
            }
        }
    }

    /// Executa uma tarefa sob um prazo. Uma tarefa que o perde não grava nada.
    pub async fn dispatch_with_deadline(&self, task: LearningTask, deadline: Duration) -> TaskResponse {
        let task_type = task.task_type();
        match tokio::time::timeout(deadline, self.dispatch(task)).await {
            Ok(response) => response,
            Err(_) => {
                warn!(task_type, ?deadline, "Task deadline exceeded");
                TaskResponse::from_error(&LoreError::DeadlineExceeded(format!(
                    "{} did not finish within {:?}",
                    task_type, deadline
                )))
            }
        }
    }
}

#[async_trait]
impl MaintenanceTarget for KnowledgeBase {
    async fn run_job(&self, job: MaintenanceJob) -> LoreResult<usize> {
        self.run_maintenance(job).await
    }
}

fn snapshot_payloads(
    patterns: &PatternStore,
    correlations: &CorrelationLearner,
    predictor: &SuccessPredictor,
) -> LoreResult<Vec<(SnapshotKind, String)>> {
    Ok(vec![
        (
            SnapshotKind::PatternFrequencies,
            serde_json::to_string(patterns.type_frequencies())?,
        ),
        (
            SnapshotKind::Correlations,
            serde_json::to_string(correlations.matrix())?,
        ),
        (
            SnapshotKind::PredictorWeights,
            serde_json::to_string(predictor.weights())?,
        ),
    ])
}

/// Horas que um projeto planejado deve levar.
///
/// Parte de uma base por tipo, faz a média com os tempos reais de projetos
/// semelhantes quando existem e depois escala pelo tamanho da stack.
pub fn estimate_completion_time(config: &ProjectContext, similar: &[SimilarProject]) -> f64 {
    let mut base = match config.project_type.as_deref() {
        Some("web_application") => 40.0,
        Some("api_service") => 25.0,
        Some("mobile_app") => 60.0,
        Some("data_pipeline") => 30.0,
        _ => 35.0,
    };

    if !similar.is_empty() {
        let mean = similar.iter().map(|p| p.completion_time).sum::<f64>() / similar.len() as f64;
        base = (base + mean) / 2.0;
    }

    let complexity = (1.0 + (config.technologies.len() as f64 - 3.0) * 0.2).max(0.2);
    base * complexity
}

async fn load_records<T: DeserializeOwned>(
    gateway: &dyn PersistenceGateway,
    set: RecordSet,
    deadline: Duration,
) -> LoreResult<Vec<T>> {
    let records = with_deadline(deadline, "record load", gateway.load_records(set)).await?;
    Ok(records
        .into_iter()
        .filter_map(|record| match serde_json::from_str(&record.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(set = %set, id = %record.id, error = %e, "Skipping undecodable record");
                None
            }
        })
        .collect())
}

async fn load_snapshot<T: DeserializeOwned + Default>(
    gateway: &dyn PersistenceGateway,
    kind: SnapshotKind,
    deadline: Duration,
) -> T {
    let snapshot = match with_deadline(deadline, "snapshot load", gateway.load_snapshot(kind)).await
    {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            warn!(kind = %kind, "No snapshot stored, starting empty");
            return T::default();
        }
        Err(e) => {
            warn!(kind = %kind, error = %e, "Snapshot unreadable, starting empty");
            return T::default();
        }
    };

    if snapshot.schema_version != SCHEMA_VERSION {
        warn!(
            kind = %kind,
            found = snapshot.schema_version,
            expected = SCHEMA_VERSION,
            "Snapshot schema mismatch, starting empty"
        );
        return T::default();
    }

    serde_json::from_str(&snapshot.payload).unwrap_or_else(|e| {
        warn!(kind = %kind, error = %e, "Corrupt snapshot, starting empty");
        T::default()
    })
}
