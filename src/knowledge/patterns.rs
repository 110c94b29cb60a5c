//! PatternStore - patterns de código aprendidos.
//!
//! Dono de todo [`CodePattern`]: deduplicação por snippet normalizado,
//! atualização do sucesso por média móvel, consultas de similaridade e poda.
//! O store é estado puro em memória; registra quais ids mudaram para que o
//! job de persist grave os deltas depois.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::PatternCandidate;
use crate::types::config::MaintenanceConfig;
use crate::types::requests::ProjectContext;

use super::signature::PatternSignature;

/// Um pattern de código aprendido.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodePattern {
    /// Hash do snippet normalizado.
    pub id: String,
    pub pattern_type: String,
    pub snippet: String,
    pub description: String,
    /// Número de observações, no mínimo 1.
    pub frequency: u64,
    /// Média dos scores de sucesso observados, em [0, 1].
    pub success_rate: f64,
    #[serde(default)]
    pub technologies: BTreeSet<String>,
    #[serde(default)]
    pub contexts: BTreeSet<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl CodePattern {
    /// Score de ranqueamento usado pelas recomendações.
    pub fn strength(&self) -> f64 {
        self.success_rate * self.frequency as f64
    }

    /// Número de tecnologias em comum com `technologies`.
    pub fn tech_overlap(&self, technologies: &BTreeSet<String>) -> usize {
        self.technologies.intersection(technologies).count()
    }
}

/// Resultado de um único upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    pub id: String,
    pub created: bool,
    pub frequency: u64,
    pub success_rate: f64,
}

/// Quando um pattern é considerado de baixo valor.
///
/// As três cláusulas precisam valer para o pattern ser podado.
#[derive(Debug, Clone)]
pub struct PrunePolicy {
    pub max_frequency: u64,
    pub max_success_rate: f64,
    pub max_age: Duration,
}

impl PrunePolicy {
    pub fn from_config(config: &MaintenanceConfig) -> Self {
        Self {
            max_frequency: config.prune_max_frequency,
            max_success_rate: config.prune_max_success_rate,
            max_age: Duration::days(config.prune_max_age_days),
        }
    }

    pub fn matches(&self, pattern: &CodePattern, now: DateTime<Utc>) -> bool {
        pattern.frequency < self.max_frequency
            && pattern.success_rate < self.max_success_rate
            && now.signed_duration_since(pattern.last_seen) > self.max_age
    }
}

impl Default for PrunePolicy {
    fn default() -> Self {
        Self::from_config(&MaintenanceConfig::default())
    }
}

/// Deltas de patterns aguardando flush.
#[derive(Debug, Clone, Default)]
pub struct PatternChanges {
    pub upserts: Vec<CodePattern>,
    pub removed: Vec<String>,
}

impl PatternChanges {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removed.is_empty()
    }
}

/// Store de patterns em memória.
#[derive(Debug, Default)]
pub struct PatternStore {
    patterns: BTreeMap<String, CodePattern>,
    /// Observações por tipo de pattern, incluindo patterns podados.
    type_frequencies: BTreeMap<String, u64>,
    dirty: BTreeSet<String>,
    removed: BTreeSet<String>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstrói um store a partir de registros carregados; nada fica marcado como sujo.
    pub fn from_parts(
        patterns: impl IntoIterator<Item = CodePattern>,
        type_frequencies: BTreeMap<String, u64>,
    ) -> Self {
        Self {
            patterns: patterns.into_iter().map(|p| (p.id.clone(), p)).collect(),
            type_frequencies,
            dirty: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// Registra uma observação de `candidate`.
    pub fn upsert(&mut self, candidate: &PatternCandidate, context: &ProjectContext) -> Upserted {
        self.upsert_at(candidate, context, Utc::now())
    }

    /// Registra uma observação de `candidate` em `now`.
    ///
    /// O score de entrada é o `overall_score` do contexto, ou 1.0 quando o
    /// chamador não informou nenhum.
    pub fn upsert_at(
        &mut self,
        candidate: &PatternCandidate,
        context: &ProjectContext,
        now: DateTime<Utc>,
    ) -> Upserted {
        let id = PatternSignature::pattern_id(&candidate.snippet);
        let incoming = context.overall_score().unwrap_or(1.0);

        *self
            .type_frequencies
            .entry(candidate.pattern_type.clone())
            .or_insert(0) += 1;
        self.dirty.insert(id.clone());
        self.removed.remove(&id);

        if let Some(pattern) = self.patterns.get_mut(&id) {
            pattern.frequency += 1;
            let n = pattern.frequency as f64;
            pattern.success_rate = (pattern.success_rate * (n - 1.0) + incoming) / n;
            pattern.last_seen = now;
            pattern
                .technologies
                .extend(context.technologies.iter().cloned());
            pattern
                .contexts
                .insert(context.project_type_or_unknown().to_string());

            return Upserted {
                id,
                created: false,
                frequency: pattern.frequency,
                success_rate: pattern.success_rate,
            };
        }

        let pattern = CodePattern {
            id: id.clone(),
            pattern_type: candidate.pattern_type.clone(),
            snippet: candidate.snippet.clone(),
            description: candidate.description.clone(),
            frequency: 1,
            success_rate: incoming,
            technologies: context.technologies.clone(),
            contexts: BTreeSet::from([context.project_type_or_unknown().to_string()]),
            metrics: context
                .success_metrics
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(*v)))
                .collect(),
            created_at: now,
            last_seen: now,
        };
        self.patterns.insert(id.clone(), pattern);

        Upserted {
            id,
            created: true,
            frequency: 1,
            success_rate: incoming,
        }
    }

    /// Associa a stack de um projeto concluído a um pattern que ele usou.
    ///
    /// As estatísticas de sucesso não mudam; só observações de `analyze_patterns`
    /// movem a média. Retorna false para ids desconhecidos.
    pub fn link_outcome(
        &mut self,
        id: &str,
        technologies: &BTreeSet<String>,
        project_type: &str,
    ) -> bool {
        let Some(pattern) = self.patterns.get_mut(id) else {
            return false;
        };
        pattern.technologies.extend(technologies.iter().cloned());
        pattern.contexts.insert(project_type.to_string());
        self.dirty.insert(id.to_string());
        true
    }

    /// Insere ou substitui um pattern inteiro (importação).
    pub fn insert(&mut self, pattern: CodePattern) {
        self.dirty.insert(pattern.id.clone());
        self.removed.remove(&pattern.id);
        self.patterns.insert(pattern.id.clone(), pattern);
    }

    pub fn get(&self, id: &str) -> Option<&CodePattern> {
        self.patterns.get(id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodePattern> {
        self.patterns.values()
    }

    /// Patterns conhecidos dos mesmos tipos que compartilham tecnologia com `context`.
    ///
    /// Ranqueados pelo número de tecnologias em comum, depois pela taxa de sucesso.
    pub fn find_similar(
        &self,
        candidate_types: &BTreeSet<String>,
        context: &ProjectContext,
    ) -> Vec<&CodePattern> {
        let mut similar: Vec<(&CodePattern, usize)> = self
            .patterns
            .values()
            .filter(|p| candidate_types.contains(&p.pattern_type))
            .map(|p| (p, p.tech_overlap(&context.technologies)))
            .filter(|(_, overlap)| *overlap > 0)
            .collect();

        similar.sort_by(|(a, oa), (b, ob)| {
            ob.cmp(oa)
                .then_with(|| b.success_rate.total_cmp(&a.success_rate))
                .then_with(|| a.id.cmp(&b.id))
        });

        similar.into_iter().map(|(p, _)| p).collect()
    }

    /// Remove todo pattern que casa com `policy`; retorna os ids removidos.
    pub fn prune(&mut self, policy: &PrunePolicy, now: DateTime<Utc>) -> Vec<String> {
        let doomed: Vec<String> = self
            .patterns
            .values()
            .filter(|p| policy.matches(p, now))
            .map(|p| p.id.clone())
            .collect();

        for id in &doomed {
            self.patterns.remove(id);
            self.dirty.remove(id);
            self.removed.insert(id.clone());
        }

        doomed
    }

    /// Observações por tipo de pattern.
    pub fn type_frequencies(&self) -> &BTreeMap<String, u64> {
        &self.type_frequencies
    }

    /// Patterns atuais por tipo.
    pub fn distribution(&self) -> BTreeMap<String, usize> {
        let mut distribution = BTreeMap::new();
        for pattern in self.patterns.values() {
            *distribution.entry(pattern.pattern_type.clone()).or_insert(0) += 1;
        }
        distribution
    }

    /// Drena os deltas pendentes.
    pub fn take_changes(&mut self) -> PatternChanges {
        let dirty = std::mem::take(&mut self.dirty);
        let removed = std::mem::take(&mut self.removed);
        PatternChanges {
            upserts: dirty
                .iter()
                .filter_map(|id| self.patterns.get(id).cloned())
                .collect(),
            removed: removed.into_iter().collect(),
        }
    }

    /// Devolve os deltas cujo flush falhou.
    pub fn requeue(&mut self, changes: &PatternChanges) {
        for pattern in &changes.upserts {
            if self.patterns.contains_key(&pattern.id) {
                self.dirty.insert(pattern.id.clone());
            }
        }
        for id in &changes.removed {
            if !self.patterns.contains_key(id) {
                self.removed.insert(id.clone());
            }
        }
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty() || !self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::requests::OVERALL_SCORE;

    fn candidate(snippet: &str) -> PatternCandidate {
        PatternCandidate::new("function", snippet, "Function: handler")
    }

    fn scored(score: f64) -> ProjectContext {
        ProjectContext::new()
            .with_technologies(["python"])
            .with_success_metric(OVERALL_SCORE, score)
    }

    #[test]
    fn test_first_observation_creates_pattern() {
        let mut store = PatternStore::new();
        let up = store.upsert(&candidate("def f(): pass"), &scored(0.6));

        assert!(up.created);
        assert_eq!(up.frequency, 1);
        assert!((up.success_rate - 0.6).abs() < 1e-9);
        assert_eq!(store.len(), 1);
        assert!(store.get(&up.id).unwrap().contexts.contains("unknown"));
    }

    #[test]
    fn test_observation_without_score_counts_as_success() {
        let mut store = PatternStore::new();
        let up = store.upsert(&candidate("def f(): pass"), &ProjectContext::new());
        assert!((up.success_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_running_mean_convergence() {
        let mut store = PatternStore::new();
        let c = candidate("def f(): pass");
        store.upsert(&c, &scored(0.6));
        store.upsert(&c, &scored(0.8));
        let up = store.upsert(&c, &scored(1.0));

        assert!(!up.created);
        assert_eq!(up.frequency, 3);
        assert!((up.success_rate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_whitespace_variants_dedupe() {
        let mut store = PatternStore::new();
        store.upsert(&candidate("def f():\n    return 1"), &scored(1.0));
        store.upsert(&candidate("# note\ndef f():\n        return   1\n"), &scored(1.0));

        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().next().unwrap().frequency, 2);
        assert_eq!(store.type_frequencies()["function"], 2);
    }

    #[test]
    fn test_find_similar_ranking() {
        let mut store = PatternStore::new();
        let both = ProjectContext::new()
            .with_technologies(["python", "fastapi"])
            .with_success_metric(OVERALL_SCORE, 0.5);
        let one = ProjectContext::new()
            .with_technologies(["python"])
            .with_success_metric(OVERALL_SCORE, 0.9);
        let other = ProjectContext::new().with_technologies(["go"]);

        let a = store.upsert(&candidate("def a(): pass"), &both).id;
        let b = store.upsert(&candidate("def b(): pass"), &one).id;
        store.upsert(&candidate("def c(): pass"), &other);
        store.upsert(
            &PatternCandidate::new("class", "class D: pass", "Class: D"),
            &both,
        );

        let query = ProjectContext::new().with_technologies(["python", "fastapi"]);
        let types = BTreeSet::from(["function".to_string()]);
        let ranked: Vec<&str> = store
            .find_similar(&types, &query)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();

        assert_eq!(ranked, vec![a.as_str(), b.as_str()]);
    }

    #[test]
    fn test_prune_requires_all_clauses() {
        let now = Utc::now();
        let old = now - Duration::days(45);
        let policy = PrunePolicy::default();
        let mut store = PatternStore::new();

        let weak = store.upsert_at(&candidate("def weak(): pass"), &scored(0.2), old).id;
        let recent = store.upsert_at(&candidate("def recent(): pass"), &scored(0.2), now).id;
        let good = store.upsert_at(&candidate("def good(): pass"), &scored(0.9), old).id;

        let removed = store.prune(&policy, now);

        assert_eq!(removed, vec![weak.clone()]);
        assert!(store.get(&weak).is_none());
        assert!(store.get(&recent).is_some());
        assert!(store.get(&good).is_some());
    }

    #[test]
    fn test_changes_drain_and_requeue() {
        let mut store = PatternStore::new();
        let id = store.upsert(&candidate("def f(): pass"), &scored(1.0)).id;

        let changes = store.take_changes();
        assert_eq!(changes.upserts.len(), 1);
        assert!(!store.has_pending_changes());

        store.requeue(&changes);
        assert!(store.has_pending_changes());
        assert_eq!(store.take_changes().upserts[0].id, id);
    }

    #[test]
    fn test_link_outcome_keeps_statistics() {
        let mut store = PatternStore::new();
        let id = store.upsert(&candidate("def f(): pass"), &scored(0.4)).id;
        store.take_changes();

        let stack = BTreeSet::from(["redis".to_string()]);
        assert!(store.link_outcome(&id, &stack, "api_service"));
        assert!(!store.link_outcome("missing", &stack, "api_service"));

        let pattern = store.get(&id).unwrap();
        assert!((pattern.success_rate - 0.4).abs() < 1e-9);
        assert_eq!(pattern.frequency, 1);
        assert!(pattern.technologies.contains("redis"));
        assert!(pattern.contexts.contains("api_service"));
        assert!(store.has_pending_changes());
    }

    #[test]
    fn test_prune_is_recorded_as_removal() {
        let now = Utc::now();
        let mut store = PatternStore::new();
        store.upsert_at(&candidate("def weak(): pass"), &scored(0.1), now - Duration::days(31));
        store.take_changes();

        let removed = store.prune(&PrunePolicy::default(), now);
        let changes = store.take_changes();
        assert!(changes.upserts.is_empty());
        assert_eq!(changes.removed, removed);
    }
}
