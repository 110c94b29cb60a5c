//! OutcomeStore - outcomes de projetos concluídos.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::requests::{ProjectContext, ProjectOutcome};
use crate::types::responses::SimilarProject;

/// Número máximo de projetos semelhantes retornados.
pub const SIMILAR_PROJECTS_LIMIT: usize = 5;

/// Bônus de similaridade quando o tipo de projeto coincide.
const PROJECT_TYPE_BONUS: usize = 3;

/// Store de outcomes em memória, última escrita vence por project id.
#[derive(Debug, Default)]
pub struct OutcomeStore {
    outcomes: BTreeMap<String, ProjectOutcome>,
    dirty: BTreeSet<String>,
}

impl OutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstrói um store a partir de registros carregados.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = ProjectOutcome>) -> Self {
        Self {
            outcomes: outcomes
                .into_iter()
                .map(|o| (o.project_id.clone(), o))
                .collect(),
            dirty: BTreeSet::new(),
        }
    }

    /// Armazena `outcome`, substituindo qualquer registro anterior com o mesmo id.
    ///
    /// Retorna o registro substituído.
    pub fn record(&mut self, outcome: ProjectOutcome) -> Option<ProjectOutcome> {
        self.dirty.insert(outcome.project_id.clone());
        self.outcomes.insert(outcome.project_id.clone(), outcome)
    }

    pub fn get(&self, project_id: &str) -> Option<&ProjectOutcome> {
        self.outcomes.get(project_id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.outcomes.values()
    }

    /// Projetos armazenados parecidos com `config`, melhores primeiro, no máximo cinco.
    pub fn find_similar(&self, config: &ProjectContext) -> Vec<SimilarProject> {
        let mut similar: Vec<SimilarProject> = self
            .outcomes
            .values()
            .filter_map(|outcome| {
                let mut score = outcome.technologies.intersection(&config.technologies).count();
                if config.project_type.as_deref() == Some(outcome.project_type.as_str()) {
                    score += PROJECT_TYPE_BONUS;
                }
                (score > 0).then(|| SimilarProject {
                    project_id: outcome.project_id.clone(),
                    project_type: outcome.project_type.clone(),
                    similarity: score,
                    success_score: outcome.success_score,
                    completion_time: outcome.completion_time,
                    issues_encountered: outcome.issues_encountered.clone(),
                })
            })
            .collect();

        similar.sort_by(|a, b| {
            b.similarity
                .cmp(&a.similarity)
                .then_with(|| a.project_id.cmp(&b.project_id))
        });
        similar.truncate(SIMILAR_PROJECTS_LIMIT);
        similar
    }

    /// Score médio de sucesso por tecnologia.
    pub fn technology_success_rates(&self) -> BTreeMap<String, f64> {
        let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for outcome in self.outcomes.values() {
            for tech in &outcome.technologies {
                let entry = totals.entry(tech.clone()).or_insert((0.0, 0));
                entry.0 += outcome.success_score;
                entry.1 += 1;
            }
        }
        totals
            .into_iter()
            .map(|(tech, (sum, n))| (tech, sum / n as f64))
            .collect()
    }

    /// Drena os outcomes alterados desde o último flush.
    pub fn take_dirty(&mut self) -> Vec<ProjectOutcome> {
        std::mem::take(&mut self.dirty)
            .iter()
            .filter_map(|id| self.outcomes.get(id).cloned())
            .collect()
    }

    /// Marca outcomes como ainda não gravados.
    pub fn requeue<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            if self.outcomes.contains_key(id) {
                self.dirty.insert(id.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_overwrites_by_id() {
        let mut store = OutcomeStore::new();
        assert!(store.record(ProjectOutcome::new("p1", 0.4)).is_none());
        let previous = store.record(ProjectOutcome::new("p1", 0.9));

        assert_eq!(store.len(), 1);
        assert!((previous.unwrap().success_score - 0.4).abs() < 1e-9);
        assert!((store.get("p1").unwrap().success_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_find_similar_scores_and_truncates() {
        let mut store = OutcomeStore::new();
        store.record(
            ProjectOutcome::new("typed", 0.8)
                .with_project_type("api_service")
                .with_technologies(["go"]),
        );
        store.record(ProjectOutcome::new("two", 0.7).with_technologies(["rust", "tokio"]));
        store.record(ProjectOutcome::new("none", 0.7).with_technologies(["php"]));
        for i in 0..6 {
            store.record(ProjectOutcome::new(format!("one-{i}"), 0.5).with_technologies(["rust"]));
        }

        let config = ProjectContext::new()
            .with_technologies(["rust", "tokio"])
            .with_project_type("api_service");
        let similar = store.find_similar(&config);

        assert_eq!(similar.len(), SIMILAR_PROJECTS_LIMIT);
        assert_eq!(similar[0].project_id, "typed");
        assert_eq!(similar[0].similarity, 3);
        assert_eq!(similar[1].project_id, "two");
        assert!(similar.iter().all(|s| s.project_id != "none"));
    }

    #[test]
    fn test_technology_success_rates() {
        let mut store = OutcomeStore::new();
        store.record(ProjectOutcome::new("a", 1.0).with_technologies(["rust"]));
        store.record(ProjectOutcome::new("b", 0.5).with_technologies(["rust", "go"]));

        let rates = store.technology_success_rates();
        assert!((rates["rust"] - 0.75).abs() < 1e-9);
        assert!((rates["go"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_take_dirty() {
        let mut store = OutcomeStore::new();
        store.record(ProjectOutcome::new("a", 1.0));
        assert_eq!(store.take_dirty().len(), 1);
        assert!(store.take_dirty().is_empty());

        store.requeue(["a"]);
        assert_eq!(store.take_dirty().len(), 1);
    }
}
