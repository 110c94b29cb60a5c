//! CorrelationLearner - coocorrência de tecnologias ponderada pelo sucesso.
//!
//! As duas direções de cada par são armazenadas e atualizadas explicitamente.
//! Os scores não têm limite superior; quem consome limita ao convertê-los
//! em confiança.

use std::collections::BTreeMap;

use crate::types::requests::ProjectOutcome;

/// Tecnologia -> tecnologia correlacionada -> score.
pub type CorrelationMatrix = BTreeMap<String, BTreeMap<String, f64>>;

/// Pesos simétricos de coocorrência.
#[derive(Debug, Clone)]
pub struct CorrelationLearner {
    matrix: CorrelationMatrix,
    step: f64,
}

impl CorrelationLearner {
    /// Cria um learner vazio; cada coocorrência soma `success_score * step`.
    pub fn new(step: f64) -> Self {
        Self {
            matrix: CorrelationMatrix::new(),
            step,
        }
    }

    pub fn from_matrix(matrix: CorrelationMatrix, step: f64) -> Self {
        Self { matrix, step }
    }

    /// Atualiza todos os pares não ordenados de tecnologias de `outcome`.
    pub fn observe(&mut self, outcome: &ProjectOutcome) {
        let increment = outcome.success_score * self.step;
        let techs: Vec<&String> = outcome.technologies.iter().collect();

        for (i, t1) in techs.iter().enumerate() {
            for t2 in &techs[i + 1..] {
                *self
                    .matrix
                    .entry((*t1).clone())
                    .or_default()
                    .entry((*t2).clone())
                    .or_insert(0.0) += increment;
                *self
                    .matrix
                    .entry((*t2).clone())
                    .or_default()
                    .entry((*t1).clone())
                    .or_insert(0.0) += increment;
            }
        }
    }

    /// Tecnologias correlacionadas com `tech`.
    pub fn get_correlated(&self, tech: &str) -> Option<&BTreeMap<String, f64>> {
        self.matrix.get(tech)
    }

    /// Score de um par, 0 quando nunca vistos juntos.
    pub fn score(&self, t1: &str, t2: &str) -> f64 {
        self.matrix
            .get(t1)
            .and_then(|row| row.get(t2))
            .copied()
            .unwrap_or(0.0)
    }

    /// Número de tecnologias com pelo menos uma correlação.
    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn matrix(&self) -> &CorrelationMatrix {
        &self.matrix
    }

    /// Adiciona pares de `other` que ainda não têm score.
    pub fn fill_missing(&mut self, other: CorrelationMatrix) {
        for (tech, row) in other {
            let local = self.matrix.entry(tech).or_default();
            for (peer, score) in row {
                local.entry(peer).or_insert(score);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_update_is_symmetric() {
        let mut learner = CorrelationLearner::new(0.1);
        learner.observe(&ProjectOutcome::new("p", 0.5).with_technologies(["A", "B"]));

        assert!((learner.score("A", "B") - 0.05).abs() < 1e-12);
        assert!((learner.score("B", "A") - 0.05).abs() < 1e-12);
        assert_eq!(learner.score("A", "A"), 0.0);
    }

    #[test]
    fn test_three_technologies_make_three_pairs() {
        let mut learner = CorrelationLearner::new(0.1);
        learner.observe(&ProjectOutcome::new("p", 1.0).with_technologies(["a", "b", "c"]));

        assert_eq!(learner.get_correlated("a").unwrap().len(), 2);
        assert_eq!(learner.get_correlated("b").unwrap().len(), 2);
        assert!((learner.score("c", "a") - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_scores_accumulate_past_one() {
        let mut learner = CorrelationLearner::new(0.1);
        let outcome = ProjectOutcome::new("p", 1.0).with_technologies(["x", "y"]);
        for _ in 0..15 {
            learner.observe(&outcome);
        }
        assert!(learner.score("x", "y") > 1.0);
    }

    #[test]
    fn test_single_technology_adds_nothing() {
        let mut learner = CorrelationLearner::new(0.1);
        learner.observe(&ProjectOutcome::new("p", 1.0).with_technologies(["solo"]));
        assert!(learner.is_empty());
    }
}
