//! SuccessPredictor - modelo linear de pesos por feature.

use std::collections::BTreeMap;

use crate::types::requests::{ProjectContext, ProjectOutcome};

/// Nome da feature -> valor.
pub type FeatureVector = BTreeMap<String, f64>;

/// Nome da feature -> peso aprendido.
pub type PredictorWeights = BTreeMap<String, f64>;

const BASELINE: f64 = 0.5;
const SCORE_SCALE: f64 = 0.1;
const CONFIDENCE_STEP: f64 = 0.05;

/// Prefixo da feature booleana por tecnologia.
pub const USES_PREFIX: &str = "uses_";

/// Prefixo da feature booleana por tipo de projeto.
pub const TYPE_PREFIX: &str = "type_";

/// Features de um projeto concluído.
pub fn outcome_features(outcome: &ProjectOutcome) -> FeatureVector {
    let mut features = FeatureVector::new();
    for tech in &outcome.technologies {
        features.insert(format!("{USES_PREFIX}{tech}"), 1.0);
    }
    features.insert("tech_count".into(), outcome.technologies.len() as f64);
    features.insert(format!("{TYPE_PREFIX}{}", outcome.project_type), 1.0);
    features.insert(
        "completion_time".into(),
        (outcome.completion_time / 100.0).min(1.0),
    );
    features.insert("patterns_used".into(), outcome.patterns_used.len() as f64);
    features.insert(
        "issues_count".into(),
        outcome.issues_encountered.len() as f64,
    );
    features
}

/// Features de um projeto planejado.
pub fn config_features(config: &ProjectContext) -> FeatureVector {
    let mut features = FeatureVector::new();
    for tech in &config.technologies {
        features.insert(format!("{USES_PREFIX}{tech}"), 1.0);
    }
    features.insert("tech_count".into(), config.technologies.len() as f64);
    if let Some(project_type) = &config.project_type {
        features.insert(format!("{TYPE_PREFIX}{project_type}"), 1.0);
    }
    features
}

fn is_identity_feature(name: &str) -> bool {
    name.starts_with(USES_PREFIX) || name.starts_with(TYPE_PREFIX)
}

/// Modelo linear de sucesso atualizado uma vez por outcome registrado.
#[derive(Debug, Clone)]
pub struct SuccessPredictor {
    weights: PredictorWeights,
    learning_rate: f64,
}

impl SuccessPredictor {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            weights: PredictorWeights::new(),
            learning_rate,
        }
    }

    pub fn from_weights(weights: PredictorWeights, learning_rate: f64) -> Self {
        Self {
            weights,
            learning_rate,
        }
    }

    /// `w = (1 - a) * w + a * success_score * v` para cada feature presente.
    pub fn update(&mut self, features: &FeatureVector, success_score: f64) {
        let a = self.learning_rate;
        for (name, value) in features {
            let weight = self.weights.entry(name.clone()).or_insert(0.0);
            *weight = (1.0 - a) * *weight + a * success_score * value;
        }
    }

    /// Retorna `(score, confidence)`, ambos limitados a [0, 1].
    ///
    /// Sem pelo menos uma feature aprendida de tecnologia ou tipo de projeto,
    /// retorna a base `(0.5, 0.5)`.
    pub fn predict(&self, features: &FeatureVector) -> (f64, f64) {
        let known = |name: &String| self.weights.get(name).is_some_and(|w| *w != 0.0);

        if !features.keys().any(|f| is_identity_feature(f) && known(f)) {
            return (BASELINE, BASELINE);
        }

        let mut score = BASELINE;
        let mut confidence = BASELINE;
        for (name, value) in features {
            if let Some(weight) = self.weights.get(name).filter(|w| **w != 0.0) {
                score += weight * value * SCORE_SCALE;
                confidence += CONFIDENCE_STEP;
            }
        }

        (score.clamp(0.0, 1.0), confidence.clamp(0.0, 1.0))
    }

    pub fn weight(&self, feature: &str) -> f64 {
        self.weights.get(feature).copied().unwrap_or(0.0)
    }

    pub fn weights(&self) -> &PredictorWeights {
        &self.weights
    }

    /// Adiciona pesos de `other` para features ainda não aprendidas.
    pub fn fill_missing(&mut self, other: PredictorWeights) {
        for (feature, weight) in other {
            self.weights.entry(feature).or_insert(weight);
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> ProjectOutcome {
        ProjectOutcome::new("p", 0.8)
            .with_project_type("api_service")
            .with_technologies(["rust", "postgres"])
            .with_completion_time(250.0)
            .with_issue("flaky ci")
    }

    #[test]
    fn test_outcome_features() {
        let features = outcome_features(&outcome());
        assert_eq!(features["uses_rust"], 1.0);
        assert_eq!(features["tech_count"], 2.0);
        assert_eq!(features["type_api_service"], 1.0);
        assert_eq!(features["completion_time"], 1.0);
        assert_eq!(features["patterns_used"], 0.0);
        assert_eq!(features["issues_count"], 1.0);
    }

    #[test]
    fn test_update_rule() {
        let mut predictor = SuccessPredictor::new(0.01);
        predictor.update(&outcome_features(&outcome()), 0.8);
        assert!((predictor.weight("uses_rust") - 0.008).abs() < 1e-12);
        assert!((predictor.weight("tech_count") - 0.016).abs() < 1e-12);

        predictor.update(&outcome_features(&outcome()), 0.8);
        let expected = 0.99 * 0.008 + 0.008;
        assert!((predictor.weight("uses_rust") - expected).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_without_shared_features() {
        let mut predictor = SuccessPredictor::new(0.01);
        predictor.update(&outcome_features(&outcome()), 0.8);

        let unrelated = ProjectContext::new()
            .with_technologies(["elixir"])
            .with_project_type("mobile_app");
        assert_eq!(predictor.predict(&config_features(&unrelated)), (0.5, 0.5));
    }

    #[test]
    fn test_matching_config_moves_prediction() {
        let mut predictor = SuccessPredictor::new(0.5);
        predictor.update(&outcome_features(&outcome()), 1.0);

        let config = ProjectContext::new().with_technologies(["rust"]);
        let (score, confidence) = predictor.predict(&config_features(&config));

        // uses_rust e tech_count carregam peso.
        assert!(score > 0.5);
        assert!((confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_prediction_is_clamped() {
        let weights = PredictorWeights::from([("uses_rust".to_string(), 100.0)]);
        let predictor = SuccessPredictor::from_weights(weights, 0.01);
        let config = ProjectContext::new().with_technologies(["rust"]);
        let (score, _) = predictor.predict(&config_features(&config));
        assert_eq!(score, 1.0);
    }
}
