//! Base de conhecimento.
//!
//! O estado aprendido (patterns, outcomes de projetos, correlações entre
//! tecnologias, pesos do preditor de sucesso) e o serviço que o lê e atualiza.

mod base;
mod correlation;
mod export;
mod outcomes;
mod patterns;
mod predictor;
mod recommend;
mod signature;

pub use base::{estimate_completion_time, KnowledgeBase, PersistReport, MODEL_VERSION};
pub use correlation::{CorrelationLearner, CorrelationMatrix};
pub use export::{ImportResult, KnowledgeExport, EXPORT_FORMAT_VERSION};
pub use outcomes::{OutcomeStore, SIMILAR_PROJECTS_LIMIT};
pub use patterns::{CodePattern, PatternChanges, PatternStore, PrunePolicy, Upserted};
pub use predictor::{
    config_features, outcome_features, FeatureVector, PredictorWeights, SuccessPredictor,
    TYPE_PREFIX, USES_PREFIX,
};
pub use recommend::{RecommendationEngine, Recommended};
pub use signature::{PatternSignature, PATTERN_ID_LEN};
