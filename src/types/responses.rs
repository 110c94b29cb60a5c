//! Tipos de resposta do Lore.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LoreError;

// ═══════════════════════════════════════════════════════════════════════════
// Envelope de tarefas
// ═══════════════════════════════════════════════════════════════════════════

/// Status de uma tarefa.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Ok,
    Error,
}

/// Resultado estruturado retornado por toda tarefa, com sucesso ou não.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub status: TaskStatus,

    pub message: String,

    /// Categoria do erro quando `status` é `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Preenchido quando o tipo de tarefa não foi reconhecido.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_tasks: Option<Vec<String>>,
}

impl TaskResponse {
    /// Resposta de sucesso com dados serializados.
    pub fn ok<T: Serialize>(message: impl Into<String>, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                status: TaskStatus::Ok,
                message: message.into(),
                error_kind: None,
                data: Some(data),
                available_tasks: None,
            },
            Err(e) => Self::from_error(&LoreError::from(e)),
        }
    }

    /// Resposta de erro descrevendo `err`.
    pub fn from_error(err: &LoreError) -> Self {
        let available_tasks = matches!(err, LoreError::UnsupportedTask(_)).then(|| {
            crate::types::requests::LearningTask::AVAILABLE
                .iter()
                .map(|t| t.to_string())
                .collect()
        });

        Self {
            status: TaskStatus::Error,
            message: err.to_string(),
            error_kind: Some(err.kind().to_string()),
            data: None,
            available_tasks,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == TaskStatus::Ok
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Recomendações
// ═══════════════════════════════════════════════════════════════════════════

/// Origem de uma recomendação.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Pattern,
    Technology,
    Architecture,
    Performance,
}

impl std::fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendationKind::Pattern => write!(f, "pattern"),
            RecommendationKind::Technology => write!(f, "technology"),
            RecommendationKind::Architecture => write!(f, "architecture"),
            RecommendationKind::Performance => write!(f, "performance"),
        }
    }
}

/// Impacto esperado ao seguir uma recomendação.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    /// Lê texto livre do serviço de inferência; qualquer valor desconhecido vira medium.
    pub fn parse_lenient(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "low" => Impact::Low,
            "high" => Impact::High,
            _ => Impact::Medium,
        }
    }
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Impact::Low => write!(f, "low"),
            Impact::Medium => write!(f, "medium"),
            Impact::High => write!(f, "high"),
        }
    }
}

/// Uma recomendação ranqueada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: RecommendationKind,

    pub title: String,

    pub description: String,

    /// Score heurístico em [0, 1].
    pub confidence: f64,

    /// Para o que a recomendação foi calculada.
    #[serde(default)]
    pub context: Value,

    #[serde(default)]
    pub supporting_evidence: Vec<String>,

    #[serde(default)]
    pub implementation_steps: Vec<String>,

    pub estimated_impact: Impact,

    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Análise de patterns
// ═══════════════════════════════════════════════════════════════════════════

/// Ocorrência de um pattern encontrada em uma amostra.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternHit {
    pub pattern_id: String,
    pub pattern_type: String,
    pub sample_index: usize,
}

/// Pattern visto pela primeira vez.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPattern {
    pub pattern_id: String,
    pub pattern_type: String,
    pub description: String,
}

/// Pattern conhecido cujas estatísticas foram atualizadas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternImprovement {
    pub pattern_id: String,
    pub frequency: u64,
    pub success_rate: f64,
}

/// Amostra que não pôde ser analisada.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSample {
    pub sample_index: usize,
    pub reason: String,
}

/// Pattern conhecido sugerido por se parecer com o que acabou de ser analisado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSuggestion {
    pub pattern_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub confidence: f64,
}

/// Resultado de `analyze_patterns`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub samples_analyzed: usize,
    pub patterns_found: Vec<PatternHit>,
    pub new_patterns: Vec<NewPattern>,
    pub pattern_improvements: Vec<PatternImprovement>,
    pub skipped_samples: Vec<SkippedSample>,
    pub recommendations: Vec<PatternSuggestion>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Projetos e previsões
// ═══════════════════════════════════════════════════════════════════════════

/// Resultado de `learn_from_project`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnReport {
    pub project_id: String,
    pub patterns_updated: usize,
    pub success_score: f64,
}

/// Projeto armazenado ranqueado contra uma consulta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarProject {
    pub project_id: String,
    pub project_type: String,
    pub similarity: usize,
    pub success_score: f64,
    pub completion_time: f64,
    #[serde(default)]
    pub issues_encountered: Vec<String>,
}

/// Resultado de `predict_outcome`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_success_score: f64,
    pub confidence: f64,
    pub risk_factors: Vec<String>,
    pub success_factors: Vec<String>,
    pub similar_projects: Vec<SimilarProject>,
    /// Horas.
    pub estimated_completion_time: f64,
    pub recommended_technologies: Vec<String>,
    pub potential_issues: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Feedback, fila, métricas
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    pub feedback_id: String,
    pub recommendation_id: String,
    pub recommendation_accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueReceipt {
    pub accepted: usize,
    /// Amostras mais antigas descartadas para respeitar o limite do buffer.
    pub dropped: usize,
    pub buffered: usize,
}

/// Número de entradas em cada mapa aprendido.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseStats {
    pub patterns: usize,
    pub project_outcomes: usize,
    pub technology_correlations: usize,
    pub success_predictors: usize,
    pub feedback_entries: usize,
}

/// Contadores do cache de recomendações.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub size: usize,
    pub capacity: usize,
    pub hit_rate: f64,
}

/// Resultado de `get_metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningMetrics {
    pub patterns_learned: u64,
    pub projects_analyzed: u64,
    pub recommendations_made: u64,
    pub recommendation_accuracy: f64,
    pub knowledge_base_size: usize,
    pub learning_rate: f64,
    pub model_version: String,
    pub knowledge_base_stats: KnowledgeBaseStats,
    pub pattern_distribution: BTreeMap<String, usize>,
    pub technology_success_rates: BTreeMap<String, f64>,
    pub cache: CacheMetrics,
    pub buffered_samples: usize,
}
