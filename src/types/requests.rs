//! Tipos de requisição do Lore.
//!
//! Tudo que um chamador pode entregar à base de conhecimento: contextos de
//! consulta, outcomes de projetos concluídos, feedback e o conjunto fechado de tarefas.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{LoreError, LoreResult};

/// Chave da métrica de sucesso usada como score de entrada na atualização de patterns.
pub const OVERALL_SCORE: &str = "overall_score";

/// Tipo de projeto usado quando o chamador não informa um.
pub const UNKNOWN_PROJECT_TYPE: &str = "unknown";

/// Contexto do projeto ao qual pertence uma consulta ou observação.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    /// Tecnologias em uso.
    #[serde(default)]
    pub technologies: BTreeSet<String>,

    /// Tipo de projeto (web_application, api_service, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,

    /// Requisitos livres.
    #[serde(default)]
    pub requirements: BTreeMap<String, Value>,

    /// Métricas numéricas de sucesso; `overall_score` alimenta as taxas de sucesso dos patterns.
    #[serde(default)]
    pub success_metrics: BTreeMap<String, f64>,
}

impl ProjectContext {
    /// Cria um contexto vazio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona tecnologias.
    pub fn with_technologies<I, S>(mut self, technologies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.technologies
            .extend(technologies.into_iter().map(Into::into));
        self
    }

    /// Define o tipo de projeto.
    pub fn with_project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = Some(project_type.into());
        self
    }

    /// Define uma métrica de sucesso.
    pub fn with_success_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.success_metrics.insert(name.into(), value);
        self
    }

    /// Define um requisito.
    pub fn with_requirement(mut self, name: impl Into<String>, value: Value) -> Self {
        self.requirements.insert(name.into(), value);
        self
    }

    /// Score geral do chamador, se informado.
    pub fn overall_score(&self) -> Option<f64> {
        self.success_metrics.get(OVERALL_SCORE).copied()
    }

    /// Tipo de projeto, ou `"unknown"`.
    pub fn project_type_or_unknown(&self) -> &str {
        self.project_type.as_deref().unwrap_or(UNKNOWN_PROJECT_TYPE)
    }

    /// Rejeita contextos que o aprendizado não consegue usar.
    pub fn validate(&self) -> LoreResult<()> {
        if self.technologies.iter().any(|t| t.trim().is_empty()) {
            return Err(LoreError::validation("technology names must not be empty"));
        }
        if let Some(project_type) = &self.project_type {
            if project_type.trim().is_empty() {
                return Err(LoreError::validation("project_type must not be empty"));
            }
        }
        for (name, value) in &self.success_metrics {
            if !value.is_finite() {
                return Err(LoreError::validation(format!(
                    "success metric '{}' is not a finite number",
                    name
                )));
            }
        }
        if let Some(score) = self.overall_score() {
            if !(0.0..=1.0).contains(&score) {
                return Err(LoreError::validation(format!(
                    "{} must be within [0, 1], got {}",
                    OVERALL_SCORE, score
                )));
            }
        }
        Ok(())
    }
}

/// Um projeto concluído, como reportado por um agente de geração.
///
/// Armazenado como veio; gravar o mesmo `project_id` de novo o substitui.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOutcome {
    #[serde(default = "new_id", alias = "id")]
    pub project_id: String,

    #[serde(default = "default_project_type")]
    pub project_type: String,

    #[serde(default)]
    pub technologies: BTreeSet<String>,

    #[serde(default)]
    pub requirements: BTreeMap<String, Value>,

    #[serde(default)]
    pub success_metrics: BTreeMap<String, Value>,

    /// Ids dos patterns usados pelo projeto.
    #[serde(default)]
    pub patterns_used: BTreeSet<String>,

    /// Horas gastas.
    #[serde(default)]
    pub completion_time: f64,

    #[serde(default = "default_success_score")]
    pub success_score: f64,

    #[serde(default)]
    pub issues_encountered: Vec<String>,

    #[serde(default = "Utc::now")]
    pub completed_at: DateTime<Utc>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_project_type() -> String {
    UNKNOWN_PROJECT_TYPE.to_string()
}

fn default_success_score() -> f64 {
    0.5
}

impl ProjectOutcome {
    /// Cria um outcome com valores padrão para tudo exceto id e score.
    pub fn new(project_id: impl Into<String>, success_score: f64) -> Self {
        Self {
            project_id: project_id.into(),
            project_type: default_project_type(),
            technologies: BTreeSet::new(),
            requirements: BTreeMap::new(),
            success_metrics: BTreeMap::new(),
            patterns_used: BTreeSet::new(),
            completion_time: 0.0,
            success_score,
            issues_encountered: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    /// Adiciona tecnologias.
    pub fn with_technologies<I, S>(mut self, technologies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.technologies
            .extend(technologies.into_iter().map(Into::into));
        self
    }

    /// Define o tipo de projeto.
    pub fn with_project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = project_type.into();
        self
    }

    /// Define o tempo de conclusão em horas.
    pub fn with_completion_time(mut self, hours: f64) -> Self {
        self.completion_time = hours;
        self
    }

    /// Adiciona ids de patterns usados pelo projeto.
    pub fn with_patterns_used<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns_used.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Adiciona um problema.
    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues_encountered.push(issue.into());
        self
    }

    pub fn validate(&self) -> LoreResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(LoreError::validation("project_id must not be empty"));
        }
        if !self.success_score.is_finite() || !(0.0..=1.0).contains(&self.success_score) {
            return Err(LoreError::validation(format!(
                "success_score must be within [0, 1], got {}",
                self.success_score
            )));
        }
        if !self.completion_time.is_finite() || self.completion_time < 0.0 {
            return Err(LoreError::validation(format!(
                "completion_time must be a non-negative number, got {}",
                self.completion_time
            )));
        }
        if self.technologies.iter().any(|t| t.trim().is_empty()) {
            return Err(LoreError::validation("technology names must not be empty"));
        }
        Ok(())
    }

    /// Este outcome visto como contexto de consulta.
    pub fn as_context(&self) -> ProjectContext {
        ProjectContext {
            technologies: self.technologies.clone(),
            project_type: Some(self.project_type.clone()),
            requirements: self.requirements.clone(),
            success_metrics: BTreeMap::new(),
        }
    }
}

/// Feedback sobre uma recomendação mostrada a um usuário.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default = "new_id")]
    pub feedback_id: String,

    pub recommendation_id: String,

    /// De 1 (inútil) a 5 (excelente).
    pub rating: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,

    #[serde(default)]
    pub implemented: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    pub fn new(recommendation_id: impl Into<String>, rating: u8) -> Self {
        Self {
            feedback_id: new_id(),
            recommendation_id: recommendation_id.into(),
            rating,
            feedback_text: None,
            implemented: false,
            outcome: None,
            created_at: Utc::now(),
        }
    }

    /// Notas 4 e 5 contam como recomendação acertada.
    pub fn is_positive(&self) -> bool {
        self.rating >= 4
    }

    pub fn validate(&self) -> LoreResult<()> {
        if self.recommendation_id.trim().is_empty() {
            return Err(LoreError::validation("recommendation_id must not be empty"));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(LoreError::validation(format!(
                "rating must be between 1 and 5, got {}",
                self.rating
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tarefas
// ═══════════════════════════════════════════════════════════════════════════

/// Todas as tarefas que a base de conhecimento entende.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum LearningTask {
    /// Extrai e aprende patterns de amostras de código.
    AnalyzePatterns {
        code_samples: Vec<String>,
        #[serde(default)]
        context: ProjectContext,
    },
    /// Igual a `AnalyzePatterns` com `requirements.focus = "security"`.
    SecurityPatternAnalysis {
        code_samples: Vec<String>,
        #[serde(default)]
        context: ProjectContext,
    },
    /// Coloca amostras no buffer do job de re-análise.
    QueueSamples {
        code_samples: Vec<String>,
        #[serde(default)]
        context: ProjectContext,
    },
    /// Registra um projeto concluído e atualiza os modelos.
    LearnFromProject { project_data: ProjectOutcome },
    /// Recomendações ranqueadas para um contexto.
    GetRecommendations {
        #[serde(default)]
        context: ProjectContext,
    },
    /// Prevê como um projeto planejado vai se sair.
    PredictOutcome {
        #[serde(default, alias = "config")]
        project_config: ProjectContext,
    },
    /// Avalia uma recomendação.
    SubmitFeedback { feedback: Feedback },
    /// Métricas de aprendizado.
    GetMetrics,
}

impl LearningTask {
    /// Nomes de tarefa aceitos por [`LearningTask::from_value`].
    pub const AVAILABLE: [&'static str; 8] = [
        "analyze_patterns",
        "security_pattern_analysis",
        "queue_samples",
        "learn_from_project",
        "get_recommendations",
        "predict_outcome",
        "submit_feedback",
        "get_metrics",
    ];

    /// Interpreta uma tarefa com tag.
    ///
    /// Um `task_type` desconhecido é `UnsupportedTask`; um conhecido com campos
    /// inválidos é `Validation`.
    pub fn from_value(value: Value) -> LoreResult<Self> {
        let task_type = value
            .get("task_type")
            .and_then(Value::as_str)
            .ok_or_else(|| LoreError::validation("missing 'task_type'"))?;

        if !Self::AVAILABLE.contains(&task_type) {
            return Err(LoreError::UnsupportedTask(task_type.to_string()));
        }

        serde_json::from_value(value)
            .map_err(|e| LoreError::validation(format!("invalid task payload: {}", e)))
    }

    /// A tag `task_type` desta tarefa.
    pub fn task_type(&self) -> &'static str {
        match self {
            Self::AnalyzePatterns { .. } => "analyze_patterns",
            Self::SecurityPatternAnalysis { .. } => "security_pattern_analysis",
            Self::QueueSamples { .. } => "queue_samples",
            Self::LearnFromProject { .. } => "learn_from_project",
            Self::GetRecommendations { .. } => "get_recommendations",
            Self::PredictOutcome { .. } => "predict_outcome",
            Self::SubmitFeedback { .. } => "submit_feedback",
            Self::GetMetrics => "get_metrics",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_validation() {
        let ok = ProjectContext::new()
            .with_technologies(["rust", "tokio"])
            .with_success_metric(OVERALL_SCORE, 0.9);
        assert!(ok.validate().is_ok());

        let out_of_range = ProjectContext::new().with_success_metric(OVERALL_SCORE, 1.5);
        assert!(matches!(
            out_of_range.validate(),
            Err(LoreError::Validation(_))
        ));

        let nan = ProjectContext::new().with_success_metric("latency", f64::NAN);
        assert!(nan.validate().is_err());

        let blank = ProjectContext::new().with_technologies([" "]);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_outcome_defaults_from_json() {
        let outcome: ProjectOutcome = serde_json::from_value(json!({
            "technologies": ["react", "fastapi"]
        }))
        .unwrap();

        assert!(!outcome.project_id.is_empty());
        assert_eq!(outcome.project_type, "unknown");
        assert!((outcome.success_score - 0.5).abs() < f64::EPSILON);
        assert_eq!(outcome.technologies.len(), 2);
    }

    #[test]
    fn test_outcome_validation() {
        assert!(ProjectOutcome::new("p1", 0.7).validate().is_ok());
        assert!(ProjectOutcome::new("p1", 1.2).validate().is_err());
        assert!(ProjectOutcome::new("", 0.7).validate().is_err());
        assert!(ProjectOutcome::new("p1", 0.7)
            .with_completion_time(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_feedback_validation() {
        assert!(Feedback::new("pattern_abc", 5).validate().is_ok());
        assert!(Feedback::new("pattern_abc", 0).validate().is_err());
        assert!(Feedback::new("pattern_abc", 6).validate().is_err());
        assert!(Feedback::new("pattern_abc", 4).is_positive());
        assert!(!Feedback::new("pattern_abc", 3).is_positive());
    }

    #[test]
    fn test_task_from_value() {
        let task = LearningTask::from_value(json!({
            "task_type": "get_recommendations",
            "context": {"technologies": ["rust"]}
        }))
        .unwrap();
        assert_eq!(task.task_type(), "get_recommendations");

        let metrics = LearningTask::from_value(json!({"task_type": "get_metrics"})).unwrap();
        assert!(matches!(metrics, LearningTask::GetMetrics));
    }

    #[test]
    fn test_unknown_task_is_unsupported() {
        let err = LearningTask::from_value(json!({"task_type": "train_neural_net"})).unwrap_err();
        assert!(matches!(err, LoreError::UnsupportedTask(ref t) if t == "train_neural_net"));
    }

    #[test]
    fn test_known_task_with_bad_payload_is_validation() {
        let err = LearningTask::from_value(json!({
            "task_type": "analyze_patterns",
            "code_samples": "not a list"
        }))
        .unwrap_err();
        assert!(matches!(err, LoreError::Validation(_)));

        let missing = LearningTask::from_value(json!({"samples": []})).unwrap_err();
        assert!(matches!(missing, LoreError::Validation(_)));
    }
}
