//! Tools MCP do Lore.
//!
//! Cada tool corresponde a uma tarefa da base de conhecimento:
//!
//! 1. `lore_analyze_patterns` - aprende patterns de amostras de código
//! 2. `lore_security_analysis` - idem, com foco em segurança
//! 3. `lore_queue_samples` - enfileira amostras para análise em background
//! 4. `lore_learn_from_project` - registra um projeto concluído
//! 5. `lore_get_recommendations` - recomendações ranqueadas para um contexto
//! 6. `lore_predict_outcome` - prevê como um projeto planejado vai se sair
//! 7. `lore_submit_feedback` - avalia uma recomendação
//! 8. `lore_get_metrics` - métricas de aprendizado
//! 9. `lore_task` - qualquer tarefa com tag, repassada como veio

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::knowledge::KnowledgeBase;
use crate::types::requests::LearningTask;
use crate::types::responses::TaskResponse;

use super::protocol::{ToolDescription, ToolResult};

/// Tool de repasse bruto.
const RAW_TASK_TOOL: &str = "lore_task";

/// Nome da tool e a tarefa que ela executa.
const TOOL_TASKS: [(&str, &str); 8] = [
    ("lore_analyze_patterns", "analyze_patterns"),
    ("lore_security_analysis", "security_pattern_analysis"),
    ("lore_queue_samples", "queue_samples"),
    ("lore_learn_from_project", "learn_from_project"),
    ("lore_get_recommendations", "get_recommendations"),
    ("lore_predict_outcome", "predict_outcome"),
    ("lore_submit_feedback", "submit_feedback"),
    ("lore_get_metrics", "get_metrics"),
];

/// Executa chamadas de tools MCP contra uma base de conhecimento compartilhada.
pub struct ToolHandler {
    knowledge: Arc<KnowledgeBase>,
    deadline: Duration,
}

impl ToolHandler {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        let deadline = knowledge.config().request_timeout();
        Self {
            knowledge,
            deadline,
        }
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Todas as tools oferecidas pelo servidor.
    pub fn list_tools() -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "lore_analyze_patterns",
                "Extract code patterns from samples and learn them. Returns new patterns, updated patterns and similar known patterns.",
                json!({
                    "type": "object",
                    "properties": {
                        "code_samples": samples_schema(),
                        "context": context_schema()
                    },
                    "required": ["code_samples"]
                }),
            ),
            ToolDescription::new(
                "lore_security_analysis",
                "Pattern analysis with the context focus set to security.",
                json!({
                    "type": "object",
                    "properties": {
                        "code_samples": samples_schema(),
                        "context": context_schema()
                    },
                    "required": ["code_samples"]
                }),
            ),
            ToolDescription::new(
                "lore_queue_samples",
                "Queue code samples for background analysis. The oldest samples are dropped when the buffer is full.",
                json!({
                    "type": "object",
                    "properties": {
                        "code_samples": samples_schema(),
                        "context": context_schema()
                    },
                    "required": ["code_samples"]
                }),
            ),
            ToolDescription::new(
                "lore_learn_from_project",
                "Record a completed project so technology correlations and success predictions improve. Recording the same project_id again replaces it.",
                json!({
                    "type": "object",
                    "properties": {
                        "project_data": {
                            "type": "object",
                            "properties": {
                                "project_id": {"type": "string"},
                                "project_type": {"type": "string"},
                                "technologies": {"type": "array", "items": {"type": "string"}},
                                "patterns_used": {"type": "array", "items": {"type": "string"}},
                                "completion_time": {"type": "number", "description": "Hours"},
                                "success_score": {"type": "number", "minimum": 0, "maximum": 1},
                                "issues_encountered": {"type": "array", "items": {"type": "string"}}
                            }
                        }
                    },
                    "required": ["project_data"]
                }),
            ),
            ToolDescription::new(
                "lore_get_recommendations",
                "Ranked pattern, technology, performance and architecture recommendations for a project context.",
                json!({
                    "type": "object",
                    "properties": {
                        "context": context_schema()
                    }
                }),
            ),
            ToolDescription::new(
                "lore_predict_outcome",
                "Predict success score, risks and completion time of a planned project.",
                json!({
                    "type": "object",
                    "properties": {
                        "project_config": context_schema()
                    }
                }),
            ),
            ToolDescription::new(
                "lore_submit_feedback",
                "Rate a recommendation from 1 (useless) to 5 (excellent).",
                json!({
                    "type": "object",
                    "properties": {
                        "feedback": {
                            "type": "object",
                            "properties": {
                                "recommendation_id": {"type": "string"},
                                "rating": {"type": "integer", "minimum": 1, "maximum": 5},
                                "feedback_text": {"type": "string"},
                                "implemented": {"type": "boolean"},
                                "outcome": {"type": "string"}
                            },
                            "required": ["recommendation_id", "rating"]
                        }
                    },
                    "required": ["feedback"]
                }),
            ),
            ToolDescription::new(
                "lore_get_metrics",
                "Learning metrics and knowledge base statistics.",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
            ToolDescription::new(
                RAW_TASK_TOOL,
                "Run a raw task object tagged by task_type.",
                json!({
                    "type": "object",
                    "properties": {
                        "task_type": {
                            "type": "string",
                            "enum": LearningTask::AVAILABLE
                        }
                    },
                    "required": ["task_type"]
                }),
            ),
        ]
    }

    /// Executa uma tool. Falhas são reportadas no resultado, nunca propagadas.
    pub async fn handle_tool_call(&self, name: &str, arguments: Value) -> ToolResult {
        let raw = if name == RAW_TASK_TOOL {
            arguments
        } else {
            match TOOL_TASKS.iter().find(|(tool, _)| *tool == name) {
                Some((_, task_type)) => tag_arguments(arguments, task_type),
                None => return ToolResult::error(format!("Unknown tool: {}", name)),
            }
        };

        let response = match LearningTask::from_value(raw) {
            Ok(task) => {
                self.knowledge
                    .dispatch_with_deadline(task, self.deadline)
                    .await
            }
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Rejected tool arguments");
                TaskResponse::from_error(&e)
            }
        };

        ToolResult::json(&response, !response.is_ok())
    }
}

/// Adiciona a tag `task_type` aos argumentos de uma tool.
fn tag_arguments(arguments: Value, task_type: &str) -> Value {
    let mut object = match arguments {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    object.insert("task_type".to_string(), Value::from(task_type));
    Value::Object(object)
}

fn samples_schema() -> Value {
    json!({
        "type": "array",
        "items": {"type": "string"},
        "description": "Source code samples, any language"
    })
}

fn context_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "technologies": {"type": "array", "items": {"type": "string"}},
            "project_type": {"type": "string"},
            "requirements": {"type": "object"},
            "success_metrics": {
                "type": "object",
                "description": "Numeric metrics; overall_score in [0, 1] drives pattern success rates"
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::Config;

    async fn handler() -> ToolHandler {
        let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
        ToolHandler::new(Arc::new(kb))
    }

    fn body(result: &ToolResult) -> Value {
        serde_json::from_str(result.text()).unwrap()
    }

    #[test]
    fn test_list_tools() {
        let tools = ToolHandler::list_tools();
        assert_eq!(tools.len(), 9);

        let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 9);
        assert!(tools.iter().all(|t| t.input_schema["type"] == "object"));
    }

    #[tokio::test]
    async fn test_analyze_tool() {
        let handler = handler().await;
        let result = handler
            .handle_tool_call(
                "lore_analyze_patterns",
                json!({
                    "code_samples": ["def handler(event):\n    return event\n"],
                    "context": {"technologies": ["python"]}
                }),
            )
            .await;

        assert!(!result.is_error);
        let value = body(&result);
        assert_eq!(value["status"], "ok");
        assert_eq!(value["data"]["new_patterns"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_without_arguments() {
        let handler = handler().await;
        let result = handler.handle_tool_call("lore_get_metrics", Value::Null).await;

        assert!(!result.is_error);
        assert_eq!(body(&result)["data"]["patterns_learned"], 0);
    }

    #[tokio::test]
    async fn test_invalid_feedback_is_error_result() {
        let handler = handler().await;
        let result = handler
            .handle_tool_call(
                "lore_submit_feedback",
                json!({"feedback": {"recommendation_id": "x", "rating": 0}}),
            )
            .await;

        assert!(result.is_error);
        assert_eq!(body(&result)["error_kind"], "validation_error");
    }

    #[tokio::test]
    async fn test_raw_task_unknown_type() {
        let handler = handler().await;
        let result = handler
            .handle_tool_call(RAW_TASK_TOOL, json!({"task_type": "optimize_everything"}))
            .await;

        assert!(result.is_error);
        let value = body(&result);
        assert_eq!(value["error_kind"], "unsupported_task");
        assert_eq!(value["available_tasks"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let handler = handler().await;
        let result = handler.handle_tool_call("lore_nope", json!({})).await;
        assert!(result.is_error);
        assert!(result.text().contains("Unknown tool"));
    }
}
