//! Trait base dos backends de geração de texto.

use async_trait::async_trait;

use crate::{LoreError, LoreResult};

/// Serviço externo de geração de texto.
///
/// Usado só para enriquecimento opcional: reescrever descrições de patterns
/// extraídos e propor mudanças de arquitetura. Chamadores devem tratar
/// qualquer erro como "sem enriquecimento".
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Retorna o nome do backend.
    fn name(&self) -> &str;

    /// Verifica se o backend responde.
    async fn is_available(&self) -> bool;

    /// Executa uma geração e retorna o texto bruto.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> LoreResult<String>;
}

/// Extrai o primeiro array JSON da saída bruta do modelo.
///
/// Modelos costumam embrulhar JSON em prosa ou code fences; tudo entre o
/// primeiro `[` e o último `]` é interpretado.
pub fn extract_json_array(output: &str) -> LoreResult<Vec<serde_json::Value>> {
    let start = output.find('[');
    let end = output.rfind(']');

    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str(&output[start..=end]).map_err(|e| {
                LoreError::InferenceUnavailable(format!("Malformed JSON array: {}", e))
            })
        }
        _ => Err(LoreError::InferenceUnavailable(
            "Response does not contain a JSON array".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_array_from_prose() {
        let output = "Sure! Here you go:\n```json\n[{\"title\": \"a\"}, {\"title\": \"b\"}]\n```";
        let items = extract_json_array(output).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["title"], "b");
    }

    #[test]
    fn test_extract_array_rejects_garbage() {
        assert!(extract_json_array("no json here").is_err());
        assert!(extract_json_array("] backwards [").is_err());
        assert!(matches!(
            extract_json_array("[{\"title\": "),
            Err(LoreError::InferenceUnavailable(_))
        ));
    }
}
