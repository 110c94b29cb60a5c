//! Backends opcionais de geração de texto.
//!
//! A inferência só enriquece resultados. Todo chamador degrada para a saída
//! da análise estática quando o backend está desabilitado ou falhando.

mod base;
mod command;
mod ollama;

pub use base::{extract_json_array, InferenceService};
pub use command::CommandInference;
pub use ollama::OllamaInference;

use std::sync::Arc;

use crate::types::config::{InferenceBackend, InferenceConfig};
use crate::LoreResult;

/// Monta o backend configurado, ou `None` quando a inferência está desabilitada.
pub fn from_config(config: &InferenceConfig) -> LoreResult<Option<Arc<dyn InferenceService>>> {
    let service: Option<Arc<dyn InferenceService>> = match config.backend {
        InferenceBackend::Disabled => None,
        InferenceBackend::Ollama => Some(Arc::new(OllamaInference::from_config(config)?)),
        InferenceBackend::Command => Some(Arc::new(CommandInference::from_config(config)?)),
    };
    Ok(service)
}
