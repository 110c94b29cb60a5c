//! Extração de patterns de código.
//!
//! Transforma texto-fonte em candidatos a pattern. O walker estrutural
//! reconhece blocos de função, classe e tipo em linguagens delimitadas por
//! indentação ou chaves; quando uma amostra não faz parse, cai para uma
//! varredura por regex e o chamador sempre recebe uma lista best-effort.

mod fallback;
mod structural;

pub use fallback::regex_candidates;
pub use structural::StructuralExtractor;

use serde::{Deserialize, Serialize};

use crate::LoreResult;

/// Descritor de pattern produzido por um extrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCandidate {
    /// function, class, import, ...
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub snippet: String,
    pub description: String,
}

impl PatternCandidate {
    pub fn new(
        pattern_type: impl Into<String>,
        snippet: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            pattern_type: pattern_type.into(),
            snippet: snippet.into(),
            description: description.into(),
        }
    }
}

/// Capacidade de extração plugável.
pub trait CodeExtractor: Send + Sync {
    /// Retorna o nome do extrator.
    fn name(&self) -> &str;

    /// Extrai candidatos de uma amostra.
    ///
    /// Só falha quando a amostra não serve como texto (vazia, binária,
    /// grande demais). Problemas de sintaxe produzem uma lista derivada de regex.
    fn extract(&self, code: &str) -> LoreResult<Vec<PatternCandidate>>;
}
