//! Normalização de snippets e identidade de patterns.
//!
//! O id de um pattern é função pura do snippet normalizado, então dois
//! snippets que diferem só em espaços ou linhas de comentário viram o
//! mesmo pattern.

use sha2::{Digest, Sha256};

/// Tamanho de um id de pattern em caracteres hex.
pub const PATTERN_ID_LEN: usize = 16;

/// Utilitários de identidade de patterns.
pub struct PatternSignature;

impl PatternSignature {
    /// Computa o id de pattern de um snippet.
    pub fn pattern_id(snippet: &str) -> String {
        let normalized = Self::normalize(snippet);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let mut id = hex::encode(hasher.finalize());
        id.truncate(PATTERN_ID_LEN);
        id
    }

    /// Normaliza um snippet: apara as linhas, remove linhas vazias e só de
    /// comentário, colapsa sequências de espaços.
    ///
    /// Blocos `/* ... */` são acompanhados entre linhas; um `*` no início só
    /// conta como comentário dentro de um deles.
    pub fn normalize(snippet: &str) -> String {
        let mut in_block = false;
        let mut kept = Vec::new();

        for line in snippet.lines().map(str::trim) {
            if in_block {
                in_block = !line.contains("*/");
                continue;
            }
            if let Some(rest) = line.strip_prefix("/*") {
                in_block = !rest.contains("*/");
                continue;
            }
            if line.is_empty() || Self::is_line_comment(line) {
                continue;
            }
            kept.push(line.split_whitespace().collect::<Vec<_>>().join(" "));
        }
        kept.join("\n")
    }

    fn is_line_comment(line: &str) -> bool {
        if line.starts_with("#[") || line.starts_with("#!") {
            // Atributos Rust e shebangs são código.
            return false;
        }
        line.starts_with("//") || line.starts_with('#')
    }

    /// Se um pattern parece relacionado a performance.
    ///
    /// Casa `performance`/`optimization` na descrição ou marcadores
    /// async no snippet.
    pub fn has_performance_marker(description: &str, snippet: &str) -> bool {
        let description = description.to_lowercase();
        if description.contains("performance") || description.contains("optimization") {
            return true;
        }
        let snippet = snippet.to_lowercase();
        snippet.contains("async") || snippet.contains("await")
    }
}
