//! Extrator estrutural baseado em linhas.

use crate::{LoreError, LoreResult};

use super::fallback::regex_candidates;
use super::{CodeExtractor, PatternCandidate};

/// Como a extensão de um bloco é delimitada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockStyle {
    /// Estilo Python: `header:` seguido de um corpo mais indentado.
    Indent,
    /// Corpo delimitado por `{ ... }`.
    Brace,
    /// O header encerra o item (`struct Unit;`).
    Single,
}

#[derive(Debug)]
struct Header {
    kind: &'static str,
    label: &'static str,
    name: String,
}

/// Prefixos que não mudam o que um item é.
const MODIFIERS: [&str; 10] = [
    "pub(crate) ",
    "pub(super) ",
    "pub ",
    "export default ",
    "export ",
    "public ",
    "private ",
    "protected ",
    "static ",
    "abstract ",
];

/// Palavra-chave, tipo de pattern, rótulo da descrição.
const KEYWORDS: [(&str, &str, &str); 13] = [
    ("async def ", "async_function", "Async function"),
    ("def ", "function", "Function"),
    ("async fn ", "async_function", "Async function"),
    ("fn ", "function", "Function"),
    ("async function ", "async_function", "Async function"),
    ("function ", "function", "Function"),
    ("func ", "function", "Function"),
    ("class ", "class", "Class"),
    ("struct ", "struct", "Struct"),
    ("enum ", "enum", "Enum"),
    ("trait ", "trait", "Trait"),
    ("interface ", "interface", "Interface"),
    ("impl", "impl", "Impl block"),
];

/// Percorre blocos de função, classe e tipo; cai para regex em erros de sintaxe.
pub struct StructuralExtractor {
    max_sample_bytes: usize,
}

impl StructuralExtractor {
    pub fn new(max_sample_bytes: usize) -> Self {
        Self { max_sample_bytes }
    }

    fn parse(&self, code: &str) -> Result<Vec<PatternCandidate>, String> {
        let lines: Vec<&str> = code.lines().collect();
        let mut candidates = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let Some(header) = classify_header(line.trim()) else {
                continue;
            };

            let end = match block_style(&lines, index)? {
                BlockStyle::Single => index,
                BlockStyle::Indent => indent_block_end(&lines, index)?,
                BlockStyle::Brace => brace_block_end(&lines, index)?,
            };

            let snippet = lines[index..=end].join("\n");
            let description = if header.name.is_empty() {
                header.label.to_string()
            } else {
                format!("{}: {}", header.label, header.name)
            };
            candidates.push(PatternCandidate::new(header.kind, snippet, description));
        }

        Ok(candidates)
    }
}

impl Default for StructuralExtractor {
    fn default() -> Self {
        Self::new(256 * 1024)
    }
}

impl CodeExtractor for StructuralExtractor {
    fn name(&self) -> &str {
        "structural"
    }

    fn extract(&self, code: &str) -> LoreResult<Vec<PatternCandidate>> {
        if code.trim().is_empty() {
            return Err(LoreError::ExtractionFailure("empty sample".into()));
        }
        if code.contains('\0') {
            return Err(LoreError::ExtractionFailure("binary content".into()));
        }
        if code.len() > self.max_sample_bytes {
            return Err(LoreError::ExtractionFailure(format!(
                "sample is {} bytes, limit is {}",
                code.len(),
                self.max_sample_bytes
            )));
        }

        match self.parse(code) {
            Ok(candidates) => Ok(candidates),
            Err(reason) => {
                tracing::debug!(reason = %reason, "Structural parse failed, using regex fallback");
                Ok(regex_candidates(code))
            }
        }
    }
}

fn strip_modifiers(mut line: &str) -> &str {
    loop {
        let before = line;
        for modifier in MODIFIERS {
            if let Some(rest) = line.strip_prefix(modifier) {
                line = rest;
            }
        }
        if before == line {
            return line;
        }
    }
}

fn classify_header(trimmed: &str) -> Option<Header> {
    let line = strip_modifiers(trimmed);

    for (keyword, kind, label) in KEYWORDS {
        let Some(rest) = line.strip_prefix(keyword) else {
            continue;
        };
        // `impl` precisa ser seguido de espaço ou lista de genéricos.
        if keyword == "impl" && !(rest.starts_with(' ') || rest.starts_with('<')) {
            continue;
        }
        let name: String = if keyword == "impl" {
            String::new()
        } else {
            rest.chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect()
        };
        if keyword != "impl" && name.is_empty() && kind != "function" {
            continue;
        }
        return Some(Header { kind, label, name });
    }

    None
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn block_style(lines: &[&str], index: usize) -> Result<BlockStyle, String> {
    let line = lines[index].trim_end();

    if line.contains('{') {
        return Ok(BlockStyle::Brace);
    }
    if line.ends_with(':') {
        return Ok(BlockStyle::Indent);
    }
    if line.ends_with(';') {
        return Ok(BlockStyle::Single);
    }

    // O header pode ocupar várias linhas ou pôr a chave na linha seguinte.
    for next in lines.iter().skip(index + 1).take(4) {
        let next = next.trim_end();
        if next.contains('{') {
            return Ok(BlockStyle::Brace);
        }
        if next.ends_with(':') {
            return Ok(BlockStyle::Indent);
        }
        if next.ends_with(';') {
            return Ok(BlockStyle::Single);
        }
    }

    Err(format!(
        "line {}: header '{}' has no body",
        index + 1,
        lines[index].trim()
    ))
}

fn indent_block_end(lines: &[&str], index: usize) -> Result<usize, String> {
    // O header pode continuar até a linha terminada em ':'.
    let mut header_end = index;
    while !lines[header_end].trim_end().ends_with(':') {
        header_end += 1;
    }

    let base = indentation(lines[index]);
    let mut end = header_end;
    let mut has_body = false;

    for (offset, line) in lines.iter().enumerate().skip(header_end + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indentation(line) <= base {
            break;
        }
        has_body = true;
        end = offset;
    }

    if !has_body {
        return Err(format!("line {}: expected an indented block", index + 1));
    }
    Ok(end)
}

fn brace_block_end(lines: &[&str], index: usize) -> Result<usize, String> {
    let mut depth: i64 = 0;
    let mut opened = false;

    for (offset, line) in lines.iter().enumerate().skip(index) {
        let mut in_string = false;
        let mut escaped = false;

        for c in line.chars() {
            if in_string {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => in_string = false,
                    _ => escaped = false,
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!("line {}: unexpected '}}'", offset + 1));
                    }
                }
                _ => {}
            }
        }

        if opened && depth == 0 {
            return Ok(offset);
        }
    }

    Err(format!("line {}: unbalanced braces", index + 1))
}
