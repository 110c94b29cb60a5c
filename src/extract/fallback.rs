//! Varredura por regex usada quando uma amostra não tem estrutura utilizável.

use once_cell::sync::Lazy;
use regex::Regex;

use super::PatternCandidate;

static RULES: Lazy<Vec<(&'static str, &'static str, Regex)>> = Lazy::new(|| {
    let rules = [
        ("import", "Import pattern", r"(?m)^[ \t]*(?:import|from|use)[ \t]+\S.*$"),
        (
            "async_function",
            "Async function pattern",
            r"async[ \t]+(?:def|fn|function)[ \t]+\w+",
        ),
        ("class_definition", "Class definition pattern", r"\bclass[ \t]+\w+"),
        ("decorator", "Decorator pattern", r"(?m)^[ \t]*@\w+"),
        (
            "exception_handling",
            "Exception handling pattern",
            r"\btry[ \t]*:|\bexcept\b[^\n]*|\bfinally[ \t]*:|\bcatch[ \t]*\([^)\n]*\)",
        ),
        (
            "comprehension",
            "Comprehension pattern",
            r"\[[^\[\]\n]*?[ \t]+for[ \t]+[^\[\]\n]*?\]",
        ),
    ];

    rules
        .into_iter()
        .filter_map(|(kind, description, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((kind, description, re)),
            Err(e) => {
                tracing::error!(kind, error = %e, "Invalid fallback pattern");
                None
            }
        })
        .collect()
});

/// Candidatos best-effort encontrados por regex.
pub fn regex_candidates(code: &str) -> Vec<PatternCandidate> {
    let mut candidates = Vec::new();

    for (kind, description, re) in RULES.iter() {
        for m in re.find_iter(code) {
            let snippet = m.as_str().trim();
            if snippet.is_empty() {
                continue;
            }
            candidates.push(PatternCandidate::new(*kind, snippet, *description));
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &str) -> Vec<String> {
        regex_candidates(code)
            .into_iter()
            .map(|c| c.pattern_type)
            .collect()
    }

    #[test]
    fn test_imports_and_decorators() {
        let code = "import os\nfrom typing import List\n@dataclass\nclass A\n";
        let kinds = kinds(code);
        assert_eq!(kinds.iter().filter(|k| *k == "import").count(), 2);
        assert!(kinds.contains(&"decorator".to_string()));
        assert!(kinds.contains(&"class_definition".to_string()));
    }

    #[test]
    fn test_async_and_exceptions() {
        let code = "async def fetch(url)\n    try:\n        pass\n    except ValueError as e:\n";
        let candidates = regex_candidates(code);
        let async_fn = candidates
            .iter()
            .find(|c| c.pattern_type == "async_function")
            .unwrap();
        assert_eq!(async_fn.snippet, "async def fetch");
        assert!(candidates
            .iter()
            .any(|c| c.pattern_type == "exception_handling" && c.snippet.starts_with("except")));
    }

    #[test]
    fn test_comprehension() {
        let candidates = regex_candidates("squares = [x * x for x in items]");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].snippet, "[x * x for x in items]");
    }

    #[test]
    fn test_plain_text_yields_nothing() {
        assert!(regex_candidates("just some prose here").is_empty());
    }
}
