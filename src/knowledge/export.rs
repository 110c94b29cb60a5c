//! Exportação e importação de conhecimento.
//!
//! Move o estado aprendido entre instalações como um único bundle JSON.

use std::path::Path;
use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::requests::ProjectOutcome;
use crate::{LoreError, LoreResult};

use super::base::KnowledgeBase;
use super::correlation::CorrelationMatrix;
use super::patterns::CodePattern;
use super::predictor::PredictorWeights;
use super::signature::PatternSignature;

/// Formato do bundle escrito por [`KnowledgeBase::export`].
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Tudo que uma base de conhecimento aprendeu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeExport {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub patterns: Vec<CodePattern>,
    pub outcomes: Vec<ProjectOutcome>,
    #[serde(default)]
    pub correlations: CorrelationMatrix,
    #[serde(default)]
    pub predictor_weights: PredictorWeights,
}

/// O que uma importação alterou.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Patterns que ainda não eram conhecidos.
    pub imported: usize,
    /// Patterns conhecidos substituídos por versões de entrada mais observadas.
    pub merged: usize,
    /// Patterns mantidos como estavam, ou rejeitados por inconsistência.
    pub skipped: usize,
    /// Outcomes com um project id novo.
    pub outcomes_imported: usize,
}

impl KnowledgeBase {
    /// Snapshot do estado aprendido.
    pub async fn export_bundle(&self) -> KnowledgeExport {
        let patterns = self.patterns.read().await;
        let outcomes = self.outcomes.read().await;
        let correlations = self.correlations.read().await;
        let predictor = self.predictor.read().await;

        KnowledgeExport {
            version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            patterns: patterns.iter().cloned().collect(),
            outcomes: outcomes.iter().cloned().collect(),
            correlations: correlations.matrix().clone(),
            predictor_weights: predictor.weights().clone(),
        }
    }

    /// Grava o estado aprendido em um arquivo JSON.
    pub async fn export(&self, path: &Path) -> LoreResult<KnowledgeExport> {
        let export = self.export_bundle().await;

        let json = serde_json::to_string_pretty(&export)?;
        tokio::fs::write(path, json).await?;

        tracing::info!(
            path = %path.display(),
            patterns = export.patterns.len(),
            outcomes = export.outcomes.len(),
            "Knowledge exported"
        );

        Ok(export)
    }

    /// Mescla um bundle JSON nesta base de conhecimento.
    pub async fn import(&self, path: &Path) -> LoreResult<ImportResult> {
        let json = tokio::fs::read_to_string(path).await?;
        let export: KnowledgeExport = serde_json::from_str(&json)?;
        let result = self.import_bundle(export).await?;

        tracing::info!(
            path = %path.display(),
            imported = result.imported,
            merged = result.merged,
            skipped = result.skipped,
            outcomes = result.outcomes_imported,
            "Knowledge imported"
        );

        Ok(result)
    }

    /// Mescla um bundle.
    ///
    /// Patterns desconhecidos são adicionados; um conhecido só é substituído quando
    /// a cópia de entrada tem mais observações. Outcomes entram por project id
    /// novo. Entradas de pesos preenchem lacunas mas nunca sobrescrevem.
    pub async fn import_bundle(&self, export: KnowledgeExport) -> LoreResult<ImportResult> {
        if export.version != EXPORT_FORMAT_VERSION {
            return Err(LoreError::validation(format!(
                "unsupported export version '{}', expected '{}'",
                export.version, EXPORT_FORMAT_VERSION
            )));
        }

        let mut result = ImportResult::default();
        {
            let mut patterns = self.patterns.write().await;
            let mut outcomes = self.outcomes.write().await;
            let mut correlations = self.correlations.write().await;
            let mut predictor = self.predictor.write().await;

            for pattern in export.patterns {
                if !is_consistent(&pattern) {
                    tracing::warn!(pattern_id = %pattern.id, "Skipping inconsistent pattern");
                    result.skipped += 1;
                    continue;
                }
                match patterns.get(&pattern.id).map(|p| p.frequency) {
                    None => {
                        patterns.insert(pattern);
                        result.imported += 1;
                    }
                    Some(local) if pattern.frequency > local => {
                        patterns.insert(pattern);
                        result.merged += 1;
                    }
                    Some(_) => result.skipped += 1,
                }
            }

            for outcome in export.outcomes {
                if outcome.validate().is_err() || outcomes.get(&outcome.project_id).is_some() {
                    continue;
                }
                outcomes.record(outcome);
                result.outcomes_imported += 1;
            }

            correlations.fill_missing(export.correlations);
            predictor.fill_missing(export.predictor_weights);
        }

        self.snapshots_dirty.store(true, Ordering::SeqCst);
        Ok(result)
    }
}

fn is_consistent(pattern: &CodePattern) -> bool {
    pattern.id == PatternSignature::pattern_id(&pattern.snippet)
        && pattern.frequency >= 1
        && (0.0..=1.0).contains(&pattern.success_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::Config;
    use crate::types::requests::ProjectContext;
    use tempfile::TempDir;

    async fn seeded() -> KnowledgeBase {
        let kb = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
        kb.analyze_patterns(
            &["fn a() {}\n".to_string(), "class B:\n    x = 1\n".to_string()],
            &ProjectContext::new().with_technologies(["rust"]),
        )
        .await
        .unwrap();
        kb.learn_from_project(ProjectOutcome::new("p1", 0.9).with_technologies(["rust", "tokio"]))
            .await
            .unwrap();
        kb
    }

    #[tokio::test]
    async fn test_export_then_import_into_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("knowledge.json");

        let source = seeded().await;
        let exported = source.export(&path).await.unwrap();
        assert_eq!(exported.patterns.len(), 2);

        let target = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
        let result = target.import(&path).await.unwrap();

        assert_eq!(result.imported, 2);
        assert_eq!(result.outcomes_imported, 1);
        let stats = target.stats().await;
        assert_eq!(stats.patterns, 2);
        assert_eq!(stats.technology_correlations, 2);
    }

    #[tokio::test]
    async fn test_import_keeps_better_local_copy() {
        let kb = seeded().await;
        let mut bundle = kb.export_bundle().await;

        let result = kb.import_bundle(bundle.clone()).await.unwrap();
        assert_eq!(result.skipped, 2);
        assert_eq!(result.outcomes_imported, 0);

        bundle.patterns[0].frequency = 10;
        let result = kb.import_bundle(bundle).await.unwrap();
        assert_eq!(result.merged, 1);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn test_import_rejects_tampered_patterns() {
        let kb = seeded().await;
        let mut bundle = kb.export_bundle().await;
        bundle.patterns[0].snippet.push_str("\nlet changed = 1;");
        bundle.patterns[1].success_rate = 4.0;

        let target = KnowledgeBase::in_memory(Config::default_config()).await.unwrap();
        let result = target.import_bundle(bundle).await.unwrap();
        assert_eq!(result.imported, 0);
        assert_eq!(result.skipped, 2);
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_version() {
        let kb = seeded().await;
        let mut bundle = kb.export_bundle().await;
        bundle.version = "9.9".into();
        assert!(matches!(
            kb.import_bundle(bundle).await,
            Err(LoreError::Validation(_))
        ));
    }
}
