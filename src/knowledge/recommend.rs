//! Recomendações ranqueadas e cacheadas.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::cache::{CacheStats, RecommendationCache};
use crate::inference::{extract_json_array, InferenceService};
use crate::types::config::{CacheConfig, RecommendationConfig};
use crate::types::requests::ProjectContext;
use crate::types::responses::{Impact, Recommendation, RecommendationKind};
use crate::{LoreError, LoreResult};

use super::correlation::CorrelationLearner;
use super::patterns::PatternStore;
use super::signature::PatternSignature;

const ARCHITECTURE_SYSTEM_PROMPT: &str = "You are a senior software architect. \
Analyse the project context and give specific architecture recommendations based on \
best practices for the project type, technology stack compatibility, scalability and \
maintainability. Focus on concrete, actionable advice.";

/// Resultado de uma consulta de recomendações.
#[derive(Debug, Clone)]
pub struct Recommended {
    pub recommendations: Vec<Recommendation>,
    /// False quando servido do cache.
    pub fresh: bool,
}

/// Compõe as quatro fontes de recomendação.
pub struct RecommendationEngine {
    config: RecommendationConfig,
    inference: Option<Arc<dyn InferenceService>>,
    inference_timeout: Duration,
    cache: Option<Mutex<RecommendationCache>>,
}

impl RecommendationEngine {
    pub fn new(
        config: RecommendationConfig,
        cache_config: &CacheConfig,
        inference: Option<Arc<dyn InferenceService>>,
        inference_timeout: Duration,
    ) -> Self {
        let cache = cache_config.enabled.then(|| {
            Mutex::new(RecommendationCache::new(
                cache_config.capacity,
                Duration::from_secs(cache_config.ttl_secs),
            ))
        });

        Self {
            config,
            inference,
            inference_timeout,
            cache,
        }
    }

    /// Retorna recomendações para `context`, do cache quando ainda válidas.
    ///
    /// Os locks dos stores só ficam presos enquanto as fontes estáticas são
    /// calculadas, nunca durante a chamada de inferência.
    pub async fn recommend(
        &self,
        context: &ProjectContext,
        patterns: &RwLock<PatternStore>,
        correlations: &RwLock<CorrelationLearner>,
    ) -> LoreResult<Recommended> {
        let key = RecommendationCache::cache_key(context)?;

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().await.get(&key) {
                tracing::debug!(key = %key, "Recommendation cache hit");
                return Ok(Recommended {
                    recommendations: hit.clone(),
                    fresh: false,
                });
            }
        }

        let mut recommendations = {
            let patterns = patterns.read().await;
            let correlations = correlations.read().await;

            let mut found = self.pattern_recommendations(&patterns, context);
            found.extend(self.technology_recommendations(&correlations, context));
            found.extend(self.performance_recommendation(&patterns, context));
            found
        };

        recommendations.extend(self.architecture_recommendations(context).await);

        let ranked = self.rank(recommendations);

        if let Some(cache) = &self.cache {
            cache.lock().await.insert(key, ranked.clone());
        }

        Ok(Recommended {
            recommendations: ranked,
            fresh: true,
        })
    }

    /// Ordena por confiança, decrescente, e mantém as `max_results` primeiras.
    ///
    /// A ordenação é estável, então confianças iguais mantêm a ordem das fontes.
    pub fn rank(&self, mut recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
        recommendations.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        recommendations.truncate(self.config.max_results);
        recommendations
    }

    /// Patterns frequentes e de alto sucesso que compartilham uma tecnologia.
    pub fn pattern_recommendations(
        &self,
        patterns: &PatternStore,
        context: &ProjectContext,
    ) -> Vec<Recommendation> {
        let mut relevant: Vec<_> = patterns
            .iter()
            .filter(|p| {
                p.success_rate > self.config.pattern_min_success_rate
                    && p.frequency > self.config.pattern_min_frequency
                    && p.tech_overlap(&context.technologies) > 0
            })
            .collect();

        relevant.sort_by(|a, b| {
            b.strength()
                .total_cmp(&a.strength())
                .then_with(|| a.id.cmp(&b.id))
        });

        relevant
            .into_iter()
            .take(self.config.pattern_top_k)
            .map(|pattern| Recommendation {
                id: format!("pattern_{}", pattern.id),
                kind: RecommendationKind::Pattern,
                title: format!(
                    "Use {} pattern: {}",
                    pattern.pattern_type, pattern.description
                ),
                description: format!(
                    "This pattern has a {:.0}% success rate and has been seen {} times.",
                    pattern.success_rate * 100.0,
                    pattern.frequency
                ),
                confidence: (pattern.success_rate * (pattern.frequency as f64 / 10.0)).min(0.95),
                context: json!({ "pattern_id": pattern.id }),
                supporting_evidence: vec![
                    format!("Success rate: {:.0}%", pattern.success_rate * 100.0),
                    format!("Usage frequency: {}", pattern.frequency),
                    format!(
                        "Compatible technologies: {}",
                        pattern
                            .technologies
                            .iter()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                ],
                implementation_steps: vec![
                    "Review the pattern implementation".to_string(),
                    "Adapt the pattern to your context".to_string(),
                    "Test the integration".to_string(),
                    "Monitor how the pattern performs".to_string(),
                ],
                estimated_impact: Impact::Medium,
                created_at: Utc::now(),
            })
            .collect()
    }

    /// Tecnologias que coocorrem com a stack do contexto em projetos bem-sucedidos.
    pub fn technology_recommendations(
        &self,
        correlations: &CorrelationLearner,
        context: &ProjectContext,
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for t1 in &context.technologies {
            let Some(correlated) = correlations.get_correlated(t1) else {
                continue;
            };
            for (t2, score) in correlated {
                if context.technologies.contains(t2)
                    || *score <= self.config.technology_min_correlation
                {
                    continue;
                }
                recommendations.push(Recommendation {
                    id: format!("tech_{}_{}", t1, t2),
                    kind: RecommendationKind::Technology,
                    title: format!("Consider adding {}", t2),
                    description: format!(
                        "{} works well with {} and could strengthen the project.",
                        t2, t1
                    ),
                    confidence: score.min(0.9),
                    context: json!({ "suggested_tech": t2, "based_on": t1 }),
                    supporting_evidence: vec![format!("Correlation with {}: {:.2}", t1, score)],
                    implementation_steps: vec![
                        format!("Evaluate {} compatibility", t2),
                        format!("Plan the {} integration", t2),
                        "Update project dependencies".to_string(),
                        "Test the integration".to_string(),
                    ],
                    estimated_impact: Impact::Medium,
                    created_at: Utc::now(),
                });
            }
        }

        recommendations
    }

    /// O pattern de performance mais forte.
    pub fn performance_recommendation(
        &self,
        patterns: &PatternStore,
        context: &ProjectContext,
    ) -> Option<Recommendation> {
        let best = patterns
            .iter()
            .filter(|p| PatternSignature::has_performance_marker(&p.description, &p.snippet))
            .max_by(|a, b| {
                a.strength()
                    .total_cmp(&b.strength())
                    .then_with(|| b.id.cmp(&a.id))
            })?;

        Some(Recommendation {
            id: format!("perf_{}", best.id),
            kind: RecommendationKind::Performance,
            title: "Performance optimization pattern".to_string(),
            description: format!(
                "Apply the {} pattern to improve performance.",
                best.description
            ),
            confidence: (best.success_rate * 0.8).clamp(0.0, 1.0),
            context: json!({
                "pattern_id": best.id,
                "project_type": context.project_type,
            }),
            supporting_evidence: vec![
                format!("Pattern success rate: {:.0}%", best.success_rate * 100.0),
                format!("Seen {} times", best.frequency),
            ],
            implementation_steps: vec![
                "Identify performance bottlenecks".to_string(),
                "Apply the optimization pattern".to_string(),
                "Benchmark before and after".to_string(),
            ],
            estimated_impact: Impact::High,
            created_at: Utc::now(),
        })
    }

    /// Sugestões livres do serviço de inferência.
    ///
    /// Qualquer falha gera uma lista vazia; o chamador nunca a vê.
    pub async fn architecture_recommendations(&self, context: &ProjectContext) -> Vec<Recommendation> {
        let Some(inference) = &self.inference else {
            return Vec::new();
        };

        match self.request_architecture(inference.as_ref(), context).await {
            Ok(recommendations) => recommendations,
            Err(e) => {
                tracing::warn!(
                    backend = inference.name(),
                    error = %e,
                    "Architecture suggestions unavailable"
                );
                Vec::new()
            }
        }
    }

    async fn request_architecture(
        &self,
        inference: &dyn InferenceService,
        context: &ProjectContext,
    ) -> LoreResult<Vec<Recommendation>> {
        let user_prompt = format!(
            "Project context:\n{}\n\n\
             Based on successful patterns, recommend 2-3 specific architecture improvements.\n\
             Answer with a JSON array only:\n\
             [{{\"title\": \"...\", \"description\": \"...\", \
             \"implementation_steps\": [\"...\"], \"estimated_impact\": \"low|medium|high\"}}]",
            serde_json::to_string_pretty(context)?
        );

        let raw = tokio::time::timeout(
            self.inference_timeout,
            inference.complete(ARCHITECTURE_SYSTEM_PROMPT, &user_prompt),
        )
        .await
        .map_err(|_| {
            LoreError::InferenceUnavailable(format!(
                "no answer within {:?}",
                self.inference_timeout
            ))
        })??;

        let context_value = serde_json::to_value(context)?;
        let batch = Uuid::new_v4().simple().to_string();

        Ok(extract_json_array(&raw)?
            .iter()
            .filter_map(Value::as_object)
            .enumerate()
            .map(|(i, suggestion)| Recommendation {
                id: format!("arch_{}_{}", i, batch),
                kind: RecommendationKind::Architecture,
                title: suggestion
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("Architecture improvement")
                    .to_string(),
                description: suggestion
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                confidence: self.config.architecture_confidence,
                context: context_value.clone(),
                supporting_evidence: vec!["Based on architectural best practices".to_string()],
                implementation_steps: suggestion
                    .get("implementation_steps")
                    .and_then(Value::as_array)
                    .map(|steps| {
                        steps
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                estimated_impact: suggestion
                    .get("estimated_impact")
                    .and_then(Value::as_str)
                    .map(Impact::parse_lenient)
                    .unwrap_or(Impact::Medium),
                created_at: Utc::now(),
            })
            .collect())
    }

    /// Estatísticas do cache; zeradas quando o cache está desabilitado.
    pub async fn cache_stats(&self) -> CacheStats {
        match &self.cache {
            Some(cache) => cache.lock().await.stats(),
            None => CacheStats::default(),
        }
    }

    /// Descarta entradas expiradas do cache.
    pub async fn cleanup_cache(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.lock().await.cleanup_expired(),
            None => 0,
        }
    }
}
