//! Cache LRU de listas de recomendações com TTL por relógio de parede.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::types::requests::ProjectContext;
use crate::types::responses::Recommendation;
use crate::LoreResult;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

/// Lista de recomendações em cache.
#[derive(Debug, Clone)]
pub struct CachedRecommendations {
    /// Recomendações exatamente como foram calculadas.
    pub recommendations: Vec<Recommendation>,

    /// Momento em que a entrada foi armazenada.
    pub cached_at: DateTime<Utc>,
}

impl CachedRecommendations {
    pub fn new(recommendations: Vec<Recommendation>) -> Self {
        Self {
            recommendations,
            cached_at: Utc::now(),
        }
    }

    /// Verifica se a entrada tem pelo menos `ttl` de idade.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let elapsed = Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        elapsed >= ttl
    }
}

/// Estatísticas do cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Número atual de entradas.
    pub size: usize,

    /// Capacidade máxima.
    pub capacity: usize,

    pub hits: u64,

    pub misses: u64,
}

impl CacheStats {
    /// Calcula a taxa de acerto.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache LRU indexado por um hash estável do contexto da consulta.
pub struct RecommendationCache {
    cache: LruCache<String, CachedRecommendations>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RecommendationCache {
    /// Cria um novo cache.
    ///
    /// # Argumentos
    /// - `capacity`: Número máximo de contextos mantidos
    /// - `ttl`: Idade máxima de uma entrada
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            cache: LruCache::new(cap),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cria um cache com o TTL padrão de uma hora.
    pub fn default_config() -> Self {
        Self::new(DEFAULT_CAPACITY.get(), Duration::from_secs(3600))
    }

    /// Gera a chave de cache de um contexto.
    ///
    /// SHA256 da forma JSON canônica; coleções ordenadas tornam a codificação
    /// independente da ordem de inserção.
    pub fn cache_key(context: &ProjectContext) -> LoreResult<String> {
        let canonical = serde_json::to_vec(context)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Busca uma chave.
    ///
    /// Retorna `None` se ausente ou expirada; entradas expiradas são removidas.
    pub fn get(&mut self, key: &str) -> Option<&Vec<Recommendation>> {
        let is_expired = self.cache.peek(key).map(|c| c.is_expired(self.ttl));

        match is_expired {
            Some(true) => {
                self.cache.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(false) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.cache.get(key).map(|c| &c.recommendations)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Armazena uma lista recém calculada, substituindo a entrada anterior.
    pub fn insert(&mut self, key: String, recommendations: Vec<Recommendation>) {
        self.cache.put(key, CachedRecommendations::new(recommendations));
    }

    pub fn invalidate(&mut self, key: &str) {
        self.cache.pop(key);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Retorna estatísticas do cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            capacity: self.cache.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Remove entradas expiradas; retorna quantas foram descartadas.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, v)| v.is_expired(self.ttl))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired_keys {
            self.cache.pop(key);
        }
        expired_keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::responses::{Impact, RecommendationKind};

    fn recommendation(id: &str) -> Recommendation {
        Recommendation {
            id: id.to_string(),
            kind: RecommendationKind::Pattern,
            title: "Use pattern".to_string(),
            description: String::new(),
            confidence: 0.9,
            context: serde_json::Value::Null,
            supporting_evidence: vec![],
            implementation_steps: vec![],
            estimated_impact: Impact::Medium,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cache_key_ignores_insertion_order() {
        let a = ProjectContext::new().with_technologies(["rust", "tokio"]);
        let b = ProjectContext::new().with_technologies(["tokio", "rust"]);
        let c = ProjectContext::new().with_technologies(["rust"]);

        let ka = RecommendationCache::cache_key(&a).unwrap();
        assert_eq!(ka, RecommendationCache::cache_key(&b).unwrap());
        assert_ne!(ka, RecommendationCache::cache_key(&c).unwrap());
    }

    #[test]
    fn test_cache_hit_returns_identical_list() {
        let mut cache = RecommendationCache::new(10, Duration::from_secs(60));
        let list = vec![recommendation("a"), recommendation("b")];
        cache.insert("k".to_string(), list.clone());

        assert_eq!(cache.get("k"), Some(&list));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_cache_miss() {
        let mut cache = RecommendationCache::new(10, Duration::from_secs(60));
        assert!(cache.get("nonexistent").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_zero_ttl_always_expires() {
        let mut cache = RecommendationCache::new(10, Duration::ZERO);
        cache.insert("k".to_string(), vec![recommendation("a")]);

        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = RecommendationCache::new(2, Duration::from_secs(60));
        cache.insert("k1".to_string(), vec![]);
        cache.insert("k2".to_string(), vec![]);
        cache.insert("k3".to_string(), vec![]);

        assert!(cache.get("k1").is_none());
        assert!(cache.get("k2").is_some());
        assert!(cache.get("k3").is_some());
    }

    #[test]
    fn test_insert_replaces_entry() {
        let mut cache = RecommendationCache::new(10, Duration::from_secs(60));
        cache.insert("k".to_string(), vec![recommendation("old")]);
        cache.insert("k".to_string(), vec![recommendation("new")]);

        assert_eq!(cache.get("k").unwrap()[0].id, "new");
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_cleanup_expired() {
        let mut cache = RecommendationCache::new(10, Duration::ZERO);
        cache.insert("k1".to_string(), vec![]);
        cache.insert("k2".to_string(), vec![]);

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_hit_rate() {
        let mut cache = RecommendationCache::new(10, Duration::from_secs(60));
        cache.insert("k".to_string(), vec![]);
        cache.get("k");
        cache.get("x");
        cache.get("k");
        assert!((cache.stats().hit_rate() - 0.666).abs() < 0.01);
    }
}
