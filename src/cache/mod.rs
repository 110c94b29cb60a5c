//! Cache de recomendações.
//!
//! Guarda as listas de recomendações calculadas recentemente por contexto, de
//! modo que uma consulta idêntica dentro do TTL retorna exatamente a mesma lista.

mod lru;

pub use lru::{CacheStats, CachedRecommendations, RecommendationCache};
