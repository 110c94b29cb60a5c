//! Configuração do Lore.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{LoreError, LoreResult};

/// Configuração principal do Lore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configurações gerais.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Configurações do modelo de aprendizado.
    #[serde(default)]
    pub learning: LearningConfig,

    /// Configurações de ranqueamento das recomendações.
    #[serde(default)]
    pub recommendations: RecommendationConfig,

    /// Configurações do cache de recomendações.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Configurações do serviço de inferência externo.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Configurações de persistência.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Configurações da manutenção em background.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Configurações gerais.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Nível de log (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Formato de log (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Prazo aplicado a cada tarefa de um chamador (em segundos).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Configurações do modelo de aprendizado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Passo da atualização dos pesos do preditor.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Multiplicador aplicado ao success_score a cada incremento de correlação.
    #[serde(default = "default_correlation_step")]
    pub correlation_step: f64,

    /// Número máximo de amostras aguardando re-análise em background.
    #[serde(default = "default_max_samples_buffered")]
    pub max_samples_buffered: usize,

    /// Amostras maiores que isso são ignoradas (em bytes).
    #[serde(default = "default_max_sample_bytes")]
    pub max_sample_bytes: usize,

    /// Pede ao serviço de inferência que reescreva as descrições dos patterns extraídos.
    #[serde(default)]
    pub enrich_patterns: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            correlation_step: default_correlation_step(),
            max_samples_buffered: default_max_samples_buffered(),
            max_sample_bytes: default_max_sample_bytes(),
            enrich_patterns: false,
        }
    }
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_correlation_step() -> f64 {
    0.1
}

fn default_max_samples_buffered() -> usize {
    256
}

fn default_max_sample_bytes() -> usize {
    256 * 1024
}

/// Configurações de ranqueamento das recomendações.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Número máximo de recomendações retornadas por consulta.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Um pattern precisa de taxa de sucesso acima disso para ser recomendado.
    #[serde(default = "default_pattern_min_success_rate")]
    pub pattern_min_success_rate: f64,

    /// Um pattern precisa ter sido visto mais vezes que isso para ser recomendado.
    #[serde(default = "default_pattern_min_frequency")]
    pub pattern_min_frequency: u64,

    /// Número de recomendações de patterns mantidas antes da junção.
    #[serde(default = "default_pattern_top_k")]
    pub pattern_top_k: usize,

    /// Score de correlação que um par de tecnologias precisa superar.
    #[serde(default = "default_technology_min_correlation")]
    pub technology_min_correlation: f64,

    /// Confiança atribuída às sugestões de arquitetura geradas por inferência.
    #[serde(default = "default_architecture_confidence")]
    pub architecture_confidence: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            pattern_min_success_rate: default_pattern_min_success_rate(),
            pattern_min_frequency: default_pattern_min_frequency(),
            pattern_top_k: default_pattern_top_k(),
            technology_min_correlation: default_technology_min_correlation(),
            architecture_confidence: default_architecture_confidence(),
        }
    }
}

fn default_max_results() -> usize {
    10
}

fn default_pattern_min_success_rate() -> f64 {
    0.8
}

fn default_pattern_min_frequency() -> u64 {
    3
}

fn default_pattern_top_k() -> usize {
    5
}

fn default_technology_min_correlation() -> f64 {
    0.5
}

fn default_architecture_confidence() -> f64 {
    0.75
}

/// Configurações do cache de recomendações.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Habilitado.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Capacidade máxima do cache (número de contextos).
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Tempo de vida de uma entrada em segundos.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl() -> u64 {
    3600 // 1 hour
}

/// Backend de inferência a usar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InferenceBackend {
    /// Sem serviço de inferência; sugestões de arquitetura sempre vazias.
    Disabled,
    /// Endpoint HTTP compatível com Ollama.
    Ollama,
    /// CLI local que imprime a resposta no stdout.
    Command,
}

/// Configurações do serviço de inferência externo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_backend")]
    pub backend: InferenceBackend,

    /// URL base do endpoint HTTP.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Nome do modelo enviado ao endpoint.
    #[serde(default = "default_model")]
    pub model: String,

    /// Comando executado pelo backend `command`.
    #[serde(default)]
    pub command: String,

    /// Argumentos colocados antes do prompt.
    #[serde(default)]
    pub args: Vec<String>,

    /// Prazo de uma única resposta (em segundos).
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: default_inference_backend(),
            base_url: default_base_url(),
            model: default_model(),
            command: String::new(),
            args: Vec::new(),
            timeout_secs: default_inference_timeout(),
        }
    }
}

fn default_inference_backend() -> InferenceBackend {
    InferenceBackend::Disabled
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:7b".to_string()
}

fn default_inference_timeout() -> u64 {
    20
}

/// Gateway de persistência a usar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Configurações de persistência.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    /// Caminho do banco SQLite.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prazo de uma única chamada ao gateway (em segundos).
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            db_path: default_db_path(),
            timeout_secs: default_storage_timeout(),
        }
    }
}

fn default_storage_backend() -> StorageBackend {
    if cfg!(feature = "sqlite") {
        StorageBackend::Sqlite
    } else {
        StorageBackend::Memory
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".lore/lore.db")
}

fn default_storage_timeout() -> u64 {
    10
}

/// Configurações da manutenção em background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Habilitado.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Re-análise das amostras em buffer (em segundos).
    #[serde(default = "default_reanalysis_interval")]
    pub reanalysis_interval_secs: u64,

    /// Flush dos mapas de pesos e dos deltas de registros (em segundos).
    #[serde(default = "default_persist_interval")]
    pub persist_interval_secs: u64,

    /// Poda de patterns de baixo valor (em segundos).
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    /// Patterns vistos menos vezes que isso são candidatos à poda.
    #[serde(default = "default_prune_max_frequency")]
    pub prune_max_frequency: u64,

    /// Patterns com taxa de sucesso abaixo disso são candidatos à poda.
    #[serde(default = "default_prune_max_success_rate")]
    pub prune_max_success_rate: f64,

    /// Patterns não vistos há mais tempo que isso são candidatos à poda.
    #[serde(default = "default_prune_max_age_days")]
    pub prune_max_age_days: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reanalysis_interval_secs: default_reanalysis_interval(),
            persist_interval_secs: default_persist_interval(),
            prune_interval_secs: default_prune_interval(),
            prune_max_frequency: default_prune_max_frequency(),
            prune_max_success_rate: default_prune_max_success_rate(),
            prune_max_age_days: default_prune_max_age_days(),
        }
    }
}

fn default_reanalysis_interval() -> u64 {
    300
}

fn default_persist_interval() -> u64 {
    3600
}

fn default_prune_interval() -> u64 {
    1800
}

fn default_prune_max_frequency() -> u64 {
    2
}

fn default_prune_max_success_rate() -> f64 {
    0.5
}

fn default_prune_max_age_days() -> i64 {
    30
}

impl Config {
    /// Carrega configuração de um arquivo TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> LoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Salva configuração em um arquivo TOML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> LoreResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Cria configuração padrão.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            learning: LearningConfig::default(),
            recommendations: RecommendationConfig::default(),
            cache: CacheConfig::default(),
            inference: InferenceConfig::default(),
            storage: StorageConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }

    /// Tenta carregar configuração do diretório atual ou usa padrão.
    pub fn load_or_default() -> Self {
        Self::load("lore.toml").unwrap_or_else(|_| Self::default_config())
    }

    /// Verifica valores que o serde não consegue rejeitar sozinho.
    pub fn validate(&self) -> LoreResult<()> {
        let rate = self.learning.learning_rate;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(LoreError::config(format!(
                "learning.learning_rate must be in (0, 1], got {}",
                rate
            )));
        }
        if self.recommendations.max_results == 0 {
            return Err(LoreError::config("recommendations.max_results must be > 0"));
        }
        let intervals = [
            ("reanalysis_interval_secs", self.maintenance.reanalysis_interval_secs),
            ("persist_interval_secs", self.maintenance.persist_interval_secs),
            ("prune_interval_secs", self.maintenance.prune_interval_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(LoreError::config(format!("maintenance.{} must be > 0", name)));
            }
        }
        Ok(())
    }

    /// Prazo das tarefas de chamadores.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.general.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_documented_intervals() {
        let config = Config::default();
        assert_eq!(config.maintenance.reanalysis_interval_secs, 300);
        assert_eq!(config.maintenance.persist_interval_secs, 3600);
        assert_eq!(config.maintenance.prune_interval_secs, 1800);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.recommendations.max_results, 10);
        assert!((config.learning.learning_rate - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.inference.backend, InferenceBackend::Disabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [learning]
            learning_rate = 0.05

            [inference]
            backend = "ollama"
            "#,
        )
        .unwrap();

        assert!((config.learning.learning_rate - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.inference.backend, InferenceBackend::Ollama);
        assert_eq!(config.inference.base_url, "http://localhost:11434");
        assert_eq!(config.storage.db_path, PathBuf::from(".lore/lore.db"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lore.toml");

        let mut config = Config::default();
        config.maintenance.prune_max_age_days = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.maintenance.prune_max_age_days, 7);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.learning.learning_rate = 0.0;
        assert!(matches!(config.validate(), Err(LoreError::Config(_))));

        let mut config = Config::default();
        config.maintenance.prune_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
