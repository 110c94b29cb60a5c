//! Tipos de erro do Lore.

use thiserror::Error;

/// Tipo de resultado padrão do Lore.
pub type LoreResult<T> = Result<T, LoreError>;

/// Erros que podem ocorrer no Lore.
#[derive(Error, Debug)]
pub enum LoreError {
    /// Contexto, outcome ou configuração malformados enviados por um chamador.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uma amostra de código não pôde ser transformada em candidatos a pattern.
    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    /// O serviço de inferência excedeu o prazo, estava inacessível ou respondeu lixo.
    #[error("Inference service unavailable: {0}")]
    InferenceUnavailable(String),

    /// O gateway de persistência rejeitou ou excedeu o prazo de uma leitura/escrita.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported task type: {0}")]
    UnsupportedTask(String),

    /// Um prazo do chamador expirou; nada foi gravado.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "cli")]
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(String),
}

impl LoreError {
    /// Cria um erro genérico.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Cria um erro de configuração.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Cria um erro de validação.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Cria um erro de persistência.
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }

    /// Rótulo estável usado nas respostas de erro estruturadas.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::ExtractionFailure(_) => "extraction_failure",
            Self::InferenceUnavailable(_) => "inference_unavailable",
            Self::Persistence(_) => "persistence_failure",
            Self::NotFound(_) => "not_found",
            Self::UnsupportedTask(_) => "unsupported_task",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::Config(_) | Self::TomlParse(_) | Self::TomlSerialize(_) => "config_error",
            Self::Json(_) => "validation_error",
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => "persistence_failure",
            Self::Http(_) => "inference_unavailable",
            #[cfg(feature = "cli")]
            Self::Prompt(_) => "io_error",
            Self::Io(_) => "io_error",
            Self::Other(_) => "internal_error",
        }
    }
}
