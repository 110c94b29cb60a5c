//! # Lore
//!
//! Motor adaptativo de conhecimento e recomendações.
//!
//! O Lore aprende patterns de código recorrentes a partir de amostras e relações
//! entre tecnologias e resultados a partir de projetos concluídos, e transforma
//! ambos em recomendações ranqueadas e previsões de sucesso. É servido a clientes
//! MCP via stdio e pode ser usado pela linha de comando `lore`.
//!
//! ## Módulos
//!
//! - [`knowledge`] - Store de patterns, store de outcomes, learners e o serviço [`KnowledgeBase`]
//! - [`extract`] - Extração de patterns de código
//! - [`inference`] - Backends opcionais de geração de texto
//! - [`storage`] - Gateways de persistência (SQLite, memória)
//! - [`cache`] - Cache LRU + TTL de recomendações
//! - [`maintenance`] - Re-análise, persistência e poda em background
//! - [`mcp`] - Servidor MCP (Model Context Protocol)
//! - [`cli`] - Interface de linha de comando
//! - [`types`] - Tipos compartilhados

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod extract;
pub mod inference;
pub mod knowledge;
pub mod maintenance;
pub mod mcp;
pub mod storage;
pub mod types;

pub use knowledge::KnowledgeBase;
pub use types::config::Config;
pub use types::errors::{LoreError, LoreResult};
