//! Tipos compartilhados.

pub mod config;
pub mod errors;
pub mod requests;
pub mod responses;
