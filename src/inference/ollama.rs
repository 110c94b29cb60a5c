//! Backend HTTP compatível com Ollama.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::base::InferenceService;
use crate::types::config::InferenceConfig;
use crate::{LoreError, LoreResult};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Chama `POST {base_url}/api/generate` com streaming desabilitado.
pub struct OllamaInference {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaInference {
    /// Cria um backend para o endpoint e modelo informados.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> LoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        })
    }

    /// Cria o backend a partir da configuração TOML.
    pub fn from_config(config: &InferenceConfig) -> LoreResult<Self> {
        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl InferenceService for OllamaInference {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> LoreResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            system: system_prompt,
            prompt: user_prompt,
            stream: false,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| LoreError::InferenceUnavailable(format!("{}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LoreError::InferenceUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LoreError::InferenceUnavailable(format!("Bad response body: {}", e)))?;

        tracing::debug!(model = %self.model, chars = body.response.len(), "Completion received");
        Ok(body.response)
    }
}
