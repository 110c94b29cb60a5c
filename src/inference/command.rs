//! Backend que executa uma CLI de geração.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::base::InferenceService;
use crate::types::config::InferenceConfig;
use crate::{LoreError, LoreResult};

/// Executa `<command> <args..> <prompt>` e retorna o stdout.
pub struct CommandInference {
    command_name: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandInference {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command_name: command.into(),
            args,
            timeout,
        }
    }

    /// Cria o backend a partir da configuração TOML.
    pub fn from_config(config: &InferenceConfig) -> LoreResult<Self> {
        if config.command.trim().is_empty() {
            return Err(LoreError::config(
                "inference.command must be set when backend = \"command\"",
            ));
        }
        Ok(Self::new(
            config.command.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn build_prompt(system_prompt: &str, user_prompt: &str) -> String {
        format!("{}\n\n{}", system_prompt, user_prompt)
    }
}

#[async_trait]
impl InferenceService for CommandInference {
    fn name(&self) -> &str {
        &self.command_name
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.command_name)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> LoreResult<String> {
        let mut cmd = Command::new(&self.command_name);
        cmd.args(&self.args)
            .arg(Self::build_prompt(system_prompt, user_prompt))
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => Err(LoreError::InferenceUnavailable(format!(
                "{} exited with {}: {}",
                self.command_name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Ok(Err(e)) => Err(LoreError::InferenceUnavailable(format!(
                "{}: {}",
                self.command_name, e
            ))),
            Err(_) => Err(LoreError::InferenceUnavailable(format!(
                "{} timed out after {:?}",
                self.command_name, self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_command() {
        let config = InferenceConfig::default();
        assert!(CommandInference::from_config(&config).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_complete_echoes_prompt() {
        let backend = CommandInference::new("echo", vec![], Duration::from_secs(5));
        let text = backend.complete("sys", "hello").await.unwrap();
        assert!(text.contains("sys"));
        assert!(text.contains("hello"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let backend =
            CommandInference::new("lore-no-such-binary-xyz", vec![], Duration::from_secs(5));
        assert!(!backend.is_available().await);
        assert!(matches!(
            backend.complete("s", "u").await,
            Err(LoreError::InferenceUnavailable(_))
        ));
    }
}
