use std::time::Duration;

use crate::document::{Document, OllamaSection};
use crate::error::Result;
use crate::settings::{optional, positive_u32, required};

pub(crate) const DEFAULT_API_BASE: &str = "http://localhost:11434";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base: String,
    pub llm_model: String,
    /// How long the server keeps the model resident after a request, e.g. `5m`.
    pub keep_alive: String,
    pub request_timeout: Duration,
}

impl Config {
    pub const DEFAULT_KEEP_ALIVE: &'static str = "5m";
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 120;

    pub(crate) fn from_section(section: Option<&OllamaSection>) -> Result<Self> {
        let section = section.cloned().unwrap_or_default();

        let request_timeout = positive_u32(
            "ollama.request_timeout",
            section.request_timeout,
            Self::DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        Ok(Self {
            api_base: optional(section.api_base).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            llm_model: required("ollama.llm_model", section.llm_model)?,
            keep_alive: optional(section.keep_alive)
                .unwrap_or_else(|| Self::DEFAULT_KEEP_ALIVE.to_string()),
            request_timeout: Duration::from_secs(request_timeout.into()),
        })
    }

    pub(crate) fn write(&self, document: &mut Document) {
        let section = document.ollama.get_or_insert_with(Default::default);
        section.api_base = Some(self.api_base.clone());
        section.llm_model = Some(self.llm_model.clone());
        section.keep_alive = Some(self.keep_alive.clone());
        section.request_timeout = i64::try_from(self.request_timeout.as_secs()).ok();
    }

    pub(crate) fn model_ids(&self) -> Vec<String> {
        let mut ids = vec![self.llm_model.clone()];
        if let Some((name, _tag)) = self.llm_model.split_once(':') {
            ids.push(name.to_string());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::document::OllamaSection;

    #[test]
    fn test_defaults_and_ids() -> anyhow::Result<()> {
        let config = Config::from_section(Some(&OllamaSection {
            llm_model: Some("llama3.2:latest".to_string()),
            ..Default::default()
        }))?;

        anyhow::ensure!(config.api_base == "http://localhost:11434");
        anyhow::ensure!(config.keep_alive == "5m");
        anyhow::ensure!(config.request_timeout.as_secs() == 120);
        anyhow::ensure!(config.model_ids() == ["llama3.2:latest", "llama3.2"]);
        Ok(())
    }

    #[test]
    fn test_model_is_required() {
        assert!(Config::from_section(None).is_err());
    }
}
