use crate::document::{Document, OllamaSection};
use crate::error::Result;
use crate::llm::ollama::DEFAULT_API_BASE;
use crate::settings::{optional, required};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Falls back to `ollama.api_base` so a single server can serve both roles.
    pub embedding_api_base: String,
    pub embedding_model: String,
}

impl Config {
    pub(crate) fn from_section(section: Option<&OllamaSection>) -> Result<Self> {
        let section = section.cloned().unwrap_or_default();

        let embedding_api_base = optional(section.embedding_api_base)
            .or_else(|| optional(section.api_base))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            embedding_api_base,
            embedding_model: required("ollama.embedding_model", section.embedding_model)?,
        })
    }

    pub(crate) fn write(&self, document: &mut Document) {
        let section = document.ollama.get_or_insert_with(Default::default);
        section.embedding_api_base = Some(self.embedding_api_base.clone());
        section.embedding_model = Some(self.embedding_model.clone());
    }

    pub(crate) fn model_ids(&self) -> Vec<String> {
        let mut ids = vec![self.embedding_model.clone()];
        if let Some((name, _tag)) = self.embedding_model.split_once(':') {
            ids.push(name.to_string());
        }
        ids
    }
}
