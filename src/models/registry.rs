use std::sync::Arc;

use dashmap::DashMap;

use crate::embedding::EmbeddingBackend;
use crate::llm::LlmBackend;
use crate::models::{ModelEntry, ModelKind};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Available,
    Downloading,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub kind: ModelKind,
    pub name: String,
    pub repo_id: Option<String>,
    pub filename: Option<String>,
    pub capabilities: Vec<String>,
    pub state: ModelState,
}

impl ModelInfo {
    fn available(id: String, kind: ModelKind, capabilities: &[&str]) -> Self {
        Self {
            name: id.clone(),
            id,
            kind,
            repo_id: None,
            filename: None,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            state: ModelState::Available,
        }
    }
}

impl From<&ModelEntry> for ModelInfo {
    fn from(entry: &ModelEntry) -> Self {
        Self {
            id: entry.id.clone(),
            kind: entry.kind,
            name: entry.name.clone().unwrap_or_else(|| entry.id.clone()),
            repo_id: entry.repo_id.clone(),
            filename: entry.filename.clone(),
            capabilities: entry.capabilities.clone(),
            state: ModelState::Available,
        }
    }
}

/// Every model known to the process, keyed by canonical id.
#[derive(Clone)]
pub struct Registry {
    models: Arc<DashMap<String, ModelInfo>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            models: Arc::new(DashMap::new()),
        }
    }

    /// Seed with the primary LLM, the primary embedding model and the catalog.
    /// Mock backends contribute nothing.
    pub fn from_settings(settings: &Settings) -> Self {
        let registry = Self::new();

        match &settings.llm.backend {
            LlmBackend::LlamaCpp(config) => {
                let mut info = ModelInfo::available(
                    config.model_stem().to_string(),
                    ModelKind::Llm,
                    &["chat", "completion"],
                );
                info.name = config.llm_hf_model_file.clone();
                info.repo_id = Some(config.llm_hf_repo_id.clone());
                info.filename = Some(config.llm_hf_model_file.clone());
                registry.register(info);
            }
            LlmBackend::Ollama(config) => {
                registry.register(ModelInfo::available(
                    config.llm_model.clone(),
                    ModelKind::Llm,
                    &["chat", "completion"],
                ));
            }
            LlmBackend::Mock => {}
        }

        match &settings.embedding.backend {
            EmbeddingBackend::HuggingFace(config) => {
                let mut info = ModelInfo::available(
                    config.embedding_hf_model_name.clone(),
                    ModelKind::Embedding,
                    &["embedding"],
                );
                info.repo_id = Some(config.embedding_hf_model_name.clone());
                registry.register(info);
            }
            EmbeddingBackend::Ollama(config) => {
                registry.register(ModelInfo::available(
                    config.embedding_model.clone(),
                    ModelKind::Embedding,
                    &["embedding"],
                ));
            }
            EmbeddingBackend::Mock => {}
        }

        for entry in &settings.models.catalog {
            registry.register(ModelInfo::from(entry));
        }

        registry
    }

    /// Insert or replace, returning the previous entry.
    pub fn register(&self, info: ModelInfo) -> Option<ModelInfo> {
        self.models.insert(info.id.clone(), info)
    }

    pub fn get(&self, id: &str) -> Option<ModelInfo> {
        self.models.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot sorted by id.
    pub fn list(&self) -> Vec<ModelInfo> {
        let mut models: Vec<ModelInfo> = self
            .models
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }

    pub fn set_state(&self, id: &str, state: ModelState) -> bool {
        match self.models.get_mut(id) {
            Some(mut entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> Option<ModelInfo> {
        self.models.remove(id).map(|(_, info)| info)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
