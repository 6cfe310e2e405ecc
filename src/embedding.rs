pub mod huggingface;
pub mod ollama;

use crate::document::{Document, EmbeddingSection};
use crate::error::Result;
use crate::settings::{Named, backend_mode, named, positive_u32, variant};

named! {
    /// Embedding model backend selected by `embedding.mode`.
    pub enum EmbeddingMode {
        HuggingFace => "huggingface",
        Ollama => "ollama",
        Mock => "mock",
    }
}

named! {
    /// How documents are fed to the embedding model during ingestion.
    pub enum IngestMode {
        Simple => "simple",
        Batch => "batch",
        Parallel => "parallel",
        Pipeline => "pipeline",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingBackend {
    HuggingFace(huggingface::Config),
    Ollama(ollama::Config),
    Mock,
}

impl EmbeddingBackend {
    pub fn mode(&self) -> EmbeddingMode {
        match self {
            Self::HuggingFace(_) => EmbeddingMode::HuggingFace,
            Self::Ollama(_) => EmbeddingMode::Ollama,
            Self::Mock => EmbeddingMode::Mock,
        }
    }

    /// Key holding the configured model's name.
    pub fn model_field(&self) -> &'static str {
        match self {
            Self::HuggingFace(_) => "huggingface.embedding_hf_model_name",
            Self::Ollama(_) => "ollama.embedding_model",
            Self::Mock => "embedding.mode",
        }
    }

    /// Identifiers under which the configured model can be referenced, canonical one first.
    pub fn model_ids(&self) -> Vec<String> {
        match self {
            Self::HuggingFace(config) => config.model_ids(),
            Self::Ollama(config) => config.model_ids(),
            Self::Mock => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub ingest_mode: IngestMode,
    /// Worker count for the `batch`, `parallel` and `pipeline` ingest modes.
    pub count_workers: u32,
    /// Dimension of the produced vectors; the vector store collection is sized from it.
    pub embed_dim: u32,
}

impl EmbeddingSettings {
    pub const DEFAULT_COUNT_WORKERS: u32 = 2;
    pub const DEFAULT_EMBED_DIM: u32 = 384;

    pub(crate) fn from_document(document: &mut Document) -> Result<Self> {
        let section: EmbeddingSection = document.embedding.take().unwrap_or_default();

        let mode: EmbeddingMode = backend_mode("embedding.mode", section.mode)?;
        let backend = match mode {
            EmbeddingMode::HuggingFace => EmbeddingBackend::HuggingFace(
                huggingface::Config::from_section(document.huggingface.take())?,
            ),
            EmbeddingMode::Ollama => {
                EmbeddingBackend::Ollama(ollama::Config::from_section(document.ollama.as_ref())?)
            }
            EmbeddingMode::Mock => EmbeddingBackend::Mock,
        };

        Ok(Self {
            backend,
            ingest_mode: variant("embedding.ingest_mode", section.ingest_mode, IngestMode::Simple)?,
            count_workers: positive_u32(
                "embedding.count_workers",
                section.count_workers,
                Self::DEFAULT_COUNT_WORKERS,
            )?,
            embed_dim: positive_u32(
                "embedding.embed_dim",
                section.embed_dim,
                Self::DEFAULT_EMBED_DIM,
            )?,
        })
    }

    pub(crate) fn write(&self, document: &mut Document) {
        document.embedding = Some(EmbeddingSection {
            mode: Some(self.backend.mode().as_str().to_string()),
            ingest_mode: Some(self.ingest_mode.as_str().to_string()),
            count_workers: Some(self.count_workers.into()),
            embed_dim: Some(self.embed_dim.into()),
            ..Default::default()
        });

        match &self.backend {
            EmbeddingBackend::HuggingFace(config) => {
                document.huggingface = Some(config.to_section())
            }
            EmbeddingBackend::Ollama(config) => config.write(document),
            EmbeddingBackend::Mock => {}
        }
    }
}
