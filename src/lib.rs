//! Typed, validated settings for a local RAG stack.
//!
//! A YAML document selects the LLM backend, the embedding backend and the
//! vector store and tunes each of them. [`Loader`] resolves `${VAR:default}`
//! placeholders, validates the result and hands back an immutable [`Settings`].
//! Nothing is loaded, downloaded or connected along the way.
//!
//! The [`models`] module adds runtime bookkeeping on top of the `models`
//! section: which models are registered, which are resident and which one
//! serves each role.

pub mod document;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod models;
pub mod placeholder;
pub mod server;
pub mod settings;
pub mod vectorstore;

pub use error::{Error, Result};
pub use loader::{Loader, LoaderOptions, UnknownKeys, load};
pub use models::ModelKind;
pub use models::manager::{
    Download, DownloadId, DownloadStatus, ManagerError, ModelLoader, ModelManager,
};
pub use models::registry::{ModelInfo, ModelState, Registry};
pub use placeholder::{Environment, ProcessEnvironment};
pub use settings::{Named, Settings};
pub use vectorstore::VectorStore;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::embedding::{EmbeddingBackend, EmbeddingMode};
    use crate::llm::{LlmBackend, LlmMode};
    use crate::vectorstore::Database;
    use crate::{Error, Loader, ModelKind, Settings, UnknownKeys};

    const SAMPLE: &str = include_str!("../settings.yaml");

    fn loader(vars: &[(&str, &str)]) -> Loader<HashMap<String, String>> {
        Loader::with_environment(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }

    fn sample_with(from: &str, to: &str) -> anyhow::Result<String> {
        anyhow::ensure!(SAMPLE.contains(from), "sample has no `{from}`");
        Ok(SAMPLE.replacen(from, to, 1))
    }

    #[test]
    fn test_sample_document_validates() -> anyhow::Result<()> {
        let settings = loader(&[]).load_str(SAMPLE)?;

        anyhow::ensure!(settings.server.env_name == "local");
        anyhow::ensure!(settings.llm.backend.mode() == LlmMode::LlamaCpp);
        anyhow::ensure!(settings.embedding.backend.mode() == EmbeddingMode::HuggingFace);
        anyhow::ensure!(settings.vectorstore.database() == Database::Qdrant);
        anyhow::ensure!(settings.models.max_loaded_models == 2);
        anyhow::ensure!(settings.models.enabled && settings.models.auto_download);
        anyhow::ensure!(settings.llm.max_new_tokens == 512);

        let LlmBackend::LlamaCpp(llamacpp) = &settings.llm.backend else {
            anyhow::bail!("expected llamacpp, got {:?}", settings.llm.backend);
        };
        anyhow::ensure!(llamacpp.llm_hf_repo_id == "TheBloke/Mistral-7B-Instruct-v0.2-GGUF");

        let EmbeddingBackend::HuggingFace(huggingface) = &settings.embedding.backend else {
            anyhow::bail!("expected huggingface, got {:?}", settings.embedding.backend);
        };
        anyhow::ensure!(huggingface.embedding_hf_model_name == "BAAI/bge-small-en-v1.5");

        anyhow::ensure!(
            settings.default_model(ModelKind::Embedding).as_deref() == Some("BAAI/bge-small-en-v1.5")
        );
        Ok(())
    }

    #[test]
    fn test_sample_round_trips() -> anyhow::Result<()> {
        let settings = loader(&[("APP_ENV", "prod")]).load_str(SAMPLE)?;
        let again = loader(&[]).load_str(&settings.to_yaml()?)?;
        pretty_assertions::assert_eq!(again, settings);

        let document = settings.to_document();
        pretty_assertions::assert_eq!(Settings::from_document(document)?, settings);
        Ok(())
    }

    #[test]
    fn test_env_name_follows_the_environment() -> anyhow::Result<()> {
        anyhow::ensure!(loader(&[("APP_ENV", "prod")]).load_str(SAMPLE)?.server.env_name == "prod");
        anyhow::ensure!(loader(&[("APP_ENV", "")]).load_str(SAMPLE)?.server.env_name == "local");
        Ok(())
    }

    #[test]
    fn test_llamacpp_needs_a_model_file() -> anyhow::Result<()> {
        let text = sample_with("  llm_hf_model_file: mistral-7b-instruct-v0.2.Q4_K_M.gguf\n", "")?;
        match loader(&[]).load_str(&text) {
            Err(Error::MissingRequiredField { field }) => {
                anyhow::ensure!(field == "llamacpp.llm_hf_model_file")
            }
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_unsupported_backend_is_named() -> anyhow::Result<()> {
        let text = sample_with("database: qdrant", "database: milvus")?;
        match loader(&[]).load_str(&text) {
            Err(Error::UnknownBackend { field, value, expected }) => {
                anyhow::ensure!(field == "vectorstore.database" && value == "milvus");
                anyhow::ensure!(expected.contains(&"qdrant") && expected.contains(&"chroma"));
            }
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_numeric_bounds() -> anyhow::Result<()> {
        for (from, to, field) in [
            ("max_loaded_models: 2", "max_loaded_models: 0", "models.max_loaded_models"),
            ("max_new_tokens: 512", "max_new_tokens: 0", "llm.max_new_tokens"),
            ("max_new_tokens: 512", "max_new_tokens: 4000", "llm.max_new_tokens"),
        ] {
            match loader(&[]).load_str(&sample_with(from, to)?) {
                Err(error @ Error::InvalidRange { .. }) => {
                    anyhow::ensure!(error.field() == Some(field), "{error}")
                }
                other => anyhow::bail!("`{to}`: unexpected {other:?}"),
            }
        }
        Ok(())
    }

    #[test]
    fn test_default_llm_must_be_configured() -> anyhow::Result<()> {
        let text = sample_with(
            "llm: mistral-7b-instruct-v0.2.Q4_K_M",
            "llm: llama-2-13b",
        )?;
        match loader(&[]).load_str(&text) {
            Err(Error::DanglingReference { field, value, known, .. }) => {
                anyhow::ensure!(field == "models.default_models.llm" && value == "llama-2-13b");
                anyhow::ensure!(known.iter().any(|id| id == "mistral-7b-instruct-v0.2.Q4_K_M"));
            }
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_misspelt_key_under_deny() -> anyhow::Result<()> {
        let text = sample_with("  context_window: 3900\n", "  context_window: 3900\n  temprature: 0.2\n")?;

        loader(&[]).load_str(&text)?;
        match loader(&[]).unknown_keys(UnknownKeys::Deny).load_str(&text) {
            Err(Error::UnknownField { field }) => anyhow::ensure!(field == "llm.temprature"),
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_settings_are_shareable() {
        fn shareable<T: Send + Sync + 'static>() {}
        shareable::<Settings>();
    }
}
