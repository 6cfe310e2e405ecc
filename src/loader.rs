use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::placeholder::{self, Environment, ProcessEnvironment};
use crate::settings::Settings;

/// What to do with keys no section recognises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Log each one at `warn` and carry on.
    #[default]
    Warn,
    /// Fail with [`Error::UnknownField`] on the first one.
    Deny,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub unknown_keys: UnknownKeys,
    /// Directory that relative store paths are anchored at. Defaults to the
    /// settings file's directory, or the working directory for [`Loader::load_str`].
    pub base_dir: Option<PathBuf>,
    /// Run [`crate::VectorStore::preflight`] after validation. On by default.
    pub check_paths: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            unknown_keys: UnknownKeys::default(),
            base_dir: None,
            check_paths: true,
        }
    }
}

/// Reads, resolves and validates settings documents.
///
/// Loading has no side effects: store paths are only inspected, nothing is
/// created on disk, no model is loaded and no connection is opened.
#[derive(Debug, Clone)]
pub struct Loader<E = ProcessEnvironment> {
    env: E,
    options: LoaderOptions,
}

impl Loader {
    pub fn new() -> Self {
        Self::with_environment(ProcessEnvironment)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Environment> Loader<E> {
    pub fn with_environment(env: E) -> Self {
        Self {
            env,
            options: LoaderOptions::default(),
        }
    }

    pub fn options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn unknown_keys(mut self, policy: UnknownKeys) -> Self {
        self.options.unknown_keys = policy;
        self
    }

    pub fn check_paths(mut self, enabled: bool) -> Self {
        self.options.check_paths = enabled;
        self
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading settings");

        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = match &self.options.base_dir {
            Some(base_dir) => base_dir.clone(),
            None => path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        self.finish(&text, &base_dir)
    }

    pub fn load_str(&self, text: &str) -> Result<Settings> {
        let base_dir = self
            .options
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        self.finish(text, &base_dir)
    }

    /// Parse and resolve placeholders without validating.
    pub fn document(&self, text: &str) -> Result<Document> {
        let mut value: Value = serde_yaml::from_str(text)?;
        if value.is_null() {
            value = Value::Mapping(Default::default());
        }

        placeholder::resolve_value(&mut value, &self.env)?;
        let document: Document = serde_yaml::from_value(value)?;

        for field in document.unknown_fields() {
            match self.options.unknown_keys {
                UnknownKeys::Warn => tracing::warn!(%field, "ignoring unknown settings key"),
                UnknownKeys::Deny => return Err(Error::UnknownField { field }),
                UnknownKeys::Ignore => {}
            }
        }

        Ok(document)
    }

    fn finish(&self, text: &str, base_dir: &Path) -> Result<Settings> {
        let settings = Settings::from_document(self.document(text)?)?;

        if self.options.check_paths {
            settings.vectorstore.preflight(base_dir)?;
        }

        tracing::debug!(
            env_name = %settings.server.env_name,
            llm = %settings.llm.backend.mode(),
            embedding = %settings.embedding.backend.mode(),
            vectorstore = %settings.vectorstore.database(),
            "settings loaded"
        );

        Ok(settings)
    }
}

/// Load `path` against the process environment with default options.
pub fn load(path: impl AsRef<Path>) -> Result<Settings> {
    Loader::new().load(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Loader, UnknownKeys};
    use crate::error::Error;

    fn loader(vars: &[(&str, &str)]) -> Loader<HashMap<String, String>> {
        Loader::with_environment(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }

    const MINIMAL: &str = "server:\n  env_name: ${APP_ENV:local}\nllm:\n  mode: mock\nembedding:\n  mode: mock\nvectorstore:\n  database: qdrant\nqdrant:\n  path: ${QDRANT_PATH:local_data/qdrant}\n";

    #[test]
    fn test_placeholders_resolve_before_validation() -> anyhow::Result<()> {
        let settings = loader(&[]).load_str(MINIMAL)?;
        anyhow::ensure!(settings.server.env_name == "local");

        let settings = loader(&[("APP_ENV", "staging")]).load_str(MINIMAL)?;
        anyhow::ensure!(settings.server.env_name == "staging");
        Ok(())
    }

    #[test]
    fn test_substituted_numbers_are_typed() -> anyhow::Result<()> {
        let text = format!("{MINIMAL}models:\n  max_loaded_models: ${{MAX_MODELS:2}}\n  auto_download: ${{AUTO:false}}\n");
        let settings = loader(&[("AUTO", "true")]).load_str(&text)?;
        anyhow::ensure!(settings.models.max_loaded_models == 2);
        anyhow::ensure!(settings.models.auto_download);
        Ok(())
    }

    #[test]
    fn test_empty_document_reports_first_missing_field() -> anyhow::Result<()> {
        anyhow::ensure!(matches!(
            loader(&[]).load_str(""),
            Err(Error::MissingRequiredField { ref field }) if field == "server.env_name"
        ));
        anyhow::ensure!(matches!(loader(&[]).load_str("- a\n- b\n"), Err(Error::Parse(_))));
        Ok(())
    }

    #[test]
    fn test_unknown_keys_policy() -> anyhow::Result<()> {
        let text = format!("{MINIMAL}telemetry:\n  enabled: true\n");

        loader(&[]).load_str(&text)?;
        loader(&[]).unknown_keys(UnknownKeys::Ignore).load_str(&text)?;

        match loader(&[]).unknown_keys(UnknownKeys::Deny).load_str(&text) {
            Err(Error::UnknownField { field }) => anyhow::ensure!(field == "telemetry"),
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_load_rejects_uncreatable_store_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, include_str!("../settings.yaml"))?;
        std::fs::write(dir.path().join("local_data"), b"")?;

        match crate::load(&path) {
            Err(Error::UnwritablePath { field, path: blocked, .. }) => {
                anyhow::ensure!(field == "qdrant.path");
                anyhow::ensure!(blocked == dir.path().join("local_data/private_gpt/qdrant"));
            }
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_io_error_names_the_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("settings.yaml");

        match loader(&[]).load(&missing) {
            Err(Error::Io { path, .. }) => anyhow::ensure!(path == missing),
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_store_paths_are_checked_relative_to_the_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, MINIMAL)?;
        std::fs::write(dir.path().join("local_data"), b"")?;

        loader(&[]).check_paths(false).load(&path)?;
        let result = loader(&[]).load(&path);
        anyhow::ensure!(matches!(
            result,
            Err(Error::UnwritablePath { ref field, .. }) if field == "qdrant.path"
        ));

        let elsewhere = tempfile::tempdir()?;
        let qdrant_path = elsewhere.path().join("q").to_string_lossy().into_owned();
        let settings = loader(&[("QDRANT_PATH", qdrant_path.as_str())]).load(&path)?;
        anyhow::ensure!(settings.vectorstore.local_path(dir.path()) == Some(elsewhere.path().join("q")));
        Ok(())
    }
}
