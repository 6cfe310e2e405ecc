use std::path::Path;

use crate::document::LlamaCppSection;
use crate::error::Result;
use crate::settings::{float_in, positive_u32, required};

/// A GGUF model fetched from the Hugging Face hub and run through llama.cpp.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub llm_hf_repo_id: String,
    pub llm_hf_model_file: String,
    pub top_k: u32,
    pub top_p: f64,
    pub repeat_penalty: f64,
    pub tfs_z: f64,
}

impl Config {
    pub const DEFAULT_TOP_K: u32 = 40;
    pub const DEFAULT_TOP_P: f64 = 0.9;
    pub const DEFAULT_REPEAT_PENALTY: f64 = 1.1;
    pub const DEFAULT_TFS_Z: f64 = 1.0;

    pub(crate) fn from_section(section: Option<LlamaCppSection>) -> Result<Self> {
        let section = section.unwrap_or_default();

        Ok(Self {
            llm_hf_repo_id: required("llamacpp.llm_hf_repo_id", section.llm_hf_repo_id)?,
            llm_hf_model_file: required("llamacpp.llm_hf_model_file", section.llm_hf_model_file)?,
            top_k: positive_u32("llamacpp.top_k", section.top_k, Self::DEFAULT_TOP_K)?,
            top_p: float_in(
                "llamacpp.top_p",
                section.top_p,
                Self::DEFAULT_TOP_P,
                |value| value > 0.0 && value <= 1.0,
                "must be within (0.0, 1.0]",
            )?,
            repeat_penalty: float_in(
                "llamacpp.repeat_penalty",
                section.repeat_penalty,
                Self::DEFAULT_REPEAT_PENALTY,
                |value| value > 0.0 && value.is_finite(),
                "must be greater than 0",
            )?,
            tfs_z: float_in(
                "llamacpp.tfs_z",
                section.tfs_z,
                Self::DEFAULT_TFS_Z,
                |value| value > 0.0 && value.is_finite(),
                "must be greater than 0",
            )?,
        })
    }

    pub(crate) fn to_section(&self) -> LlamaCppSection {
        LlamaCppSection {
            llm_hf_repo_id: Some(self.llm_hf_repo_id.clone()),
            llm_hf_model_file: Some(self.llm_hf_model_file.clone()),
            top_k: Some(self.top_k.into()),
            top_p: Some(self.top_p),
            repeat_penalty: Some(self.repeat_penalty),
            tfs_z: Some(self.tfs_z),
            ..Default::default()
        }
    }

    /// Model file name without its extension, e.g. `mistral-7b-instruct-v0.2.Q4_K_M`.
    pub fn model_stem(&self) -> &str {
        Path::new(&self.llm_hf_model_file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.llm_hf_model_file)
    }

    pub(crate) fn model_ids(&self) -> Vec<String> {
        let mut ids = vec![self.model_stem().to_string()];
        for id in [&self.llm_hf_model_file, &self.llm_hf_repo_id] {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::document::LlamaCppSection;
    use crate::error::Error;

    fn section() -> LlamaCppSection {
        LlamaCppSection {
            llm_hf_repo_id: Some("TheBloke/Mistral-7B-Instruct-v0.2-GGUF".to_string()),
            llm_hf_model_file: Some("mistral-7b-instruct-v0.2.Q4_K_M.gguf".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_model_file() -> anyhow::Result<()> {
        let result = Config::from_section(Some(LlamaCppSection {
            llm_hf_model_file: None,
            ..section()
        }));
        anyhow::ensure!(matches!(
            result,
            Err(Error::MissingRequiredField { ref field }) if field == "llamacpp.llm_hf_model_file"
        ));

        let result = Config::from_section(None);
        anyhow::ensure!(matches!(
            result,
            Err(Error::MissingRequiredField { ref field }) if field == "llamacpp.llm_hf_repo_id"
        ));
        Ok(())
    }

    #[test]
    fn test_model_ids() -> anyhow::Result<()> {
        let config = Config::from_section(Some(section()))?;
        pretty_assertions::assert_eq!(
            config.model_ids(),
            vec![
                "mistral-7b-instruct-v0.2.Q4_K_M".to_string(),
                "mistral-7b-instruct-v0.2.Q4_K_M.gguf".to_string(),
                "TheBloke/Mistral-7B-Instruct-v0.2-GGUF".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_sampling_bounds() -> anyhow::Result<()> {
        for (patch, field) in [
            (LlamaCppSection { top_k: Some(0), ..section() }, "llamacpp.top_k"),
            (LlamaCppSection { top_p: Some(0.0), ..section() }, "llamacpp.top_p"),
            (LlamaCppSection { top_p: Some(1.5), ..section() }, "llamacpp.top_p"),
            (LlamaCppSection { repeat_penalty: Some(-1.0), ..section() }, "llamacpp.repeat_penalty"),
            (LlamaCppSection { tfs_z: Some(f64::NAN), ..section() }, "llamacpp.tfs_z"),
        ] {
            match Config::from_section(Some(patch)) {
                Err(error) => anyhow::ensure!(error.field() == Some(field), "{error}"),
                Ok(config) => anyhow::bail!("{field}: accepted {config:?}"),
            }
        }
        Ok(())
    }
}
