use crate::document::HuggingFaceSection;
use crate::error::Result;
use crate::settings::{optional, required};

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub embedding_hf_model_name: String,
    /// Token for gated repositories. Never printed by `Debug`.
    pub access_token: Option<String>,
    pub trust_remote_code: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("embedding_hf_model_name", &self.embedding_hf_model_name)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("trust_remote_code", &self.trust_remote_code)
            .finish()
    }
}

impl Config {
    pub(crate) fn from_section(section: Option<HuggingFaceSection>) -> Result<Self> {
        let section = section.unwrap_or_default();

        Ok(Self {
            embedding_hf_model_name: required(
                "huggingface.embedding_hf_model_name",
                section.embedding_hf_model_name,
            )?,
            access_token: optional(section.access_token),
            trust_remote_code: section.trust_remote_code.unwrap_or(false),
        })
    }

    pub(crate) fn to_section(&self) -> HuggingFaceSection {
        HuggingFaceSection {
            embedding_hf_model_name: Some(self.embedding_hf_model_name.clone()),
            access_token: self.access_token.clone(),
            trust_remote_code: Some(self.trust_remote_code),
            ..Default::default()
        }
    }

    pub(crate) fn model_ids(&self) -> Vec<String> {
        let mut ids = vec![self.embedding_hf_model_name.clone()];
        if let Some(short) = self
            .embedding_hf_model_name
            .rsplit_once('/')
            .map(|(_, short)| short)
            .filter(|short| !short.is_empty())
        {
            ids.push(short.to_string());
        }
        ids
    }
}
