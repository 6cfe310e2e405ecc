pub mod llamacpp;
pub mod ollama;

use crate::document::{Document, LlmSection};
use crate::error::{Error, Result};
use crate::settings::{Named, backend_mode, float_in, named, positive_u32, variant};

named! {
    /// Inference engine selected by `llm.mode`.
    pub enum LlmMode {
        LlamaCpp => "llamacpp",
        Ollama => "ollama",
        Mock => "mock",
    }
}

named! {
    /// Chat template used to turn messages into a prompt.
    pub enum PromptStyle {
        Default => "default",
        Llama2 => "llama2",
        Llama3 => "llama3",
        Tag => "tag",
        Mistral => "mistral",
        ChatMl => "chatml",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LlmBackend {
    LlamaCpp(llamacpp::Config),
    Ollama(ollama::Config),
    Mock,
}

impl LlmBackend {
    pub fn mode(&self) -> LlmMode {
        match self {
            Self::LlamaCpp(_) => LlmMode::LlamaCpp,
            Self::Ollama(_) => LlmMode::Ollama,
            Self::Mock => LlmMode::Mock,
        }
    }

    /// Key holding the configured model's name.
    pub fn model_field(&self) -> &'static str {
        match self {
            Self::LlamaCpp(_) => "llamacpp.llm_hf_model_file",
            Self::Ollama(_) => "ollama.llm_model",
            Self::Mock => "llm.mode",
        }
    }

    /// Identifiers under which the configured model can be referenced, canonical one first.
    pub fn model_ids(&self) -> Vec<String> {
        match self {
            Self::LlamaCpp(config) => config.model_ids(),
            Self::Ollama(config) => config.model_ids(),
            Self::Mock => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub backend: LlmBackend,
    pub max_new_tokens: u32,
    pub context_window: u32,
    /// Hugging Face repository holding the tokenizer, when it differs from the model's.
    pub tokenizer: Option<String>,
    pub prompt_style: PromptStyle,
    pub temperature: f64,
}

impl LlmSettings {
    pub const DEFAULT_MAX_NEW_TOKENS: u32 = 256;
    pub const DEFAULT_CONTEXT_WINDOW: u32 = 3900;
    pub const DEFAULT_TEMPERATURE: f64 = 0.1;

    pub(crate) fn from_document(document: &mut Document) -> Result<Self> {
        let section: LlmSection = document.llm.take().unwrap_or_default();

        let mode: LlmMode = backend_mode("llm.mode", section.mode)?;
        let backend = match mode {
            LlmMode::LlamaCpp => {
                LlmBackend::LlamaCpp(llamacpp::Config::from_section(document.llamacpp.take())?)
            }
            LlmMode::Ollama => {
                LlmBackend::Ollama(ollama::Config::from_section(document.ollama.as_ref())?)
            }
            LlmMode::Mock => LlmBackend::Mock,
        };

        let max_new_tokens = positive_u32(
            "llm.max_new_tokens",
            section.max_new_tokens,
            Self::DEFAULT_MAX_NEW_TOKENS,
        )?;
        let context_window = positive_u32(
            "llm.context_window",
            section.context_window,
            Self::DEFAULT_CONTEXT_WINDOW,
        )?;
        if max_new_tokens >= context_window {
            return Err(Error::range(
                "llm.max_new_tokens",
                max_new_tokens,
                format!("must be smaller than llm.context_window ({context_window})"),
            ));
        }

        let tokenizer = section
            .tokenizer
            .map(|tokenizer| tokenizer.trim().to_string())
            .filter(|tokenizer| !tokenizer.is_empty());

        let prompt_style = variant("llm.prompt_style", section.prompt_style, PromptStyle::Default)?;

        let temperature = float_in(
            "llm.temperature",
            section.temperature,
            Self::DEFAULT_TEMPERATURE,
            |value| (0.0..=2.0).contains(&value),
            "must be within 0.0..=2.0",
        )?;

        Ok(Self {
            backend,
            max_new_tokens,
            context_window,
            tokenizer,
            prompt_style,
            temperature,
        })
    }

    pub(crate) fn write(&self, document: &mut Document) {
        document.llm = Some(LlmSection {
            mode: Some(self.backend.mode().as_str().to_string()),
            max_new_tokens: Some(self.max_new_tokens.into()),
            context_window: Some(self.context_window.into()),
            tokenizer: self.tokenizer.clone(),
            prompt_style: Some(self.prompt_style.as_str().to_string()),
            temperature: Some(self.temperature),
            ..Default::default()
        });

        match &self.backend {
            LlmBackend::LlamaCpp(config) => document.llamacpp = Some(config.to_section()),
            LlmBackend::Ollama(config) => config.write(document),
            LlmBackend::Mock => {}
        }
    }
}
