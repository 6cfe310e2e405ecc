//! The validated, immutable view of a settings document.

use crate::document::Document;
use crate::embedding::EmbeddingSettings;
use crate::error::{Error, Result};
use crate::llm::LlmSettings;
use crate::models::{self, ModelKind, ModelsSettings, PrimaryModels};
use crate::placeholder;
use crate::server::ServerSettings;
use crate::vectorstore::VectorStore;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub vectorstore: VectorStore,
    pub models: ModelsSettings,
}

impl Settings {
    /// Validate a placeholder-free document. Sections of backends that are not
    /// selected are ignored.
    pub fn from_document(mut document: Document) -> Result<Self> {
        let server = ServerSettings::from_section(document.server.take())?;
        let llm = LlmSettings::from_document(&mut document)?;
        let embedding = EmbeddingSettings::from_document(&mut document)?;
        let vectorstore = VectorStore::from_document(&mut document)?;
        let models = ModelsSettings::from_document(
            &mut document,
            &Primary {
                llm: &llm,
                embedding: &embedding,
            },
        )?;

        Ok(Self {
            server,
            llm,
            embedding,
            vectorstore,
            models,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut document = Document {
            server: Some(self.server.to_section()),
            models: Some(self.models.to_section()),
            ..Default::default()
        };
        self.llm.write(&mut document);
        self.embedding.write(&mut document);
        self.vectorstore.write(&mut document);
        document
    }

    /// Serialize with every `${` escaped, so loading the output yields `self` again.
    pub fn to_yaml(&self) -> Result<String> {
        let mut value = serde_yaml::to_value(self.to_document())?;
        placeholder::escape_value(&mut value);
        Ok(serde_yaml::to_string(&value)?)
    }

    /// Every identifier a `models.default_models` entry of this kind may use.
    pub fn known_models(&self, kind: ModelKind) -> Vec<String> {
        let mut known = self.primary_ids(kind);
        known.extend(
            self.models
                .catalog
                .iter()
                .filter(|entry| entry.kind == kind)
                .map(|entry| entry.id.clone()),
        );
        known
    }

    /// Canonical id of the model `reference` names, if it names a configured one.
    pub fn resolve_model(&self, kind: ModelKind, reference: &str) -> Option<String> {
        models::resolve(
            &self.primary_ids(kind),
            &self.models.catalog,
            kind,
            reference,
        )
    }

    /// Canonical id of the default model for `kind`.
    pub fn default_model(&self, kind: ModelKind) -> Option<String> {
        self.models
            .default_models
            .get(kind)
            .and_then(|reference| self.resolve_model(kind, reference))
    }
}

impl PrimaryModels for Settings {
    fn primary_ids(&self, kind: ModelKind) -> Vec<String> {
        Primary {
            llm: &self.llm,
            embedding: &self.embedding,
        }
        .primary_ids(kind)
    }

    fn primary_field(&self, kind: ModelKind) -> &'static str {
        Primary {
            llm: &self.llm,
            embedding: &self.embedding,
        }
        .primary_field(kind)
    }
}

struct Primary<'a> {
    llm: &'a LlmSettings,
    embedding: &'a EmbeddingSettings,
}

impl PrimaryModels for Primary<'_> {
    fn primary_ids(&self, kind: ModelKind) -> Vec<String> {
        match kind {
            ModelKind::Llm => self.llm.backend.model_ids(),
            ModelKind::Embedding => self.embedding.backend.model_ids(),
            ModelKind::Analysis | ModelKind::Summarization => Vec::new(),
        }
    }

    fn primary_field(&self, kind: ModelKind) -> &'static str {
        match kind {
            ModelKind::Llm => self.llm.backend.model_field(),
            ModelKind::Embedding => self.embedding.backend.model_field(),
            ModelKind::Analysis | ModelKind::Summarization => "models.catalog",
        }
    }
}

/// A closed set of names accepted for a setting.
pub trait Named: Sized + Copy + 'static {
    const NAMES: &'static [&'static str];

    fn as_str(self) -> &'static str;

    /// Case-insensitive lookup, surrounding whitespace ignored.
    fn from_name(name: &str) -> Option<Self>;
}

macro_rules! named {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $crate::settings::Named for $name {
            const NAMES: &'static [&'static str] = &[$($text),+];

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                let name = name.trim();
                $(
                    if name.eq_ignore_ascii_case($text) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::settings::Named::as_str(*self))
            }
        }
    };
}

pub(crate) use named;

/// Trimmed value, with blank strings treated as absent.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn required(field: &str, value: Option<String>) -> Result<String> {
    optional(value).ok_or_else(|| Error::missing(field))
}

/// A required backend selector (`llm.mode`, `vectorstore.database`, ...).
pub(crate) fn backend_mode<T: Named>(field: &str, value: Option<String>) -> Result<T> {
    let value = required(field, value)?;
    T::from_name(&value).ok_or_else(|| Error::UnknownBackend {
        field: field.to_string(),
        value,
        expected: T::NAMES,
    })
}

pub(crate) fn variant_required<T: Named>(field: &str, value: Option<String>) -> Result<T> {
    let value = required(field, value)?;
    T::from_name(&value).ok_or_else(|| Error::UnknownVariant {
        field: field.to_string(),
        value,
        expected: T::NAMES,
    })
}

pub(crate) fn variant<T: Named>(field: &str, value: Option<String>, default: T) -> Result<T> {
    match optional(value) {
        Some(value) => variant_required(field, Some(value)),
        None => Ok(default),
    }
}

pub(crate) fn positive_u32(field: &str, value: Option<i64>, default: u32) -> Result<u32> {
    let Some(value) = value else {
        return Ok(default);
    };
    if value < 1 {
        return Err(Error::range(field, value, "must be at least 1"));
    }
    u32::try_from(value).map_err(|_| Error::range(field, value, format!("must be at most {}", u32::MAX)))
}

pub(crate) fn int_in(
    field: &str,
    value: Option<i64>,
    default: i64,
    range: std::ops::RangeInclusive<i64>,
) -> Result<i64> {
    let value = value.unwrap_or(default);
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::range(
            field,
            value,
            format!("must be within {}..={}", range.start(), range.end()),
        ))
    }
}

pub(crate) fn float_in(
    field: &str,
    value: Option<f64>,
    default: f64,
    accept: impl Fn(f64) -> bool,
    bound: &str,
) -> Result<f64> {
    let value = value.unwrap_or(default);
    if accept(value) {
        Ok(value)
    } else {
        Err(Error::range(field, value, bound))
    }
}
