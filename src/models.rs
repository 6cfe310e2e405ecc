pub mod manager;
pub mod registry;

use std::collections::HashSet;

use crate::document::{CatalogEntry, DefaultModelsSection, Document, ModelsSection};
use crate::error::{Error, Result};
use crate::settings::{Named, named, optional, positive_u32, required, variant_required};

named! {
    /// Role a model plays in the pipeline.
    pub enum ModelKind {
        Llm => "llm",
        Embedding => "embedding",
        Analysis => "analysis",
        Summarization => "summarization",
    }
}

/// A model that can be fetched and loaded on demand, in addition to the primary ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub id: String,
    pub kind: ModelKind,
    pub name: Option<String>,
    pub repo_id: Option<String>,
    pub filename: Option<String>,
    pub capabilities: Vec<String>,
}

/// Models activated at startup, as written in the document (any accepted identifier).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultModels {
    pub llm: Option<String>,
    pub embedding: Option<String>,
}

impl DefaultModels {
    pub fn get(&self, kind: ModelKind) -> Option<&str> {
        match kind {
            ModelKind::Llm => self.llm.as_deref(),
            ModelKind::Embedding => self.embedding.as_deref(),
            ModelKind::Analysis | ModelKind::Summarization => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelsSettings {
    /// Whether models beyond the defaults may be loaded and switched at runtime.
    pub enabled: bool,
    pub max_loaded_models: u32,
    /// Fetch models that are registered but not present locally instead of failing.
    pub auto_download: bool,
    pub default_models: DefaultModels,
    pub catalog: Vec<ModelEntry>,
}

impl Default for ModelsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_loaded_models: Self::DEFAULT_MAX_LOADED_MODELS,
            auto_download: false,
            default_models: DefaultModels::default(),
            catalog: Vec::new(),
        }
    }
}

/// Identifiers of the primary model configured for each kind, canonical id first.
pub(crate) trait PrimaryModels {
    fn primary_ids(&self, kind: ModelKind) -> Vec<String>;

    /// Key that names the primary model of `kind`, for error reporting.
    fn primary_field(&self, kind: ModelKind) -> &'static str;
}

impl ModelsSettings {
    pub const DEFAULT_MAX_LOADED_MODELS: u32 = 1;

    pub(crate) fn from_document(
        document: &mut Document,
        primary: &impl PrimaryModels,
    ) -> Result<Self> {
        let section: ModelsSection = document.models.take().unwrap_or_default();

        let max_loaded_models = positive_u32(
            "models.max_loaded_models",
            section.max_loaded_models,
            Self::DEFAULT_MAX_LOADED_MODELS,
        )?;

        let catalog = section
            .catalog
            .into_iter()
            .enumerate()
            .map(|(index, entry)| catalog_entry(index, entry))
            .collect::<Result<Vec<_>>>()?;

        let canonical: Vec<(ModelKind, String)> = [ModelKind::Llm, ModelKind::Embedding]
            .into_iter()
            .filter_map(|kind| Some((kind, primary.primary_ids(kind).into_iter().next()?)))
            .collect();
        let mut seen: HashSet<&str> = HashSet::new();
        for (kind, id) in &canonical {
            if !seen.insert(id.as_str()) {
                return Err(Error::DuplicateModel {
                    field: primary.primary_field(*kind).to_string(),
                    id: id.clone(),
                });
            }
        }
        for (index, entry) in catalog.iter().enumerate() {
            if !seen.insert(entry.id.as_str()) {
                return Err(Error::DuplicateModel {
                    field: format!("models.catalog[{index}].id"),
                    id: entry.id.clone(),
                });
            }
        }

        let defaults = section.default_models.unwrap_or_default();
        let default_models = DefaultModels {
            llm: optional(defaults.llm),
            embedding: optional(defaults.embedding),
        };

        for kind in [ModelKind::Llm, ModelKind::Embedding] {
            let Some(reference) = default_models.get(kind) else {
                continue;
            };
            let ids = primary.primary_ids(kind);
            if resolve(&ids, &catalog, kind, reference).is_none() {
                let mut known = ids;
                known.extend(
                    catalog
                        .iter()
                        .filter(|entry| entry.kind == kind)
                        .map(|entry| entry.id.clone()),
                );
                return Err(Error::DanglingReference {
                    field: format!("models.default_models.{}", kind.as_str()),
                    value: reference.to_string(),
                    kind: kind.as_str(),
                    known,
                });
            }
        }

        let pinned = [ModelKind::Llm, ModelKind::Embedding]
            .into_iter()
            .filter(|kind| default_models.get(*kind).is_some())
            .count();
        if usize::try_from(max_loaded_models).is_ok_and(|capacity| capacity < pinned) {
            return Err(Error::range(
                "models.max_loaded_models",
                max_loaded_models,
                format!("must be at least the number of default models ({pinned})"),
            ));
        }

        Ok(Self {
            enabled: section.enabled.unwrap_or(false),
            max_loaded_models,
            auto_download: section.auto_download.unwrap_or(false),
            default_models,
            catalog,
        })
    }

    pub(crate) fn to_section(&self) -> ModelsSection {
        let default_models = (self.default_models != DefaultModels::default()).then(|| {
            DefaultModelsSection {
                llm: self.default_models.llm.clone(),
                embedding: self.default_models.embedding.clone(),
                ..Default::default()
            }
        });

        ModelsSection {
            enabled: Some(self.enabled),
            max_loaded_models: Some(self.max_loaded_models.into()),
            auto_download: Some(self.auto_download),
            default_models,
            catalog: self
                .catalog
                .iter()
                .map(|entry| CatalogEntry {
                    id: Some(entry.id.clone()),
                    kind: Some(entry.kind.as_str().to_string()),
                    name: entry.name.clone(),
                    repo_id: entry.repo_id.clone(),
                    filename: entry.filename.clone(),
                    capabilities: entry.capabilities.clone(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

fn catalog_entry(index: usize, entry: CatalogEntry) -> Result<ModelEntry> {
    let field = |name: &str| format!("models.catalog[{index}].{name}");

    Ok(ModelEntry {
        id: required(&field("id"), entry.id)?,
        kind: variant_required(&field("kind"), entry.kind)?,
        name: optional(entry.name),
        repo_id: optional(entry.repo_id),
        filename: optional(entry.filename),
        capabilities: entry.capabilities,
    })
}

/// Canonical id of the model `reference` points at, if any. Primary aliases win over catalog ids.
pub(crate) fn resolve(
    primary_ids: &[String],
    catalog: &[ModelEntry],
    kind: ModelKind,
    reference: &str,
) -> Option<String> {
    if primary_ids.iter().any(|id| id == reference) {
        return primary_ids.first().cloned();
    }

    catalog
        .iter()
        .find(|entry| entry.kind == kind && entry.id == reference)
        .map(|entry| entry.id.clone())
}
