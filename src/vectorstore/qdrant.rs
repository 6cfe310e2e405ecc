use std::path::PathBuf;

use crate::document::QdrantSection;
use crate::error::{Error, Result};
use crate::settings::optional;

/// Where the Qdrant collection lives: an embedded on-disk store or a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Path(PathBuf),
    Url(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub location: Location,
    pub api_key: Option<String>,
    pub prefer_grpc: bool,
    pub collection_name: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("location", &self.location)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("prefer_grpc", &self.prefer_grpc)
            .field("collection_name", &self.collection_name)
            .finish()
    }
}

impl Config {
    pub const DEFAULT_COLLECTION_NAME: &'static str = "documents";

    pub(crate) fn from_section(section: Option<QdrantSection>) -> Result<Self> {
        let section = section.unwrap_or_default();

        let location = match (optional(section.path), optional(section.url)) {
            (Some(_), Some(_)) => {
                return Err(Error::ConflictingFields {
                    field: "qdrant.path".to_string(),
                    other: "qdrant.url".to_string(),
                });
            }
            (Some(path), None) => Location::Path(PathBuf::from(path)),
            (None, Some(url)) => Location::Url(url),
            (None, None) => return Err(Error::missing("qdrant.path")),
        };

        Ok(Self {
            location,
            api_key: optional(section.api_key),
            prefer_grpc: section.prefer_grpc.unwrap_or(false),
            collection_name: optional(section.collection_name)
                .unwrap_or_else(|| Self::DEFAULT_COLLECTION_NAME.to_string()),
        })
    }

    pub(crate) fn to_section(&self) -> QdrantSection {
        let (path, url) = match &self.location {
            Location::Path(path) => (Some(path.to_string_lossy().into_owned()), None),
            Location::Url(url) => (None, Some(url.clone())),
        };

        QdrantSection {
            path,
            url,
            api_key: self.api_key.clone(),
            prefer_grpc: Some(self.prefer_grpc),
            collection_name: Some(self.collection_name.clone()),
            ..Default::default()
        }
    }
}
