use std::path::PathBuf;

use crate::document::ChromaSection;
use crate::error::{Error, Result};
use crate::settings::optional;

/// Embedded Chroma persisted under `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub path: PathBuf,
}

impl Config {
    pub(crate) fn from_section(section: Option<ChromaSection>) -> Result<Self> {
        let path = section
            .and_then(|section| optional(section.path))
            .ok_or_else(|| Error::missing("chroma.path"))?;

        Ok(Self {
            path: PathBuf::from(path),
        })
    }

    pub(crate) fn to_section(&self) -> ChromaSection {
        ChromaSection {
            path: Some(self.path.to_string_lossy().into_owned()),
            ..Default::default()
        }
    }
}
