pub mod chroma;
pub mod qdrant;

use std::path::{Path, PathBuf};

use crate::document::{Document, VectorStoreSection};
use crate::error::{Error, Result};
use crate::settings::{Named, backend_mode, named};

named! {
    /// Vector database selected by `vectorstore.database`.
    pub enum Database {
        Qdrant => "qdrant",
        Chroma => "chroma",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorStore {
    Qdrant(qdrant::Config),
    Chroma(chroma::Config),
}

impl VectorStore {
    pub fn database(&self) -> Database {
        match self {
            Self::Qdrant(_) => Database::Qdrant,
            Self::Chroma(_) => Database::Chroma,
        }
    }

    pub(crate) fn from_document(document: &mut Document) -> Result<Self> {
        let section: VectorStoreSection = document.vectorstore.take().unwrap_or_default();

        match backend_mode("vectorstore.database", section.database)? {
            Database::Qdrant => Ok(Self::Qdrant(qdrant::Config::from_section(
                document.qdrant.take(),
            )?)),
            Database::Chroma => Ok(Self::Chroma(chroma::Config::from_section(
                document.chroma.take(),
            )?)),
        }
    }

    pub(crate) fn write(&self, document: &mut Document) {
        document.vectorstore = Some(VectorStoreSection {
            database: Some(self.database().as_str().to_string()),
            ..Default::default()
        });

        match self {
            Self::Qdrant(config) => document.qdrant = Some(config.to_section()),
            Self::Chroma(config) => document.chroma = Some(config.to_section()),
        }
    }

    /// On-disk location of the store, with relative paths anchored at `base_dir`.
    /// `None` for stores reached over the network.
    pub fn local_path(&self, base_dir: &Path) -> Option<PathBuf> {
        let (_, path) = self.configured_path()?;
        Some(anchor(path, base_dir))
    }

    /// Check that the store's directory exists or could be created, without creating anything.
    /// Only the read-only permission flag is inspected, not ownership or ACLs.
    pub fn preflight(&self, base_dir: &Path) -> Result<()> {
        match self.configured_path() {
            Some((field, path)) => ensure_creatable(field, &anchor(path, base_dir)),
            None => Ok(()),
        }
    }

    fn configured_path(&self) -> Option<(&'static str, &Path)> {
        match self {
            Self::Qdrant(config) => match &config.location {
                qdrant::Location::Path(path) => Some(("qdrant.path", path.as_path())),
                qdrant::Location::Url(_) => None,
            },
            Self::Chroma(config) => Some(("chroma.path", config.path.as_path())),
        }
    }
}

fn anchor(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Walk up to the nearest existing ancestor, which must be a writable directory.
///
/// Writability comes from the permission bits' read-only flag alone. Ownership
/// and ACLs are not consulted, so a `0755` directory owned by another user
/// passes here and only fails when the store itself creates it.
fn ensure_creatable(field: &str, path: &Path) -> Result<()> {
    let unwritable = |reason: String| Error::UnwritablePath {
        field: field.to_string(),
        path: path.to_path_buf(),
        reason,
    };

    let mut probe = Some(path);
    while let Some(candidate) = probe {
        let candidate = if candidate.as_os_str().is_empty() {
            Path::new(".")
        } else {
            candidate
        };

        match std::fs::metadata(candidate) {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(unwritable(format!(
                    "{} exists and is not a directory",
                    candidate.display()
                )));
            }
            Ok(metadata) if metadata.permissions().readonly() => {
                return Err(unwritable(format!("{} is read-only", candidate.display())));
            }
            Ok(_) => return Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                probe = candidate.parent();
            }
            Err(error) => return Err(unwritable(error.to_string())),
        }
    }

    Ok(())
}
