use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while turning a settings document into [`crate::Settings`].
///
/// All of these are fatal at startup. Variants that concern a single key carry
/// its dotted path (`llamacpp.llm_hf_model_file`, `models.catalog[1].id`), see
/// [`Error::field`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read settings from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("malformed placeholder in `{field}` ({reason}): {text:?}")]
    MalformedPlaceholder {
        field: String,
        text: String,
        reason: &'static str,
    },

    #[error("`{field}` references environment variable `{variable}`, which is unset and has no default")]
    UnresolvedPlaceholder { field: String, variable: String },

    #[error("missing required field `{field}`")]
    MissingRequiredField { field: String },

    #[error("unsupported backend {value:?} for `{field}`, expected one of: {}", .expected.join(", "))]
    UnknownBackend {
        field: String,
        value: String,
        expected: &'static [&'static str],
    },

    #[error("unknown value {value:?} for `{field}`, expected one of: {}", .expected.join(", "))]
    UnknownVariant {
        field: String,
        value: String,
        expected: &'static [&'static str],
    },

    #[error("`{field}` = {value} is out of range: {bound}")]
    InvalidRange {
        field: String,
        value: String,
        bound: String,
    },

    #[error("`{field}` and `{other}` cannot both be set")]
    ConflictingFields { field: String, other: String },

    #[error("`{field}` refers to {value:?}, which is not a configured {kind} model (known: {})", .known.join(", "))]
    DanglingReference {
        field: String,
        value: String,
        kind: &'static str,
        known: Vec<String>,
    },

    #[error("`{field}` declares model {id:?} more than once")]
    DuplicateModel { field: String, id: String },

    #[error("unknown field `{field}`")]
    UnknownField { field: String },

    #[error("`{field}` points at {}, which cannot be created: {reason}", .path.display())]
    UnwritablePath {
        field: String,
        path: PathBuf,
        reason: String,
    },
}

impl Error {
    /// Dotted path of the offending key, if the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Io { .. } | Self::Parse(_) => None,
            Self::MalformedPlaceholder { field, .. }
            | Self::UnresolvedPlaceholder { field, .. }
            | Self::MissingRequiredField { field }
            | Self::UnknownBackend { field, .. }
            | Self::UnknownVariant { field, .. }
            | Self::InvalidRange { field, .. }
            | Self::ConflictingFields { field, .. }
            | Self::DanglingReference { field, .. }
            | Self::DuplicateModel { field, .. }
            | Self::UnknownField { field }
            | Self::UnwritablePath { field, .. } => Some(field),
        }
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
        }
    }

    pub(crate) fn range(
        field: impl Into<String>,
        value: impl ToString,
        bound: impl Into<String>,
    ) -> Self {
        Self::InvalidRange {
            field: field.into(),
            value: value.to_string(),
            bound: bound.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn test_field_path_is_reported() -> anyhow::Result<()> {
        let error = Error::missing("llamacpp.llm_hf_model_file");
        anyhow::ensure!(error.field() == Some("llamacpp.llm_hf_model_file"));
        anyhow::ensure!(
            error.to_string() == "missing required field `llamacpp.llm_hf_model_file`"
        );

        let error = Error::UnknownBackend {
            field: "llm.mode".to_string(),
            value: "vllm".to_string(),
            expected: &["llamacpp", "ollama", "mock"],
        };
        anyhow::ensure!(error.to_string().ends_with("expected one of: llamacpp, ollama, mock"));

        Ok(())
    }
}
