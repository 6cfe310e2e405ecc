//! `${NAME:default}` substitution over a parsed YAML tree.
//!
//! A placeholder resolves to the environment value of `NAME` when it is set and
//! non-empty, otherwise to `default`. `${NAME}` without a default must be
//! resolvable. Substitution happens on string scalars only, never on mapping
//! keys, and the result is always a string; numeric and boolean settings accept
//! numeric and boolean strings when they are read.
//!
//! `$${` is an escaped, literal `${`. [`escape_value`] applies it to every
//! string so that written-back documents resolve to the same values.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use serde_yaml::Value;

use crate::error::{Error, Result};

/// Source of variable values for placeholder resolution.
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<S: BuildHasher> Environment for HashMap<String, String, S> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<E: Environment + ?Sized> Environment for &E {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

/// Resolve every placeholder in `text`. `field` is only used for error reporting.
pub fn resolve_str<'a, E>(text: &'a str, env: &E, field: &str) -> Result<Cow<'a, str>>
where
    E: Environment + ?Sized,
{
    if !text.contains("${") {
        return Ok(Cow::Borrowed(text));
    }

    let malformed = |reason| Error::MalformedPlaceholder {
        field: field.to_string(),
        text: text.to_string(),
        reason,
    };

    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        let (literal, tail) = rest.split_at(start);

        if let Some(literal) = literal.strip_suffix('$') {
            output.push_str(literal);
            output.push_str("${");
            rest = tail.get(2..).unwrap_or_default();
            continue;
        }
        output.push_str(literal);

        let body = tail.get(2..).unwrap_or_default();
        let end = body
            .find('}')
            .ok_or_else(|| malformed("unterminated placeholder"))?;
        let inner = body.get(..end).unwrap_or_default();
        rest = body.get(end + 1..).unwrap_or_default();

        let (name, default) = match inner.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (inner, None),
        };

        if name.is_empty() {
            return Err(malformed("empty variable name"));
        }
        if !is_variable_name(name) {
            return Err(malformed("invalid variable name"));
        }

        match (env.var(name).filter(|value| !value.is_empty()), default) {
            (Some(value), _) => output.push_str(&value),
            (None, Some(default)) => output.push_str(default),
            (None, None) => {
                return Err(Error::UnresolvedPlaceholder {
                    field: field.to_string(),
                    variable: name.to_string(),
                });
            }
        }
    }

    output.push_str(rest);
    Ok(Cow::Owned(output))
}

/// Inverse of resolution for literal text: every `${` becomes `$${`.
pub fn escape(text: &str) -> Cow<'_, str> {
    if text.contains("${") {
        Cow::Owned(text.replace("${", "$${"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Escape every string scalar in place. Keys are left alone since they are never resolved.
pub fn escape_value(value: &mut Value) {
    match value {
        Value::String(text) => {
            if let Cow::Owned(escaped) = escape(text) {
                *text = escaped;
            }
        }
        Value::Mapping(mapping) => mapping.values_mut().for_each(escape_value),
        Value::Sequence(items) => items.iter_mut().for_each(escape_value),
        Value::Tagged(tagged) => escape_value(&mut tagged.value),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Resolve placeholders in place, walking mappings, sequences and tagged values.
pub fn resolve_value<E>(value: &mut Value, env: &E) -> Result<()>
where
    E: Environment + ?Sized,
{
    walk(value, env, &mut Vec::new())
}

fn walk<E>(value: &mut Value, env: &E, path: &mut Vec<String>) -> Result<()>
where
    E: Environment + ?Sized,
{
    match value {
        Value::String(text) => {
            if let Cow::Owned(resolved) = resolve_str(text, env, &join(path))? {
                *text = resolved;
            }
            Ok(())
        }
        Value::Mapping(mapping) => {
            for (key, child) in mapping.iter_mut() {
                path.push(key_segment(key));
                let outcome = walk(child, env, path);
                path.pop();
                outcome?;
            }
            Ok(())
        }
        Value::Sequence(items) => {
            let depth = path.len();
            let base = path.last().map(String::len);
            for (index, child) in items.iter_mut().enumerate() {
                let segment = format!("[{index}]");
                match path.last_mut() {
                    Some(last) => last.push_str(&segment),
                    None => path.push(segment),
                }
                let outcome = walk(child, env, path);
                path.truncate(depth);
                if let (Some(last), Some(len)) = (path.last_mut(), base) {
                    last.truncate(len);
                }
                outcome?;
            }
            Ok(())
        }
        Value::Tagged(tagged) => walk(&mut tagged.value, env, path),
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
    }
}

fn key_segment(key: &Value) -> String {
    match key {
        Value::String(key) => key.clone(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn join(path: &[String]) -> String {
    path.join(".")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use serde_yaml::Value;

    use super::{Environment, escape, escape_value, resolve_str, resolve_value};
    use crate::error::Error;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_default_applies_when_unset_or_empty() -> anyhow::Result<()> {
        let unset = env(&[]);
        let empty = env(&[("APP_ENV", "")]);
        let set = env(&[("APP_ENV", "prod")]);

        anyhow::ensure!(resolve_str("${APP_ENV:local}", &unset, "server.env_name")? == "local");
        anyhow::ensure!(resolve_str("${APP_ENV:local}", &empty, "server.env_name")? == "local");
        anyhow::ensure!(resolve_str("${APP_ENV:local}", &set, "server.env_name")? == "prod");

        Ok(())
    }

    #[test]
    fn test_mixed_text_and_multiple_placeholders() -> anyhow::Result<()> {
        let vars = env(&[("HOST", "localhost"), ("PORT", "6333")]);
        let resolved = resolve_str("http://${HOST}:${PORT:80}/$path", &vars, "qdrant.url")?;
        anyhow::ensure!(resolved == "http://localhost:6333/$path");

        anyhow::ensure!(resolve_str("${EMPTY_DEFAULT:}", &vars, "x")? == "");
        anyhow::ensure!(resolve_str("${WITH_COLON:a:b}", &vars, "x")? == "a:b");
        Ok(())
    }

    #[test]
    fn test_malformed_placeholders() -> anyhow::Result<()> {
        let vars = env(&[]);
        for (text, expected) in [
            ("${APP_ENV:local", "unterminated placeholder"),
            ("${}", "empty variable name"),
            ("${:local}", "empty variable name"),
            ("${1ST}", "invalid variable name"),
            ("${APP-ENV:local}", "invalid variable name"),
        ] {
            match resolve_str(text, &vars, "server.env_name") {
                Err(Error::MalformedPlaceholder { field, reason, .. }) => {
                    anyhow::ensure!(field == "server.env_name");
                    anyhow::ensure!(reason == expected, "{text}: {reason}");
                }
                other => anyhow::bail!("{text}: unexpected {other:?}"),
            }
        }
        Ok(())
    }

    #[test]
    fn test_missing_variable_without_default() -> anyhow::Result<()> {
        let result = resolve_str("${HF_TOKEN}", &env(&[]), "huggingface.access_token");
        anyhow::ensure!(matches!(
            result,
            Err(Error::UnresolvedPlaceholder { ref variable, .. }) if variable == "HF_TOKEN"
        ));
        Ok(())
    }

    #[allow(clippy::indexing_slicing)]
    #[test]
    fn test_tree_walk_reports_nested_paths() -> anyhow::Result<()> {
        let mut document: Value = serde_yaml::from_str(
            "server:\n  env_name: ${APP_ENV:local}\nmodels:\n  catalog:\n    - id: ${MODEL_ID}\n",
        )?;

        let vars = env(&[("MODEL_ID", "phi-3")]);
        resolve_value(&mut document, &vars)?;
        anyhow::ensure!(document["server"]["env_name"] == Value::from("local"));
        anyhow::ensure!(document["models"]["catalog"][0]["id"] == Value::from("phi-3"));

        let mut document: Value =
            serde_yaml::from_str("models:\n  catalog:\n    - id: ${MODEL_ID}\n")?;
        match resolve_value(&mut document, &env(&[])) {
            Err(Error::UnresolvedPlaceholder { field, .. }) => {
                anyhow::ensure!(field == "models.catalog[0].id", "got {field}");
            }
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_escaped_placeholders_are_literal() -> anyhow::Result<()> {
        let vars = env(&[("TEAM", "search")]);
        anyhow::ensure!(resolve_str("$${TEAM}", &vars, "x")? == "${TEAM}");
        anyhow::ensure!(resolve_str("$$${TEAM}", &vars, "x")? == "$${TEAM}");
        anyhow::ensure!(resolve_str("$${TEAM}-${TEAM}", &vars, "x")? == "${TEAM}-search");
        anyhow::ensure!(escape("${TEAM}") == "$${TEAM}");
        anyhow::ensure!(escape("plain $ text") == "plain $ text");

        let mut document: Value = serde_yaml::from_str("server:\n  env_name: ${TEAM}\n${KEY}: [\"${A}\"]\n")?;
        escape_value(&mut document);
        let expected: Value = serde_yaml::from_str("server:\n  env_name: $${TEAM}\n${KEY}: [\"$${A}\"]\n")?;
        pretty_assertions::assert_eq!(document, expected);
        Ok(())
    }

    #[test]
    fn test_sequence_under_empty_key_keeps_parent_path() -> anyhow::Result<()> {
        let mut document: Value =
            serde_yaml::from_str("outer:\n  \"\": [\"${A:a}\", b]\n  after: ${MISSING}\n")?;
        match resolve_value(&mut document, &env(&[])) {
            Err(Error::UnresolvedPlaceholder { field, .. }) => {
                anyhow::ensure!(field == "outer.after", "got {field}");
            }
            other => anyhow::bail!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_keys_and_non_strings_are_untouched() -> anyhow::Result<()> {
        let mut document: Value = serde_yaml::from_str("${KEY:k}: 3\nflag: true\n")?;
        let before = document.clone();
        resolve_value(&mut document, &env(&[("KEY", "v")]))?;
        pretty_assertions::assert_eq!(document, before);
        Ok(())
    }

    struct Fixed(Option<String>);

    impl Environment for Fixed {
        fn var(&self, _name: &str) -> Option<String> {
            self.0.clone()
        }
    }

    proptest! {
        #[test]
        fn prop_text_without_placeholders_is_unchanged(text in "[^$]*") {
            let resolved = resolve_str(&text, &Fixed(None), "x").map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(resolved.as_ref(), text.as_str());
        }

        #[test]
        fn prop_value_wins_over_default(value in "[a-z0-9]{1,12}", default in "[a-z0-9]{0,12}") {
            let text = format!("${{APP_ENV:{default}}}");
            let resolved = resolve_str(&text, &Fixed(Some(value.clone())), "x").map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(resolved.as_ref(), value.as_str());

            let resolved = resolve_str(&text, &Fixed(None), "x").map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(resolved.as_ref(), default.as_str());
        }

        #[test]
        fn prop_escaped_text_resolves_to_itself(text in "[a-z${}:$_]{0,24}") {
            let escaped = escape(&text);
            let resolved = resolve_str(&escaped, &Fixed(Some("leaked".to_string())), "x").map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(resolved.as_ref(), text.as_str());
        }
    }
}
