//! Front-matter parsing: splitting an agent file into config and body.
//!
//! An agent file may begin with a YAML block delimited by `---` lines. The
//! block becomes the document's [`ConfigMap`]; the rest is the body handed
//! to the directive parser and template engine. A document without front
//! matter is all body.
//!
//! The split itself is delegated to `gray_matter` with a raw engine so we
//! get the frontmatter text back verbatim and control YAML parsing (and
//! its error reporting) ourselves.

use anyhow::Result;
use gray_matter::{
    engine::Engine,
    Matter, Pod,
};
use std::path::Path;

use crate::config::{ConfigMap, ConfigValue};
use crate::core::MdflowError;

/// gray_matter engine that returns the raw frontmatter text unparsed.
///
/// Parsing is deferred to `serde_yaml` so malformed YAML surfaces as a
/// fatal error with line/column instead of being swallowed.
struct RawFrontmatter;

impl Engine for RawFrontmatter {
    fn parse(content: &str) -> Result<Pod, gray_matter::Error> {
        Ok(Pod::String(content.to_string()))
    }
}

/// A parsed markdown document: structured config plus prompt body.
///
/// Created at parse time and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Document {
    /// Front-matter mapping; empty when the file has no front matter.
    pub config: ConfigMap,
    /// The body text with front matter removed.
    pub body: String,
}

impl Document {
    /// Parse a document from full file text.
    ///
    /// # Errors
    ///
    /// [`MdflowError::FrontMatterParseError`] when a front-matter block is
    /// present but is not a valid YAML mapping; the message carries the
    /// YAML parser's line/column.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let matter: Matter<RawFrontmatter> = Matter::new();
        let parsed = matter.parse::<String>(text).map_err(|e| {
            MdflowError::FrontMatterParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let Some(raw) = parsed.data.filter(|raw| !raw.trim().is_empty()) else {
            return Ok(Self { config: ConfigMap::new(), body: parsed.content });
        };

        let yaml: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(|e| {
            MdflowError::FrontMatterParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut config = match ConfigValue::from_yaml(yaml) {
            ConfigValue::Map(map) => map,
            other => {
                return Err(MdflowError::FrontMatterParseError {
                    path: path.display().to_string(),
                    reason: format!("front matter must be a mapping, got {other}"),
                }
                .into())
            }
        };

        if let Some(env) = config.remove("env") {
            config.insert("env", coerce_env(env));
        }

        Ok(Self { config, body: parsed.content })
    }
}

/// Coerce scalars under the `env` key to strings.
///
/// Environment values are always strings at the process boundary, so
/// `PORT: 8080` and `DEBUG: true` behave the same as their quoted forms.
/// Applies to a scalar `env`, to each element of a list, and to each value
/// of a mapping. Other keys keep their parsed types.
fn coerce_env(value: ConfigValue) -> ConfigValue {
    match value {
        ConfigValue::Number(n) => ConfigValue::String(n.to_string()),
        ConfigValue::Bool(b) => ConfigValue::String(b.to_string()),
        ConfigValue::List(items) => {
            ConfigValue::List(items.into_iter().map(coerce_env).collect())
        }
        ConfigValue::Map(map) => {
            let mut coerced = ConfigMap::new();
            for (k, v) in map.iter() {
                coerced.insert(k.to_string(), coerce_env(v.clone()));
            }
            ConfigValue::Map(coerced)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Document {
        Document::parse(text, Path::new("test.md")).unwrap()
    }

    #[test]
    fn test_no_front_matter() {
        let doc = parse("Just a prompt.\n");
        assert!(doc.config.is_empty());
        assert_eq!(doc.body, "Just a prompt.\n");
    }

    #[test]
    fn test_basic_split() {
        let doc = parse("---\nprint: true\nmodel: opus\n---\nSay hi.\n");
        assert!(doc.config.get("print").unwrap().is_true());
        assert_eq!(doc.config.get("model").unwrap().as_str(), Some("opus"));
        assert_eq!(doc.body.trim(), "Say hi.");
    }

    #[test]
    fn test_empty_config_round_trip() {
        let doc = parse("body only");
        assert!(doc.config.is_empty());
        assert_eq!(doc.body, "body only");
    }

    #[test]
    fn test_env_scalar_coercion() {
        let doc = parse("---\nenv:\n  PORT: 8080\n  DEBUG: true\n  NAME: app\n---\nbody");
        let env = doc.config.get("env").unwrap().as_map().unwrap();
        assert_eq!(env.get("PORT").unwrap().as_str(), Some("8080"));
        assert_eq!(env.get("DEBUG").unwrap().as_str(), Some("true"));
        assert_eq!(env.get("NAME").unwrap().as_str(), Some("app"));
    }

    #[test]
    fn test_non_env_keys_keep_types() {
        let doc = parse("---\ncontext_window: 50000\nsilent: true\n---\nbody");
        assert_eq!(doc.config.get("context_window").unwrap().as_usize(), Some(50_000));
        assert!(doc.config.get("silent").unwrap().is_true());
    }

    #[test]
    fn test_malformed_yaml_is_fatal() {
        let err = Document::parse("---\nkey: [unclosed\n---\nbody", Path::new("bad.md"))
            .unwrap_err();
        match err.downcast_ref::<MdflowError>() {
            Some(MdflowError::FrontMatterParseError { path, .. }) => {
                assert_eq!(path, "bad.md");
            }
            other => panic!("expected FrontMatterParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_dollar_keys_survive() {
        let doc = parse("---\n$1: prompt\n$lang: en\n---\nbody");
        assert_eq!(doc.config.get("$1").unwrap().as_str(), Some("prompt"));
        assert_eq!(doc.config.get("$lang").unwrap().as_str(), Some("en"));
    }
}
