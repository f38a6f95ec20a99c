//! Dynamic configuration values.
//!
//! Front matter and config-file layers are open mappings whose shape is
//! unknown at compile time: any key may be a flag for the downstream
//! driver. [`ConfigValue`] models that as a small tagged tree instead of
//! trying to type every driver's flag surface.

use std::fmt;

/// A single configuration value: scalar, list, or mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// YAML `null` / absent value
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Numeric scalar, kept in YAML's representation so `3` and `3.5`
    /// round-trip faithfully into argv strings
    Number(serde_yaml::Number),
    /// String scalar
    String(String),
    /// Sequence of values
    List(Vec<ConfigValue>),
    /// Insertion-ordered mapping
    Map(ConfigMap),
}

impl ConfigValue {
    /// True for `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for the literal `false`.
    #[must_use]
    pub fn is_false(&self) -> bool {
        matches!(self, Self::Bool(false))
    }

    /// True for the literal `true`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// Truthiness used by the interactive-mode toggle: anything that is
    /// not literally `false` counts, including `null` and `""`.
    #[must_use]
    pub fn is_interactive_truthy(&self) -> bool {
        !self.is_false()
    }

    /// Borrow the map form, if this is a mapping.
    #[must_use]
    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the string form, if this is a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render a scalar as the string that goes into argv or the child
    /// environment. Lists and maps have no single argument form.
    #[must_use]
    pub fn as_arg_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Interpret as a non-negative integer, for keys like `context_window`.
    #[must_use]
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Number(n) => n.as_u64().map(|v| v as usize),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert from a parsed YAML value.
    #[must_use]
    pub fn from_yaml(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(b) => Self::Bool(b),
            serde_yaml::Value::Number(n) => Self::Number(n),
            serde_yaml::Value::String(s) => Self::String(s),
            serde_yaml::Value::Sequence(seq) => {
                Self::List(seq.into_iter().map(Self::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(mapping) => {
                let mut map = ConfigMap::new();
                for (k, v) in mapping {
                    // Non-string keys (rare in YAML front matter) are
                    // stringified so `$1: prompt` and `1: x` both survive.
                    let key = match k {
                        serde_yaml::Value::String(s) => s,
                        other => serde_yaml::to_string(&other)
                            .map(|s| s.trim_end().to_string())
                            .unwrap_or_default(),
                    };
                    map.insert(key, Self::from_yaml(v));
                }
                Self::Map(map)
            }
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }

    /// Convert from a parsed JSON value (`.mdflow.json` project config).
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                // Route through YAML's number type for a single scalar model.
                serde_yaml::from_str::<serde_yaml::Number>(&n.to_string())
                    .map_or(Self::String(n.to_string()), Self::Number)
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => {
                Self::List(arr.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(obj) => {
                let mut map = ConfigMap::new();
                for (k, v) in obj {
                    map.insert(k, Self::from_json(v));
                }
                Self::Map(map)
            }
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Self::Map(map) => {
                let rendered: Vec<String> =
                    map.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// An insertion-ordered string-keyed mapping of [`ConfigValue`]s.
///
/// Insertion order is kept for deterministic argv emission and debug
/// output; it is not otherwise observable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// True when the key is present (even with a `null` value).
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or replace, preserving the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Remove a key, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigMap {
    fn from_iter<T: IntoIterator<Item = (String, ConfigValue)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_scalars() {
        let v: serde_yaml::Value = serde_yaml::from_str("42").unwrap();
        assert_eq!(ConfigValue::from_yaml(v).as_arg_string().unwrap(), "42");

        let v: serde_yaml::Value = serde_yaml::from_str("true").unwrap();
        assert!(ConfigValue::from_yaml(v).is_true());

        let v: serde_yaml::Value = serde_yaml::from_str("~").unwrap();
        assert!(ConfigValue::from_yaml(v).is_null());
    }

    #[test]
    fn test_from_yaml_mapping_preserves_order() {
        let v: serde_yaml::Value = serde_yaml::from_str("z: 1\na: 2\nm: 3").unwrap();
        let map = match ConfigValue::from_yaml(v) {
            ConfigValue::Map(m) => m,
            other => panic!("expected map, got {other:?}"),
        };
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_interactive_truthiness() {
        assert!(ConfigValue::Null.is_interactive_truthy());
        assert!(ConfigValue::String(String::new()).is_interactive_truthy());
        assert!(ConfigValue::Bool(true).is_interactive_truthy());
        assert!(!ConfigValue::Bool(false).is_interactive_truthy());
    }

    #[test]
    fn test_map_insert_replaces_in_place() {
        let mut map = ConfigMap::new();
        map.insert("a", ConfigValue::from("1"));
        map.insert("b", ConfigValue::from("2"));
        map.insert("a", ConfigValue::from("3"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a").unwrap().as_str(), Some("3"));
    }

    #[test]
    fn test_from_json_object() {
        let v: serde_json::Value = serde_json::from_str(r#"{"print": true, "n": 3}"#).unwrap();
        let map = match ConfigValue::from_json(v) {
            ConfigValue::Map(m) => m,
            other => panic!("expected map, got {other:?}"),
        };
        assert!(map.get("print").unwrap().is_true());
        assert_eq!(map.get("n").unwrap().as_usize(), Some(3));
    }
}
