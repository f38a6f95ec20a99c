//! Configuration: dynamic values and the four-layer cascade.
//!
//! [`ConfigValue`] models the open key/value shape of front matter and
//! config files; [`cascade`] merges built-in adapter defaults, the user
//! global file, and project files into the effective per-driver defaults.

pub mod cascade;
pub mod value;

pub use cascade::{defaults_for, find_git_root, load_cascade, merge_layers};
pub use value::{ConfigMap, ConfigValue};
