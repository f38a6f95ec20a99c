//! Tool adapters: per-driver defaults and interactive-mode transforms.
//!
//! Each downstream AI CLI has its own convention for "run once with this
//! prompt and print the answer" versus "open an interactive session":
//! `claude` wants `--print`, `codex` gates batch mode behind an `exec`
//! subcommand, `gemini` wants the prompt behind a flag, and so on. An
//! adapter contributes the built-in defaults layer for its tool and knows
//! how to rewrite those defaults for interactive mode.
//!
//! Unknown tools fall back to [`ToolAdapter::Default`], which contributes
//! nothing and only strips the interactive marker keys.

use crate::config::{ConfigMap, ConfigValue};

/// Front-matter keys that toggle interactive mode; every adapter strips
/// them during the interactive transform.
pub const INTERACTIVE_KEYS: &[&str] = &["_interactive", "_i"];

/// One registered driver adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAdapter {
    /// Anthropic `claude` CLI
    Claude,
    /// Google `gemini` CLI
    Gemini,
    /// OpenAI `codex` CLI
    Codex,
    /// GitHub `copilot` CLI
    Copilot,
    /// Factory `droid` CLI
    Droid,
    /// `opencode` CLI
    Opencode,
    /// Any unrecognized driver
    Default,
}

impl ToolAdapter {
    /// Look up the adapter for a driver name.
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        match name {
            "claude" => Self::Claude,
            "gemini" => Self::Gemini,
            "codex" => Self::Codex,
            "copilot" => Self::Copilot,
            "droid" => Self::Droid,
            "opencode" => Self::Opencode,
            _ => Self::Default,
        }
    }

    /// Canonical tool identifier, `None` for the fallback adapter.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Claude => Some("claude"),
            Self::Gemini => Some("gemini"),
            Self::Codex => Some("codex"),
            Self::Copilot => Some("copilot"),
            Self::Droid => Some("droid"),
            Self::Opencode => Some("opencode"),
            Self::Default => None,
        }
    }

    /// The built-in defaults this adapter contributes for print mode.
    #[must_use]
    pub fn defaults(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        match self {
            Self::Claude => {
                map.insert("print", ConfigValue::Bool(true));
            }
            Self::Gemini => {
                map.insert("$1", ConfigValue::from("prompt"));
            }
            Self::Codex | Self::Droid => {
                map.insert("_subcommand", ConfigValue::from("exec"));
            }
            Self::Copilot => {
                map.insert("$1", ConfigValue::from("prompt"));
                map.insert("silent", ConfigValue::Bool(true));
            }
            Self::Opencode => {
                map.insert("_subcommand", ConfigValue::from("run"));
            }
            Self::Default => {}
        }
        map
    }

    /// Rewrite a merged config for an interactive session.
    ///
    /// Pure function of `(self, config)`: removes or rewrites the keys that
    /// force print mode, and always strips the interactive marker keys.
    #[must_use]
    pub fn apply_interactive(&self, config: ConfigMap) -> ConfigMap {
        let mut config = config;
        match self {
            Self::Claude => {
                config.remove("print");
            }
            Self::Gemini => {
                if config.get("$1").and_then(ConfigValue::as_str) == Some("prompt") {
                    config.insert("$1", ConfigValue::from("prompt-interactive"));
                }
            }
            Self::Codex | Self::Droid | Self::Opencode => {
                config.remove("_subcommand");
            }
            Self::Copilot => {
                if config.get("$1").and_then(ConfigValue::as_str) == Some("prompt") {
                    config.insert("$1", ConfigValue::from("interactive"));
                }
                config.remove("silent");
            }
            Self::Default => {}
        }
        for key in INTERACTIVE_KEYS {
            config.remove(key);
        }
        config
    }
}

/// Build the built-in defaults cascade layer: one `commands` entry per
/// registered adapter.
#[must_use]
pub fn builtin_defaults_layer() -> ConfigMap {
    let adapters = [
        ToolAdapter::Claude,
        ToolAdapter::Gemini,
        ToolAdapter::Codex,
        ToolAdapter::Copilot,
        ToolAdapter::Droid,
        ToolAdapter::Opencode,
    ];
    let mut commands = ConfigMap::new();
    for adapter in adapters {
        let name = adapter.name().expect("registered adapters are named");
        commands.insert(name, ConfigValue::Map(adapter.defaults()));
    }
    let mut layer = ConfigMap::new();
    layer.insert("commands", ConfigValue::Map(commands));
    layer
}
