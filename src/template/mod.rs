//! Liquid template rendering and free-variable analysis.
//!
//! The prompt body (and inline command text) may use Liquid syntax:
//! `{{ _name }}` interpolation with filters, `{% if %}`/`{% for %}`
//! control flow, `{% assign %}`/`{% capture %}` locals, and `{% raw %}`
//! passthrough. Rendering is lenient: variables the caller did not bind
//! render as empty instead of failing.
//!
//! Rendering delegates to the `liquid` crate; leniency is implemented by
//! pre-binding every free variable (found by [`analysis::free_variables`])
//! that the caller left unbound to nil before rendering.

pub mod analysis;

use anyhow::Result;
use std::collections::BTreeMap;

use crate::core::MdflowError;

pub use analysis::free_variables;

/// Wrapper around a configured Liquid parser.
pub struct TemplateEngine {
    parser: liquid::Parser,
}

impl TemplateEngine {
    /// Build an engine with the standard tag and filter library.
    pub fn new() -> Result<Self> {
        let parser = liquid::ParserBuilder::with_stdlib().build().map_err(|e| {
            MdflowError::TemplateError { message: format!("failed to build template engine: {e}") }
        })?;
        Ok(Self { parser })
    }

    /// Render `text` with the given variable bindings.
    ///
    /// Free variables not present in `vars` are bound to nil so undefined
    /// names render as empty output.
    ///
    /// # Errors
    ///
    /// [`MdflowError::TemplateError`] on parse failure (malformed tags,
    /// unknown filters).
    pub fn render(&self, text: &str, vars: &BTreeMap<String, String>) -> Result<String> {
        let template = self.parser.parse(text).map_err(|e| MdflowError::TemplateError {
            message: e.to_string(),
        })?;

        let mut globals = liquid::Object::new();
        for (name, value) in vars {
            globals.insert(
                liquid::model::KString::from_string(name.clone()),
                liquid::model::Value::scalar(value.clone()),
            );
        }
        for name in analysis::free_variables(text) {
            if !vars.contains_key(&name) {
                globals.insert(
                    liquid::model::KString::from_string(name),
                    liquid::model::Value::Nil,
                );
            }
        }

        template.render(&globals).map_err(|e| {
            MdflowError::TemplateError { message: e.to_string() }.into()
        })
    }
}

/// Wrap resolved directive output so a later render pass treats it as
/// literal text.
///
/// A literal `{% endraw %}` inside the output would terminate the wrapper
/// early, so it is broken apart before wrapping.
#[must_use]
pub fn wrap_raw(output: &str) -> String {
    let sanitized = sanitize_raw_terminator(output);
    format!("{{% raw %}}\n{sanitized}\n{{% endraw %}}")
}

/// Break up `{% endraw %}` sequences so they cannot close a raw block.
#[must_use]
pub fn sanitize_raw_terminator(text: &str) -> String {
    static ENDRAW: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"\{%-?\s*endraw\s*-?%\}").unwrap()
    });
    ENDRAW.replace_all(text, "{ % endraw % }").into_owned()
}
