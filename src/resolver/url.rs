//! URL import fetching.
//!
//! `@https://...` directives pull remote text into the prompt. Only
//! text-bearing responses are accepted: markdown, plain text, and JSON by
//! declared content type, plus a sniffing fallback for servers that send
//! no (or a generic) content type.

use anyhow::Result;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::core::MdflowError;

/// Content-type base types accepted without sniffing.
const ACCEPTED_TYPES: &[&str] = &[
    "text/markdown",
    "text/x-markdown",
    "text/plain",
    "application/json",
    "application/x-json",
    "text/json",
];

/// Base types that carry no real information; the body is sniffed instead.
const GENERIC_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];

/// Fetch a URL and return its trimmed text body.
///
/// # Errors
///
/// - [`MdflowError::NetworkError`] on transport failure or HTTP >= 400
/// - [`MdflowError::UnsupportedContentType`] when the response is neither
///   declared nor sniffable as text/markdown/JSON
pub async fn fetch_url(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/markdown, application/json, text/plain, */*")
        .send()
        .await
        .map_err(|e| MdflowError::NetworkError { url: url.to_string(), reason: e.to_string() })?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(MdflowError::NetworkError {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        }
        .into());
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(';').next().unwrap_or("").trim().to_ascii_lowercase());

    let body = response
        .text()
        .await
        .map_err(|e| MdflowError::NetworkError { url: url.to_string(), reason: e.to_string() })?;

    if !body_acceptable(content_type.as_deref(), url, &body) {
        return Err(MdflowError::UnsupportedContentType {
            content_type: content_type.unwrap_or_else(|| "unknown".to_string()),
            url: url.to_string(),
        }
        .into());
    }

    Ok(body.trim().to_string())
}

/// Decide whether a response body may enter the prompt.
fn body_acceptable(content_type: Option<&str>, url: &str, body: &str) -> bool {
    match content_type {
        Some(ct) if ACCEPTED_TYPES.contains(&ct) => true,
        Some(ct) if GENERIC_TYPES.contains(&ct) || ct.is_empty() => {
            looks_like_json(body) || looks_like_markdown(url, body)
        }
        None => looks_like_json(body) || looks_like_markdown(url, body),
        Some(_) => false,
    }
}

fn looks_like_json(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body).is_ok()
}

fn looks_like_markdown(url: &str, body: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.ends_with(".md") || path.ends_with(".markdown") || path.ends_with(".json") {
        return true;
    }
    body.starts_with('#')
        || body.contains("\n- ")
        || body.contains("\n* ")
        || body.contains("\n#")
        || body.contains("```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_content_types() {
        for ct in ["text/markdown", "text/plain", "application/json", "text/json"] {
            assert!(body_acceptable(Some(ct), "https://x.test/a", "anything at all"));
        }
    }

    #[test]
    fn test_explicit_unsupported_type_rejected() {
        assert!(!body_acceptable(Some("text/html"), "https://x.test/a", "# looks like md"));
        assert!(!body_acceptable(Some("image/png"), "https://x.test/a.md", "data"));
    }

    #[test]
    fn test_missing_type_sniffs_json() {
        assert!(body_acceptable(None, "https://x.test/data", r#"{"ok": true}"#));
        assert!(!body_acceptable(None, "https://x.test/data", "just prose, nothing more"));
    }

    #[test]
    fn test_missing_type_sniffs_markdown() {
        assert!(body_acceptable(None, "https://x.test/doc", "# Title\n\nBody"));
        assert!(body_acceptable(None, "https://x.test/doc", "intro\n- item one\n- item two"));
        assert!(body_acceptable(None, "https://x.test/doc", "text\n```rust\nfn x() {}\n```"));
    }

    #[test]
    fn test_markdown_url_suffix_accepted() {
        assert!(body_acceptable(None, "https://x.test/readme.md", "plain prose"));
        assert!(body_acceptable(None, "https://x.test/doc.markdown?v=2", "plain prose"));
    }

    #[test]
    fn test_generic_type_sniffs() {
        assert!(body_acceptable(
            Some("application/octet-stream"),
            "https://x.test/doc.md",
            "prose"
        ));
        assert!(!body_acceptable(
            Some("application/octet-stream"),
            "https://x.test/blob",
            "prose"
        ));
    }
}
