//! File system helpers: size-capped reads and binary detection.
//!
//! The import resolver and glob expander both need to read files with the
//! same guard rails: reject files over [`MAX_INPUT_SIZE`](crate::constants::MAX_INPUT_SIZE)
//! and detect binary content before it ends up inside a prompt.

use anyhow::{Context, Result};
use std::path::Path;

use crate::constants::{BINARY_EXTENSIONS, BINARY_SNIFF_LEN, MAX_INPUT_SIZE};
use crate::core::MdflowError;

/// Read a file as UTF-8 text, enforcing the input size cap.
///
/// # Errors
///
/// - [`MdflowError::FileNotFound`] when the file does not exist
/// - [`MdflowError::FileSizeLimit`] when it exceeds the cap
pub async fn read_text_capped(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path).await.map_err(|_| MdflowError::FileNotFound {
        path: path.display().to_string(),
    })?;
    if metadata.len() > MAX_INPUT_SIZE {
        return Err(MdflowError::FileSizeLimit {
            path: path.display().to_string(),
            size: metadata.len(),
            limit: MAX_INPUT_SIZE,
        }
        .into());
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Check whether a file should be treated as binary.
///
/// A file is binary when its extension is in the known-binary list, or when
/// the first 8 KiB of its content contains a null byte.
pub fn is_binary_file(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    match std::fs::File::open(path) {
        Ok(mut file) => {
            use std::io::Read;
            let mut buf = vec![0u8; BINARY_SNIFF_LEN];
            match file.read(&mut buf) {
                Ok(n) => buf[..n].contains(&0),
                Err(_) => false,
            }
        }
        Err(_) => false,
    }
}

/// Check whether a byte slice looks binary (contains a null byte).
#[must_use]
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}
