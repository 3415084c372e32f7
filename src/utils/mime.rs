//! MIME Type Detection Utilities
//!
//! Detects content types from file bytes (magic numbers via `infer`) or from
//! a file name's extension (via `mime_guess`).

/// Guess MIME by inspecting bytes (magic numbers)
pub fn guess_mime_from_bytes(bytes: &[u8]) -> Option<String> {
    infer::get(bytes).map(|k| k.mime_type().to_string())
}

/// Guess MIME by file name or path (extension-based)
pub fn guess_mime_from_path(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next()?;
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

/// Combined guess: prefer bytes, fall back to extension, otherwise octet-stream
pub fn guess_mime(bytes: Option<&[u8]>, path: Option<&str>) -> String {
    if let Some(b) = bytes
        && let Some(m) = guess_mime_from_bytes(b)
    {
        return m;
    }
    if let Some(p) = path
        && let Some(m) = guess_mime_from_path(p)
    {
        return m;
    }
    "application/octet-stream".to_string()
}
