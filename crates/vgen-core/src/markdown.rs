//! Markdown scraping helpers for collaborator output.
//!
//! Collaborators wrap structured payloads in fenced code blocks. These helpers
//! pull the payload out; they never interpret it.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::IgnoredAny;

fn fence_marker_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+-]*").ok())
        .as_ref()
}

/// Text after the opening fence line, preferring a `json`-tagged fence.
fn fenced_body(text: &str) -> &str {
    let open = text
        .find("```json")
        .or_else(|| text.find("```JSON"))
        .or_else(|| text.find("```"));
    match open {
        Some(pos) => {
            let after = &text[pos..];
            match after.find('\n') {
                Some(nl) => &after[nl + 1..],
                None => "",
            }
        }
        None => text,
    }
}

/// Return the JSON payload of a markdown document.
///
/// Looks inside the first `json`-tagged fence (or the first fence of any tag,
/// or the bare text) for the first JSON value. The value's extent is found by
/// parsing, so fences embedded inside JSON strings do not truncate it. When
/// the payload does not parse, everything up to the last closing fence is
/// returned so the caller can report the parse error.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let body = fenced_body(text);
    let start = body.find(|c: char| c == '{' || c == '[')?;
    let candidate = &body[start..];

    let mut values = serde_json::Deserializer::from_str(candidate).into_iter::<IgnoredAny>();
    match values.next() {
        Some(Ok(_)) => Some(&candidate[..values.byte_offset()]),
        _ => {
            let end = candidate.rfind("```").unwrap_or(candidate.len());
            Some(candidate[..end].trim())
        }
    }
}

/// Remove fence markers (```` ```verilog ````, ```` ``` ````) and trim.
pub fn strip_fence_markers(text: &str) -> String {
    match fence_marker_re() {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.replace("```", "").trim().to_string(),
    }
}
