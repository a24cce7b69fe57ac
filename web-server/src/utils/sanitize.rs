// web-server/src/utils/sanitize.rs
use once_cell::sync::Lazy;
use regex::Regex;

// Elements whose content is executable or rendered and is dropped with the tag
static EXECUTABLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<\s*(script|style|iframe|object|embed|noscript|template)\b[^>]*>.*?<\s*/\s*(script|style|iframe|object|embed|noscript|template)\s*>")
        .unwrap_or_else(|e| panic!("invalid executable block pattern: {}", e))
});

// An executable element that is never closed swallows the rest of the input
static UNCLOSED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<\s*(script|style|iframe|object|embed|noscript|template)\b.*$")
        .unwrap_or_else(|e| panic!("invalid unclosed block pattern: {}", e))
});

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<\s*/?\s*[a-zA-Z!][^>]*>")
        .unwrap_or_else(|e| panic!("invalid tag pattern: {}", e))
});

/// Trim whitespace and strip markup from a user-supplied string.
///
/// Script-like elements are removed together with their content, any other
/// tag is removed and its text kept.
pub fn sanitize_input(input: &str) -> String {
    let without_blocks = EXECUTABLE_BLOCK.replace_all(input, "");
    let without_unclosed = UNCLOSED_BLOCK.replace_all(&without_blocks, "");
    let without_tags = TAG.replace_all(&without_unclosed, "");
    without_tags.trim().to_string()
}
