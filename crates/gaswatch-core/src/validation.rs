//! Input validation for registrations
//!
//! Identities are Telegram usernames. They are trimmed, stripped of a leading
//! `@`, sanitized against markup, checked against the username alphabet and
//! lowercased, so every spelling of the same handle maps to one stored
//! identity.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{MAX_THRESHOLD, MIN_THRESHOLD};

static IDENTITY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{5,32}$").expect("valid identity regex"));

// Elements dropped together with their content. An unclosed element runs to
// the end of input.
static DANGEROUS_ELEMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|iframe|object|embed|noscript|template|textarea|title)\b[^>]*>.*?(?:</\s*(script|style|iframe|object|embed|noscript|template|textarea|title)\s*>|$)")
        .expect("valid element regex")
});

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?\s*([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").expect("valid tag regex"));

// Formatting and block tags survive sanitizing; everything else is unwrapped
const KEPT_TAGS: &[&str] = &[
    "b", "i", "u", "s", "em", "strong", "strike", "sub", "sup", "tt", "font", "p", "div", "h1",
    "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote",
];

/// Normalize a raw identity into its stored form
pub fn normalize_identity(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(Error::validation("Telegram username must not be empty"));
    }

    let trimmed = raw.trim();
    let unprefixed = trimmed.strip_prefix('@').unwrap_or(trimmed);
    let sanitized = sanitize_markup(unprefixed);

    if !IDENTITY_PATTERN.is_match(&sanitized) {
        return Err(Error::validation(
            "Invalid username. It must be 5-32 characters long (letters, numbers, underscore)",
        ));
    }

    Ok(sanitized.to_lowercase())
}

/// Check a threshold is within the accepted range
pub fn validate_threshold(threshold: i64) -> Result<i32> {
    match i32::try_from(threshold) {
        Ok(t) if (MIN_THRESHOLD..=MAX_THRESHOLD).contains(&t) => Ok(t),
        _ => Err(Error::validation(format!(
            "Gas price must be between {MIN_THRESHOLD} and {MAX_THRESHOLD} Gwei"
        ))),
    }
}

/// Strip markup that could be reflected back into a page or a chat.
///
/// Script-like elements disappear with their content, unknown tags are
/// unwrapped, formatting tags are kept as-is.
pub fn sanitize_markup(input: &str) -> String {
    let without_dangerous = DANGEROUS_ELEMENTS.replace_all(input, "");

    TAG.replace_all(&without_dangerous, |caps: &regex::Captures<'_>| {
        let name = caps[1].to_ascii_lowercase();
        if KEPT_TAGS.contains(&name.as_str()) {
            caps[0].to_string()
        } else {
            String::new()
        }
    })
    .into_owned()
}
