//! Canonical text normalization shared by every component.
//!
//! All matching in the engine — pantry coverage, use-now ranking, search
//! fallback — goes through the same normal form so tokens built from recipe
//! text and tokens built from pantry item names always compare equal.

use std::collections::HashSet;

/// Lowercase the input, replace every maximal run of characters outside
/// `[a-z0-9]` with a single space, and trim. Pure and total; empty input
/// normalizes to the empty string.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Normalized tokens in first-seen order, deduplicated.
pub fn token_set(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for token in normalized.split_whitespace() {
        if seen.insert(token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Union of the token sets of several strings, order-preserving.
pub fn token_set_of_all<I, S>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for text in texts {
        for token in token_set(text.as_ref()) {
            if seen.insert(token.clone()) {
                tokens.push(token);
            }
        }
    }
    tokens
}
