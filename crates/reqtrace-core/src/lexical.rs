//! Lexical helpers for programmatic scoring

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9]+(?:-[a-z0-9]+)*").expect("token pattern is valid"));

/// Lowercased alphanumeric tokens (hyphenated compounds kept whole)
pub(crate) fn tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Distinct tokens of at least `min_len` characters
pub(crate) fn vocabulary(text: &str, min_len: usize) -> HashSet<String> {
    tokens(text)
        .into_iter()
        .filter(|t| t.chars().count() >= min_len)
        .collect()
}

/// Whitespace-separated word count
pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Overlap between a reference vocabulary and a candidate text
///
/// Full credit is reached once the candidate shares `divisor` of the
/// reference vocabulary. Returns `None` when the reference is empty so the
/// caller can pick a neutral score.
pub(crate) fn capped_overlap(reference: &str, candidate: &str, divisor: f64, min_len: usize) -> Option<f64> {
    let reference = vocabulary(reference, min_len);
    if reference.is_empty() {
        return None;
    }
    let candidate = vocabulary(candidate, min_len);
    let shared = reference.intersection(&candidate).count();
    #[allow(clippy::cast_precision_loss)]
    let needed = (reference.len() as f64 * divisor).max(1.0);
    #[allow(clippy::cast_precision_loss)]
    let ratio = shared as f64 / needed;
    Some(ratio.min(1.0))
}

/// Number of distinct keywords that occur as whole tokens in `text`
///
/// Multi-word keywords match a consecutive run of tokens.
pub(crate) fn keyword_hits(text: &str, keywords: &[String]) -> usize {
    let words = tokens(text);
    keywords
        .iter()
        .map(|k| tokens(k))
        .filter(|needle| {
            !needle.is_empty() && words.windows(needle.len()).any(|window| window == needle.as_slice())
        })
        .count()
}

/// First `max_chars` characters of `text`, never splitting a character
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
