//! Glob matching of bucket names against service patterns.
//!
//! The only metacharacter is `*`, matching zero or more characters. Matching
//! is case-sensitive and anchored at both ends. Validation happens when a
//! pattern is written to the registry; [`matches`] itself accepts any input
//! and always terminates.

use super::error::{BrokerError, BrokerResult};

const MAX_PATTERN_LEN: usize = 255;

/// Reports whether `name` is covered by `pattern`.
pub fn matches(pattern: &str, name: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let head = parts[0];
    let tail = parts[parts.len() - 1];
    if name.len() < head.len() + tail.len() {
        return false;
    }
    if !name.starts_with(head) || !name.ends_with(tail) {
        return false;
    }

    // Both bounds sit on char boundaries: they come from a matched prefix and
    // a matched suffix that do not overlap.
    let mut rest = &name[head.len()..name.len() - tail.len()];
    for part in &parts[1..parts.len() - 1] {
        // Consecutive wildcards produce empty parts.
        if part.is_empty() {
            continue;
        }
        // Leftmost match is always safe for `*`-only globs: taking the
        // earliest occurrence leaves the most room for the remaining parts.
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    true
}

/// Patterns out of `patterns` that cover `name`, in declaration order.
pub fn matching_patterns<'a>(patterns: &'a [String], name: &str) -> Vec<&'a str> {
    patterns
        .iter()
        .map(String::as_str)
        .filter(|pattern| matches(pattern, name))
        .collect()
}

/// Whether any of `patterns` covers `name`.
pub fn matches_any(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|pattern| matches(pattern, name))
}

/// Rejects patterns that could never name a bucket. Allowed characters are
/// those valid in bucket names (`A-Z a-z 0-9 . - _`) plus `*`.
pub fn validate_pattern(pattern: &str) -> BrokerResult<()> {
    if pattern.is_empty() {
        return Err(BrokerError::config("bucket pattern cannot be empty"));
    }
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(BrokerError::config(format!(
            "bucket pattern '{pattern}' is longer than {MAX_PATTERN_LEN} characters"
        )));
    }

    let invalid = pattern
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(*c, '.' | '-' | '_' | '*')));
    if let Some(c) = invalid {
        return Err(BrokerError::config(format!(
            "bucket pattern '{pattern}' contains invalid character {c:?}"
        )));
    }

    Ok(())
}

/// Validates a whole pattern list and drops duplicates, keeping the first
/// occurrence.
pub fn normalize_patterns(patterns: &[String]) -> BrokerResult<Vec<String>> {
    if patterns.is_empty() {
        return Err(BrokerError::config("bucket patterns cannot be empty"));
    }

    let mut result: Vec<String> = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let pattern = pattern.trim();
        validate_pattern(pattern)?;
        if !result.iter().any(|p| p == pattern) {
            result.push(pattern.to_string());
        }
    }
    Ok(result)
}
