//! Whitelist entry normalization and validation
//!
//! These are pure string functions; invalid input is reported as a value,
//! never a panic.

use crate::config::{MAX_DOMAIN_LEN, MAX_LABEL_LEN};

/// Shown when the options input is blank after normalization.
pub const EMPTY_INPUT_MESSAGE: &str = "Please enter a domain name";
/// Shown when the normalized input is not a hostname.
pub const INVALID_INPUT_MESSAGE: &str = "Please enter a valid domain name";

/// Why a domain was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("domain is empty")]
    Empty,
    #[error("domain is {0} characters long (max 253)")]
    TooLong(usize),
    #[error("empty label at position {0}")]
    EmptyLabel(usize),
    #[error("label '{0}' exceeds 63 characters")]
    LabelTooLong(String),
    #[error("label '{0}' contains characters other than letters, digits and hyphens")]
    InvalidCharacter(String),
    #[error("label '{0}' starts or ends with a hyphen")]
    HyphenAtEdge(String),
}

// =============================================================================
// Normalization
// =============================================================================

/// Normalize user input into a whitelist entry.
///
/// Trims whitespace, lower-cases, strips a leading `http://` or `https://`
/// and a trailing `/`. Stripping repeats until nothing changes, so
/// `normalize(normalize(s)) == normalize(s)` for every input.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut current = lowered.trim();

    loop {
        let stripped = strip_scheme(current);
        let stripped = stripped.strip_suffix('/').unwrap_or(stripped).trim();
        if stripped.len() == current.len() {
            break;
        }
        current = stripped;
    }

    current.to_string()
}

#[inline]
fn strip_scheme(s: &str) -> &str {
    s.strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(s)
}

// =============================================================================
// Validation
// =============================================================================

/// Check hostname syntax: dot-separated labels of 1-63 ASCII letters, digits
/// and internal hyphens, at most 253 characters overall.
pub fn check(domain: &str) -> Result<(), DomainError> {
    if domain.is_empty() {
        return Err(DomainError::Empty);
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(DomainError::TooLong(domain.len()));
    }

    for (position, label) in domain.split('.').enumerate() {
        check_label(label, position)?;
    }

    Ok(())
}

fn check_label(label: &str, position: usize) -> Result<(), DomainError> {
    if label.is_empty() {
        return Err(DomainError::EmptyLabel(position));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(DomainError::LabelTooLong(label.to_string()));
    }
    if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(DomainError::InvalidCharacter(label.to_string()));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(DomainError::HyphenAtEdge(label.to_string()));
    }
    Ok(())
}

/// True iff `domain` is a syntactically valid hostname.
#[inline]
pub fn is_valid(domain: &str) -> bool {
    check(domain).is_ok()
}
