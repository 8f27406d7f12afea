//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{EngineError, ResultEngine};

/// Trim `value` and require at least `min_chars` characters.
pub(crate) fn normalize_required_text(
    value: &str,
    label: &str,
    min_chars: usize,
) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() < min_chars {
        return Err(EngineError::Validation(format!(
            "{label} must be at least {min_chars} characters long"
        )));
    }
    Ok(trimmed.to_string())
}

/// Like [`normalize_required_text`], but blank input means "absent".
pub(crate) fn normalize_optional_text(
    value: Option<&str>,
    label: &str,
    min_chars: usize,
) -> ResultEngine<Option<String>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => normalize_required_text(text, label, min_chars).map(Some),
        None => Ok(None),
    }
}

/// Comparison key for names: accents and case are ignored, punctuation and
/// whitespace runs collapse to a single space.
pub(crate) fn normalize_name_key(value: &str) -> String {
    let trimmed = value.trim();
    let mut out = String::new();
    let mut prev_space = false;
    for ch in trimmed.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    let normalized = out.trim();
    if normalized.is_empty() {
        trimmed.to_lowercase()
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_counts_trimmed_chars() {
        assert_eq!(
            normalize_required_text("  Fuel ", "description", 3).unwrap(),
            "Fuel"
        );
        assert!(normalize_required_text("  ab  ", "description", 3).is_err());
        assert!(normalize_required_text("     ", "description", 3).is_err());
    }

    #[test]
    fn optional_text_treats_blank_as_absent() {
        assert_eq!(normalize_optional_text(Some("  "), "d", 3).unwrap(), None);
        assert_eq!(normalize_optional_text(None, "d", 3).unwrap(), None);
        assert!(normalize_optional_text(Some("ab"), "d", 3).is_err());
    }

    #[test]
    fn name_key_folds_accents_and_punctuation() {
        assert_eq!(normalize_name_key("Alimentação"), "alimentacao");
        assert_eq!(normalize_name_key("  Linha   101 - Ida "), "linha 101 ida");
        assert_eq!(normalize_name_key("..."), "...");
    }
}
