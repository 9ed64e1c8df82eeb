//! Field normalization
//!
//! Canonical forms for identifiers and free-text fields before they are
//! validated and stored.

use unicode_normalization::UnicodeNormalization;

/// Remove every character that is not an ASCII decimal digit.
///
/// Used to canonicalize the national identifier, which is commonly written
/// with separators (`123.456.789-09`).
pub fn strip_non_digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Compose to NFC, then uppercase.
///
/// Visually identical strings in different composition forms end up with the
/// same stored value. Surrounding whitespace is trimmed.
pub fn normalize_text(s: &str) -> String {
    s.trim().nfc().collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use unicode_normalization::UnicodeNormalization;

    #[test]
    fn test_strip_non_digits() {
        assert_eq!(strip_non_digits("123.456-789"), "123456789");
        assert_eq!(strip_non_digits("529.982.247-25"), "52998224725");
        assert_eq!(strip_non_digits(""), "");
        assert_eq!(strip_non_digits("abc"), "");
    }

    #[test]
    fn test_strip_non_digits_ignores_non_ascii_digits() {
        // Arabic-Indic digits are not accepted as identifier digits
        assert_eq!(strip_non_digits("١٢٣45"), "45");
    }

    #[test]
    fn test_normalize_text_composed() {
        assert_eq!(normalize_text("café"), "CAFÉ");
    }

    #[test]
    fn test_normalize_text_decomposed() {
        let decomposed = "cafe\u{0301}";
        assert_eq!(normalize_text(decomposed), "CAFÉ");
        assert_eq!(normalize_text(decomposed), normalize_text("caf\u{00e9}"));
    }

    #[test]
    fn test_normalize_text_trims() {
        assert_eq!(normalize_text("  loja centro \t"), "LOJA CENTRO");
    }

    proptest! {
        #[test]
        fn prop_strip_non_digits_only_digits(s in ".*") {
            let out = strip_non_digits(&s);
            prop_assert!(out.chars().all(|c| c.is_ascii_digit()));
        }

        #[test]
        fn prop_normalize_text_ignores_composition_form(s in "\\PC*") {
            let decomposed: String = s.nfd().collect();
            prop_assert_eq!(normalize_text(&decomposed), normalize_text(&s));
        }
    }
}
