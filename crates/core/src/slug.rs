//! URL slug generation for products and categories.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)] // constant pattern
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s_-]").expect("valid slug pattern"));

#[allow(clippy::expect_used)] // constant pattern
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_-]+").expect("valid separator pattern"));

/// Turn a display name into a URL slug.
///
/// Lowercases, drops everything except ASCII letters, digits, whitespace,
/// underscores and hyphens, collapses separator runs into a single `-`, and
/// trims leading/trailing hyphens. Applying it twice gives the same result.
///
/// ```
/// use ayurmart_core::generate_slug;
///
/// assert_eq!(generate_slug("iPhone 15 Pro"), "iphone-15-pro");
/// assert_eq!(generate_slug("Test Product!@#"), "test-product");
/// assert_eq!(generate_slug("Ashwagandha  Churna -- 100g"), "ashwagandha-churna-100g");
/// ```
#[must_use]
pub fn generate_slug(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned = DISALLOWED.replace_all(lowered.trim(), "");
    SEPARATORS
        .replace_all(&cleaned, "-")
        .trim_matches('-')
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_examples() {
        assert_eq!(generate_slug("iPhone 15 Pro"), "iphone-15-pro");
        assert_eq!(generate_slug("Test Product!@#"), "test-product");
    }

    #[test]
    fn test_trims_separators() {
        assert_eq!(generate_slug("  --Triphala Tablets--  "), "triphala-tablets");
        assert_eq!(generate_slug("brahmi_ghrita"), "brahmi-ghrita");
    }

    #[test]
    fn test_drops_non_ascii() {
        assert_eq!(generate_slug("Chyawanprash (500 g) – Classic"), "chyawanprash-500-g-classic");
    }

    #[test]
    fn test_only_symbols_is_empty() {
        assert_eq!(generate_slug("!@#$%"), "");
    }

    proptest! {
        #[test]
        fn prop_slug_is_idempotent(name in ".{0,64}") {
            let once = generate_slug(&name);
            prop_assert_eq!(generate_slug(&once), once.clone());
        }

        #[test]
        fn prop_slug_charset(name in ".{0,64}") {
            let slug = generate_slug(&name);
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }
    }
}
