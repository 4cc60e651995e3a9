//! Coverage token grammar.
//!
//! A provider declares coverage as a single comma-separated string of tokens:
//!
//! - exact: `90210` matches only that ZIP
//! - wildcard: `902*` matches any ZIP starting with the prefix
//! - range: `90210-90220` matches any ZIP between the bounds, inclusive
//!
//! A lead ZIP matches a declaration if any one token matches. Range bounds
//! are compared as strings; both sides are five-digit codes in practice, so
//! the lexicographic order coincides with numeric order there.

/// Whether one coverage token matches the lead ZIP.
pub fn token_matches(token: &str, zip: &str) -> bool {
    // Exact match
    if token == zip {
        return true;
    }

    // Wildcard match (e.g., "902*" matches "90210")
    if token.contains('*') {
        let prefix = token.replace('*', "");
        return zip.starts_with(&prefix);
    }

    // Range match (e.g., "90210-90220")
    if token.contains('-') {
        if let Some((start, end)) = token.split_once('-') {
            let (start, end) = (start.trim(), end.trim());
            return zip >= start && zip <= end;
        }
    }

    false
}

/// Split a provider's `zip_codes` field into trimmed, non-empty tokens.
pub fn coverage_tokens(zip_codes: &str) -> impl Iterator<Item = &str> {
    zip_codes.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Whether any token in the declaration covers the lead ZIP.
pub fn covers_zip(zip_codes: &str, zip: &str) -> bool {
    coverage_tokens(zip_codes).any(|token| token_matches(token, zip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_token_matches_only_itself() {
        assert!(token_matches("90210", "90210"));
        assert!(!token_matches("90210", "90211"));
    }

    #[test]
    fn wildcard_token_matches_prefix() {
        assert!(token_matches("902*", "90210"));
        assert!(token_matches("902*", "90299"));
        assert!(!token_matches("902*", "91210"));
    }

    #[test]
    fn range_token_matches_inclusive_bounds() {
        assert!(token_matches("90210-90220", "90215"));
        assert!(token_matches("90210-90220", "90210"));
        assert!(token_matches("90210-90220", "90220"));
        assert!(!token_matches("90210-90220", "90225"));
        assert!(!token_matches("90210-90220", "90209"));
    }

    #[test]
    fn declaration_matches_on_any_token() {
        let declaration = "10001, 902*, 48100-48200";
        assert!(covers_zip(declaration, "10001"));
        assert!(covers_zip(declaration, "90250"));
        assert!(covers_zip(declaration, "48150"));
        assert!(!covers_zip(declaration, "33101"));
    }

    #[test]
    fn blank_tokens_are_ignored() {
        assert!(covers_zip("  , 90210, ", "90210"));
        assert!(!covers_zip("", "90210"));
        assert!(!covers_zip("  ,  ", "90210"));
    }
}
