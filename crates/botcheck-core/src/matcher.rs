//! Response matching.
//!
//! An expectation is compared against a reply case-insensitively after
//! trimming. Any `<...>` span in the expectation is a wildcard that matches any
//! text, line breaks included; everything else is literal. A templated
//! expectation only has to occur somewhere inside the reply.
//!
//! ```
//! use botcheck_core::matches;
//!
//! assert!(matches("Привет, <name>!", "ПРИВЕТ, Юля!"));
//! assert!(!matches("Привет, <name>!", "Пока!"));
//! assert!(matches("", "anything"));
//! ```

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// A `<...>` placeholder in an already-escaped expectation.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<.*?>").expect("placeholder pattern is valid"));

/// Returns true if `actual` satisfies the `expected` pattern.
///
/// An empty (or whitespace-only) expectation always matches.
pub fn matches(expected: &str, actual: &str) -> bool {
    let expected = expected.trim().to_lowercase();
    if expected.is_empty() {
        return true;
    }

    let actual = actual.trim().to_lowercase();
    if expected == actual {
        return true;
    }

    let escaped = regex::escape(&expected);
    let pattern = PLACEHOLDER.replace_all(&escaped, ".*");

    // An unbuildable pattern never matches; the caller reports a mismatch.
    RegexBuilder::new(&pattern)
        .dot_matches_new_line(true)
        .build()
        .is_ok_and(|re| re.is_match(&actual))
}

/// Convenience for optional expectations: `None` always matches.
pub fn matches_optional(expected: Option<&str>, actual: &str) -> bool {
    expected.is_none_or(|expected| matches(expected, actual))
}

/// Returns true if `text` contains a `<...>` placeholder.
pub fn has_placeholder(text: &str) -> bool {
    text.contains('<') && text.contains('>')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_expectation_always_matches() {
        assert!(matches("", "whatever"));
        assert!(matches("   ", ""));
        assert!(matches_optional(None, "whatever"));
    }

    #[test]
    fn literal_comparison_ignores_case_and_surrounding_whitespace() {
        assert!(matches("Welcome", "  welcome\n"));
        assert!(matches("ГОТОВО", "готово"));
        assert!(!matches("Welcome", "Goodbye"));
    }

    #[test]
    fn literal_without_placeholder_is_substring_search() {
        // With no placeholder the escaped pattern is still searched inside the reply
        assert!(matches("Ready", "Your route is ready!"));
        assert!(!matches("Ready", "Still waiting"));
    }

    #[test]
    fn placeholder_matches_any_text() {
        assert!(matches("Привет, <name>!", "ПРИВЕТ, Юля!"));
        assert!(matches("Hello, <name>!", "Hello, !"));
        assert!(!matches("Привет, <name>!", "Пока!"));
    }

    #[test]
    fn placeholder_spans_line_breaks() {
        assert!(matches(
            "Your schedule:<list>Good luck",
            "Your schedule:\n10:00 Keynote\n11:00 Rust\nGood luck"
        ));
    }

    #[test]
    fn multiple_placeholders() {
        assert!(matches(
            "Talk <title> starts at <time>",
            "Talk «Async Rust» starts at 12:30"
        ));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(matches("Price: $5 (approx.)", "price: $5 (approx.)"));
        assert!(!matches("a.c", "abc"));
        assert!(matches("1+1=<n>", "1+1=2"));
    }

    #[test]
    fn unbalanced_brackets_compare_literally() {
        assert!(matches("use <b", "please use <b tag"));
        assert!(!matches("use <b", "use b"));
        assert!(matches("a > b", "so a > b holds"));
    }

    #[test]
    fn optional_expectation_delegates() {
        assert!(matches_optional(Some("Hi <x>"), "hi there"));
        assert!(!matches_optional(Some("Bye"), "hi there"));
    }

    #[test]
    fn has_placeholder_requires_both_brackets() {
        assert!(has_placeholder("Меня зовут <имя>"));
        assert!(!has_placeholder("a < b"));
        assert!(!has_placeholder("plain"));
    }
}
