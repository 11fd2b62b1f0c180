//! Text helpers shared by the log and report writers.

/// Truncates `s` to at most `max_chars` characters, appending "..." when cut.
///
/// Counts characters, not bytes, so Cyrillic and emoji are never split.
///
/// ```
/// use botcheck_core::truncate_chars;
///
/// assert_eq!(truncate_chars("hello", 10), "hello");
/// assert_eq!(truncate_chars("Привет, мир", 6), "Привет...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}
