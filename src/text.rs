/// Returns at most the first `max_chars` characters of `s`.
pub fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Keeps the first `max_words` whitespace-separated words, joined by single spaces.
pub fn first_words(s: &str, max_words: usize) -> String {
    s.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn collapse_whitespace(s: &str) -> String {
    first_words(s, usize::MAX)
}
