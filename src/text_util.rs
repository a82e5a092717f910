/// Collapse each line's whitespace runs to a single space, trim the line,
/// drop lines that end up empty and rejoin with `\n`.
///
/// # Examples
///
/// ```
/// use codevec::text_util::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("  a\t\tb  \n\n   \nc "), "a b\nc");
/// ```
pub fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep at most `max_chars` characters, cutting on a char boundary.
///
/// Returns the input unchanged when it already fits.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// True when the text has no non-whitespace characters.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
