//! Output trimming helpers.

/// Returns the trailing `limit` characters of `text`.
///
/// Counts characters rather than bytes so the cut never lands inside a
/// multi-byte sequence.
pub fn tail_chars(text: &str, limit: usize) -> &str {
    if limit == 0 {
        return "";
    }

    match text.char_indices().rev().nth(limit - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}
