const TRUNCATED_MARKER: &str = "\n.[truncated]";
pub const MAX_PREVIEW_CHARS: usize = 1_000;

/// Longest prefix of `text` holding at most `max_chars` characters.
///
/// Counts Unicode scalar values, so the cut never lands inside a multibyte
/// character.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Body preview for human-readable artifacts; appends a marker when cut.
pub fn prepare_preview_content(body: &str) -> String {
    let clipped = clip_chars(body, MAX_PREVIEW_CHARS);
    if clipped.len() == body.len() {
        body.to_string()
    } else {
        format!("{clipped}{TRUNCATED_MARKER}")
    }
}
