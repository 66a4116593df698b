//! Conversation title cleanup.
//!
//! Titles come back from the service's auto-naming (and from users typing
//! into a rename prompt) with stray whitespace and quotes. `normalize_title`
//! strips those; an empty result means "no usable title".

/// Trim whitespace and surrounding quotes from a title.
///
/// Returns `None` when nothing is left.
pub fn normalize_title(raw: &str) -> Option<String> {
    let title = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();

    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}
