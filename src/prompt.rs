//! Prompt length handling.
//!
//! The remote accepts at most a fixed number of characters per query. Limits
//! are counted in Unicode scalar values so multi-byte text is never cut in
//! the middle of a character.

use std::borrow::Cow;

/// Cut `prompt` down to at most `max_chars` characters
///
/// Returns the input unchanged (borrowed) when it already fits.
pub fn truncate_prompt(prompt: &str, max_chars: usize) -> Cow<'_, str> {
    match prompt.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => Cow::Owned(prompt[..byte_idx].to_string()),
        None => Cow::Borrowed(prompt),
    }
}

/// Number of characters in `prompt`
pub fn char_len(prompt: &str) -> usize {
    prompt.chars().count()
}
