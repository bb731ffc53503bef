//! Text model primitives: sizes, ranges, and character classification.

pub use text_size::{TextRange, TextSize};

/// Returns `true` if `ch` can extend the filter text of a completion session.
///
/// Typing one of these while a session is open narrows the candidate list;
/// anything else is a potential commit or dismissal character.
#[inline]
pub fn is_potential_filter_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
