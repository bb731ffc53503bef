//! Shared primitives for the Lumen completion engine.

#![forbid(unsafe_code)]

mod edit;
mod text;

pub use edit::{apply_text_edits, EditError, TextEdit};
pub use text::{is_potential_filter_char, TextRange, TextSize};
