//! Field element orchestrator.
//!
//! An element pairs a content source with the one slot that orders it in the
//! field. `banner` builds the fixed header/separator rows, `buffer` is the
//! live multi-row text used by windows and the input area.

mod banner;
mod buffer;
mod core;

pub use banner::Banner;
pub use buffer::TextBuffer;
pub use core::{FieldElement, ImageSource, StaticImage};
