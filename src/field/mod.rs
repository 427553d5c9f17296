//! Receptive field orchestrator.
//!
//! The field owns every placed slot in top-to-bottom order behind a single
//! lock. Placement, removal, reindexing and composition all run under that
//! lock; viewport overflow is resolved at render time in `viewport`.

mod core;
mod viewport;

pub(crate) use core::FieldShared;
pub use core::{FieldBuilder, ReceptiveField, SlotSnapshot};
