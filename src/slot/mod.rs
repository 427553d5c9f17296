//! Slot orchestrator.
//!
//! A slot is the ordering record for exactly one field element. It remembers
//! the element's requested placement and, while placed, its 0-based rank in
//! the owning field.

mod core;

pub(crate) use core::SlotCore;
pub use core::{Slot, SlotId};
