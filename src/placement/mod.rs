//! Placement policy orchestrator.
//!
//! A `Placement` is the closed set of requests a producer can make; `mode`
//! and `gravity` are derived from it and fully determine ordering.

mod core;

pub use core::{Gravity, Group, Mode, Placement};
