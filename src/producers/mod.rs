//! Content producers that feed text into field elements.
//!
//! Each producer owns its element and its own small lock; it only touches
//! the field through the element API.

pub mod clock;
pub mod goals;

pub use clock::{ClockProducer, format_time};
pub use goals::{Goal, GoalList, GoalsError, GoalsWindow, load_goals};
