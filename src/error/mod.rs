//! Error orchestrator: the crate-wide error enum lives in `types`.

mod types;

pub use types::{ImageError, LayoutError, Result};
