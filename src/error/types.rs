use thiserror::Error;

use crate::config::ConfigError;
use crate::logging::LoggingError;
use crate::producers::GoalsError;
use crate::placement::Placement;
use crate::slot::SlotId;

/// Unified result type for the receptive field crate.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors surfaced by the field layout engine.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("{placement} boundary is already held by {incumbent}")]
    PinnedConflict {
        placement: Placement,
        incumbent: SlotId,
    },
    #[error("{slot} claims a position but has no field")]
    OrphanSlot { slot: SlotId },
    #[error("{slot} failed to produce its image: {source}")]
    ElementRender {
        slot: SlotId,
        #[source]
        source: ImageError,
    },
    #[error("insert index {index} out of range for {len} slots")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{slot} has no field to be placed in")]
    Unattached { slot: SlotId },
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("goals error: {0}")]
    Goals(#[from] GoalsError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure reported by a content source while producing its image.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ImageError(pub String);

impl ImageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
