//! Receptive field layout engine.
//!
//! A field is a vertical stack of text elements. Each element owns one slot
//! that records where it asked to be placed (pinned, anchored or sliding,
//! toward the top or the bottom); the field keeps the slots ordered, hides
//! floating content that would overflow the viewport, and composes the
//! visible image on demand.

pub mod config;
pub mod element;
pub mod error;
pub mod field;
pub mod logging;
pub mod metrics;
pub mod placement;
pub mod producers;
pub mod render;
pub mod runtime;
pub mod slot;
pub mod width;

pub use config::{ClockConfig, ClockMode, ConfigError, FieldConfig, GoalsConfig, LogConfig};
pub use element::{Banner, FieldElement, ImageSource, StaticImage, TextBuffer};
pub use error::{ImageError, LayoutError, Result};
pub use field::{FieldBuilder, ReceptiveField, SlotSnapshot};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{FieldMetrics, MetricSnapshot};
pub use placement::{Gravity, Group, Mode, Placement};
pub use producers::{ClockProducer, Goal, GoalList, GoalsError, GoalsWindow};
pub use render::{
    Frame, PresenterSettings, RenderSignal, RenderTrigger, RenderWatcher, TerminalPresenter,
};
pub use runtime::FieldRuntime;
pub use slot::{Slot, SlotId};
pub use width::{display_width, row_count};
