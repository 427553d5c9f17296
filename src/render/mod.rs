//! Render orchestrator.
//!
//! `trigger` holds the dirty tracking that decides when the composed image
//! must be recomputed and who hears about it; `frame` is the published
//! result; `terminal` writes a frame to an output surface.

mod frame;
mod terminal;
mod trigger;

pub use frame::Frame;
pub use terminal::{PresenterSettings, TerminalPresenter};
pub use trigger::{RenderSignal, RenderTrigger, RenderWatcher};
