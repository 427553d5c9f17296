use std::fmt;
use std::sync::Arc;

use crate::error::{ImageError, Result};
use crate::field::ReceptiveField;
use crate::placement::Placement;
use crate::slot::Slot;

/// Anything that can produce the current text of an element. Called on every
/// render; implementations must not hand back stale text.
pub trait ImageSource: Send + Sync {
    fn image(&self) -> std::result::Result<String, ImageError>;
}

impl<F> ImageSource for F
where
    F: Fn() -> std::result::Result<String, ImageError> + Send + Sync,
{
    fn image(&self) -> std::result::Result<String, ImageError> {
        self()
    }
}

/// Fixed text, e.g. a banner or separator row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticImage(String);

impl StaticImage {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl ImageSource for StaticImage {
    fn image(&self) -> std::result::Result<String, ImageError> {
        Ok(self.0.clone())
    }
}

/// A content block on the field. Owns exactly one slot for its whole life;
/// dropping the element takes the slot out of the field.
pub struct FieldElement {
    slot: Slot,
}

impl FieldElement {
    pub fn new<S>(placement: Placement, source: S, field: Option<&ReceptiveField>) -> Result<Self>
    where
        S: ImageSource + 'static,
    {
        Self::from_arc(placement, Arc::new(source), field)
    }

    /// Build an element over a source the caller keeps a handle to, such as a
    /// `TextBuffer` a producer keeps writing into.
    pub fn from_arc(
        placement: Placement,
        source: Arc<dyn ImageSource>,
        field: Option<&ReceptiveField>,
    ) -> Result<Self> {
        Ok(Self {
            slot: Slot::new(placement, source, field)?,
        })
    }

    pub fn text(
        placement: Placement,
        text: impl Into<String>,
        field: Option<&ReceptiveField>,
    ) -> Result<Self> {
        Self::new(placement, StaticImage::new(text), field)
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn image(&self) -> std::result::Result<String, ImageError> {
        self.slot.image()
    }

    /// Tell the field this element's content changed. No-op while unplaced.
    pub fn refresh(&self) {
        if !self.slot.is_placed() {
            return;
        }
        if let Some(field) = self.slot.field() {
            field.invalidate();
        }
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldElement")
            .field("slot", &self.slot)
            .finish()
    }
}

impl Drop for FieldElement {
    fn drop(&mut self) {
        self.slot.release();
    }
}
