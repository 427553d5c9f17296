use blake3::Hash;

use crate::slot::SlotId;

/// One composed image of the field.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: String,
    /// Rows occupied by `image`.
    pub rows: usize,
    /// Slots that contributed, in position order.
    pub included: Vec<SlotId>,
    /// Floating slots left out by the viewport.
    pub excluded: Vec<SlotId>,
    pub hash: Hash,
    /// Dirty generation this frame was composed for.
    pub generation: u64,
    /// False when the image is identical to the previously published one.
    pub changed: bool,
}

impl Frame {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.image.lines()
    }
}
