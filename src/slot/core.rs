use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::json;

use crate::element::ImageSource;
use crate::error::{ImageError, LayoutError, Result};
use crate::field::{FieldShared, ReceptiveField};
use crate::logging::{LogLevel, Logger, json_kv};
use crate::placement::{Gravity, Mode, Placement};

static NEXT_SLOT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Creation sequence number of a slot. Unique per process and increasing,
/// so it doubles as a stable tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl SlotId {
    fn next() -> Self {
        Self(NEXT_SLOT_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    pub fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Mutable part of a slot. Written only while the owning field's lock is
/// held, except when a slot detaches itself from a field that no longer
/// exists.
pub(crate) struct SlotBinding {
    pub(crate) placement: Placement,
    pub(crate) position: Option<usize>,
    pub(crate) field: Option<Weak<FieldShared>>,
    pub(crate) logger: Option<Logger>,
}

pub(crate) struct SlotCore {
    id: SlotId,
    source: Arc<dyn ImageSource>,
    binding: Mutex<SlotBinding>,
}

impl SlotCore {
    fn new(placement: Placement, source: Arc<dyn ImageSource>) -> Self {
        Self {
            id: SlotId::next(),
            source,
            binding: Mutex::new(SlotBinding {
                placement,
                position: None,
                field: None,
                logger: None,
            }),
        }
    }

    pub(crate) fn id(&self) -> SlotId {
        self.id
    }

    pub(crate) fn image(&self) -> std::result::Result<String, ImageError> {
        self.source.image()
    }

    // Lock order is always field state first, then slot binding. Callers on
    // the slot side must drop this guard before touching the field.
    pub(crate) fn binding(&self) -> MutexGuard<'_, SlotBinding> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn home(&self) -> (Option<usize>, Option<Arc<FieldShared>>) {
        let binding = self.binding();
        let field = binding.field.as_ref().and_then(Weak::upgrade);
        (binding.position, field)
    }

    /// Clear a position whose field has gone away.
    fn detach_orphan(&self) {
        let logger = {
            let mut binding = self.binding();
            binding.position = None;
            binding.field = None;
            binding.logger.take()
        };
        if let Some(logger) = logger {
            logger.emit(
                LogLevel::Error,
                "field::layout",
                "orphan_slot",
                [json_kv("slot", json!(self.id.sequence()))],
            );
        }
    }
}

/// Ordering handle owned by a single field element.
pub struct Slot {
    core: Arc<SlotCore>,
}

impl Slot {
    /// Create a slot for `source`. With a field the slot is placed right away;
    /// without one it only records the requested placement.
    pub(crate) fn new(
        placement: Placement,
        source: Arc<dyn ImageSource>,
        field: Option<&ReceptiveField>,
    ) -> Result<Self> {
        let slot = Self {
            core: Arc::new(SlotCore::new(placement, source)),
        };
        if let Some(field) = field {
            field.place_slot(&slot.core, placement)?;
        }
        Ok(slot)
    }

    pub fn id(&self) -> SlotId {
        self.core.id
    }

    pub fn placement(&self) -> Placement {
        self.core.binding().placement
    }

    pub fn mode(&self) -> Mode {
        self.placement().mode()
    }

    pub fn gravity(&self) -> Gravity {
        self.placement().gravity()
    }

    /// Rank in the field, or `None` while the slot is not placed.
    pub fn position(&self) -> Option<usize> {
        self.core.binding().position
    }

    pub fn is_placed(&self) -> bool {
        self.position().is_some()
    }

    /// The field this slot was last attached to, if it still exists.
    pub fn field(&self) -> Option<ReceptiveField> {
        self.core.home().1.map(ReceptiveField::from_shared)
    }

    pub(crate) fn image(&self) -> std::result::Result<String, ImageError> {
        self.core.image()
    }

    /// (Re-)submit this slot to a field. Defaults to the remembered field and
    /// placement. A slot that is already placed moves in one locked step,
    /// whether it stays in its field or crosses into another one.
    pub fn place(
        &self,
        field: Option<&ReceptiveField>,
        placement: Option<Placement>,
    ) -> Result<usize> {
        let placement = placement.unwrap_or_else(|| self.placement());
        let target = match field {
            Some(field) => field.clone(),
            None => self
                .field()
                .ok_or(LayoutError::Unattached { slot: self.id() })?,
        };

        let (position, current) = self.core.home();
        if position.is_some() {
            match current {
                Some(shared) if target.is_shared(&shared) => {}
                Some(shared) => {
                    let source = ReceptiveField::from_shared(shared);
                    return target.transfer_slot(&source, &self.core, placement);
                }
                None => self.core.detach_orphan(),
            }
        }

        target.place_slot(&self.core, placement)
    }

    /// Move this slot to `placement` within its field as one indivisible step.
    pub fn replace(&self, placement: Placement) -> Result<usize> {
        self.place(None, Some(placement))
    }

    /// Take the slot out of its field. Removing an unplaced slot is a no-op.
    pub fn remove(&self) -> Result<()> {
        match self.core.home() {
            (None, _) => Ok(()),
            (Some(_), Some(shared)) => {
                ReceptiveField::from_shared(shared).remove_slot(&self.core);
                Ok(())
            }
            (Some(_), None) => {
                self.core.detach_orphan();
                Err(LayoutError::OrphanSlot { slot: self.id() })
            }
        }
    }

    /// Removal used when the owning element goes away; a vanished field is
    /// expected at teardown and is not reported.
    pub(crate) fn release(&self) {
        match self.core.home() {
            (Some(_), Some(shared)) => {
                ReceptiveField::from_shared(shared).remove_slot(&self.core);
            }
            (Some(_), None) => {
                let mut binding = self.core.binding();
                binding.position = None;
                binding.field = None;
            }
            (None, _) => {}
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = self.core.binding();
        f.debug_struct("Slot")
            .field("id", &self.core.id)
            .field("placement", &binding.placement)
            .field("position", &binding.position)
            .finish()
    }
}
