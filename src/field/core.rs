use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use serde_json::json;

use crate::error::{LayoutError, Result};
use crate::logging::{LogLevel, Logger, json_kv, json_str};
use crate::metrics::{FieldMetrics, MetricSnapshot};
use crate::placement::{Group, Placement};
use crate::render::{Frame, RenderTrigger, RenderWatcher};
use crate::slot::{SlotCore, SlotId};
use crate::width::row_count;

use super::viewport;

const LAYOUT_TARGET: &str = "field::layout";
const RENDER_TARGET: &str = "field::render";

/// Point-in-time view of one placed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub id: SlotId,
    pub placement: Placement,
    pub position: usize,
}

struct Entry {
    slot: Arc<SlotCore>,
    placement: Placement,
}

pub(crate) struct FieldState {
    entries: Vec<Entry>,
    viewport_rows: Option<usize>,
    trigger: RenderTrigger,
    published: Option<Frame>,
    metrics: FieldMetrics,
    home: Weak<FieldShared>,
    logger: Option<Logger>,
}

impl FieldState {
    fn log<I>(&self, level: LogLevel, target: &str, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            logger.emit(level, target, message, fields);
        }
    }

    fn index_of(&self, id: SlotId) -> Option<usize> {
        self.entries.iter().position(|e| e.slot.id() == id)
    }

    fn pinned_holder(&self, placement: Placement, except: SlotId) -> Option<SlotId> {
        self.entries
            .iter()
            .find(|e| e.placement == placement && e.slot.id() != except)
            .map(|e| e.slot.id())
    }

    fn ensure_vacant(&mut self, placement: Placement, id: SlotId) -> Result<()> {
        if !placement.is_pinned() {
            return Ok(());
        }
        match self.pinned_holder(placement, id) {
            None => Ok(()),
            Some(incumbent) => {
                self.metrics.record_conflict();
                self.log(
                    LogLevel::Warn,
                    LAYOUT_TARGET,
                    "pinned_conflict",
                    [
                        json_str("placement", placement.to_string()),
                        json_kv("slot", json!(id.sequence())),
                        json_kv("incumbent", json!(incumbent.sequence())),
                    ],
                );
                Err(LayoutError::PinnedConflict {
                    placement,
                    incumbent,
                })
            }
        }
    }

    /// Absolute index a new slot with `placement` belongs at.
    fn target_index(&self, placement: Placement) -> usize {
        let len = self.entries.len();
        // Anchored slots join the inner edge of their run, floating slots
        // the outer edge of the floating region on their side.
        let below_anchored_top = self
            .entries
            .iter()
            .take_while(|e| e.placement.group() <= Group::AnchoredTop)
            .count();
        let above_anchored_bottom = self
            .entries
            .iter()
            .rev()
            .take_while(|e| e.placement.group() >= Group::AnchoredBottom)
            .count();

        match placement {
            Placement::PinnedTop => 0,
            Placement::AnchoredTop | Placement::SlideTop => below_anchored_top,
            Placement::SlideBottom | Placement::AnchoredBottom => len - above_anchored_bottom,
            Placement::PinnedBottom => len,
        }
    }

    /// The only path that grows the sequence. Out-of-range indices are
    /// rejected before anything changes.
    pub(crate) fn insert_at(
        &mut self,
        slot: &Arc<SlotCore>,
        placement: Placement,
        index: usize,
    ) -> Result<usize> {
        let len = self.entries.len();
        if index > len {
            return Err(LayoutError::IndexOutOfRange { index, len });
        }
        debug_assert!(self.index_of(slot.id()).is_none());

        self.entries.insert(
            index,
            Entry {
                slot: Arc::clone(slot),
                placement,
            },
        );
        {
            let mut binding = slot.binding();
            binding.placement = placement;
            binding.field = Some(self.home.clone());
            binding.logger = self.logger.clone();
        }
        self.reindex(index);
        self.trigger.mark_dirty();
        Ok(index)
    }

    fn remove_at(&mut self, index: usize) -> Entry {
        let entry = self.entries.remove(index);
        entry.slot.binding().position = None;
        self.reindex(index);
        self.trigger.mark_dirty();
        entry
    }

    fn reindex(&mut self, from: usize) {
        for (idx, entry) in self.entries.iter().enumerate().skip(from) {
            entry.slot.binding().position = Some(idx);
        }
    }

    fn place(&mut self, slot: &Arc<SlotCore>, placement: Placement) -> Result<usize> {
        let id = slot.id();
        self.ensure_vacant(placement, id)?;

        let previous = self.index_of(id);
        if let Some(index) = previous {
            self.remove_at(index);
        }
        let index = self.target_index(placement);
        let position = self.insert_at(slot, placement, index)?;

        let message = if previous.is_some() {
            self.metrics.record_replacement();
            "slot_replaced"
        } else {
            self.metrics.record_placement();
            "slot_placed"
        };
        self.log(
            LogLevel::Debug,
            LAYOUT_TARGET,
            message,
            [
                json_kv("slot", json!(id.sequence())),
                json_str("placement", placement.to_string()),
                json_kv("position", json!(position)),
            ],
        );
        Ok(position)
    }

    fn remove(&mut self, slot: &SlotCore) {
        match self.index_of(slot.id()) {
            Some(index) => {
                self.remove_at(index);
                self.metrics.record_removal();
                self.log(
                    LogLevel::Debug,
                    LAYOUT_TARGET,
                    "slot_removed",
                    [
                        json_kv("slot", json!(slot.id().sequence())),
                        json_kv("position", json!(index)),
                    ],
                );
            }
            None => slot.binding().position = None,
        }
    }

    fn render(&mut self) -> Result<Frame> {
        if !self.trigger.is_dirty() {
            if let Some(published) = self.published.as_ref() {
                let mut frame = published.clone();
                frame.changed = false;
                self.metrics.record_cache_hit();
                return Ok(frame);
            }
        }
        self.compose()
    }

    fn compose(&mut self) -> Result<Frame> {
        let mut images = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry.slot.image() {
                Ok(image) => images.push(image),
                Err(source) => {
                    let slot = entry.slot.id();
                    self.metrics.record_render_failure();
                    self.log(
                        LogLevel::Warn,
                        RENDER_TARGET,
                        "element_render_failed",
                        [
                            json_kv("slot", json!(slot.sequence())),
                            json_str("error", source.to_string()),
                        ],
                    );
                    return Err(LayoutError::ElementRender { slot, source });
                }
            }
        }

        let rows: Vec<usize> = images.iter().map(|image| row_count(image)).collect();
        let floating: Vec<bool> = self
            .entries
            .iter()
            .map(|e| e.placement.is_floating())
            .collect();
        let keep = viewport::fit(&rows, &floating, self.viewport_rows);

        let mut image = String::new();
        let mut total_rows = 0;
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if keep[idx] {
                image.push_str(&images[idx]);
                total_rows += rows[idx];
                included.push(entry.slot.id());
            } else {
                excluded.push(entry.slot.id());
            }
        }

        let hash = blake3::hash(image.as_bytes());
        let changed = self
            .published
            .as_ref()
            .map(|published| published.hash != hash)
            .unwrap_or(true);

        if !excluded.is_empty() {
            self.log(
                LogLevel::Debug,
                RENDER_TARGET,
                "floating_overflow",
                [
                    json_kv("excluded", json!(excluded.len())),
                    json_kv("viewport_rows", json!(self.viewport_rows)),
                ],
            );
        }

        let frame = Frame {
            image,
            rows: total_rows,
            included,
            excluded,
            hash,
            generation: self.trigger.generation(),
            changed,
        };
        self.metrics.record_render(frame.excluded.len());
        self.published = Some(frame.clone());
        self.trigger.clear();
        Ok(frame)
    }
}

pub(crate) struct FieldShared {
    state: Mutex<FieldState>,
    watchers: RwLock<Vec<Arc<dyn RenderWatcher>>>,
}

/// Options for constructing a [`ReceptiveField`].
#[derive(Default)]
pub struct FieldBuilder {
    viewport_rows: Option<usize>,
    logger: Option<Logger>,
}

impl FieldBuilder {
    pub fn viewport_rows(mut self, rows: usize) -> Self {
        self.viewport_rows = Some(rows);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> ReceptiveField {
        let shared = Arc::new_cyclic(|home| FieldShared {
            state: Mutex::new(FieldState {
                entries: Vec::new(),
                viewport_rows: self.viewport_rows,
                trigger: RenderTrigger::new(),
                published: None,
                metrics: FieldMetrics::new(),
                home: home.clone(),
                logger: self.logger,
            }),
            watchers: RwLock::new(Vec::new()),
        });
        ReceptiveField { shared }
    }
}

/// Container of every placed slot, top to bottom. Clones share the same
/// field.
#[derive(Clone)]
pub struct ReceptiveField {
    shared: Arc<FieldShared>,
}

impl Default for ReceptiveField {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceptiveField {
    pub fn new() -> Self {
        FieldBuilder::default().build()
    }

    pub fn builder() -> FieldBuilder {
        FieldBuilder::default()
    }

    pub(crate) fn from_shared(shared: Arc<FieldShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn is_shared(&self, other: &Arc<FieldShared>) -> bool {
        Arc::ptr_eq(&self.shared, other)
    }

    fn lock(&self) -> MutexGuard<'_, FieldState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the field lock and notify watchers afterwards if the
    /// field went from clean to dirty.
    fn mutate<T>(&self, f: impl FnOnce(&mut FieldState) -> T) -> T {
        let (out, dirtied) = {
            let mut state = self.lock();
            let before = state.trigger.generation();
            let out = f(&mut *state);
            let after = state.trigger.generation();
            (out, (after != before).then_some(after))
        };
        if let Some(generation) = dirtied {
            self.notify(generation);
        }
        out
    }

    fn notify(&self, generation: u64) {
        let watchers = self
            .shared
            .watchers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for watcher in watchers {
            watcher.field_dirtied(generation);
        }
    }

    pub(crate) fn place_slot(&self, slot: &Arc<SlotCore>, placement: Placement) -> Result<usize> {
        self.mutate(|state| state.place(slot, placement))
    }

    /// Move `slot` from `source` into this field. Both fields are locked for
    /// the whole step, always in address order, so a failed move leaves the
    /// slot where it was.
    pub(crate) fn transfer_slot(
        &self,
        source: &ReceptiveField,
        slot: &Arc<SlotCore>,
        placement: Placement,
    ) -> Result<usize> {
        if Arc::ptr_eq(&source.shared, &self.shared) {
            return self.place_slot(slot, placement);
        }
        let (result, dirtied_source, dirtied_target) = {
            let source_first = Arc::as_ptr(&source.shared) < Arc::as_ptr(&self.shared);
            let (mut from, mut to) = if source_first {
                let from = source.lock();
                (from, self.lock())
            } else {
                let to = self.lock();
                (source.lock(), to)
            };
            let before = (from.trigger.generation(), to.trigger.generation());
            let result = match to.ensure_vacant(placement, slot.id()) {
                Ok(()) => {
                    from.remove(slot);
                    to.place(slot, placement)
                }
                Err(err) => Err(err),
            };
            let source_gen = from.trigger.generation();
            let target_gen = to.trigger.generation();
            (
                result,
                (source_gen != before.0).then_some(source_gen),
                (target_gen != before.1).then_some(target_gen),
            )
        };
        if let Some(generation) = dirtied_source {
            source.notify(generation);
        }
        if let Some(generation) = dirtied_target {
            self.notify(generation);
        }
        result
    }

    pub(crate) fn remove_slot(&self, slot: &SlotCore) {
        self.mutate(|state| state.remove(slot))
    }

    /// Register a watcher told about every clean-to-dirty transition.
    pub fn watch(&self, watcher: Arc<dyn RenderWatcher>) {
        self.shared
            .watchers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(watcher);
    }

    /// Mark the composed image stale, e.g. after an element's content changed.
    pub fn invalidate(&self) {
        self.mutate(|state| {
            state.trigger.mark_dirty();
        })
    }

    /// Overflow threshold for the next render.
    pub fn set_viewport_height(&self, rows: usize) {
        self.mutate(|state| {
            if state.viewport_rows != Some(rows) {
                state.viewport_rows = Some(rows);
                state.trigger.mark_dirty();
            }
        })
    }

    pub fn clear_viewport_height(&self) {
        self.mutate(|state| {
            if state.viewport_rows.take().is_some() {
                state.trigger.mark_dirty();
            }
        })
    }

    pub fn viewport_height(&self) -> Option<usize> {
        self.lock().viewport_rows
    }

    /// Composed image of the whole field. Served from the last published
    /// image while nothing changed.
    pub fn render(&self) -> Result<String> {
        self.render_frame().map(|frame| frame.image)
    }

    pub fn render_frame(&self) -> Result<Frame> {
        self.lock().render()
    }

    /// Compose only when something changed since the last publish.
    pub fn render_if_dirty(&self) -> Result<Option<Frame>> {
        let mut state = self.lock();
        if !state.trigger.is_dirty() && state.published.is_some() {
            return Ok(None);
        }
        state.compose().map(Some)
    }

    /// Last successfully published image, if any.
    pub fn published(&self) -> Option<Frame> {
        self.lock().published.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().trigger.is_dirty()
    }

    pub fn generation(&self) -> u64 {
        self.lock().trigger.generation()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Placed slots in position order.
    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.lock()
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| SlotSnapshot {
                id: entry.slot.id(),
                placement: entry.placement,
                position,
            })
            .collect()
    }

    pub fn metrics(&self) -> MetricSnapshot {
        self.lock().metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{FieldElement, StaticImage};
    use crate::error::ImageError;
    use crate::logging::MemorySink;
    use crate::render::RenderSignal;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    fn text(field: &ReceptiveField, placement: Placement, body: &str) -> FieldElement {
        FieldElement::text(placement, body, Some(field)).unwrap()
    }

    fn assert_contiguous(field: &ReceptiveField, elements: &[&FieldElement]) {
        let snapshot = field.snapshot();
        for element in elements {
            if let Some(position) = element.slot().position() {
                assert_eq!(snapshot[position].id, element.slot().id());
            }
        }
        let placed = elements.iter().filter(|e| e.slot().is_placed()).count();
        assert_eq!(placed, snapshot.len());
    }

    fn assert_group_order(field: &ReceptiveField) {
        let groups: Vec<Group> = field
            .snapshot()
            .iter()
            .map(|s| s.placement.group())
            .collect();
        assert!(groups.windows(2).all(|w| w[0] <= w[1]), "{groups:?}");
    }

    #[test]
    fn scenario_header_floating_prompt() {
        let field = ReceptiveField::new();
        let header = text(&field, Placement::PinnedTop, "HEADER");
        let prompt = text(&field, Placement::PinnedBottom, "PROMPT");
        let a = text(&field, Placement::SlideBottom, "a");
        let b = text(&field, Placement::SlideBottom, "b");
        let c = text(&field, Placement::SlideBottom, "c");

        assert_eq!(field.render().unwrap(), "HEADERabcPROMPT");
        let positions: Vec<_> = [&header, &a, &b, &c, &prompt]
            .iter()
            .map(|e| e.slot().position())
            .collect();
        assert_eq!(positions, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
    }

    fn five_rows(field: &ReceptiveField) -> Vec<FieldElement> {
        vec![
            text(field, Placement::PinnedTop, "HEADER\n"),
            text(field, Placement::PinnedBottom, "PROMPT\n"),
            text(field, Placement::SlideBottom, "a\n"),
            text(field, Placement::SlideBottom, "b\n"),
            text(field, Placement::SlideBottom, "c\n"),
        ]
    }

    #[test]
    fn viewport_drops_oldest_floating_rows() {
        let field = ReceptiveField::builder().viewport_rows(4).build();
        let elements = five_rows(&field);

        let frame = field.render_frame().unwrap();
        assert_eq!(frame.image, "HEADER\nb\nc\nPROMPT\n");
        assert_eq!(frame.rows, 4);
        assert_eq!(frame.excluded, vec![elements[2].slot().id()]);
        // Excluded slots stay in the field.
        assert_eq!(field.len(), 5);
        assert_eq!(elements[2].slot().position(), Some(1));

        let again = field.render().unwrap();
        assert_eq!(again, frame.image);
    }

    #[test]
    fn tiny_viewport_keeps_fixed_content_only() {
        let field = ReceptiveField::builder().viewport_rows(2).build();
        let _elements = five_rows(&field);
        assert_eq!(field.render().unwrap(), "HEADER\nPROMPT\n");
        assert_eq!(field.render().unwrap(), "HEADER\nPROMPT\n");

        field.set_viewport_height(1);
        assert_eq!(field.render().unwrap(), "HEADER\nPROMPT\n");
    }

    #[test]
    fn viewport_change_applies_on_next_render() {
        let field = ReceptiveField::new();
        let _elements = five_rows(&field);
        assert_eq!(field.render().unwrap(), "HEADER\na\nb\nc\nPROMPT\n");
        field.set_viewport_height(3);
        assert!(field.is_dirty());
        assert_eq!(field.viewport_height(), Some(3));
        assert_eq!(field.render().unwrap(), "HEADER\nc\nPROMPT\n");
        field.clear_viewport_height();
        assert_eq!(field.render().unwrap(), "HEADER\na\nb\nc\nPROMPT\n");
    }

    #[test]
    fn anchored_top_follows_insertion_order() {
        let field = ReceptiveField::new();
        let x = text(&field, Placement::AnchoredTop, "X");
        let y = text(&field, Placement::AnchoredTop, "Y");
        assert_eq!(field.render().unwrap(), "XY");

        x.slot().remove().unwrap();
        x.slot().place(None, Some(Placement::AnchoredTop)).unwrap();
        assert_eq!(field.render().unwrap(), "YX");
        assert_eq!(y.slot().position(), Some(0));
        assert_eq!(x.slot().position(), Some(1));
    }

    #[test]
    fn groups_stay_ordered_under_mixed_insertions() {
        let field = ReceptiveField::new();
        let elements = vec![
            text(&field, Placement::SlideTop, "f1"),
            text(&field, Placement::AnchoredBottom, "ab1"),
            text(&field, Placement::PinnedBottom, "pb"),
            text(&field, Placement::AnchoredTop, "at1"),
            text(&field, Placement::SlideBottom, "f2"),
            text(&field, Placement::PinnedTop, "pt"),
            text(&field, Placement::SlideTop, "f0"),
            text(&field, Placement::AnchoredBottom, "ab2"),
            text(&field, Placement::AnchoredTop, "at2"),
        ];
        assert_eq!(field.render().unwrap(), "ptat1at2f0f1f2ab2ab1pb");
        assert_group_order(&field);
        let refs: Vec<&FieldElement> = elements.iter().collect();
        assert_contiguous(&field, &refs);
    }

    #[test]
    fn newest_anchored_bottom_sits_above_earlier_ones() {
        let field = ReceptiveField::new();
        let prompt = text(&field, Placement::PinnedBottom, "P");
        let separator = text(&field, Placement::AnchoredBottom, "SEP");
        let goals = text(&field, Placement::AnchoredBottom, "GOALS");
        assert_eq!(field.render().unwrap(), "GOALSSEPP");
        assert_eq!(goals.slot().position(), Some(0));
        assert_eq!(separator.slot().position(), Some(1));
        assert_eq!(prompt.slot().position(), Some(2));

        // Floating content stays above the whole anchored-bottom run.
        let _log = text(&field, Placement::SlideBottom, "log");
        assert_eq!(field.render().unwrap(), "logGOALSSEPP");
    }

    #[test]
    fn contiguity_survives_removal_churn() {
        let field = ReceptiveField::new();
        let mut elements: Vec<FieldElement> = (0..12)
            .map(|i| {
                let placement = Placement::ALL[2 + i % 4];
                text(&field, placement, &i.to_string())
            })
            .collect();
        for idx in [3, 0, 7, 1] {
            elements[idx].slot().remove().unwrap();
        }
        elements.truncate(9);
        elements[2].slot().place(None, None).unwrap();

        let refs: Vec<&FieldElement> = elements.iter().collect();
        assert_contiguous(&field, &refs);
        assert_group_order(&field);
        let positions: Vec<usize> = field.snapshot().iter().map(|s| s.position).collect();
        assert_eq!(positions, (0..field.len()).collect::<Vec<_>>());
    }

    #[test]
    fn second_pinned_top_is_rejected_without_mutation() {
        let field = ReceptiveField::new();
        let header = text(&field, Placement::PinnedTop, "H");
        let _body = text(&field, Placement::SlideTop, "b");
        let before = field.snapshot();

        let err = FieldElement::text(Placement::PinnedTop, "H2", Some(&field)).unwrap_err();
        match err {
            LayoutError::PinnedConflict {
                placement,
                incumbent,
            } => {
                assert_eq!(placement, Placement::PinnedTop);
                assert_eq!(incumbent, header.slot().id());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(field.snapshot(), before);
        assert_eq!(field.metrics().conflicts, 1);
    }

    #[test]
    fn pinned_boundary_frees_after_removal() {
        let field = ReceptiveField::new();
        let first = text(&field, Placement::PinnedBottom, "1");
        first.slot().remove().unwrap();
        let second = text(&field, Placement::PinnedBottom, "2");
        assert_eq!(second.slot().position(), Some(0));
    }

    #[test]
    fn replace_moves_slot_between_groups() {
        let field = ReceptiveField::new();
        let _top = text(&field, Placement::AnchoredTop, "T");
        let mover = text(&field, Placement::SlideTop, "M");
        let _bottom = text(&field, Placement::AnchoredBottom, "B");

        assert_eq!(mover.slot().replace(Placement::PinnedBottom).unwrap(), 2);
        assert_eq!(mover.slot().placement(), Placement::PinnedBottom);
        assert_eq!(field.render().unwrap(), "TBM");
        assert_eq!(field.metrics().replacements, 1);
    }

    #[test]
    fn replace_into_occupied_boundary_leaves_slot_untouched() {
        let field = ReceptiveField::new();
        let _header = text(&field, Placement::PinnedTop, "H");
        let mover = text(&field, Placement::SlideTop, "M");
        let before = field.snapshot();
        assert!(mover.slot().replace(Placement::PinnedTop).is_err());
        assert_eq!(field.snapshot(), before);
        assert_eq!(mover.slot().placement(), Placement::SlideTop);
    }

    #[test]
    fn pinned_slot_can_be_replaced_in_place() {
        let field = ReceptiveField::new();
        let header = text(&field, Placement::PinnedTop, "H");
        assert_eq!(header.slot().replace(Placement::PinnedTop).unwrap(), 0);
    }

    #[test]
    fn replace_is_never_observed_half_done() {
        let field = ReceptiveField::new();
        let _header = text(&field, Placement::PinnedTop, "H");
        let _prompt = text(&field, Placement::PinnedBottom, "P");
        let mover = text(&field, Placement::SlideTop, "M");
        let id = mover.slot().id();
        let stop = Arc::new(AtomicBool::new(false));

        let observer = {
            let field = field.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observations = 0;
                loop {
                    let count = field.snapshot().iter().filter(|s| s.id == id).count();
                    assert_eq!(count, 1);
                    let frame = field.render_frame().unwrap();
                    assert_eq!(frame.included.iter().filter(|s| **s == id).count(), 1);
                    observations += 1;
                    if stop.load(Ordering::Relaxed) {
                        break observations;
                    }
                }
            })
        };

        let cycle = [
            Placement::AnchoredTop,
            Placement::SlideBottom,
            Placement::AnchoredBottom,
            Placement::SlideTop,
        ];
        for round in 0..2_000 {
            mover.slot().replace(cycle[round % cycle.len()]).unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        let observations = observer.join().unwrap();
        assert!(observations > 0);
    }

    #[test]
    fn concurrent_producers_keep_indices_contiguous() {
        let field = ReceptiveField::new();
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let field = field.clone();
                thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..50 {
                        let placement = Placement::ALL[2 + (worker + i) % 4];
                        let element =
                            FieldElement::text(placement, format!("{worker}:{i}\n"), Some(&field))
                                .unwrap();
                        if i % 3 == 0 {
                            element.slot().remove().unwrap();
                        }
                        kept.push(element);
                    }
                    kept
                })
            })
            .collect();
        let elements: Vec<FieldElement> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();

        let refs: Vec<&FieldElement> = elements.iter().collect();
        assert_contiguous(&field, &refs);
        assert_group_order(&field);
        assert_eq!(field.len(), elements.iter().filter(|e| e.slot().is_placed()).count());
    }

    #[test]
    fn insert_at_rejects_out_of_range_without_mutation() {
        let field = ReceptiveField::new();
        let _a = text(&field, Placement::SlideTop, "a");
        let stray = FieldElement::text(Placement::SlideTop, "s", None).unwrap();
        let before = field.snapshot();

        let core = {
            let state = field.lock();
            Arc::clone(&state.entries[0].slot)
        };
        let mut state = field.lock();
        let err = state
            .insert_at(&core, Placement::SlideTop, 5)
            .unwrap_err();
        assert!(matches!(err, LayoutError::IndexOutOfRange { index: 5, len: 1 }));
        drop(state);

        assert_eq!(field.snapshot(), before);
        assert_eq!(stray.slot().position(), None);
    }

    #[test]
    fn render_is_cached_until_dirty() {
        let field = ReceptiveField::new();
        let _a = text(&field, Placement::SlideTop, "a");
        let first = field.render_frame().unwrap();
        assert!(first.changed);
        assert!(!field.is_dirty());

        let second = field.render_frame().unwrap();
        assert!(!second.changed);
        assert_eq!(second.hash, first.hash);
        assert!(field.render_if_dirty().unwrap().is_none());
        assert_eq!(field.metrics().renders, 1);
        assert_eq!(field.metrics().cache_hits, 1);

        let _b = text(&field, Placement::SlideTop, "b");
        let third = field.render_if_dirty().unwrap().unwrap();
        assert_eq!(third.image, "ba");
    }

    #[test]
    fn empty_images_keep_ordering() {
        let field = ReceptiveField::new();
        let _a = text(&field, Placement::AnchoredTop, "a");
        let _gap = text(&field, Placement::SlideTop, "");
        let _b = text(&field, Placement::AnchoredBottom, "b");
        assert_eq!(field.render().unwrap(), "ab");
    }

    #[test]
    fn failing_element_aborts_render_and_keeps_dirty() {
        let sink = Arc::new(MemorySink::new());
        let field = ReceptiveField::builder()
            .logger(Logger::from_arc(sink.clone()))
            .build();
        let _ok = text(&field, Placement::PinnedTop, "ok");
        let published = field.render().unwrap();

        let broken = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&broken);
        let flaky = FieldElement::new(
            Placement::SlideTop,
            move || {
                if flag.load(Ordering::Relaxed) {
                    Err(ImageError::new("source offline"))
                } else {
                    Ok("back".to_string())
                }
            },
            Some(&field),
        )
        .unwrap();

        let err = field.render().unwrap_err();
        assert!(
            matches!(err, LayoutError::ElementRender { slot, .. } if slot == flaky.slot().id())
        );
        assert!(field.is_dirty());
        assert_eq!(field.published().unwrap().image, published);
        assert_eq!(field.metrics().render_failures, 1);
        assert!(sink.messages().iter().any(|m| m == "element_render_failed"));

        broken.store(false, Ordering::Relaxed);
        assert_eq!(field.render().unwrap(), "okback");
        assert!(!field.is_dirty());
    }

    #[test]
    fn watchers_hear_clean_to_dirty_transitions() {
        let field = ReceptiveField::new();
        let signal = Arc::new(RenderSignal::new());
        field.watch(signal.clone());

        let _a = text(&field, Placement::SlideTop, "a");
        let first = signal.take().unwrap();
        let _b = text(&field, Placement::SlideTop, "b");
        // Already dirty; no new transition.
        assert!(signal.take().is_none());

        field.render().unwrap();
        field.invalidate();
        let second = signal.wait_timeout(Duration::from_millis(50)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn dropping_element_releases_slot() {
        let field = ReceptiveField::new();
        let keep = text(&field, Placement::SlideTop, "k");
        {
            let _temp = text(&field, Placement::SlideTop, "t");
            assert_eq!(keep.slot().position(), Some(1));
        }
        assert_eq!(field.len(), 1);
        assert_eq!(keep.slot().position(), Some(0));
    }

    #[test]
    fn layout_events_are_logged() {
        let sink = Arc::new(MemorySink::new());
        let field = ReceptiveField::builder()
            .logger(Logger::from_arc(sink.clone()))
            .build();
        let element = text(&field, Placement::AnchoredTop, "x");
        element.slot().replace(Placement::SlideBottom).unwrap();
        element.slot().remove().unwrap();
        assert_eq!(
            sink.messages(),
            vec!["slot_placed", "slot_replaced", "slot_removed"]
        );
    }

    #[test]
    fn static_sources_compose_directly() {
        let field = ReceptiveField::new();
        let _s = FieldElement::new(Placement::SlideTop, StaticImage::new("s"), Some(&field)).unwrap();
        assert_eq!(field.render().unwrap(), "s");
    }
}
