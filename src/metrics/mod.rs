use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;

/// Counters kept by a receptive field under its own lock.
#[derive(Debug, Default, Clone)]
pub struct FieldMetrics {
    placements: u64,
    removals: u64,
    replacements: u64,
    conflicts: u64,
    renders: u64,
    cache_hits: u64,
    render_failures: u64,
    excluded_slots: u64,
}

impl FieldMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_placement(&mut self) {
        self.placements = self.placements.saturating_add(1);
    }

    pub fn record_removal(&mut self) {
        self.removals = self.removals.saturating_add(1);
    }

    pub fn record_replacement(&mut self) {
        self.replacements = self.replacements.saturating_add(1);
    }

    pub fn record_conflict(&mut self) {
        self.conflicts = self.conflicts.saturating_add(1);
    }

    pub fn record_render(&mut self, excluded: usize) {
        self.renders = self.renders.saturating_add(1);
        self.excluded_slots = self.excluded_slots.saturating_add(excluded as u64);
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits = self.cache_hits.saturating_add(1);
    }

    pub fn record_render_failure(&mut self) {
        self.render_failures = self.render_failures.saturating_add(1);
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            placements: self.placements,
            removals: self.removals,
            replacements: self.replacements,
            conflicts: self.conflicts,
            renders: self.renders,
            cache_hits: self.cache_hits,
            render_failures: self.render_failures,
            excluded_slots: self.excluded_slots,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub placements: u64,
    pub removals: u64,
    pub replacements: u64,
    pub conflicts: u64,
    pub renders: u64,
    pub cache_hits: u64,
    pub render_failures: u64,
    pub excluded_slots: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "field_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("placements".to_string(), json!(self.placements));
        map.insert("removals".to_string(), json!(self.removals));
        map.insert("replacements".to_string(), json!(self.replacements));
        map.insert("conflicts".to_string(), json!(self.conflicts));
        map.insert("renders".to_string(), json!(self.renders));
        map.insert("cache_hits".to_string(), json!(self.cache_hits));
        map.insert("render_failures".to_string(), json!(self.render_failures));
        map.insert("excluded_slots".to_string(), json!(self.excluded_slots));
        map
    }
}
