//! Span registry used to rebuild ancestry from a flat stream of spans.
//!
//! Spans arrive unordered from many workers. Each one is indexed by id as it
//! starts; depth is then recovered by walking parent links through the index.
//! A parent that was never registered ends the walk, so the span is treated
//! as a root from that point on.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use opentelemetry::trace::SpanId;
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::SpanData;

/// Upper bound on ancestry walks.
pub const MAX_DEPTH: usize = 256;

/// What the registry remembers about a span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub id: SpanId,
    pub parent: Option<SpanId>,
    pub name: String,
    pub scope: String,
    pub attributes: Vec<KeyValue>,
    pub start: SystemTime,
    pub end: Option<SystemTime>,
}

impl SpanRecord {
    /// Record for a span that just started; the SDK's end time is not final yet.
    pub fn started(span: &SpanData) -> Self {
        Self {
            id: span.span_context.span_id(),
            parent: (span.parent_span_id != SpanId::INVALID).then_some(span.parent_span_id),
            name: span.name.to_string(),
            scope: span.instrumentation_scope.name().to_string(),
            attributes: span.attributes.clone(),
            start: span.start_time,
            end: None,
        }
    }
}

/// Index of spans by id. Entries are kept for the life of the registry.
#[derive(Debug, Default)]
pub struct SpanRegistry {
    spans: HashMap<SpanId, SpanRecord>,
}

impl SpanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `record.id`.
    pub fn register(&mut self, record: SpanRecord) {
        self.spans.insert(record.id, record);
    }

    pub fn get(&self, id: &SpanId) -> Option<&SpanRecord> {
        self.spans.get(id)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Mark a span ended, refreshing its attributes with the final set.
    ///
    /// Unknown spans are registered as they are.
    pub fn finish(&mut self, span: &SpanData) -> &SpanRecord {
        let record = self
            .spans
            .entry(span.span_context.span_id())
            .or_insert_with(|| SpanRecord::started(span));
        record.attributes = span.attributes.clone();
        record.end = Some(span.end_time);
        record
    }

    /// Number of registered ancestors above `parent`, counting `parent` itself.
    ///
    /// Stops at a missing parent, at a cycle, or at [`MAX_DEPTH`].
    pub fn depth_from(&self, id: SpanId, parent: Option<SpanId>) -> usize {
        let mut depth = 0;
        let mut visited = HashSet::from([id]);
        let mut next = parent;

        while let Some(parent_id) = next {
            let Some(record) = self.spans.get(&parent_id) else {
                break;
            };
            if !visited.insert(parent_id) {
                tracing::debug!(span_id = %id, parent_id = %parent_id, "Cyclic span ancestry, stopping walk");
                break;
            }
            if depth == MAX_DEPTH {
                tracing::debug!(span_id = %id, "Span ancestry deeper than limit, stopping walk");
                break;
            }
            depth += 1;
            next = record.parent;
        }

        depth
    }

    /// Depth of a registered span; unknown spans are at depth 0.
    pub fn depth(&self, id: SpanId) -> usize {
        let parent = self.spans.get(&id).and_then(|r| r.parent);
        self.depth_from(id, parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> SpanId {
        SpanId::from_bytes(n.to_be_bytes())
    }

    fn record(n: u64, parent: Option<u64>) -> SpanRecord {
        SpanRecord {
            id: id(n),
            parent: parent.map(id),
            name: format!("span-{}", n),
            scope: "test".into(),
            attributes: Vec::new(),
            start: SystemTime::now(),
            end: None,
        }
    }

    #[test]
    fn test_depth_follows_parents() {
        let mut registry = SpanRegistry::new();
        registry.register(record(1, None));
        registry.register(record(2, Some(1)));
        registry.register(record(3, Some(2)));

        assert_eq!(registry.depth(id(1)), 0);
        assert_eq!(registry.depth(id(2)), 1);
        assert_eq!(registry.depth(id(3)), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_missing_parent_is_root() {
        let mut registry = SpanRegistry::new();
        registry.register(record(10, Some(99)));
        assert_eq!(registry.depth(id(10)), 0);

        // A chain broken halfway only counts the resolved part.
        registry.register(record(11, Some(10)));
        assert_eq!(registry.depth(id(11)), 1);
    }

    #[test]
    fn test_late_parent_is_picked_up() {
        let mut registry = SpanRegistry::new();
        registry.register(record(2, Some(1)));
        assert_eq!(registry.depth(id(2)), 0);

        registry.register(record(1, None));
        assert_eq!(registry.depth(id(2)), 1);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut registry = SpanRegistry::new();
        registry.register(record(1, Some(2)));
        registry.register(record(2, Some(1)));
        assert_eq!(registry.depth(id(1)), 1);

        registry.register(record(3, Some(3)));
        assert_eq!(registry.depth(id(3)), 0);
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut registry = SpanRegistry::new();
        registry.register(record(1, None));
        for id in 2..=(MAX_DEPTH as u64 + 10) {
            registry.register(record(id, Some(id - 1)));
        }
        assert_eq!(registry.depth(id(MAX_DEPTH as u64 + 10)), MAX_DEPTH);
    }
}
