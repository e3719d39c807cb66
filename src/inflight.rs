use std::collections::BTreeSet;
use std::ops::Range;

/// Line indices with an outstanding fetch.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    indices: BTreeSet<u64>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, index: u64) -> bool {
        self.indices.contains(&index)
    }

    pub fn mark(&mut self, index: u64) {
        self.indices.insert(index);
    }

    /// Release every index in `span`, whether or not it was marked.
    pub fn release(&mut self, span: Range<u64>) {
        if span.is_empty() {
            return;
        }
        let released: Vec<u64> = self.indices.range(span).copied().collect();
        for index in released {
            self.indices.remove(&index);
        }
    }

    /// First in-flight index inside `span`, if any.
    pub fn first_in(&self, span: Range<u64>) -> Option<u64> {
        if span.is_empty() {
            return None;
        }
        self.indices.range(span).next().copied()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
