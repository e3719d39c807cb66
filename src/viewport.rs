//! Scroll geometry over a line-indexed source.
//!
//! Items have an estimated size until the renderer reports a measurement
//! through [`ViewportModel::remeasure`]. Only measured items are stored, as a
//! sorted delta table with prefix sums, so memory stays proportional to what
//! has actually been rendered rather than to the line count.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{LensError, Result};

/// Half-open index interval `[start, end)` of rendered items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleRange {
    pub start: u64,
    pub end: u64,
}

impl VisibleRange {
    pub const EMPTY: VisibleRange = VisibleRange { start: 0, end: 0 };

    /// Inclusive constructor, matching how ranges are usually talked about.
    pub fn inclusive(first: u64, last: u64) -> Self {
        Self {
            start: first,
            end: last + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn first(&self) -> Option<u64> {
        (!self.is_empty()).then_some(self.start)
    }

    pub fn last(&self) -> Option<u64> {
        (!self.is_empty()).then(|| self.end - 1)
    }

    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index < self.end
    }

    pub fn iter(&self) -> std::ops::Range<u64> {
        self.start..self.end.max(self.start)
    }
}

impl fmt::Display for VisibleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => write!(f, "[{}, {}]", first, last),
            _ => write!(f, "[]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
}

#[derive(Debug)]
pub struct ViewportModel {
    line_count: u64,
    estimated_size: u32,
    measured: BTreeMap<u64, u32>,
    /// Sorted measured indices, parallel to `prefix_delta`.
    measured_keys: Vec<u64>,
    /// `prefix_delta[k]` is the summed size correction of `measured_keys[..k]`.
    prefix_delta: Vec<i64>,
    scroll_offset: u64,
    container_size: u32,
    range: VisibleRange,
}

impl ViewportModel {
    pub fn new(estimated_size: u32) -> Self {
        Self {
            line_count: 0,
            estimated_size: estimated_size.max(1),
            measured: BTreeMap::new(),
            measured_keys: Vec::new(),
            prefix_delta: vec![0],
            scroll_offset: 0,
            container_size: 0,
            range: VisibleRange::EMPTY,
        }
    }

    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn container_size(&self) -> u32 {
        self.container_size
    }

    pub fn visible_range(&self) -> VisibleRange {
        self.range
    }

    /// Resets geometry for a new source. Measurements belong to the old one.
    pub fn set_line_count(&mut self, line_count: u64) -> VisibleRange {
        self.line_count = line_count;
        self.measured.clear();
        self.rebuild_prefix();
        self.scroll_offset = 0;
        self.recompute()
    }

    pub fn size_of(&self, index: u64) -> u32 {
        self.measured
            .get(&index)
            .copied()
            .unwrap_or(self.estimated_size)
    }

    /// Distance from the top of the content to the top of `index`.
    pub fn offset_of(&self, index: u64) -> u64 {
        let index = index.min(self.line_count);
        let k = self.measured_keys.partition_point(|&key| key < index);
        let base = index * u64::from(self.estimated_size);
        (base as i64 + self.prefix_delta[k]) as u64
    }

    pub fn total_size(&self) -> u64 {
        self.offset_of(self.line_count)
    }

    /// Index of the item occupying `offset`, clamped to the last item.
    pub fn index_at(&self, offset: u64) -> u64 {
        if self.line_count == 0 {
            return 0;
        }
        let (mut lo, mut hi) = (0u64, self.line_count - 1);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.offset_of(mid) <= offset {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    fn max_scroll(&self) -> u64 {
        self.total_size()
            .saturating_sub(u64::from(self.container_size))
    }

    pub fn update_viewport(&mut self, scroll_offset: u64, container_size: u32) -> VisibleRange {
        self.container_size = container_size;
        self.scroll_offset = scroll_offset.min(self.max_scroll());
        self.recompute()
    }

    pub fn scroll_to_index(&mut self, index: i64, align: Align) -> Result<VisibleRange> {
        let index = self.check_index(index)?;
        let top = self.offset_of(index);
        let size = u64::from(self.size_of(index));
        let container = u64::from(self.container_size);
        let target = match align {
            Align::Start => top,
            Align::Center => (top + size / 2).saturating_sub(container / 2),
            Align::End => (top + size).saturating_sub(container),
        };
        self.scroll_offset = target.min(self.max_scroll());
        Ok(self.recompute())
    }

    /// Replaces the size estimate of `index` with a measured one. The scroll
    /// offset is kept, so content below the item shifts.
    pub fn remeasure(&mut self, index: u64, actual_size: u32) -> Result<VisibleRange> {
        let index = self.check_index(index as i64)?;
        let actual_size = actual_size.max(1);
        if self.size_of(index) == actual_size {
            return Ok(self.range);
        }
        if actual_size == self.estimated_size {
            self.measured.remove(&index);
        } else {
            self.measured.insert(index, actual_size);
        }
        self.rebuild_prefix();
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
        Ok(self.recompute())
    }

    fn check_index(&self, index: i64) -> Result<u64> {
        if index < 0 || index as u64 >= self.line_count {
            return Err(LensError::IndexOutOfBounds {
                index,
                line_count: self.line_count,
            });
        }
        Ok(index as u64)
    }

    fn rebuild_prefix(&mut self) {
        let estimated = i64::from(self.estimated_size);
        self.measured_keys = self.measured.keys().copied().collect();
        self.prefix_delta = Vec::with_capacity(self.measured.len() + 1);
        let mut running = 0i64;
        self.prefix_delta.push(running);
        for size in self.measured.values() {
            running += i64::from(*size) - estimated;
            self.prefix_delta.push(running);
        }
    }

    fn recompute(&mut self) -> VisibleRange {
        self.range = if self.line_count == 0 || self.container_size == 0 {
            VisibleRange::EMPTY
        } else {
            let first = self.index_at(self.scroll_offset);
            let bottom = self.scroll_offset + u64::from(self.container_size) - 1;
            let last = self.index_at(bottom).min(self.line_count - 1);
            VisibleRange::inclusive(first, last)
        };
        self.range
    }
}
