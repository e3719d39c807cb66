use std::ops::Range;

use tracing::{debug, warn};

use crate::cache::LineCache;
use crate::error::Result;
use crate::inflight::InFlightTracker;
use crate::viewport::VisibleRange;

/// One `getLines(start, count)` call, tagged with the source generation it was
/// issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub start: u64,
    pub count: u64,
}

impl FetchRequest {
    pub fn span(&self) -> Range<u64> {
        self.start..self.start + self.count
    }
}

#[derive(Debug)]
pub struct FetchCompletion {
    pub request: FetchRequest,
    pub result: Result<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The whole span was written into the cache; carries the line count.
    Merged(usize),
    /// The source returned fewer lines than requested. What arrived is cached;
    /// the rest of the span stays missing until the viewport asks again.
    Short(usize),
    Failed,
    /// Issued against a source that has since been replaced; discarded.
    Stale,
}

/// Carries a request to the line source. Implementations must eventually hand
/// a [`FetchCompletion`] back to the scheduler's owner, from any thread and in
/// any order.
pub trait Fetcher {
    fn fetch(&self, request: FetchRequest);
}

pub struct FetchScheduler {
    cache: LineCache,
    in_flight: InFlightTracker,
    line_count: u64,
    generation: u64,
    batch_cap: u64,
    fetcher: Box<dyn Fetcher>,
}

impl FetchScheduler {
    pub fn new(fetcher: Box<dyn Fetcher>, batch_cap: u64) -> Self {
        Self {
            cache: LineCache::new(),
            in_flight: InFlightTracker::new(),
            line_count: 0,
            generation: 0,
            batch_cap: batch_cap.max(1),
            fetcher,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    pub fn get(&self, index: u64) -> Option<&str> {
        self.cache.get(index)
    }

    pub fn is_in_flight(&self, index: u64) -> bool {
        self.in_flight.contains(index)
    }

    pub fn cached_lines(&self) -> usize {
        self.cache.len()
    }

    pub fn in_flight_lines(&self) -> usize {
        self.in_flight.len()
    }

    /// Drops all cached and in-flight state and starts a new generation, so
    /// completions for the previous source are recognised as stale.
    pub fn reset(&mut self, line_count: u64) {
        self.cache.clear();
        self.in_flight.clear();
        self.line_count = line_count;
        self.generation += 1;
        debug!(generation = self.generation, line_count, "line cache reset");
    }

    fn is_missing(&self, index: u64) -> bool {
        !self.cache.contains_line(index) && !self.in_flight.contains(index)
    }

    /// Works out which span, if any, a viewport at `range` should request.
    ///
    /// The span runs from the first to the last missing index of the
    /// overscanned range. Cached holes inside it are re-fetched rather than
    /// split into several requests, but the span never reaches an index that
    /// is already in flight. Spans wider than the batch cap are cut to the
    /// cap, starting as close to the top of the viewport as possible.
    pub fn plan(&self, range: VisibleRange, overscan: u64) -> Option<Range<u64>> {
        if self.line_count == 0 || range.is_empty() {
            return None;
        }
        let lo = range.start.saturating_sub(overscan).min(self.line_count);
        let hi = range.end.saturating_add(overscan).min(self.line_count);
        if lo >= hi {
            return None;
        }

        let span_min = (lo..hi).find(|&i| self.is_missing(i))?;
        let span_max = (span_min..hi).rev().find(|&i| self.is_missing(i))?;

        let mut start = span_min;
        let mut end = span_max + 1;
        if end - start > self.batch_cap {
            let anchor = range.start.clamp(span_min, span_max + 1 - self.batch_cap);
            start = (anchor..=span_max)
                .find(|&i| self.is_missing(i))
                .unwrap_or(span_min);
            end = (start + self.batch_cap).min(span_max + 1);
            while end > start + 1 && !self.is_missing(end - 1) {
                end -= 1;
            }
        }

        if let Some(busy) = self.in_flight.first_in(start..end) {
            end = busy;
        }
        Some(start..end)
    }

    /// Issues at most one fetch covering the missing lines around `range`.
    pub fn request_range(&mut self, range: VisibleRange, overscan: u64) -> Option<FetchRequest> {
        let span = self.plan(range, overscan)?;
        for index in span.clone() {
            if !self.cache.contains_line(index) {
                self.in_flight.mark(index);
            }
        }
        let request = FetchRequest {
            generation: self.generation,
            start: span.start,
            count: span.end - span.start,
        };
        debug!(
            generation = request.generation,
            start = request.start,
            count = request.count,
            "issuing line fetch"
        );
        self.fetcher.fetch(request);
        Some(request)
    }

    pub fn complete(&mut self, completion: FetchCompletion) -> CompletionOutcome {
        let FetchCompletion { request, result } = completion;
        if request.generation != self.generation {
            debug!(
                generation = request.generation,
                current = self.generation,
                start = request.start,
                "dropping stale fetch completion"
            );
            return CompletionOutcome::Stale;
        }

        let outcome = match result {
            Ok(mut lines) => {
                let room = self.line_count.saturating_sub(request.start);
                let expected = request.count.min(room) as usize;
                lines.truncate(expected);
                let merged = lines.len();
                self.cache.merge(request.start, lines);
                if merged < expected {
                    debug!(
                        start = request.start,
                        expected,
                        merged,
                        "source returned a short batch"
                    );
                    CompletionOutcome::Short(merged)
                } else {
                    CompletionOutcome::Merged(merged)
                }
            }
            Err(err) => {
                warn!(
                    start = request.start,
                    count = request.count,
                    "line fetch failed: {}",
                    err
                );
                CompletionOutcome::Failed
            }
        };
        self.in_flight.release(request.span());
        outcome
    }
}
