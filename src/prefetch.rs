use tracing::info;

use crate::scheduler::{CompletionOutcome, FetchCompletion, FetchRequest, FetchScheduler, Fetcher};
use crate::viewport::VisibleRange;

pub const DEFAULT_OVERSCAN: u64 = 20;
pub const DEFAULT_BATCH_CAP: u64 = 500;

/// What the renderer gets for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSlot<'a> {
    Ready(&'a str),
    Pending,
}

/// Owns the line cache (through its scheduler) and keeps it in step with the
/// viewport and with the identity of the open source.
pub struct PrefetchController {
    scheduler: FetchScheduler,
    overscan: u64,
}

impl PrefetchController {
    pub fn new(fetcher: Box<dyn Fetcher>, overscan: u64, batch_cap: u64) -> Self {
        Self {
            scheduler: FetchScheduler::new(fetcher, batch_cap),
            overscan,
        }
    }

    pub fn overscan(&self) -> u64 {
        self.overscan
    }

    pub fn generation(&self) -> u64 {
        self.scheduler.generation()
    }

    pub fn line_count(&self) -> u64 {
        self.scheduler.line_count()
    }

    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    pub fn on_viewport_changed(&mut self, range: VisibleRange) -> Option<FetchRequest> {
        self.scheduler.request_range(range, self.overscan)
    }

    /// Invalidates everything cached for the previous source. Must run before
    /// the first viewport update against the new one.
    pub fn on_source_changed(&mut self, line_count: u64) {
        info!(line_count, "source changed, invalidating line cache");
        self.scheduler.reset(line_count);
    }

    pub fn on_source_closed(&mut self) {
        self.scheduler.reset(0);
    }

    pub fn on_fetch_complete(&mut self, completion: FetchCompletion) -> CompletionOutcome {
        self.scheduler.complete(completion)
    }

    pub fn get_visible_lines(&self, range: VisibleRange) -> Vec<(u64, LineSlot<'_>)> {
        range
            .iter()
            .filter(|&index| index < self.scheduler.line_count())
            .map(|index| {
                let slot = match self.scheduler.get(index) {
                    Some(line) => LineSlot::Ready(line),
                    None => LineSlot::Pending,
                };
                (index, slot)
            })
            .collect()
    }
}
