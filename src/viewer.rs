//! Everything the control thread owns: geometry, the line cache, selection,
//! search navigation and the query panel. All methods run on one thread;
//! asynchronous work comes back in through [`Viewer::on_fetch_complete`] and
//! [`Viewer::finish_query`].

use tracing::{debug, warn};

use crate::backend::FileInfo;
use crate::classifier::classify;
use crate::config::ViewerConfig;
use crate::error::{LensError, Result};
use crate::prefetch::{LineSlot, PrefetchController};
use crate::query::{QueryPanel, QueryResult, QueryState, LINE_NUMBER_COLUMN};
use crate::scheduler::{CompletionOutcome, FetchCompletion, FetchRequest, Fetcher};
use crate::search::{SearchDirection, SearchNavigator};
use crate::selection::{line_index_for_row, IndexBase, SelectionSync};
use crate::viewport::{Align, ViewportModel, VisibleRange};

const PENDING_MARKER: &str = "…";

pub struct Viewer {
    viewport: ViewportModel,
    controller: PrefetchController,
    selection: SelectionSync,
    search: SearchNavigator,
    queries: QueryPanel,
    source: Option<FileInfo>,
}

impl Viewer {
    pub fn new(config: &ViewerConfig, fetcher: Box<dyn Fetcher>) -> Self {
        let mut viewport = ViewportModel::new(config.line_height);
        viewport.update_viewport(0, config.viewport_height);
        Self {
            viewport,
            controller: PrefetchController::new(fetcher, config.overscan, config.batch_cap),
            selection: SelectionSync::new(),
            search: SearchNavigator::new(),
            queries: QueryPanel::new(),
            source: None,
        }
    }

    pub fn source(&self) -> Option<&FileInfo> {
        self.source.as_ref()
    }

    pub fn viewport(&self) -> &ViewportModel {
        &self.viewport
    }

    pub fn controller(&self) -> &PrefetchController {
        &self.controller
    }

    pub fn visible_range(&self) -> VisibleRange {
        self.viewport.visible_range()
    }

    pub fn selected(&self) -> Option<u64> {
        self.selection.selected()
    }

    pub fn search(&self) -> &SearchNavigator {
        &self.search
    }

    pub fn query_state(&self) -> &QueryState {
        self.queries.state()
    }

    fn prefetch(&mut self) -> Option<FetchRequest> {
        let range = self.viewport.visible_range();
        self.controller.on_viewport_changed(range)
    }

    /// Switches to a freshly opened source. The cache is invalidated before
    /// the first fetch for the new source is scheduled.
    pub fn on_source_opened(&mut self, info: FileInfo) -> Option<FetchRequest> {
        self.controller.on_source_changed(info.line_count);
        self.viewport.set_line_count(info.line_count);
        self.selection.clear();
        self.search.clear();
        self.queries.reset();
        self.source = Some(info);
        self.prefetch()
    }

    pub fn on_source_closed(&mut self) {
        self.controller.on_source_closed();
        self.viewport.set_line_count(0);
        self.selection.clear();
        self.search.clear();
        self.queries.reset();
        self.source = None;
    }

    pub fn on_scroll(&mut self, offset: u64) -> Option<FetchRequest> {
        let container = self.viewport.container_size();
        self.viewport.update_viewport(offset, container);
        self.prefetch()
    }

    pub fn resize(&mut self, container_size: u32) -> Option<FetchRequest> {
        let offset = self.viewport.scroll_offset();
        self.viewport.update_viewport(offset, container_size);
        self.prefetch()
    }

    pub fn scroll_to_index(&mut self, index: i64, align: Align) -> Result<VisibleRange> {
        let range = self.viewport.scroll_to_index(index, align)?;
        self.prefetch();
        Ok(range)
    }

    pub fn remeasure(&mut self, index: u64, actual_size: u32) -> Result<VisibleRange> {
        let range = self.viewport.remeasure(index, actual_size)?;
        self.prefetch();
        Ok(range)
    }

    pub fn select_and_reveal(&mut self, index: i64) -> Result<VisibleRange> {
        let range = self.selection.select_and_reveal(index, &mut self.viewport)?;
        self.prefetch();
        Ok(range)
    }

    /// Installs a search outcome. A failed search leaves the previous results
    /// and selection in place. On success the first hit is revealed.
    pub fn apply_search(&mut self, pattern: &str, results: Result<Vec<u64>>) -> Result<Option<u64>> {
        let results = results?;
        debug!(pattern, hits = results.len(), "search finished");
        self.search.set_results(pattern, results);
        let first = self.search.current();
        self.reveal_search_hit(first)
    }

    pub fn search_step(&mut self, direction: SearchDirection) -> Result<Option<u64>> {
        let hit = self.search.step(direction);
        self.reveal_search_hit(hit)
    }

    fn reveal_search_hit(&mut self, hit: Option<u64>) -> Result<Option<u64>> {
        match hit {
            Some(index) => {
                self.select_and_reveal(index as i64)?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    pub fn begin_query(&mut self, query: &str) -> Result<u64> {
        self.queries.begin(query)
    }

    pub fn finish_query(&mut self, ticket: u64, result: Result<QueryResult>) -> bool {
        self.queries.finish(ticket, result)
    }

    pub fn acknowledge_query(&mut self) {
        self.queries.acknowledge();
    }

    /// Reveals the line a query result row points at.
    pub fn activate_row(&mut self, row: usize) -> Result<VisibleRange> {
        let result = self
            .queries
            .result()
            .ok_or_else(|| LensError::Query("no query result".to_string()))?;
        let index = line_index_for_row(result, row, LINE_NUMBER_COLUMN, IndexBase::One)?;
        self.select_and_reveal(index)
    }

    pub fn on_fetch_complete(&mut self, completion: FetchCompletion) -> CompletionOutcome {
        let outcome = self.controller.on_fetch_complete(completion);
        // A capped batch may have left part of the viewport uncovered. Short
        // or failed replies wait for the next viewport change.
        if let CompletionOutcome::Merged(_) = outcome {
            self.prefetch();
        }
        outcome
    }

    pub fn get_visible_lines(&self) -> Vec<(u64, LineSlot<'_>)> {
        self.controller.get_visible_lines(self.viewport.visible_range())
    }

    /// Renders the visible rows as text: selection marker, search-hit marker,
    /// 1-based line number, category tag and content.
    pub fn render(&self) -> Vec<String> {
        self.get_visible_lines()
            .into_iter()
            .map(|(index, slot)| {
                let marker = if self.selection.selected() == Some(index) { '>' } else { ' ' };
                let hit = if self.search.is_match(index) { '*' } else { ' ' };
                match slot {
                    LineSlot::Ready(text) => format!(
                        "{}{}{:8} │ {} {}",
                        marker,
                        hit,
                        index + 1,
                        classify(text).tag(),
                        text
                    ),
                    LineSlot::Pending => {
                        format!("{}{}{:8} │ {}", marker, hit, index + 1, PENDING_MARKER)
                    }
                }
            })
            .collect()
    }

    pub fn report(&self, what: &str, err: &LensError) {
        warn!(category = ?err.category(), "{} failed: {}", what, err);
    }
}
