//! SQL surface over the open source.
//!
//! The engine understands a deliberately small dialect against the virtual
//! table `logs(line_number, line)`, where `line_number` is 1-based:
//!
//! ```text
//! SELECT <* | col[, col]> FROM logs [WHERE regex_match(line, '<regex>')] [LIMIT n]
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{LensError, Result};
use crate::file_source::LineSource;
use crate::search::compile_pattern;

pub const TABLE_NAME: &str = "logs";
pub const LINE_NUMBER_COLUMN: &str = "line_number";
pub const LINE_COLUMN: &str = "line";

/// Upper bound on returned rows when the query has no LIMIT.
pub const MAX_ROWS: usize = 10_000;
const SCAN_BATCH: u64 = 10_000;

static QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*select\s+(?P<cols>.+?)\s+from\s+(?P<table>\w+)(?:\s+where\s+regex_match\s*\(\s*line\s*,\s*'(?P<pat>(?:[^']|'')*)'\s*\))?(?:\s+limit\s+(?P<limit>\d+))?\s*;?\s*$",
    )
    .expect("query grammar is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    LineNumber,
    Line,
}

impl Column {
    fn name(self) -> &'static str {
        match self {
            Column::LineNumber => LINE_NUMBER_COLUMN,
            Column::Line => LINE_COLUMN,
        }
    }
}

#[derive(Debug)]
struct Plan {
    columns: Vec<Column>,
    filter: Option<Regex>,
    limit: usize,
}

fn parse(query: &str) -> Result<Plan> {
    let caps = QUERY_RE
        .captures(query)
        .ok_or_else(|| LensError::Query(format!("unsupported query: {}", query.trim())))?;

    let table = &caps["table"];
    if !table.eq_ignore_ascii_case(TABLE_NAME) {
        return Err(LensError::Query(format!("unknown table: {}", table)));
    }

    let cols = caps["cols"].trim();
    let columns = if cols == "*" {
        vec![Column::LineNumber, Column::Line]
    } else {
        cols.split(',')
            .map(|c| match c.trim().to_ascii_lowercase().as_str() {
                LINE_NUMBER_COLUMN => Ok(Column::LineNumber),
                LINE_COLUMN => Ok(Column::Line),
                other => Err(LensError::Query(format!("unknown column: {}", other))),
            })
            .collect::<Result<Vec<_>>>()?
    };

    let filter = match caps.name("pat") {
        Some(pat) => Some(
            compile_pattern(&pat.as_str().replace("''", "'"))
                .map_err(|e| LensError::Query(e.to_string()))?,
        ),
        None => None,
    };

    let limit = match caps.name("limit") {
        Some(limit) => limit
            .as_str()
            .parse::<usize>()
            .map_err(|_| LensError::Query(format!("invalid limit: {}", limit.as_str())))?
            .min(MAX_ROWS),
        None => MAX_ROWS,
    };

    Ok(Plan {
        columns,
        filter,
        limit,
    })
}

/// Runs `query` by scanning `source` in batches.
pub fn execute_sql(source: &dyn LineSource, query: &str) -> Result<QueryResult> {
    let plan = parse(query)?;
    let columns: Vec<String> = plan.columns.iter().map(|c| c.name().to_string()).collect();
    let mut rows = Vec::new();

    let line_count = source.line_count();
    let mut start = 0;
    while start < line_count && rows.len() < plan.limit {
        let batch = source.get_lines(start, SCAN_BATCH)?;
        if batch.is_empty() {
            break;
        }
        for (offset, line) in batch.iter().enumerate() {
            if rows.len() >= plan.limit {
                break;
            }
            if plan.filter.as_ref().is_some_and(|re| !re.is_match(line)) {
                continue;
            }
            let line_number = start + offset as u64 + 1;
            let row = plan
                .columns
                .iter()
                .map(|column| match column {
                    Column::LineNumber => Value::from(line_number),
                    Column::Line => Value::from(line.as_str()),
                })
                .collect();
            rows.push(row);
        }
        start += batch.len() as u64;
    }

    let row_count = rows.len();
    Ok(QueryResult {
        columns,
        rows,
        row_count,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryState {
    Idle,
    Running { ticket: u64, query: String },
    Succeeded(QueryResult),
    Failed(String),
}

/// Tracks the single outstanding query. A new query is rejected while one is
/// running.
#[derive(Debug)]
pub struct QueryPanel {
    state: QueryState,
    next_ticket: u64,
}

impl Default for QueryPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryPanel {
    pub fn new() -> Self {
        Self {
            state: QueryState::Idle,
            next_ticket: 1,
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, QueryState::Running { .. })
    }

    /// Moves to `Running` and returns the ticket the completion must carry.
    pub fn begin(&mut self, query: &str) -> Result<u64> {
        if self.is_running() {
            return Err(LensError::QueryBusy);
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.state = QueryState::Running {
            ticket,
            query: query.to_string(),
        };
        Ok(ticket)
    }

    /// Records the outcome of the query identified by `ticket`. Returns false
    /// when the ticket is not the running one.
    pub fn finish(&mut self, ticket: u64, result: Result<QueryResult>) -> bool {
        match self.state {
            QueryState::Running { ticket: running, .. } if running == ticket => {}
            _ => {
                warn!(ticket, "ignoring result for a query that is no longer running");
                return false;
            }
        }
        self.state = match result {
            Ok(result) => QueryState::Succeeded(result),
            Err(err) => QueryState::Failed(err.to_string()),
        };
        true
    }

    pub fn acknowledge(&mut self) {
        if !self.is_running() {
            self.state = QueryState::Idle;
        }
    }

    /// Abandons any running query, e.g. when the source goes away.
    pub fn reset(&mut self) {
        self.state = QueryState::Idle;
    }

    pub fn result(&self) -> Option<&QueryResult> {
        match &self.state {
            QueryState::Succeeded(result) => Some(result),
            _ => None,
        }
    }
}
