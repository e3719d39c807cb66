use regex::Regex;

use crate::error::{LensError, Result};

pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| LensError::InvalidPattern(e.to_string()))
}

/// Byte-level matcher every line source searches with, local or remote, so a
/// pattern means the same thing and fails the same way on both.
pub fn compile_line_matcher(pattern: &str) -> Result<regex::bytes::Regex> {
    regex::bytes::Regex::new(pattern).map_err(|e| LensError::InvalidPattern(e.to_string()))
}

/// Result list of the last successful search plus a cursor into it.
#[derive(Debug, Default)]
pub struct SearchNavigator {
    pattern: String,
    results: Vec<u64>,
    cursor: Option<usize>,
}

impl SearchNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.pattern.clear();
        self.results.clear();
        self.cursor = None;
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn results(&self) -> &[u64] {
        &self.results
    }

    pub fn is_active(&self) -> bool {
        !self.pattern.is_empty()
    }

    /// Replaces the result set. The cursor starts on the first hit.
    pub fn set_results(&mut self, pattern: &str, mut results: Vec<u64>) {
        results.sort_unstable();
        results.dedup();
        self.pattern = pattern.to_string();
        self.cursor = if results.is_empty() { None } else { Some(0) };
        self.results = results;
    }

    pub fn current(&self) -> Option<u64> {
        self.cursor.and_then(|i| self.results.get(i).copied())
    }

    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    pub fn next(&mut self) -> Option<u64> {
        if self.results.is_empty() {
            return None;
        }
        let new_index = match self.cursor {
            Some(i) => (i + 1) % self.results.len(),
            None => 0,
        };
        self.cursor = Some(new_index);
        self.current()
    }

    pub fn prev(&mut self) -> Option<u64> {
        if self.results.is_empty() {
            return None;
        }
        let new_index = match self.cursor {
            Some(0) | None => self.results.len() - 1,
            Some(i) => i - 1,
        };
        self.cursor = Some(new_index);
        self.current()
    }

    pub fn is_match(&self, line_index: u64) -> bool {
        self.results.binary_search(&line_index).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

impl SearchNavigator {
    pub fn step(&mut self, direction: SearchDirection) -> Option<u64> {
        match direction {
            SearchDirection::Forward => self.next(),
            SearchDirection::Backward => self.prev(),
        }
    }
}
