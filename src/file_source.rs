use crate::error::Result;

/// A line-addressable source the viewer can page through.
pub trait LineSource: Send + Sync {
    /// Returns total number of lines in the file
    fn line_count(&self) -> u64;

    fn file_size(&self) -> Result<u64>;

    /// Up to `count` lines starting at the 0-based `start`, fewer near the end
    /// of the file. Fails with `OutOfRange` when `start >= line_count`.
    fn get_lines(&self, start: u64, count: u64) -> Result<Vec<String>>;

    /// Ascending 0-based indices of lines matching `pattern`, at most `max_results`.
    fn search(&self, pattern: &str, max_results: usize) -> Result<Vec<u64>>;

    /// Display name for status output and the recent-files list
    fn display_name(&self) -> &str;
}
