use std::collections::HashMap;

/// Sparse store of line contents keyed by absolute line index.
///
/// Entries are only valid for the source generation that produced them; the
/// owner clears the whole cache when the source changes. There is no eviction.
#[derive(Debug, Default)]
pub struct LineCache {
    lines: HashMap<u64, String>,
}

impl LineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a line is cached
    pub fn contains_line(&self, line_num: u64) -> bool {
        self.lines.contains_key(&line_num)
    }

    /// Get a line from cache if available
    pub fn get(&self, line_num: u64) -> Option<&str> {
        self.lines.get(&line_num).map(String::as_str)
    }

    /// Insert `lines` at consecutive indices starting at `start`, overwriting
    /// whatever was there.
    pub fn merge(&mut self, start: u64, lines: Vec<String>) {
        self.lines.reserve(lines.len());
        for (offset, line) in lines.into_iter().enumerate() {
            self.lines.insert(start + offset as u64, line);
        }
    }

    pub fn clear(&mut self) {
        self.lines = HashMap::new();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_merge_and_get() {
        let mut cache = LineCache::new();
        let lines: Vec<String> = (0..500).map(|i| format!("line {}", i)).collect();
        cache.merge(1000, lines);

        assert!(cache.contains_line(1000));
        assert!(cache.contains_line(1499));
        assert!(!cache.contains_line(999));
        assert!(!cache.contains_line(1500));

        assert_eq!(cache.get(1000), Some("line 0"));
        assert_eq!(cache.get(1499), Some("line 499"));
        assert_eq!(cache.len(), 500);
    }

    #[test]
    fn test_merge_overwrites() {
        let mut cache = LineCache::new();
        cache.merge(0, vec!["a".to_string(), "b".to_string()]);
        cache.merge(1, vec!["B".to_string(), "c".to_string()]);

        assert_eq!(cache.get(0), Some("a"));
        assert_eq!(cache.get(1), Some("B"));
        assert_eq!(cache.get(2), Some("c"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_no_eviction() {
        let mut cache = LineCache::new();
        for chunk in 0..50u64 {
            cache.merge(chunk * 10_000, vec!["x".to_string(); 10]);
        }
        assert_eq!(cache.len(), 500);
        assert!(cache.contains_line(0));
        assert!(cache.contains_line(490_009));
    }

    #[test]
    fn test_clear() {
        let mut cache = LineCache::new();
        cache.merge(7, vec!["seven".to_string()]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(7), None);
    }
}
