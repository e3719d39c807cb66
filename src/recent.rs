use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

pub const MAX_RECENT_FILES: usize = 7;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecentFilesDoc {
    recent: Vec<String>,
}

/// Most-recently-opened sources, newest first, without duplicates.
#[derive(Debug, Default)]
pub struct RecentFiles {
    store: Option<PathBuf>,
    entries: Vec<String>,
}

impl RecentFiles {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the list persisted at `store`. A missing or unreadable file
    /// yields an empty list; the next `save` rewrites it.
    pub fn load(store: impl Into<PathBuf>) -> Self {
        let store = store.into();
        let entries = match fs::read_to_string(&store) {
            Ok(text) => match serde_json::from_str::<RecentFilesDoc>(&text) {
                Ok(doc) => doc.recent,
                Err(e) => {
                    warn!(path = %store.display(), "ignoring corrupt recent files list: {}", e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %store.display(), "cannot read recent files list: {}", e);
                Vec::new()
            }
        };

        let mut recent = Self {
            store: Some(store),
            entries: Vec::new(),
        };
        for path in entries.into_iter().rev() {
            recent.add(&path);
        }
        recent
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn add(&mut self, path: &str) {
        self.entries.retain(|p| p != path);
        self.entries.insert(0, path.to_string());
        self.entries.truncate(MAX_RECENT_FILES);
    }

    pub fn save(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if let Some(parent) = store.parent() {
            fs::create_dir_all(parent)?;
        }
        let doc = RecentFilesDoc {
            recent: self.entries.clone(),
        };
        fs::write(store, serde_json::to_string_pretty(&doc)?)?;
        Ok(())
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_most_recent_first_without_duplicates() {
        let mut recent = RecentFiles::in_memory();
        recent.add("/a.log");
        recent.add("/b.log");
        recent.add("/a.log");
        assert_eq!(recent.entries(), &["/a.log", "/b.log"]);
    }

    #[test]
    fn test_capped_at_seven() {
        let mut recent = RecentFiles::in_memory();
        for i in 0..10 {
            recent.add(&format!("/{}.log", i));
        }
        assert_eq!(recent.entries().len(), MAX_RECENT_FILES);
        assert_eq!(recent.entries()[0], "/9.log");
        assert_eq!(recent.entries()[6], "/3.log");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("nested").join("recent.json");

        let mut recent = RecentFiles::load(&store);
        assert!(recent.entries().is_empty());
        recent.add("/var/log/syslog");
        recent.add("build01:/var/log/app.log");
        recent.save().unwrap();

        let reloaded = RecentFiles::load(&store);
        assert_eq!(
            reloaded.entries(),
            &["build01:/var/log/app.log", "/var/log/syslog"]
        );
    }

    #[test]
    fn test_corrupt_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("recent.json");
        fs::write(&store, "{not json").unwrap();
        assert!(RecentFiles::load(&store).entries().is_empty());
    }

    #[test]
    fn test_load_normalises_hand_edited_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("recent.json");
        let paths: Vec<String> = ["/a", "/b", "/a", "/c", "/d", "/e", "/f", "/g", "/h"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        fs::write(&store, serde_json::json!({ "recent": paths }).to_string()).unwrap();

        let recent = RecentFiles::load(&store);
        assert_eq!(
            recent.entries(),
            &["/a", "/b", "/c", "/d", "/e", "/f", "/g"]
        );
    }
}
