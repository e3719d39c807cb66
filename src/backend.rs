use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LensError, Result};
use crate::file_loader::MappedFile;
use crate::file_source::LineSource;
use crate::format::{detect_format, SAMPLE_LINES};
use crate::query::{self, QueryResult};
use crate::remote_loader::{parse_remote_spec, RemoteFile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub line_count: u64,
    pub format: String,
}

/// Emitted while a source is being opened and indexed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexProgress {
    pub phase: String,
    pub progress: f32,
    pub message: String,
}

impl IndexProgress {
    fn new(phase: &str, progress: f32, message: impl Into<String>) -> Self {
        Self {
            phase: phase.to_string(),
            progress,
            message: message.into(),
        }
    }
}

/// Holds whichever source is currently open. Shared between the control
/// thread and fetch workers.
#[derive(Default)]
pub struct Backend {
    source: RwLock<Option<Arc<dyn LineSource>>>,
}

impl Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `path` (local, or `host:/path` over ssh) and replaces any open source.
    pub fn open(&self, path: &str, progress: &dyn Fn(IndexProgress)) -> Result<FileInfo> {
        progress(IndexProgress::new("opening", 0.0, "Opening file..."));

        let source: Arc<dyn LineSource> = match parse_remote_spec(path) {
            Some((host, remote_path)) => Arc::new(RemoteFile::open(host, remote_path)?),
            None => Arc::new(MappedFile::open(path)?),
        };
        let line_count = source.line_count();

        progress(IndexProgress::new(
            "indexing",
            0.5,
            format!("Indexing {} lines...", line_count),
        ));

        let sample = if line_count == 0 {
            Vec::new()
        } else {
            source.get_lines(0, SAMPLE_LINES)?
        };
        let info = FileInfo {
            path: path.to_string(),
            size: source.file_size()?,
            line_count,
            format: detect_format(&sample).to_string(),
        };

        self.install(Some(source));
        info!(path, line_count, format = %info.format, "opened source");
        progress(IndexProgress::new("complete", 1.0, "File ready"));
        Ok(info)
    }

    /// Makes `source` current without going through the filesystem.
    pub fn install(&self, source: Option<Arc<dyn LineSource>>) {
        *self.source.write().unwrap_or_else(PoisonError::into_inner) = source;
    }

    pub fn close(&self) {
        if self
            .source
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            info!("closed source");
        }
    }

    pub fn is_open(&self) -> bool {
        self.source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current(&self) -> Result<Arc<dyn LineSource>> {
        self.source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(LensError::NoSourceOpen)
    }

    pub fn get_lines(&self, start: u64, count: u64) -> Result<Vec<String>> {
        self.current()?.get_lines(start, count)
    }

    pub fn search(&self, pattern: &str, max_results: usize) -> Result<Vec<u64>> {
        self.current()?.search(pattern, max_results)
    }

    pub fn execute_sql(&self, sql: &str) -> Result<QueryResult> {
        query::execute_sql(self.current()?.as_ref(), sql)
    }
}
