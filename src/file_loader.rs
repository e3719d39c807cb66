use std::fs::File;
use std::path::Path;

use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{LensError, Result};
use crate::file_source::LineSource;
use crate::search::compile_line_matcher;

/// Bytes inspected when deciding whether a file is text at all.
const BINARY_SNIFF_LEN: usize = 8192;

/// Smallest slice of the file handed to one indexing task.
const INDEX_CHUNK_BYTES: usize = 64 * 1024 * 1024;

/// Lines matched by one search task.
const SEARCH_CHUNK_LINES: usize = 10_000;

/// A local file mapped into memory with a byte offset for every line start.
pub struct MappedFile {
    mmap: Option<Mmap>,
    line_offsets: Vec<usize>,
    display_name: String,
}

impl MappedFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let display_name = path.display().to_string();
        let file = File::open(path).map_err(|e| LensError::from_open(e, &display_name))?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(LensError::UnsupportedFormat {
                path: display_name,
                reason: "is a directory".to_string(),
            });
        }

        // Zero-length files cannot be mapped on every platform.
        let mmap = if metadata.len() == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file)? })
        };

        let mut loader = Self {
            mmap,
            line_offsets: Vec::new(),
            display_name,
        };

        if loader.data()[..loader.data().len().min(BINARY_SNIFF_LEN)].contains(&0) {
            return Err(LensError::UnsupportedFormat {
                path: loader.display_name,
                reason: "binary content".to_string(),
            });
        }

        loader.build_line_index();
        debug!(
            path = %loader.display_name,
            lines = loader.line_offsets.len(),
            "built line index"
        );
        Ok(loader)
    }

    fn data(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    fn build_line_index(&mut self) {
        let data = self.data();
        if data.is_empty() {
            return;
        }

        let chunk_size = INDEX_CHUNK_BYTES.max(data.len() / rayon::current_num_threads().max(1));
        let chunk_starts: Vec<usize> = (0..data.len()).step_by(chunk_size).collect();
        let chunk_offsets: Vec<Vec<usize>> = chunk_starts
            .into_par_iter()
            .map(|start| {
                let end = (start + chunk_size).min(data.len());
                memchr_iter(b'\n', &data[start..end])
                    .map(|pos| start + pos + 1)
                    .filter(|&next| next < data.len())
                    .collect()
            })
            .collect();

        let mut offsets = Vec::with_capacity(data.len() / 100 + 1);
        offsets.push(0);
        for chunk in chunk_offsets {
            offsets.extend(chunk);
        }
        self.line_offsets = offsets;
    }

    fn line_bytes(&self, line_num: usize) -> &[u8] {
        let data = self.data();
        let start = self.line_offsets[line_num];
        let end = if line_num + 1 < self.line_offsets.len() {
            self.line_offsets[line_num + 1]
        } else {
            data.len()
        };

        let line_bytes = &data[start..end];
        let line_bytes = line_bytes.strip_suffix(b"\n").unwrap_or(line_bytes);
        line_bytes.strip_suffix(b"\r").unwrap_or(line_bytes)
    }
}

impl LineSource for MappedFile {
    fn line_count(&self) -> u64 {
        self.line_offsets.len() as u64
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.data().len() as u64)
    }

    fn get_lines(&self, start: u64, count: u64) -> Result<Vec<String>> {
        let line_count = self.line_count();
        if start >= line_count {
            return Err(LensError::OutOfRange { start, line_count });
        }

        let end = start.saturating_add(count).min(line_count);
        let lines = (start as usize..end as usize)
            .map(|i| String::from_utf8_lossy(self.line_bytes(i)).into_owned())
            .collect();
        Ok(lines)
    }

    /// Matches chunks of lines in parallel, one wave of chunks at a time, and
    /// stops after the first wave that fills `max_results`.
    fn search(&self, pattern: &str, max_results: usize) -> Result<Vec<u64>> {
        let regex = compile_line_matcher(pattern)?;
        let line_count = self.line_offsets.len();
        let wave = SEARCH_CHUNK_LINES * rayon::current_num_threads().max(1);

        let mut results = Vec::new();
        let mut wave_start = 0;
        while wave_start < line_count && results.len() < max_results {
            let wave_end = (wave_start + wave).min(line_count);
            let chunk_starts: Vec<usize> = (wave_start..wave_end).step_by(SEARCH_CHUNK_LINES).collect();
            let hits: Vec<Vec<u64>> = chunk_starts
                .into_par_iter()
                .map(|chunk_start| {
                    let chunk_end = (chunk_start + SEARCH_CHUNK_LINES).min(wave_end);
                    (chunk_start..chunk_end)
                        .filter(|&i| regex.is_match(self.line_bytes(i)))
                        .map(|i| i as u64)
                        .take(max_results)
                        .collect()
                })
                .collect();
            results.extend(hits.into_iter().flatten());
            wave_start = wave_end;
        }
        results.truncate(max_results);
        Ok(results)
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_basic_indexing() {
        let file = create_test_file(b"line1\nline2\nline3\n");
        let mapped = MappedFile::open(file.path()).unwrap();
        assert_eq!(mapped.line_count(), 3);
        assert_eq!(mapped.file_size().unwrap(), 18);
    }

    #[test]
    fn test_no_trailing_newline() {
        let file = create_test_file(b"a\nb");
        let mapped = MappedFile::open(file.path()).unwrap();
        assert_eq!(mapped.get_lines(0, 10).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_get_lines_partial_and_crlf() {
        let file = create_test_file(b"line1\r\nline2\r\nline3\nline4\nline5\n");
        let mapped = MappedFile::open(file.path()).unwrap();

        assert_eq!(mapped.get_lines(1, 2).unwrap(), vec!["line2", "line3"]);
        assert_eq!(mapped.get_lines(0, 1).unwrap(), vec!["line1"]);
        assert_eq!(mapped.get_lines(3, 100).unwrap(), vec!["line4", "line5"]);
    }

    #[test]
    fn test_get_lines_out_of_range() {
        let file = create_test_file(b"only\n");
        let mapped = MappedFile::open(file.path()).unwrap();
        assert!(matches!(
            mapped.get_lines(1, 1),
            Err(LensError::OutOfRange { start: 1, line_count: 1 })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let file = create_test_file(b"ok\n\xff\xfebad\n");
        let mapped = MappedFile::open(file.path()).unwrap();
        let lines = mapped.get_lines(1, 1).unwrap();
        assert!(lines[0].ends_with("bad"));
    }

    #[test]
    fn test_search() {
        let file = create_test_file(
            b"error: something failed\ninfo: all good\nerror: another failure\n",
        );
        let mapped = MappedFile::open(file.path()).unwrap();

        assert_eq!(mapped.search("error", 100).unwrap(), vec![0, 2]);
        assert_eq!(mapped.search("error", 1).unwrap(), vec![0]);
        assert!(matches!(
            mapped.search("(", 100),
            Err(LensError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_search_across_chunks_keeps_line_order() {
        let mut content = Vec::new();
        for i in 0..25_000 {
            if i % 1000 == 999 {
                content.extend_from_slice(format!("{} HIT\n", i).as_bytes());
            } else {
                content.extend_from_slice(format!("{} ok\n", i).as_bytes());
            }
        }
        let file = create_test_file(&content);
        let mapped = MappedFile::open(file.path()).unwrap();
        assert_eq!(mapped.line_count(), 25_000);

        let all = mapped.search("(?i)hit", 100).unwrap();
        assert_eq!(all.len(), 25);
        assert_eq!(all[..3], [999, 1999, 2999]);
        assert_eq!(*all.last().unwrap(), 24_999);

        assert_eq!(mapped.search(r"HIT$", 2).unwrap(), vec![999, 1999]);
        assert_eq!(mapped.get_lines(24_999, 1).unwrap(), vec!["24999 HIT"]);
    }

    #[test]
    fn test_empty_file_has_no_lines() {
        let file = create_test_file(b"");
        let mapped = MappedFile::open(file.path()).unwrap();
        assert_eq!(mapped.line_count(), 0);
        assert!(mapped.get_lines(0, 1).is_err());
    }

    #[test]
    fn test_open_errors() {
        assert!(matches!(
            MappedFile::open("/definitely/not/here.log"),
            Err(LensError::NotFound { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MappedFile::open(dir.path()),
            Err(LensError::UnsupportedFormat { .. })
        ));

        let binary = create_test_file(b"\x7fELF\x00\x00\x01");
        assert!(matches!(
            MappedFile::open(binary.path()),
            Err(LensError::UnsupportedFormat { .. })
        ));
    }
}
