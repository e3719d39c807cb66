use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use regex::bytes::Regex;
use tracing::{debug, warn};

use crate::error::{LensError, Result};
use crate::file_source::LineSource;
use crate::search::compile_line_matcher;

const MAX_RETRIES: usize = 3;
const RETRY_DELAY_MS: u64 = 500;

/// Splits `host:/path` (or `host:~/path`) into its parts. Existing local
/// files and anything else without that shape are treated as local paths.
pub fn parse_remote_spec(spec: &str) -> Option<(&str, &str)> {
    if Path::new(spec).exists() {
        return None;
    }
    let (host, path) = spec.split_once(':')?;
    if host.is_empty() || host.contains('/') || host.contains('\\') {
        return None;
    }
    if !(path.starts_with('/') || path.starts_with('~')) {
        return None;
    }
    Some((host, path))
}

/// 0-based indices of the lines read from `reader` that `matcher` accepts,
/// stopping once `max_results` are found. Line endings are stripped first.
fn scan_matches<R: BufRead>(mut reader: R, matcher: &Regex, max_results: usize) -> Result<Vec<u64>> {
    let mut results = Vec::new();
    let mut line = Vec::new();
    let mut index = 0u64;
    while results.len() < max_results {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let text = line.strip_suffix(b"\n").unwrap_or(&line[..]);
        let text = text.strip_suffix(b"\r").unwrap_or(text);
        if matcher.is_match(text) {
            results.push(index);
        }
        index += 1;
    }
    Ok(results)
}

/// Wraps `value` in single quotes for the remote shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// A file on another machine, read through `ssh` one line span at a time.
pub struct RemoteFile {
    host: String,
    path: String,
    display_name: String,
    line_count: u64,
}

impl RemoteFile {
    pub fn open(host: &str, path: &str) -> Result<Self> {
        let display_name = format!("{}:{}", host, path);
        let line_count = Self::fetch_line_count(host, path)?;

        Ok(Self {
            host: host.to_string(),
            path: path.to_string(),
            display_name,
            line_count,
        })
    }

    fn run(host: &str, remote_cmd: &str) -> Result<Output> {
        Ok(Command::new("ssh").arg(host).arg(remote_cmd).output()?)
    }

    fn classify_failure(host: &str, path: &str, output: &Output) -> LensError {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let location = format!("{}:{}", host, path);
        if stderr.contains("No such file") {
            LensError::NotFound { path: location }
        } else if stderr.contains("Permission denied") {
            LensError::PermissionDenied { path: location }
        } else {
            LensError::Ssh {
                host: host.to_string(),
                message: stderr.trim().to_string(),
            }
        }
    }

    fn parse_number(host: &str, what: &str, stdout: Vec<u8>) -> Result<u64> {
        let stdout = String::from_utf8(stdout)?;
        stdout.trim().parse().map_err(|_| LensError::Ssh {
            host: host.to_string(),
            message: format!("Invalid {}: {}", what, stdout.trim()),
        })
    }

    fn fetch_line_count(host: &str, path: &str) -> Result<u64> {
        Self::with_retry(|| {
            let output = Self::run(host, &format!("wc -l < {}", shell_quote(path)))?;
            if !output.status.success() {
                return Err(Self::classify_failure(host, path, &output));
            }
            Self::parse_number(host, "line count", output.stdout)
        })
    }

    fn with_retry<T, F>(mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(result) => return Ok(result),
                Err(err @ (LensError::NotFound { .. } | LensError::PermissionDenied { .. })) => {
                    return Err(err);
                }
                Err(err) if attempt >= MAX_RETRIES => return Err(err),
                Err(err) => {
                    warn!(attempt, "remote command failed, retrying: {}", err);
                    attempt += 1;
                    thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
            }
        }
    }
}

impl LineSource for RemoteFile {
    fn line_count(&self) -> u64 {
        self.line_count
    }

    fn file_size(&self) -> Result<u64> {
        Self::with_retry(|| {
            let output = Self::run(&self.host, &format!("stat -c%s {}", shell_quote(&self.path)))?;
            if !output.status.success() {
                return Err(Self::classify_failure(&self.host, &self.path, &output));
            }
            Self::parse_number(&self.host, "file size", output.stdout)
        })
    }

    fn get_lines(&self, start: u64, count: u64) -> Result<Vec<String>> {
        if start >= self.line_count {
            return Err(LensError::OutOfRange {
                start,
                line_count: self.line_count,
            });
        }
        let count = count.min(self.line_count - start);
        // tail -n +N is 1-based
        let cmd = format!(
            "tail -n +{} {} | head -n {}",
            start + 1,
            shell_quote(&self.path),
            count
        );

        Self::with_retry(|| {
            let output = Self::run(&self.host, &cmd)?;
            if !output.status.success() {
                return Err(Self::classify_failure(&self.host, &self.path, &output));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(stdout.lines().map(str::to_string).collect())
        })
    }

    /// Streams the file over ssh and matches locally, so patterns behave as
    /// they do for local files.
    fn search(&self, pattern: &str, max_results: usize) -> Result<Vec<u64>> {
        let matcher = compile_line_matcher(pattern)?;
        let cmd = format!("cat -- {}", shell_quote(&self.path));

        Self::with_retry(|| {
            let mut child = Command::new("ssh")
                .arg(&self.host)
                .arg(&cmd)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()?;
            let stdout = child.stdout.take().ok_or_else(|| LensError::Ssh {
                host: self.host.clone(),
                message: "no output stream".to_string(),
            })?;
            let scanned = scan_matches(BufReader::new(stdout), &matcher, max_results);

            let read_to_end = matches!(&scanned, Ok(results) if results.len() < max_results);
            if !read_to_end {
                debug!(host = %self.host, max_results, "stopping remote transfer");
                // The child may already have exited on its own.
                let _ = child.kill();
            }
            let output = child.wait_with_output()?;
            let results = scanned?;
            if read_to_end && !output.status.success() {
                return Err(Self::classify_failure(&self.host, &self.path, &output));
            }
            Ok(results)
        })
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}
