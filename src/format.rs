use std::fmt;

use serde::{Deserialize, Serialize};

/// How many leading lines are sampled.
pub const SAMPLE_LINES: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    PlainText,
    Ndjson,
    Csv,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::PlainText => "PlainText",
            FileFormat::Ndjson => "Ndjson",
            FileFormat::Csv => "Csv",
        };
        f.write_str(name)
    }
}

/// Guesses the format from the first lines of a file.
pub fn detect_format<S: AsRef<str>>(first_lines: &[S]) -> FileFormat {
    if first_lines.is_empty() {
        return FileFormat::PlainText;
    }

    let json_lines = first_lines
        .iter()
        .filter(|line| {
            let trimmed = line.as_ref().trim();
            trimmed.starts_with('{') && trimmed.ends_with('}')
        })
        .count();
    if json_lines > first_lines.len() / 2 {
        return FileFormat::Ndjson;
    }

    let comma_counts: Vec<usize> = first_lines
        .iter()
        .map(|line| line.as_ref().matches(',').count())
        .collect();
    if comma_counts.len() > 1 {
        let first_count = comma_counts[0];
        if first_count > 0 && comma_counts.iter().all(|&c| c == first_count) {
            return FileFormat::Csv;
        }
    }

    FileFormat::PlainText
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_ndjson() {
        let lines = [
            r#"{"level":"info","message":"test1"}"#,
            r#"{"level":"error","message":"test2"}"#,
            r#"{"level":"info","message":"test3"}"#,
        ];
        assert_eq!(detect_format(&lines), FileFormat::Ndjson);
    }

    #[test]
    fn test_detect_plain_text() {
        let lines = [
            "2024-01-01 INFO Starting application",
            "2024-01-01 ERROR Something went wrong",
        ];
        assert_eq!(detect_format(&lines), FileFormat::PlainText);
        assert_eq!(detect_format::<&str>(&[]), FileFormat::PlainText);
    }

    #[test]
    fn test_detect_csv() {
        let lines = [
            "timestamp,level,message",
            "2024-01-01,INFO,test1",
            "2024-01-01,ERROR,test2",
        ];
        assert_eq!(detect_format(&lines), FileFormat::Csv);
    }

    #[test]
    fn test_single_line_with_commas_is_not_csv() {
        assert_eq!(detect_format(&["a,b,c"]), FileFormat::PlainText);
        assert_eq!(FileFormat::Ndjson.to_string(), "Ndjson");
    }
}
