use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCategory {
    Error,
    Warning,
    Debug,
    Info,
    None,
}

impl LineCategory {
    /// Fixed-width tag used by the text renderer.
    pub fn tag(self) -> &'static str {
        match self {
            LineCategory::Error => "ERR ",
            LineCategory::Warning => "WARN",
            LineCategory::Debug => "DBG ",
            LineCategory::Info => "INFO",
            LineCategory::None => "    ",
        }
    }
}

/// Checked in order; the first hit wins.
static TEXT_PATTERNS: LazyLock<[(LineCategory, Regex); 4]> = LazyLock::new(|| {
    let re = |pattern: &str| Regex::new(pattern).expect("classifier patterns are valid");
    [
        (
            LineCategory::Error,
            re(r"(?i)\b(error|err|fatal|critical|crit|panic|exception|failed|failure)\b"),
        ),
        (LineCategory::Warning, re(r"(?i)\b(warn|warning)\b")),
        (LineCategory::Debug, re(r"(?i)\b(debug|trace)\b")),
        (LineCategory::Info, re(r"(?i)\b(info|notice)\b")),
    ]
});

fn level_name(level: &str) -> Option<LineCategory> {
    match level.to_ascii_lowercase().as_str() {
        "error" | "err" | "fatal" | "critical" | "crit" | "panic" | "emerg" | "alert" => {
            Some(LineCategory::Error)
        }
        "warn" | "warning" => Some(LineCategory::Warning),
        "debug" | "trace" => Some(LineCategory::Debug),
        "info" | "information" | "notice" => Some(LineCategory::Info),
        _ => None,
    }
}

/// Numeric levels as emitted by bunyan/pino style loggers.
fn level_number(level: u64) -> Option<LineCategory> {
    match level {
        0..=20 => Some(LineCategory::Debug),
        21..=30 => Some(LineCategory::Info),
        31..=40 => Some(LineCategory::Warning),
        41..=60 => Some(LineCategory::Error),
        _ => None,
    }
}

fn structured_level(content: &str) -> Option<LineCategory> {
    let trimmed = content.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    let record: Value = serde_json::from_str(trimmed).ok()?;
    match record.get("level")? {
        Value::String(level) => level_name(level),
        Value::Number(level) => level.as_u64().and_then(level_number),
        _ => None,
    }
}

/// Classifies a single line for highlighting. A recognised `level` field in a
/// JSON record wins over any keyword found in the text.
pub fn classify(content: &str) -> LineCategory {
    if let Some(category) = structured_level(content) {
        return category;
    }
    TEXT_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(content))
        .map(|(category, _)| *category)
        .unwrap_or(LineCategory::None)
}
