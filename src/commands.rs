use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LensCommand {
    Open { path: String },
    Close,
    /// 1-based line number, centered and selected.
    Goto { line: usize },
    Scroll { offset: u64 },
    Resize { height: u32 },
    Measure { line: usize, height: u32 },
    Top,
    Bottom,
    Lines,
    Size,
    Show,
    Select,
    Search { pattern: String },
    Next,
    Prev,
    Sql { query: String },
    Result,
    /// 1-based row of the last query result.
    Row { row: usize },
    Recent,
}

#[derive(Debug, Clone)]
pub enum CommandResponse {
    Ok(Option<String>),
    Lines(Vec<String>),
    Error(String),
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResponse::Ok(None) => write!(f, "OK"),
            CommandResponse::Ok(Some(msg)) => write!(f, "OK {}", msg),
            CommandResponse::Lines(lines) => {
                write!(f, "OK {}", lines.len())?;
                for line in lines {
                    write!(f, "\n{}", line)?;
                }
                Ok(())
            }
            CommandResponse::Error(msg) => write!(f, "ERROR {}", msg),
        }
    }
}

fn no_args(parts: &[&str], usage: &str, command: LensCommand) -> Result<LensCommand, String> {
    if parts.len() != 1 {
        return Err(format!("usage: {}", usage));
    }
    Ok(command)
}

fn one_based(value: &str, what: &str) -> Result<usize, String> {
    let n: usize = value
        .parse()
        .map_err(|_| format!("invalid {}: {}", what, value))?;
    if n == 0 {
        return Err(format!("{} must be >= 1", what));
    }
    Ok(n)
}

/// Everything after the command word, with surrounding whitespace removed.
fn rest<'a>(input: &'a str, command: &str) -> &'a str {
    input[command.len()..].trim()
}

pub fn parse_command(input: &str) -> Result<LensCommand, String> {
    let input = input.trim();
    let parts: Vec<&str> = input.split_whitespace().collect();

    if parts.is_empty() {
        return Err("empty command".to_string());
    }

    match parts[0].to_lowercase().as_str() {
        "open" => {
            let path = rest(input, parts[0]);
            if path.is_empty() {
                return Err("usage: open <path>".to_string());
            }
            Ok(LensCommand::Open {
                path: path.to_string(),
            })
        }
        "close" => no_args(&parts, "close", LensCommand::Close),
        "goto" => {
            if parts.len() != 2 {
                return Err("usage: goto <line_number>".to_string());
            }
            let line = one_based(parts[1], "line number")?;
            Ok(LensCommand::Goto { line })
        }
        "scroll" => {
            if parts.len() != 2 {
                return Err("usage: scroll <offset>".to_string());
            }
            let offset = parts[1]
                .parse()
                .map_err(|_| format!("invalid offset: {}", parts[1]))?;
            Ok(LensCommand::Scroll { offset })
        }
        "resize" => {
            if parts.len() != 2 {
                return Err("usage: resize <height>".to_string());
            }
            let height = parts[1]
                .parse()
                .map_err(|_| format!("invalid height: {}", parts[1]))?;
            Ok(LensCommand::Resize { height })
        }
        "measure" => {
            if parts.len() != 3 {
                return Err("usage: measure <line_number> <height>".to_string());
            }
            let line = one_based(parts[1], "line number")?;
            let height = u32::try_from(one_based(parts[2], "height")?)
                .map_err(|_| format!("invalid height: {}", parts[2]))?;
            Ok(LensCommand::Measure { line, height })
        }
        "top" => no_args(&parts, "top", LensCommand::Top),
        "bottom" => no_args(&parts, "bottom", LensCommand::Bottom),
        "lines" => no_args(&parts, "lines", LensCommand::Lines),
        "size" => no_args(&parts, "size", LensCommand::Size),
        "show" => no_args(&parts, "show", LensCommand::Show),
        "select" => no_args(&parts, "select", LensCommand::Select),
        "search" => {
            let pattern = rest(input, parts[0]);
            if pattern.is_empty() {
                return Err("usage: search <pattern>".to_string());
            }
            Ok(LensCommand::Search {
                pattern: pattern.to_string(),
            })
        }
        "next" => no_args(&parts, "next", LensCommand::Next),
        "prev" => no_args(&parts, "prev", LensCommand::Prev),
        "sql" => {
            let query = rest(input, parts[0]);
            if query.is_empty() {
                return Err("usage: sql <query>".to_string());
            }
            Ok(LensCommand::Sql {
                query: query.to_string(),
            })
        }
        "result" => no_args(&parts, "result", LensCommand::Result),
        "row" => {
            if parts.len() != 2 {
                return Err("usage: row <row_number>".to_string());
            }
            let row = one_based(parts[1], "row number")?;
            Ok(LensCommand::Row { row })
        }
        "recent" => no_args(&parts, "recent", LensCommand::Recent),
        cmd => Err(format!("unknown command: {}", cmd)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_goto() {
        assert_eq!(parse_command("goto 100"), Ok(LensCommand::Goto { line: 100 }));
        assert_eq!(parse_command("GOTO 1"), Ok(LensCommand::Goto { line: 1 }));
        assert_eq!(parse_command("  goto   42  "), Ok(LensCommand::Goto { line: 42 }));
        assert!(parse_command("goto 0").is_err());
        assert!(parse_command("goto -3").is_err());
    }

    #[test]
    fn test_parse_no_arg_commands() {
        assert_eq!(parse_command("lines"), Ok(LensCommand::Lines));
        assert_eq!(parse_command("TOP"), Ok(LensCommand::Top));
        assert_eq!(parse_command("  bottom  "), Ok(LensCommand::Bottom));
        assert_eq!(parse_command("Next"), Ok(LensCommand::Next));
        assert_eq!(parse_command("prev"), Ok(LensCommand::Prev));
        assert_eq!(parse_command("show"), Ok(LensCommand::Show));
        assert_eq!(parse_command("recent"), Ok(LensCommand::Recent));
        assert!(parse_command("lines extra").is_err());
        assert!(parse_command("size extra").is_err());
    }

    #[test]
    fn test_parse_text_arguments_keep_spaces() {
        assert_eq!(
            parse_command("open /var/log/my app.log"),
            Ok(LensCommand::Open {
                path: "/var/log/my app.log".to_string()
            })
        );
        assert_eq!(
            parse_command("search  error|fatal  "),
            Ok(LensCommand::Search {
                pattern: "error|fatal".to_string()
            })
        );
        assert_eq!(
            parse_command("SQL SELECT * FROM logs LIMIT 3"),
            Ok(LensCommand::Sql {
                query: "SELECT * FROM logs LIMIT 3".to_string()
            })
        );
        assert!(parse_command("open").is_err());
        assert!(parse_command("search   ").is_err());
    }

    #[test]
    fn test_parse_numeric_commands() {
        assert_eq!(parse_command("scroll 1200"), Ok(LensCommand::Scroll { offset: 1200 }));
        assert_eq!(parse_command("resize 50"), Ok(LensCommand::Resize { height: 50 }));
        assert_eq!(
            parse_command("measure 10 3"),
            Ok(LensCommand::Measure { line: 10, height: 3 })
        );
        assert_eq!(parse_command("row 2"), Ok(LensCommand::Row { row: 2 }));
        assert!(parse_command("row 0").is_err());
        assert!(parse_command("measure 10").is_err());
        assert_eq!(
            parse_command("measure 10 5000000000"),
            Err("invalid height: 5000000000".to_string())
        );
        assert!(parse_command("scroll abc").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("").is_err());
        assert!(parse_command("goto").is_err());
        assert!(parse_command("goto abc").is_err());
        assert!(parse_command("unknown 123").is_err());
    }

    #[test]
    fn test_response_format() {
        assert_eq!(format!("{}", CommandResponse::Ok(None)), "OK");
        assert_eq!(
            format!("{}", CommandResponse::Ok(Some("done".to_string()))),
            "OK done"
        );
        assert_eq!(
            format!("{}", CommandResponse::Error("failed".to_string())),
            "ERROR failed"
        );
        assert_eq!(
            format!(
                "{}",
                CommandResponse::Lines(vec!["a".to_string(), "b".to_string()])
            ),
            "OK 2\na\nb"
        );
        assert_eq!(format!("{}", CommandResponse::Lines(Vec::new())), "OK 0");
    }
}
