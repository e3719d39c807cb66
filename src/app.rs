use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, warn};

use crate::backend::{Backend, FileInfo};
use crate::commands::{CommandResponse, LensCommand};
use crate::config::ViewerConfig;
use crate::error::{LensError, Result};
use crate::query::{QueryResult, QueryState};
use crate::recent::RecentFiles;
use crate::scheduler::{FetchCompletion, FetchRequest, Fetcher};
use crate::search::SearchDirection;
use crate::server::CommandRequest;
use crate::viewer::Viewer;
use crate::viewport::{Align, VisibleRange};

const FETCH_WORKERS: usize = 2;

/// Everything the control thread reacts to, in arrival order.
pub enum ViewerEvent {
    Command(CommandRequest),
    FetchDone(FetchCompletion),
    QueryDone {
        ticket: u64,
        result: Result<QueryResult>,
    },
}

/// Converts a 1-based position from a command into a 0-based index.
fn zero_based<T: TryFrom<usize>>(position: usize, what: &str) -> std::result::Result<T, CommandResponse> {
    let index = position
        .checked_sub(1)
        .ok_or_else(|| CommandResponse::Error(format!("{} must be >= 1", what)))?;
    T::try_from(index)
        .map_err(|_| CommandResponse::Error(format!("{} out of range: {}", what, position)))
}

/// Runs `getLines` calls on a small pool of worker threads and posts each
/// completion back to the control thread.
pub struct ThreadFetcher {
    requests: async_channel::Sender<FetchRequest>,
}

impl ThreadFetcher {
    pub fn spawn(backend: Arc<Backend>, events: async_channel::Sender<ViewerEvent>) -> Self {
        let (requests, queue) = async_channel::unbounded::<FetchRequest>();
        for worker in 0..FETCH_WORKERS {
            let queue = queue.clone();
            let backend = backend.clone();
            let events = events.clone();
            thread::spawn(move || {
                while let Ok(request) = queue.recv_blocking() {
                    let result = backend.get_lines(request.start, request.count);
                    let completion = FetchCompletion { request, result };
                    if events.send_blocking(ViewerEvent::FetchDone(completion)).is_err() {
                        break;
                    }
                }
                debug!(worker, "fetch worker exiting");
            });
        }
        Self { requests }
    }
}

impl Fetcher for ThreadFetcher {
    fn fetch(&self, request: FetchRequest) {
        // Unbounded, so this only fails once every worker has exited.
        if self.requests.try_send(request).is_err() {
            warn!(start = request.start, "fetch workers unavailable, dropping request");
        }
    }
}

pub struct App {
    config: ViewerConfig,
    backend: Arc<Backend>,
    viewer: Viewer,
    recent: RecentFiles,
    events_tx: async_channel::Sender<ViewerEvent>,
    events_rx: async_channel::Receiver<ViewerEvent>,
}

impl App {
    pub fn new(config: ViewerConfig, recent: RecentFiles) -> Self {
        let backend = Arc::new(Backend::new());
        let (events_tx, events_rx) = async_channel::unbounded();
        let fetcher = ThreadFetcher::spawn(backend.clone(), events_tx.clone());
        let viewer = Viewer::new(&config, Box::new(fetcher));
        Self {
            config,
            backend,
            viewer,
            recent,
            events_tx,
            events_rx,
        }
    }

    pub fn sender(&self) -> async_channel::Sender<ViewerEvent> {
        self.events_tx.clone()
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn open(&mut self, path: &str) -> Result<FileInfo> {
        let info = self.backend.open(path, &|p| {
            info!(phase = %p.phase, progress = p.progress, "{}", p.message);
        })?;
        self.viewer.on_source_opened(info.clone());
        self.recent.add(path);
        if let Err(e) = self.recent.save() {
            warn!("could not save recent files: {}", e);
        }
        Ok(info)
    }

    pub fn close(&mut self) {
        self.backend.close();
        self.viewer.on_source_closed();
    }

    /// Processes events for the lifetime of the process.
    pub fn run(mut self) {
        while self.process_next() {}
        info!("event channel closed, shutting down");
    }

    /// Blocks for one event and handles it. Returns false once the channel is closed.
    pub fn process_next(&mut self) -> bool {
        match self.events_rx.recv_blocking() {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(_) => false,
        }
    }

    pub fn handle_event(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::Command(request) => {
                let response = self.execute(request.command);
                if request.response_tx.send(response).is_err() {
                    debug!("client went away before the response was sent");
                }
            }
            ViewerEvent::FetchDone(completion) => {
                let outcome = self.viewer.on_fetch_complete(completion);
                debug!(?outcome, "fetch completed");
            }
            ViewerEvent::QueryDone { ticket, result } => {
                if let Err(e) = &result {
                    warn!(ticket, "query failed: {}", e);
                }
                self.viewer.finish_query(ticket, result);
            }
        }
    }

    fn spawn_query(&self, ticket: u64, query: String) {
        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        thread::spawn(move || {
            let result = backend.execute_sql(&query);
            if events
                .send_blocking(ViewerEvent::QueryDone { ticket, result })
                .is_err()
            {
                debug!(ticket, "viewer gone before query finished");
            }
        });
    }

    fn range_response(&self, result: Result<VisibleRange>, what: &str) -> CommandResponse {
        match result {
            Ok(range) => CommandResponse::Ok(Some(range.to_string())),
            Err(e) => self.error_response(what, e),
        }
    }

    fn error_response(&self, what: &str, err: LensError) -> CommandResponse {
        self.viewer.report(what, &err);
        CommandResponse::Error(err.to_string())
    }

    fn search_response(&self, result: Result<Option<u64>>) -> CommandResponse {
        match result {
            Ok(Some(index)) => {
                let position = self.viewer.search().position().map_or(0, |p| p + 1);
                CommandResponse::Ok(Some(format!(
                    "{} {}/{}",
                    index + 1,
                    position,
                    self.viewer.search().results().len()
                )))
            }
            Ok(None) => CommandResponse::Ok(Some("no matches".to_string())),
            Err(e) => self.error_response("search", e),
        }
    }

    fn require_source(&self) -> Result<()> {
        if self.viewer.source().is_none() {
            return Err(LensError::NoSourceOpen);
        }
        Ok(())
    }

    pub fn execute(&mut self, command: LensCommand) -> CommandResponse {
        match command {
            LensCommand::Open { path } => match self.open(&path) {
                Ok(info) => CommandResponse::Ok(Some(format!(
                    "{} lines {} bytes {}",
                    info.line_count, info.size, info.format
                ))),
                Err(e) => {
                    error!(path = %path, "open failed: {}", e);
                    CommandResponse::Error(e.to_string())
                }
            },
            LensCommand::Close => {
                self.close();
                CommandResponse::Ok(None)
            }
            LensCommand::Goto { line } => {
                let index = match zero_based::<i64>(line, "line number") {
                    Ok(index) => index,
                    Err(response) => return response,
                };
                let result = self.viewer.select_and_reveal(index);
                self.range_response(result, "goto")
            }
            LensCommand::Scroll { offset } => {
                self.viewer.on_scroll(offset);
                CommandResponse::Ok(Some(self.viewer.visible_range().to_string()))
            }
            LensCommand::Resize { height } => {
                self.viewer.resize(height);
                CommandResponse::Ok(Some(self.viewer.visible_range().to_string()))
            }
            LensCommand::Measure { line, height } => {
                let index = match zero_based::<u64>(line, "line number") {
                    Ok(index) => index,
                    Err(response) => return response,
                };
                let result = self.viewer.remeasure(index, height);
                self.range_response(result, "measure")
            }
            LensCommand::Top => {
                let result = self.viewer.scroll_to_index(0, Align::Start);
                self.range_response(result, "top")
            }
            LensCommand::Bottom => {
                let last = self.viewer.viewport().line_count() as i64 - 1;
                let result = self.viewer.scroll_to_index(last, Align::End);
                self.range_response(result, "bottom")
            }
            LensCommand::Lines => {
                CommandResponse::Ok(Some(self.viewer.viewport().line_count().to_string()))
            }
            LensCommand::Size => match self.viewer.source() {
                Some(info) => CommandResponse::Ok(Some(info.size.to_string())),
                None => CommandResponse::Error(LensError::NoSourceOpen.to_string()),
            },
            LensCommand::Show => CommandResponse::Lines(self.viewer.render()),
            LensCommand::Select => match self.viewer.selected() {
                Some(index) => CommandResponse::Ok(Some((index + 1).to_string())),
                None => CommandResponse::Ok(None),
            },
            LensCommand::Search { pattern } => {
                let results = self
                    .require_source()
                    .and_then(|_| self.backend.search(&pattern, self.config.search_max_results));
                let result = self.viewer.apply_search(&pattern, results);
                self.search_response(result)
            }
            LensCommand::Next => {
                let result = self.viewer.search_step(SearchDirection::Forward);
                self.search_response(result)
            }
            LensCommand::Prev => {
                let result = self.viewer.search_step(SearchDirection::Backward);
                self.search_response(result)
            }
            LensCommand::Sql { query } => {
                if let Err(e) = self.require_source() {
                    return self.error_response("sql", e);
                }
                match self.viewer.begin_query(&query) {
                    Ok(ticket) => {
                        self.spawn_query(ticket, query);
                        CommandResponse::Ok(Some(format!("running #{}", ticket)))
                    }
                    Err(e) => self.error_response("sql", e),
                }
            }
            LensCommand::Result => match self.viewer.query_state() {
                QueryState::Idle => CommandResponse::Ok(Some("idle".to_string())),
                QueryState::Running { ticket, .. } => {
                    CommandResponse::Ok(Some(format!("running #{}", ticket)))
                }
                QueryState::Succeeded(result) => {
                    let mut lines = vec![result.columns.join("\t")];
                    lines.extend(result.rows.iter().map(|row| {
                        row.iter()
                            .map(|cell| match cell {
                                serde_json::Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join("\t")
                    }));
                    CommandResponse::Lines(lines)
                }
                QueryState::Failed(message) => {
                    let response = CommandResponse::Error(message.clone());
                    self.viewer.acknowledge_query();
                    response
                }
            },
            LensCommand::Row { row } => {
                let index = match zero_based::<usize>(row, "row") {
                    Ok(index) => index,
                    Err(response) => return response,
                };
                let result = self.viewer.activate_row(index);
                self.range_response(result, "row")
            }
            LensCommand::Recent => CommandResponse::Lines(self.recent.entries().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn log_file(lines: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..lines {
            if i % 100 == 7 {
                writeln!(file, "ERROR request {} failed", i).unwrap();
            } else {
                writeln!(file, "INFO request {} ok", i).unwrap();
            }
        }
        file.flush().unwrap();
        file
    }

    fn app() -> App {
        let config = ViewerConfig {
            viewport_height: 5,
            ..ViewerConfig::default()
        };
        App::new(config, RecentFiles::in_memory())
    }

    fn ok_message(response: CommandResponse) -> String {
        match response {
            CommandResponse::Ok(Some(msg)) => msg,
            other => panic!("unexpected response: {}", other),
        }
    }

    #[test]
    fn test_open_then_show_after_fetch() {
        let file = log_file(1000);
        let mut app = app();
        let path = file.path().to_str().unwrap().to_string();

        let msg = ok_message(app.execute(LensCommand::Open { path: path.clone() }));
        assert!(msg.starts_with("1000 lines"));

        assert!(app.process_next());
        match app.execute(LensCommand::Show) {
            CommandResponse::Lines(rows) => {
                assert_eq!(rows.len(), 5);
                assert!(rows[0].ends_with("INFO INFO request 0 ok"));
                assert!(rows[2].contains("│ INFO INFO request 2 ok"));
            }
            other => panic!("unexpected response: {}", other),
        }
        assert_eq!(
            app.execute(LensCommand::Recent).to_string(),
            format!("OK 1\n{}", path)
        );
    }

    #[test]
    fn test_search_and_navigate() {
        let file = log_file(1000);
        let mut app = app();
        app.open(file.path().to_str().unwrap()).unwrap();

        let msg = ok_message(app.execute(LensCommand::Search {
            pattern: "^ERROR".to_string(),
        }));
        assert_eq!(msg, "8 1/10");
        assert_eq!(ok_message(app.execute(LensCommand::Next)), "108 2/10");
        assert_eq!(ok_message(app.execute(LensCommand::Prev)), "8 1/10");
        assert_eq!(ok_message(app.execute(LensCommand::Prev)), "908 10/10");
        assert_eq!(ok_message(app.execute(LensCommand::Select)), "908");

        let response = app.execute(LensCommand::Search {
            pattern: "(".to_string(),
        });
        assert!(response.to_string().starts_with("ERROR invalid regex"));
        assert_eq!(ok_message(app.execute(LensCommand::Select)), "908");
    }

    #[test]
    fn test_sql_row_selects_line() {
        let file = log_file(1000);
        let mut app = app();
        app.open(file.path().to_str().unwrap()).unwrap();

        let msg = ok_message(app.execute(LensCommand::Sql {
            query: "SELECT line_number, line FROM logs WHERE regex_match(line, 'request 4[0-9] ') LIMIT 3"
                .to_string(),
        }));
        assert_eq!(msg, "running #1");
        assert!(app
            .execute(LensCommand::Sql {
                query: "SELECT * FROM logs".to_string()
            })
            .to_string()
            .starts_with("ERROR"));

        while matches!(app.viewer().query_state(), QueryState::Running { .. }) {
            assert!(app.process_next());
        }
        match app.execute(LensCommand::Result) {
            CommandResponse::Lines(rows) => {
                assert_eq!(rows[0], "line_number\tline");
                assert_eq!(rows[1], "41\tINFO request 40 ok");
                assert_eq!(rows.len(), 4);
            }
            other => panic!("unexpected response: {}", other),
        }

        ok_message(app.execute(LensCommand::Row { row: 1 }));
        assert_eq!(app.viewer().selected(), Some(40));
        assert!(app.execute(LensCommand::Row { row: 9 }).to_string().starts_with("ERROR"));
    }

    #[test]
    fn test_out_of_range_goto_reports_and_keeps_selection() {
        let file = log_file(10);
        let mut app = app();
        app.open(file.path().to_str().unwrap()).unwrap();

        ok_message(app.execute(LensCommand::Goto { line: 3 }));
        let response = app.execute(LensCommand::Goto { line: 11 });
        assert_eq!(response.to_string(), "ERROR Index 10 outside of 0..10");
        assert_eq!(ok_message(app.execute(LensCommand::Select)), "3");
    }

    #[test]
    fn test_positions_below_one_or_too_large_are_rejected() {
        let file = log_file(10);
        let mut app = app();
        app.open(file.path().to_str().unwrap()).unwrap();
        ok_message(app.execute(LensCommand::Goto { line: 3 }));

        assert_eq!(
            app.execute(LensCommand::Goto { line: 0 }).to_string(),
            "ERROR line number must be >= 1"
        );
        assert_eq!(
            app.execute(LensCommand::Measure { line: 0, height: 2 }).to_string(),
            "ERROR line number must be >= 1"
        );
        assert_eq!(
            app.execute(LensCommand::Row { row: 0 }).to_string(),
            "ERROR row must be >= 1"
        );
        assert!(app
            .execute(LensCommand::Goto { line: usize::MAX })
            .to_string()
            .starts_with("ERROR"));
        assert_eq!(ok_message(app.execute(LensCommand::Select)), "3");
    }

    #[test]
    fn test_commands_without_source() {
        let mut app = app();
        assert_eq!(app.execute(LensCommand::Lines).to_string(), "OK 0");
        assert_eq!(app.execute(LensCommand::Show).to_string(), "OK 0");
        assert_eq!(app.execute(LensCommand::Size).to_string(), "ERROR No file open");
        assert_eq!(
            app.execute(LensCommand::Search {
                pattern: "x".to_string()
            })
            .to_string(),
            "ERROR No file open"
        );
        assert!(app
            .execute(LensCommand::Open {
                path: "/no/such/file.log".to_string()
            })
            .to_string()
            .starts_with("ERROR File not found"));
    }

    #[test]
    fn test_close_then_late_fetch_is_ignored() {
        let file = log_file(100);
        let mut app = app();
        app.open(file.path().to_str().unwrap()).unwrap();
        assert_eq!(app.execute(LensCommand::Close).to_string(), "OK");

        assert!(app.process_next());
        assert_eq!(app.viewer().controller().scheduler().cached_lines(), 0);
        assert_eq!(app.execute(LensCommand::Lines).to_string(), "OK 0");
    }
}
