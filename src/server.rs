use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::app::ViewerEvent;
use crate::commands::{parse_command, CommandResponse, LensCommand};

pub struct CommandRequest {
    pub command: LensCommand,
    pub response_tx: mpsc::Sender<CommandResponse>,
}

const MAX_PORT_ATTEMPTS: u16 = 100;

fn try_bind_port(starting_port: u16) -> std::io::Result<(TcpListener, u16)> {
    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = starting_port.saturating_add(offset);
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => return Ok((listener, port)),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AddrInUse,
        format!(
            "could not find available port in range {}-{}",
            starting_port,
            starting_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
        ),
    ))
}

/// Accepts clients on a background thread and forwards their commands to the
/// control thread. Returns the port actually bound.
pub fn start_server(
    port: u16,
    events: async_channel::Sender<ViewerEvent>,
) -> std::io::Result<(JoinHandle<()>, u16)> {
    let (listener, actual_port) = try_bind_port(port)?;
    info!("loglens server listening on 127.0.0.1:{}", actual_port);

    let handle = thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let events = events.clone();
                    thread::spawn(move || {
                        handle_client(stream, events);
                    });
                }
                Err(e) => {
                    warn!("Connection error: {}", e);
                }
            }
        }
    });

    Ok((handle, actual_port))
}

fn dispatch(line: &str, events: &async_channel::Sender<ViewerEvent>) -> CommandResponse {
    let command = match parse_command(line) {
        Ok(cmd) => cmd,
        Err(e) => return CommandResponse::Error(e),
    };

    let (response_tx, response_rx) = mpsc::channel();
    let request = CommandRequest {
        command,
        response_tx,
    };
    if events.send_blocking(ViewerEvent::Command(request)).is_err() {
        return CommandResponse::Error("viewer not available".to_string());
    }
    response_rx
        .recv()
        .unwrap_or_else(|_| CommandResponse::Error("no response from viewer".to_string()))
}

fn handle_client(mut stream: TcpStream, events: async_channel::Sender<ViewerEvent>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    debug!(%peer, "client connected");

    let reader = match stream.try_clone() {
        Ok(s) => BufReader::new(s),
        Err(e) => {
            warn!("Failed to clone stream for {}: {}", peer, e);
            return;
        }
    };

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Read error from {}: {}", peer, e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = dispatch(&line, &events);
        let response_str = format!("{}\n", response);
        if let Err(e) = stream.write_all(response_str.as_bytes()) {
            warn!("Write error to {}: {}", peer, e);
            break;
        }
        if let Err(e) = stream.flush() {
            warn!("Flush error to {}: {}", peer, e);
            break;
        }
    }
    debug!(%peer, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_answered_locally() {
        let (tx, rx) = async_channel::unbounded();
        let response = dispatch("bogus", &tx);
        assert_eq!(response.to_string(), "ERROR unknown command: bogus");
        assert!(rx.is_empty());
    }

    #[test]
    fn test_commands_round_trip_through_event_channel() {
        let (tx, rx) = async_channel::unbounded();
        let viewer = thread::spawn(move || {
            if let Ok(ViewerEvent::Command(request)) = rx.recv_blocking() {
                assert_eq!(request.command, LensCommand::Size);
                request
                    .response_tx
                    .send(CommandResponse::Ok(Some("1234".to_string())))
                    .unwrap();
            }
        });
        assert_eq!(dispatch("size", &tx).to_string(), "OK 1234");
        viewer.join().unwrap();
    }

    #[test]
    fn test_closed_viewer() {
        let (tx, rx) = async_channel::unbounded::<ViewerEvent>();
        drop(rx);
        assert_eq!(
            dispatch("top", &tx).to_string(),
            "ERROR viewer not available"
        );
    }
}
