//! HTTP transport layer.
//!
//! A deliberately small HTTP/1.1 server: one spawned task per connection,
//! GET-only routes, plain-text responses, `Connection: close`. The transport
//! validates inputs, calls board operations, and maps their failures onto
//! status codes; it carries no game logic of its own.
//!
//! Routes:
//! - `GET /look/<player>`
//! - `GET /flip/<player>/<row>,<col>`
//! - `GET /replace/<player>/<from>/<to>`
//! - `GET /watch/<player>` (long-poll; responds after the next board change)
//! - `GET /reset/<player>`
//!
//! Game-rule failures map to 409, validation failures to 400. Every
//! response allows cross-origin access so a browser client can be hosted
//! anywhere.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::board::Board;
use crate::card;
use crate::error::BoardError;
use crate::player;

/// HTTP front end for a shared [`Board`].
pub struct Server {
    listener: TcpListener,
    board: Arc<Board>,
}

impl Server {
    /// Binds the listening socket. Port 0 picks a free port.
    pub async fn bind(host: &str, port: u16, board: Arc<Board>) -> io::Result<Server> {
        let listener = TcpListener::bind((host, port)).await?;
        info!("listening on http://{}", listener.local_addr()?);
        Ok(Server { listener, board })
    }

    /// The bound address (differs from the requested one when port 0 was
    /// asked for).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener fails.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let board = Arc::clone(&self.board);
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, board).await {
                    debug!("connection from {} dropped: {}", addr, err);
                }
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, board: Arc<Board>) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    reader.read_line(&mut line).await?;
    let request_line = line.trim_end().to_string();

    // Drain request headers; none of them affect these routes.
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line.trim_end().is_empty() {
            break;
        }
    }

    debug!("request: {}", request_line);
    match handle_request(&request_line, &mut reader, &board).await {
        Some((status, body)) => write_response(&mut write_half, status, &body).await,
        // The client went away while a long-poll was pending.
        None => Ok(()),
    }
}

/// Routes one request. Returns `None` when the client disconnected during a
/// long-poll, in which case the watch future is dropped without side
/// effects and there is nobody left to answer.
async fn handle_request(
    request_line: &str,
    reader: &mut BufReader<OwnedReadHalf>,
    board: &Board,
) -> Option<(u16, String)> {
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    if method != "GET" {
        return Some((405, "only GET is supported".to_string()));
    }
    let path = target.split('?').next().unwrap_or(target);
    let Some(segments) = decode_path(path) else {
        return Some((400, "malformed percent-encoding in path".to_string()));
    };
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    let response = match segments.as_slice() {
        ["look", player] => match require_player(player) {
            Ok(()) => (200, board.look(player).await),
            Err(resp) => resp,
        },
        ["flip", player, location] => match require_player(player) {
            Ok(()) => match parse_location(location) {
                Some((row, col)) => match board.flip(player, row, col).await {
                    Ok(()) => (200, board.look(player).await),
                    Err(err) => error_response(err),
                },
                None => (
                    400,
                    format!("invalid location {:?}, expected ROW,COL", location),
                ),
            },
            Err(resp) => resp,
        },
        ["replace", player, from, to] => match require_player(player) {
            Ok(()) => {
                if !card::is_valid_value(from) || !card::is_valid_value(to) {
                    (
                        400,
                        "card values must be non-empty with no whitespace".to_string(),
                    )
                } else {
                    let from = from.to_string();
                    let to = to.to_string();
                    let result = board
                        .map(|value| {
                            let from = from.clone();
                            let to = to.clone();
                            async move {
                                if value == from {
                                    to
                                } else {
                                    value
                                }
                            }
                        })
                        .await;
                    match result {
                        Ok(()) => (200, board.look(player).await),
                        Err(err) => error_response(err),
                    }
                }
            }
            Err(resp) => resp,
        },
        ["watch", player] => match require_player(player) {
            Ok(()) => {
                tokio::select! {
                    _ = board.watch() => (200, board.look(player).await),
                    _ = connection_closed(reader) => return None,
                }
            }
            Err(resp) => resp,
        },
        ["reset", player] => match require_player(player) {
            Ok(()) => {
                board.reset().await;
                (200, board.look(player).await)
            }
            Err(resp) => resp,
        },
        _ => (404, "no such route".to_string()),
    };
    Some(response)
}

fn require_player(player: &str) -> Result<(), (u16, String)> {
    if player::is_valid_player_id(player) {
        Ok(())
    } else {
        Err((400, BoardError::BadPlayerId(player.to_string()).to_string()))
    }
}

fn error_response(err: BoardError) -> (u16, String) {
    let status = if err.is_rule_violation() { 409 } else { 400 };
    (status, err.to_string())
}

/// Splits a request path into percent-decoded segments.
fn decode_path(path: &str) -> Option<Vec<String>> {
    path.trim_start_matches('/')
        .split('/')
        .map(percent_decode)
        .collect()
}

fn percent_decode(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn parse_location(location: &str) -> Option<(usize, usize)> {
    let (row, col) = location.split_once(',')?;
    Some((row.trim().parse().ok()?, col.trim().parse().ok()?))
}

/// Resolves when the peer closes its end of the connection.
async fn connection_closed(reader: &mut BufReader<OwnedReadHalf>) -> io::Result<()> {
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(_) => continue, // stray pipelined bytes; ignored
            Err(err) => return Err(err),
        }
    }
}

async fn write_response(stream: &mut OwnedWriteHalf, status: u16, body: &str) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        reason(status),
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        _ => "Internal Server Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_decode_passthrough_and_escapes() {
        assert_eq!(percent_decode("alice").as_deref(), Some("alice"));
        assert_eq!(percent_decode("a%20b").as_deref(), Some("a b"));
        assert_eq!(percent_decode("%F0%9F%A6%84").as_deref(), Some("🦄"));
        assert_eq!(percent_decode("100%25").as_deref(), Some("100%"));
    }

    #[test]
    fn percent_decode_rejects_malformed_escapes() {
        assert_eq!(percent_decode("%"), None);
        assert_eq!(percent_decode("%2"), None);
        assert_eq!(percent_decode("%zz"), None);
        assert_eq!(percent_decode("%+1"), None);
        // Decoded bytes must still be UTF-8.
        assert_eq!(percent_decode("%FF%FE"), None);
    }

    #[test]
    fn decode_path_splits_segments() {
        assert_eq!(
            decode_path("/flip/alice/1,2"),
            Some(vec!["flip".to_string(), "alice".to_string(), "1,2".to_string()])
        );
        assert_eq!(decode_path("/"), Some(vec![String::new()]));
    }

    #[test]
    fn parse_location_accepts_row_comma_col() {
        assert_eq!(parse_location("1,2"), Some((1, 2)));
        assert_eq!(parse_location("0,0"), Some((0, 0)));
        assert_eq!(parse_location("12"), None);
        assert_eq!(parse_location("1,2,3"), None);
        assert_eq!(parse_location("a,b"), None);
        assert_eq!(parse_location("-1,0"), None);
    }

    #[test]
    fn rule_failures_map_to_conflict() {
        assert_eq!(error_response(BoardError::NoCard { row: 0, col: 0 }).0, 409);
        assert_eq!(
            error_response(BoardError::Contended { row: 0, col: 0 }).0,
            409
        );
        assert_eq!(
            error_response(BoardError::SameCard { row: 0, col: 0 }).0,
            409
        );
        assert_eq!(
            error_response(BoardError::OutOfBounds {
                row: 9,
                col: 9,
                rows: 2,
                cols: 2
            })
            .0,
            400
        );
        assert_eq!(
            error_response(BoardError::BadValue("a b".to_string())).0,
            400
        );
    }

    #[test]
    fn player_validation() {
        assert!(require_player("alice_1").is_ok());
        assert_eq!(require_player("bad player").unwrap_err().0, 400);
        assert_eq!(require_player("").unwrap_err().0, 400);
    }

    #[test]
    fn status_reasons() {
        assert_eq!(reason(200), "OK");
        assert_eq!(reason(409), "Conflict");
        assert_eq!(reason(500), "Internal Server Error");
    }
}
