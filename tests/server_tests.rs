//! End-to-end tests for the HTTP transport, over real sockets on an
//! ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use memory_scramble::{Board, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

const DEADLINE: Duration = Duration::from_secs(2);

/// Boots a server on a 2x2 A/B board and returns its address.
async fn start_server() -> std::net::SocketAddr {
    let values = ["A", "B", "B", "A"].iter().map(|v| v.to_string()).collect();
    let board = Arc::new(Board::from_values(2, 2, values).unwrap());
    let server = Server::bind("127.0.0.1", 0, board).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// Issues one GET request and returns (status, body).
async fn get(addr: std::net::SocketAddr, path: &str) -> (u16, String) {
    let raw = get_raw(addr, path).await;
    parse_response(&raw)
}

async fn get_raw(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: test\r\n\r\n", path);
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    timeout(DEADLINE, stream.read_to_string(&mut response))
        .await
        .expect("response not received in time")
        .unwrap();
    response
}

fn parse_response(raw: &str) -> (u16, String) {
    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("malformed status line");
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

#[tokio::test]
async fn look_returns_initial_snapshot() {
    let addr = start_server().await;
    let (status, body) = get(addr, "/look/alice").await;
    assert_eq!(status, 200);
    assert_eq!(body, "2x2\ndown\ndown\ndown\ndown");
}

#[tokio::test]
async fn responses_allow_cross_origin_access() {
    let addr = start_server().await;
    let raw = get_raw(addr, "/look/alice").await;
    assert!(raw.contains("Access-Control-Allow-Origin: *"));
    assert!(raw.contains("Content-Type: text/plain; charset=utf-8"));
}

#[tokio::test]
async fn flip_responds_with_the_new_snapshot() {
    let addr = start_server().await;
    let (status, body) = get(addr, "/flip/alice/0,0").await;
    assert_eq!(status, 200);
    assert_eq!(body, "2x2\nmy A\ndown\ndown\ndown");

    // Another player sees the card as merely face up.
    let (status, body) = get(addr, "/look/bob").await;
    assert_eq!(status, 200);
    assert_eq!(body, "2x2\nup A\ndown\ndown\ndown");
}

#[tokio::test]
async fn game_rule_failures_are_conflicts() {
    let addr = start_server().await;
    let (status, _) = get(addr, "/flip/alice/0,0").await;
    assert_eq!(status, 200);
    // Same card again: a rule failure, not a bad request.
    let (status, _) = get(addr, "/flip/alice/0,0").await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn validation_failures_are_bad_requests() {
    let addr = start_server().await;
    assert_eq!(get(addr, "/look/not%20valid").await.0, 400);
    assert_eq!(get(addr, "/flip/alice/zero,one").await.0, 400);
    assert_eq!(get(addr, "/flip/alice/9,9").await.0, 400);
    assert_eq!(get(addr, "/replace/alice/A/two%20words").await.0, 400);
}

#[tokio::test]
async fn unknown_routes_and_methods_are_rejected() {
    let addr = start_server().await;
    assert_eq!(get(addr, "/scores/alice").await.0, 404);
    assert_eq!(get(addr, "/look").await.0, 404);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /look/alice HTTP/1.1\r\nHost: test\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    timeout(DEADLINE, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(parse_response(&response).0, 405);
}

#[tokio::test]
async fn replace_decodes_percent_escapes() {
    let addr = start_server().await;
    let (status, _) = get(addr, "/flip/alice/0,0").await;
    assert_eq!(status, 200);

    // Replace A with ☺ (percent-encoded UTF-8).
    let (status, body) = get(addr, "/replace/alice/A/%E2%98%BA").await;
    assert_eq!(status, 200);
    assert_eq!(body, "2x2\nmy ☺\ndown\ndown\ndown");
}

#[tokio::test]
async fn watch_long_poll_completes_after_a_change() {
    let addr = start_server().await;

    let watcher = tokio::spawn(async move { get(addr, "/watch/observer").await });
    sleep(Duration::from_millis(100)).await;
    assert!(!watcher.is_finished(), "watch must wait for a change");

    let (status, _) = get(addr, "/flip/alice/1,0").await;
    assert_eq!(status, 200);

    let (status, body) = timeout(DEADLINE, watcher).await.unwrap().unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, "2x2\ndown\ndown\nup B\ndown");
}

#[tokio::test]
async fn reset_route_restores_the_board() {
    let addr = start_server().await;
    get(addr, "/flip/alice/0,0").await;
    get(addr, "/flip/alice/1,1").await;

    let (status, body) = get(addr, "/reset/alice").await;
    assert_eq!(status, 200);
    assert_eq!(body, "2x2\ndown\ndown\ndown\ndown");
}
