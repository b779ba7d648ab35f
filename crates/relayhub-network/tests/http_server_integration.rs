//! Integration tests for HttpServer
//!
//! These tests drive the server over real sockets with the mock relay driver.

use relayhub_boards::{BoardConfig, BoardStore, ServerConfig};
use relayhub_core::{BoardId, RelayIndex, SerialPolicy};
use relayhub_hardware::mock::{MockRelayDriver, MockRelayHandle};
use relayhub_hardware::{DriverRegistry, ShadowCache};
use relayhub_network::{HttpServer, HttpServerConfig, HttpServerError, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

fn local_config() -> HttpServerConfig {
    HttpServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
    }
}

fn router(boards: BoardStore) -> (Router, MockRelayHandle) {
    let (driver, handle) = MockRelayDriver::new();
    let mut registry = DriverRegistry::new(ShadowCache::new());
    registry.register(driver);
    (Router::new(registry, boards, ServerConfig::default()), handle)
}

type ServerTask = JoinHandle<Result<(), HttpServerError>>;

async fn start(boards: BoardStore) -> (SocketAddr, MockRelayHandle, ServerTask) {
    let (router, handle) = router(boards);
    let server = HttpServer::bind(local_config(), router).await.unwrap();
    let addr = server.local_addr().unwrap();
    (addr, handle, tokio::spawn(server.run()))
}

async fn send_raw(addr: SocketAddr, raw: &str) -> String {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    };
    timeout(Duration::from_secs(5), exchange)
        .await
        .expect("Request timeout")
}

async fn get(addr: SocketAddr, path: &str) -> String {
    send_raw(addr, &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n")).await
}

fn body(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or_default()
}

async fn stop(addr: SocketAddr, server: ServerTask) {
    let response = get(addr, "/quit").await;
    assert!(response.contains("Program stopped"));
    timeout(Duration::from_secs(5), server)
        .await
        .expect("Server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_no_device_reports_1001() {
    let (addr, _handle, server) = start(BoardStore::default()).await;

    let response = get(addr, "/api/card").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.contains("Server: relayhub/"));
    assert!(response.contains("Content-Type: application/json; charset=utf-8\r\n"));
    assert_eq!(
        body(&response),
        r#"{"meta":{"error":1001,"message":"No compatible device detected."},"data":{}}"#
    );

    stop(addr, server).await;
}

#[tokio::test]
async fn test_set_and_read_over_socket() {
    let (addr, handle, server) = start(BoardStore::default()).await;
    handle.attach("MOCK-8", 8);

    let response = get(addr, "/api/serial/MOCK-8/4/1?source=test").await;
    assert_eq!(body(&response), r#"{"meta":{},"data":[{"relay":"4","value":"1"}]}"#);
    assert_eq!(handle.relay_is_on("MOCK-8", RelayIndex::new(4).unwrap()), Some(true));

    let response = get(addr, "/api/card").await;
    assert!(body(&response).contains(r#"{"relay":"4","value":"1"}"#));
    assert!(body(&response).contains(r#"{"relay":"8","value":"0"}"#));

    stop(addr, server).await;
}

#[tokio::test]
async fn test_escaped_serial_over_socket() {
    let (addr, handle, server) = start(BoardStore::default()).await;
    handle.attach("1a86:7523:4", 4);

    let response = get(addr, "/api/serial/1a86%3A7523%3A4/2/1").await;
    assert_eq!(body(&response), r#"{"meta":{},"data":[{"relay":"2","value":"1"}]}"#);
    assert_eq!(handle.write_count(), 1);

    stop(addr, server).await;
}

#[tokio::test]
async fn test_invalid_relay_never_reaches_driver() {
    let (addr, handle, server) = start(BoardStore::default()).await;
    handle.attach("MOCK-8", 8);

    for path in ["/api/card/0/1", "/api/card/17/1", "/api/card/9/1", "/api/card/1/7"] {
        let response = get(addr, path).await;
        assert!(body(&response).contains(r#""error":1003"#), "{path}");
    }
    assert_eq!(handle.write_count(), 0);

    stop(addr, server).await;
}

#[tokio::test]
async fn test_post_is_accepted() {
    let (addr, handle, server) = start(BoardStore::default()).await;
    handle.attach("MOCK-8", 8);

    let response = send_raw(
        addr,
        "POST /api/card/2/1 HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody",
    )
    .await;
    assert!(body(&response).contains(r#""value":"1""#));

    stop(addr, server).await;
}

#[tokio::test]
async fn test_boards_over_socket() {
    let boards = BoardStore::new(vec![
        BoardConfig::new(BoardId::new(1).unwrap(), SerialPolicy::Auto, 8).unwrap(),
        BoardConfig::new(BoardId::new(2).unwrap(), SerialPolicy::Auto, 8).unwrap(),
    ])
    .unwrap();
    let (addr, handle, server) = start(boards).await;
    handle.attach("ONLY", 8);

    assert!(body(&get(addr, "/api/card").await).contains(r#""error":1002"#));
    assert!(body(&get(addr, "/api/board/1/3/1").await).contains(r#""value":"1""#));
    assert!(body(&get(addr, "/api/board/2/3").await).contains(r#""error":1001"#));

    let writes = handle.write_count();
    assert!(body(&get(addr, "/api/board/1/3/2").await).contains(r#""error":1003"#));
    assert_eq!(handle.write_count(), writes);

    let listing = get(addr, "/api/board").await;
    assert!(body(&listing).contains(r#""serial":"ONLY""#));
    assert!(body(&listing).contains("NOT FOUND"));

    stop(addr, server).await;
}

#[tokio::test]
async fn test_error_pages() {
    let (addr, _handle, server) = start(BoardStore::default()).await;

    let response = get(addr, "/favicon.ico").await;
    assert!(response.starts_with("HTTP/1.1 500 "));
    assert!(body(&response).contains("ERROR:"));

    let response = send_raw(addr, "garbage\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 "));

    let response = send_raw(addr, "DELETE /api/card HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 500 "));

    stop(addr, server).await;
}

#[tokio::test]
async fn test_status_page() {
    let (addr, handle, server) = start(BoardStore::default()).await;
    handle.attach("MOCK-2", 2);

    let response = get(addr, "/").await;
    assert!(response.contains("Content-Type: text/html; charset=utf-8\r\n"));
    assert!(body(&response).contains("My appliance 1"));
    assert!(body(&response).contains("/api/serial/"));

    stop(addr, server).await;
}

#[tokio::test]
async fn test_external_shutdown() {
    let (router, _handle) = router(BoardStore::default());
    let server = HttpServer::bind(local_config(), router).await.unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let task = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));
    tx.send(()).unwrap();

    timeout(Duration::from_secs(5), task)
        .await
        .expect("Server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_bind_conflict() {
    let (router_a, _a) = router(BoardStore::default());
    let first = HttpServer::bind(local_config(), router_a).await.unwrap();
    let addr = first.local_addr().unwrap();

    let (router_b, _b) = router(BoardStore::default());
    let result = HttpServer::bind(HttpServerConfig { bind_addr: addr }, router_b).await;
    assert!(matches!(result, Err(HttpServerError::BindFailed(a)) if a == addr));
}
