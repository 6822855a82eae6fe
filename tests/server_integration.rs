//! End-to-end tests over real TCP connections.

use std::net::SocketAddr;

use prodigit::config::Config;
use prodigit::server::{Server, ServerHandle, ServerState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

fn test_config(workers: usize) -> Config {
    Config {
        listen: "127.0.0.1:0".to_string(),
        workers,
        grace_period: 2,
        log_level: "info".to_string(),
    }
}

async fn start_server(
    workers: usize,
) -> (SocketAddr, ServerHandle, tokio::task::JoinHandle<()>) {
    let server = Server::bind(test_config(workers)).expect("bind");
    let addr = server.local_addr().expect("local addr");
    let handle = server.handle();
    let task = tokio::spawn(server.serve());
    (addr, handle, task)
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Client {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Client {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Send one request line and read back one response line.
    async fn request(&mut self, line: &str) -> String {
        self.writer.write_all(line.as_bytes()).await.expect("write");
        self.writer.write_all(b"\n").await.expect("write newline");

        let mut response = String::new();
        let n = self.reader.read_line(&mut response).await.expect("read");
        assert!(n > 0, "server closed before responding to {:?}", line);
        response.trim_end().to_string()
    }

    /// Read until EOF, asserting no further data arrives.
    async fn expect_eof(&mut self) {
        let mut rest = String::new();
        let n = self.reader.read_line(&mut rest).await.unwrap_or(0);
        assert_eq!(n, 0, "unexpected trailing data: {:?}", rest);
    }
}

#[tokio::test]
async fn full_session_exchange() {
    let (addr, handle, task) = start_server(4).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.request("24").await, "38");
    assert_eq!(client.request("49").await, "77");
    assert_eq!(client.request("0").await, "10");
    assert_eq!(client.request("1").await, "1");
    assert_eq!(client.request("13").await, "NO_SOLUTION");
    assert_eq!(client.request("-5").await, "ERROR: Number must be positive");
    assert_eq!(
        client.request("six").await,
        "ERROR: Please enter a valid positive integer"
    );
    assert_eq!(client.request("6").await, "6");
    assert_eq!(client.request("EXIT").await, "Goodbye!");

    // After the farewell the server closes its end.
    client.expect_eof().await;

    handle.stop().await;
    task.await.expect("server task");
}

#[tokio::test]
async fn eof_closes_without_farewell() {
    let (addr, handle, task) = start_server(4).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.request("12").await, "26");

    // Half-close; the server must close without sending anything more.
    client.writer.shutdown().await.expect("shutdown write half");
    client.expect_eof().await;

    handle.stop().await;
    task.await.expect("server task");
}

#[tokio::test]
async fn concurrent_sessions_match_serial_run() {
    let (addr, handle, task) = start_server(4).await;
    let queries = ["24", "0", "13", "-5", "49", "100", "garbage", "36"];

    // Serial oracle: one client alone.
    let mut serial = Vec::new();
    let mut client = Client::connect(addr).await;
    for query in &queries {
        serial.push(client.request(query).await);
    }
    assert_eq!(client.request("exit").await, "Goodbye!");

    // The same sequence from many simultaneous clients must yield the
    // same per-connection responses.
    let mut clients = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let serial = serial.clone();
        clients.spawn(async move {
            let mut client = Client::connect(addr).await;
            for (query, expected) in queries.iter().zip(&serial) {
                assert_eq!(&client.request(query).await, expected);
            }
            assert_eq!(client.request("exit").await, "Goodbye!");
        });
    }
    while let Some(result) = clients.join_next().await {
        result.expect("client task");
    }

    handle.stop().await;
    task.await.expect("server task");
}

#[tokio::test]
async fn saturated_pool_still_serves_queued_clients() {
    let (addr, handle, task) = start_server(1).await;

    // The first client occupies the single worker slot.
    let mut first = Client::connect(addr).await;
    assert_eq!(first.request("24").await, "38");

    // A second client connects fine and queues for the slot.
    let mut second = Client::connect(addr).await;
    let waiting = tokio::spawn(async move { second.request("49").await });

    // Releasing the worker lets the queued session through.
    assert_eq!(first.request("exit").await, "Goodbye!");
    assert_eq!(waiting.await.expect("queued client"), "77");

    handle.stop().await;
    task.await.expect("server task");
}

#[tokio::test]
async fn stop_releases_port_and_refuses_new_connections() {
    let (addr, handle, task) = start_server(2).await;

    let mut client = Client::connect(addr).await;
    assert_eq!(client.request("8").await, "8");
    assert_eq!(client.request("exit").await, "Goodbye!");

    handle.stop().await;
    assert_eq!(handle.state(), ServerState::Stopped);
    task.await.expect("server task");

    // The port is free again: a fresh server can claim it...
    let mut config = test_config(2);
    config.listen = addr.to_string();
    let rebound = Server::bind(config).expect("rebind after stop");
    drop(rebound);

    // ...and so can a plain listener.
    let listener = TcpListener::bind(addr).await.expect("plain rebind");
    drop(listener);

    // Nothing is listening anymore, so connects are refused.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn stop_aborts_idle_sessions_after_grace() {
    let (addr, handle, task) = start_server(2).await;

    let mut client = Client::connect(addr).await;
    assert_eq!(client.request("7").await, "7");

    // The client never disconnects; stop() must still return once the
    // grace period cuts the session off.
    handle.stop().await;
    task.await.expect("server task");

    client.expect_eof().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_concurrent() {
    let (_addr, handle, task) = start_server(2).await;

    let mut stoppers = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let handle = handle.clone();
        stoppers.spawn(async move { handle.stop().await });
    }
    while let Some(result) = stoppers.join_next().await {
        result.expect("stop task");
    }

    // One more after the fact is a no-op.
    handle.stop().await;
    assert_eq!(handle.state(), ServerState::Stopped);
    task.await.expect("server task");
}
