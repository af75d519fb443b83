//! Test harness shared by the integration tests.
//!
//! [`TestServer`] runs a gateway on a random loopback port; [`TestClient`]
//! speaks the client side of the upgrade and frame protocol over any stream.

#![allow(dead_code)]

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wsgate::{Config, Error, Frame, Server};

pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
pub const SAMPLE_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

/// A well-formed upgrade request for `path`.
pub fn upgrade_request(path: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: localhost:8080\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {SAMPLE_KEY}\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n"
    )
}

pub struct TestServer {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<wsgate::Result<()>>,
}

impl TestServer {
    pub async fn spawn() -> (Self, std::net::SocketAddr) {
        Self::spawn_with(Config::default()).await
    }

    pub async fn spawn_with(config: Config) -> (Self, std::net::SocketAddr) {
        let config = config.with_bind_addr("127.0.0.1:0".parse().unwrap());
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));
        (
            Self {
                shutdown: tx,
                handle,
            },
            addr,
        )
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        self.handle.await.unwrap().unwrap();
    }
}

pub struct TestClient<S = TcpStream> {
    stream: S,
    buf: BytesMut,
    mask_seed: u8,
}

impl TestClient<TcpStream> {
    /// Connect and complete the upgrade on `/websocket`.
    pub async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (client, head) = TestClient::upgrade(stream, "/websocket").await;
        assert!(head.starts_with("HTTP/1.1 101"), "upgrade failed: {head}");
        client
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> TestClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
            mask_seed: 1,
        }
    }

    /// Send an upgrade request for `path` and return the response head.
    pub async fn upgrade(stream: S, path: &str) -> (Self, String) {
        let mut client = Self::new(stream);
        client.send_raw(upgrade_request(path).as_bytes()).await;
        let head = client.read_head().await;
        (client, head)
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Read an HTTP response head, up to and including the blank line.
    pub async fn read_head(&mut self) -> String {
        loop {
            if let Some(end) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = self.buf.split_to(end + 4);
                return String::from_utf8(head.to_vec()).unwrap();
            }
            assert_ne!(self.stream.read_buf(&mut self.buf).await.unwrap(), 0, "eof in head");
        }
    }

    /// Send `frame` masked, as a client must.
    pub async fn send(&mut self, frame: &Frame) {
        let seed = self.mask_seed;
        self.mask_seed = self.mask_seed.wrapping_add(1);
        let mut out = BytesMut::new();
        frame.write(&mut out, Some([seed, 0x5A, seed ^ 0xFF, 0xA5]));
        self.send_raw(&out).await;
    }

    /// Next frame from the server, or `None` once the server closed the stream.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            match Frame::parse(&self.buf) {
                Ok((frame, consumed)) => {
                    let _ = self.buf.split_to(consumed);
                    return Some(frame);
                }
                Err(Error::IncompleteFrame { .. }) => {}
                Err(e) => panic!("bad frame from server: {e}"),
            }
            if self.stream.read_buf(&mut self.buf).await.unwrap() == 0 {
                assert!(self.buf.is_empty(), "eof mid-frame");
                return None;
            }
        }
    }

    /// Send a text frame and return the reply text.
    pub async fn round_trip(&mut self, text: &str) -> String {
        self.send(&Frame::text(text)).await;
        let reply = self.recv().await.expect("reply");
        reply.as_text().unwrap().to_string()
    }

    /// Read until the server closes the stream.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut rest = self.buf.split().to_vec();
        self.stream.read_to_end(&mut rest).await.unwrap();
        rest
    }

    /// Run the close handshake and wait for the server to hang up.
    pub async fn close(mut self) {
        self.send(&Frame::close(Some(1000), "bye")).await;
        let reply = self.recv().await.expect("close reply");
        assert_eq!(reply.close_code(), Some(1000));
        assert!(self.recv().await.is_none());
    }
}
