//! Delimiter-framed echo server.
//!
//! A plain TCP service, independent of the WebSocket gateway: every unit
//! terminated by the configured delimiter (`$_` by default) is logged with a
//! per-connection counter and echoed back with the delimiter re-appended.

use bytes::{Buf, Bytes, BytesMut};
use tracing::info;

use crate::config::DelimiterConfig;
use crate::error::{Error, Result};

/// Splits a byte stream on a delimiter, stripping it.
#[derive(Debug, Clone)]
pub struct DelimiterDecoder {
    delimiter: Vec<u8>,
    max_frame_length: usize,
}

impl DelimiterDecoder {
    #[must_use]
    pub fn new(config: &DelimiterConfig) -> Self {
        Self {
            delimiter: config.delimiter.clone(),
            max_frame_length: config.max_frame_length,
        }
    }

    /// Take the next complete unit out of `buf`.
    ///
    /// Returns `Ok(None)` if no delimiter has arrived yet.
    ///
    /// # Errors
    ///
    /// Returns `Error::FrameTooLarge` once a unit exceeds `max_frame_length`,
    /// whether or not its delimiter has arrived.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        match find(buf, &self.delimiter) {
            Some(len) => {
                if len > self.max_frame_length {
                    return Err(Error::FrameTooLarge {
                        size: len,
                        max: self.max_frame_length,
                    });
                }
                let unit = buf.split_to(len).freeze();
                buf.advance(self.delimiter.len());
                Ok(Some(unit))
            }
            // The tail may hold the start of a delimiter.
            None if buf.len() > self.max_frame_length + self.delimiter.len().saturating_sub(1) => {
                Err(Error::FrameTooLarge {
                    size: buf.len(),
                    max: self.max_frame_length,
                })
            }
            None => Ok(None),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Per-connection echo handler.
#[derive(Debug, Clone)]
pub struct DelimiterEcho {
    delimiter: Vec<u8>,
    counter: u64,
}

impl DelimiterEcho {
    #[must_use]
    pub fn new(config: &DelimiterConfig) -> Self {
        Self {
            delimiter: config.delimiter.clone(),
            counter: 0,
        }
    }

    /// Units handled so far on this connection.
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Log `unit` and build its echo.
    pub fn handle(&mut self, unit: &[u8]) -> Bytes {
        self.counter += 1;
        info!(
            "This is {} times receive client : [{}]",
            self.counter,
            String::from_utf8_lossy(unit)
        );
        let mut reply = BytesMut::with_capacity(unit.len() + self.delimiter.len());
        reply.extend_from_slice(unit);
        reply.extend_from_slice(&self.delimiter);
        reply.freeze()
    }
}

#[cfg(feature = "async-tokio")]
mod runtime {
    use std::future::Future;

    use bytes::BytesMut;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tracing::{debug, info, warn};

    use super::{DelimiterDecoder, DelimiterEcho};
    use crate::config::DelimiterConfig;
    use crate::connection::ConnectionId;
    use crate::error::Result;

    /// Echo delimited units on one connection until the peer closes.
    ///
    /// # Errors
    ///
    /// Returns `Error::FrameTooLarge` for an over-long unit and
    /// `Error::Transport` for I/O failures; the transport is shut down either way.
    pub async fn serve_connection<T>(mut io: T, config: &DelimiterConfig, id: ConnectionId) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut echo = DelimiterEcho::new(config);
        let outcome = echo_loop(&mut io, config, &mut echo).await;

        if let Err(e) = &outcome {
            warn!(connection = %id, error = %e, "closing delimiter connection");
        }
        if let Err(e) = io.shutdown().await {
            debug!(connection = %id, error = %e, "shutdown failed");
        }
        debug!(connection = %id, units = echo.counter(), "closed");
        outcome
    }

    async fn echo_loop<T>(io: &mut T, config: &DelimiterConfig, echo: &mut DelimiterEcho) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let decoder = DelimiterDecoder::new(config);
        let mut buf = BytesMut::with_capacity(config.max_frame_length);
        loop {
            while let Some(unit) = decoder.decode(&mut buf)? {
                io.write_all(&echo.handle(&unit)).await?;
            }
            io.flush().await?;
            if io.read_buf(&mut buf).await? == 0 {
                return Ok(());
            }
        }
    }

    /// Accept delimiter connections until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the address cannot be bound.
    pub async fn run<F>(config: DelimiterConfig, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "delimiter echo listening");
        serve(listener, config, shutdown).await
    }

    /// Accept connections on an already bound listener.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok(())` once `shutdown` completes.
    pub async fn serve<F>(listener: TcpListener, config: DelimiterConfig, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let config = std::sync::Arc::new(config);
        let mut next_id = 0u64;

        loop {
            tokio::select! {
                () = &mut shutdown => return Ok(()),
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    next_id += 1;
                    let id = ConnectionId(next_id);
                    let config = std::sync::Arc::clone(&config);
                    debug!(connection = %id, %peer, "accepted");
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, &config, id).await {
                            debug!(connection = %id, %peer, error = %e, "delimiter connection ended with error");
                        }
                    });
                }
            }
        }
    }
}

#[cfg(feature = "async-tokio")]
pub use runtime::{run, serve, serve_connection};

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DelimiterConfig {
        DelimiterConfig::default()
    }

    #[test]
    fn test_decode_splits_on_delimiter() {
        let decoder = DelimiterDecoder::new(&config());
        let mut buf = BytesMut::from(&b"hello$_world$_par"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "hello");
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "world");
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"par");
    }

    #[test]
    fn test_decode_empty_unit() {
        let decoder = DelimiterDecoder::new(&config());
        let mut buf = BytesMut::from(&b"$_"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_too_long_without_delimiter() {
        let decoder = DelimiterDecoder::new(&config().with_max_frame_length(4));
        let mut buf = BytesMut::from(&b"abcd$"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"x");
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(Error::FrameTooLarge { max: 4, .. })
        ));
    }

    #[test]
    fn test_decode_too_long_with_delimiter() {
        let decoder = DelimiterDecoder::new(&config().with_max_frame_length(4));
        let mut buf = BytesMut::from(&b"abcdef$_"[..]);
        assert_eq!(
            decoder.decode(&mut buf),
            Err(Error::FrameTooLarge { size: 6, max: 4 })
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let config = config().with_delimiter(&b"\n"[..]);
        let decoder = DelimiterDecoder::new(&config);
        let mut buf = BytesMut::from(&b"line\n"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "line");
        assert_eq!(DelimiterEcho::new(&config).handle(b"line"), "line\n");
    }

    #[test]
    fn test_echo_counts_and_appends() {
        let mut echo = DelimiterEcho::new(&config());
        assert_eq!(echo.handle(b"hi"), "hi$_");
        assert_eq!(echo.handle(b"again"), "again$_");
        assert_eq!(echo.counter(), 2);
        assert_eq!(DelimiterEcho::new(&config()).counter(), 0);
    }

    #[cfg(feature = "async-tokio")]
    #[tokio::test]
    async fn test_serve_connection_echoes() {
        use crate::connection::ConnectionId;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move {
            serve_connection(server, &DelimiterConfig::default(), ConnectionId(1)).await
        });

        client.write_all(b"one$_tw").await.unwrap();
        client.write_all(b"o$_").await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"one$_two$_");
        assert_eq!(task.await.unwrap(), Ok(()));
    }

    #[cfg(feature = "async-tokio")]
    #[tokio::test]
    async fn test_serve_connection_closes_on_long_unit() {
        use crate::connection::ConnectionId;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let config = DelimiterConfig::default().with_max_frame_length(8);
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move { serve_connection(server, &config, ConnectionId(1)).await });

        client.write_all(b"far too long for this$_").await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
        assert!(matches!(
            task.await.unwrap(),
            Err(Error::FrameTooLarge { max: 8, .. })
        ));
    }
}
