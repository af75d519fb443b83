use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::connection::Outbound;
use crate::error::{Error, Result};
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;
use crate::protocol::{Frame, FrameHeader, HttpRequest, HttpResponse};

const READ_CHUNK: usize = 4096;

/// Byte-level encoder/decoder between a transport and the state machine.
///
/// Decodes HTTP request heads while the connection awaits its upgrade and
/// WebSocket frames afterwards. Outbound frames are never masked.
pub struct GatewayCodec<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    config: Config,
}

impl<T> GatewayCodec<T> {
    #[must_use]
    pub fn new(io: T, config: Config) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }

    fn check_header(&self, header: &FrameHeader) -> Result<()> {
        if header.mask.is_none() && !self.config.accept_unmasked_frames {
            return Err(Error::UnmaskedClientFrame);
        }
        if header.rsv != 0 {
            return Err(Error::ReservedBitsSet);
        }
        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(header.payload_len));
            }
        }
        self.config.limits.check_frame_size(header.payload_len)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> GatewayCodec<T> {
    /// Read more bytes into the read buffer. Returns 0 at end of stream.
    async fn fill(&mut self) -> Result<usize> {
        self.read_buf.reserve(READ_CHUNK);
        Ok(self.io.read_buf(&mut self.read_buf).await?)
    }

    /// Read one HTTP request, including any `Content-Length` body, which is discarded.
    ///
    /// Returns `Ok(None)` if the peer closed before sending anything. Requests
    /// over `max_handshake_size` come back flagged as failed decodes.
    pub async fn read_request(&mut self) -> Result<Option<HttpRequest>> {
        let max = self.config.limits.max_handshake_size;
        loop {
            if let Some(end) = find_head_end(&self.read_buf) {
                let head_len = end + 4;
                let request = HttpRequest::parse_with_limit(&self.read_buf[..head_len], max);
                self.read_buf.advance(head_len);

                let body_len = request.content_length().unwrap_or(0);
                let total = head_len.checked_add(body_len).unwrap_or(usize::MAX);
                if let Err(err) = self.config.limits.check_handshake_size(total) {
                    self.read_buf.clear();
                    return Ok(Some(HttpRequest::decode_failure(err.to_string())));
                }
                while self.read_buf.len() < body_len {
                    if self.fill().await? == 0 {
                        return Err(Error::ConnectionClosed);
                    }
                }
                self.read_buf.advance(body_len);
                return Ok(Some(request));
            }

            if let Err(err) = self.config.limits.check_handshake_size(self.read_buf.len()) {
                self.read_buf.clear();
                return Ok(Some(HttpRequest::decode_failure(err.to_string())));
            }

            if self.fill().await? == 0 {
                return if self.read_buf.is_empty() {
                    Ok(None)
                } else {
                    Err(Error::ConnectionClosed)
                };
            }
        }
    }

    /// Read one frame.
    ///
    /// Returns `Ok(None)` if the peer closed between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match FrameHeader::parse(&self.read_buf) {
                Ok(header) => {
                    self.check_header(&header)?;
                    let total = header.header_len.checked_add(header.payload_len).ok_or(
                        Error::FrameTooLarge {
                            size: header.payload_len,
                            max: self.config.limits.max_frame_size,
                        },
                    )?;
                    if self.read_buf.len() >= total {
                        let (frame, consumed) = Frame::parse(&self.read_buf)?;
                        self.read_buf.advance(consumed);
                        return Ok(Some(frame));
                    }
                    self.read_buf.reserve(total - self.read_buf.len());
                }
                Err(Error::IncompleteFrame { .. }) => {}
                Err(e) => return Err(e),
            }

            if self.fill().await? == 0 {
                return if self.read_buf.is_empty() {
                    Ok(None)
                } else {
                    Err(Error::ConnectionClosed)
                };
            }
        }
    }

    pub async fn write_response(&mut self, response: &HttpResponse) -> Result<()> {
        let mut buf = Vec::with_capacity(128 + response.body_bytes().len());
        response.write(&mut buf)?;
        self.io.write_all(&buf).await?;
        Ok(())
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_buf.clear();
        frame.write(&mut self.write_buf, None);
        self.io.write_all(&self.write_buf).await?;
        Ok(())
    }

    pub async fn write(&mut self, outbound: &Outbound) -> Result<()> {
        match outbound {
            Outbound::Response(response) => self.write_response(response).await,
            Outbound::Frame(frame) => self.write_frame(frame).await,
        }
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }

    /// Flush and shut down the write half of the transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
