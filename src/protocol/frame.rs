//! Decoded WebSocket frames and their wire encoding (RFC 6455 Section 5.2).
//!
//! [`Frame`] is the unit exchanged between the codec and the dispatcher: an
//! opcode plus an unmasked payload. The parse/write functions here are the
//! codec's business; the dispatcher never looks at header bits.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Header fields of a frame, available before its payload has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// RSV1..RSV3 as the high nibble bits `0b0111_0000 >> 4`.
    pub rsv: u8,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, if the MASK bit was set.
    pub mask: Option<[u8; 4]>,
    /// Payload length in bytes.
    pub payload_len: usize,
    /// Bytes occupied by the header, including the masking key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a frame header.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `Error::ReservedOpcode` if a reserved opcode is used
    /// - `Error::FrameTooLarge` if the 64-bit length does not fit in `usize`
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let fin = buf[0] & 0x80 != 0;
        let rsv = (buf[0] & 0x70) >> 4;
        let opcode = OpCode::try_from(buf[0] & 0x0F)?;
        let masked = buf[1] & 0x80 != 0;

        let (payload_len, len_end) = match buf[1] & 0x7F {
            len @ 0..=125 => (len as usize, 2),
            126 => {
                if buf.len() < 4 {
                    return Err(Error::IncompleteFrame {
                        needed: 4 - buf.len(),
                    });
                }
                (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
            }
            _ => {
                if buf.len() < 10 {
                    return Err(Error::IncompleteFrame {
                        needed: 10 - buf.len(),
                    });
                }
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                let len = u64::from_be_bytes(len);
                let len = usize::try_from(len).map_err(|_| Error::FrameTooLarge {
                    size: usize::MAX,
                    max: usize::MAX,
                })?;
                (len, 10)
            }
        };

        let header_len = if masked { len_end + 4 } else { len_end };
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let mask = masked.then(|| [buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]]);

        Ok(Self {
            fin,
            rsv,
            opcode,
            mask,
            payload_len,
            header_len,
        })
    }
}

/// A decoded WebSocket frame: opcode plus unmasked payload.
///
/// The payload is interpreted solely according to the opcode. Only `Text`
/// requires UTF-8; see [`Frame::as_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Bytes,
}

impl Frame {
    /// Create a final frame with the given opcode and payload.
    #[must_use]
    pub fn new(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            payload: payload.into(),
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(OpCode::Text, text.into())
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Binary, data)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Pong, data)
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = BytesMut::with_capacity(2 + reason.len());
                data.put_u16(code);
                data.put_slice(reason.as_bytes());
                data.freeze()
            }
            None => Bytes::new(),
        };
        Self::new(OpCode::Close, payload)
    }

    /// The payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The payload as text.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` if the payload is not valid UTF-8.
    pub fn as_text(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.payload)?)
    }

    /// Status code of a close frame, if one is present.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match (self.opcode, self.payload.as_ref()) {
            (OpCode::Close, [hi, lo, ..]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Parse one frame from the front of `buf`, unmasking its payload.
    ///
    /// Returns the frame and the number of bytes consumed. The RSV bits are
    /// returned separately through [`FrameHeader`]; use [`FrameHeader::parse`]
    /// first when they matter.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `Error::ReservedOpcode` if a reserved opcode is used
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        let total = header
            .header_len
            .checked_add(header.payload_len)
            .ok_or(Error::FrameTooLarge {
                size: header.payload_len,
                max: usize::MAX - header.header_len,
            })?;

        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mut payload = BytesMut::from(&buf[header.header_len..total]);
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }

        let frame = Frame {
            fin: header.fin,
            opcode: header.opcode,
            payload: payload.freeze(),
        };
        Ok((frame, total))
    }

    /// Check the control-frame rules of RFC 6455 Section 5.5.
    ///
    /// # Errors
    ///
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }
        Ok(())
    }

    /// Append the wire encoding of this frame to `buf`.
    ///
    /// Servers pass `None`; a masking key is only used by clients.
    pub fn write(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) {
        let len = self.payload.len();
        buf.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = u8::from(self.opcode);
        if self.fin {
            byte0 |= 0x80;
        }
        buf.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0 };
        if len <= 125 {
            buf.put_u8(mask_bit | len as u8);
        } else if len <= usize::from(u16::MAX) {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(len as u64);
        }

        match mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Number of bytes [`Frame::write`] will append.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let len = self.payload.len();
        let extended = if len <= 125 {
            0
        } else if len <= usize::from(u16::MAX) {
            2
        } else {
            8
        };
        2 + extended + if masked { 4 } else { 0 } + len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unmasked_text_frame() {
        // FIN=1, opcode=1 (text), unmasked, payload="Hello"
        let data = &[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
        let (frame, len) = Frame::parse(data).unwrap();
        assert_eq!(len, 7);
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.as_text().unwrap(), "Hello");
    }

    #[test]
    fn test_parse_masked_text_frame() {
        // RFC 6455 Section 5.7 example
        let data = &[
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ];
        let (frame, len) = Frame::parse(data).unwrap();
        assert_eq!(len, 11);
        assert_eq!(frame.payload().as_ref(), b"Hello");
    }

    #[test]
    fn test_header_reports_mask_and_rsv() {
        let data = &[0xC1, 0x85, 0x37, 0xfa, 0x21, 0x3d];
        let header = FrameHeader::parse(data).unwrap();
        assert_eq!(header.rsv, 0b100);
        assert_eq!(header.mask, Some([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(header.payload_len, 5);
        assert_eq!(header.header_len, 6);
    }

    #[test]
    fn test_parse_incomplete() {
        assert!(matches!(
            Frame::parse(&[0x81]),
            Err(Error::IncompleteFrame { needed: 1 })
        ));
        assert!(matches!(
            Frame::parse(&[0x81, 0x05, b'H']),
            Err(Error::IncompleteFrame { needed: 4 })
        ));
        assert!(matches!(
            Frame::parse(&[0x82, 0x7E, 0x01]),
            Err(Error::IncompleteFrame { needed: 1 })
        ));
    }

    #[test]
    fn test_parse_reserved_opcode() {
        assert!(matches!(
            Frame::parse(&[0x83, 0x00]),
            Err(Error::ReservedOpcode(0x3))
        ));
    }

    #[test]
    fn test_parse_16bit_length() {
        let frame = Frame::binary(vec![0xAB; 300]);
        let mut buf = BytesMut::new();
        frame.write(&mut buf, None);
        assert_eq!(buf[1], 126);
        assert_eq!(buf.len(), frame.wire_size(false));
        let (parsed, consumed) = Frame::parse(&buf).unwrap();
        assert_eq!(consumed, 4 + 300);
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_parse_64bit_length() {
        let frame = Frame::binary(vec![0x01; 70_000]);
        let mut buf = BytesMut::new();
        frame.write(&mut buf, None);
        assert_eq!(buf[1], 127);
        let (parsed, consumed) = Frame::parse(&buf).unwrap();
        assert_eq!(consumed, 10 + 70_000);
        assert_eq!(parsed.payload().len(), 70_000);
    }

    #[test]
    fn test_write_masked_then_parse() {
        let frame = Frame::text("hi there");
        let mut buf = BytesMut::new();
        frame.write(&mut buf, Some([1, 2, 3, 4]));
        assert_eq!(buf[1] & 0x80, 0x80);
        assert_ne!(&buf[6..], b"hi there");
        let (parsed, _) = Frame::parse(&buf).unwrap();
        assert_eq!(parsed.as_text().unwrap(), "hi there");
    }

    #[test]
    fn test_close_frame_payload() {
        let frame = Frame::close(Some(1000), "bye");
        assert_eq!(frame.payload().as_ref(), &[0x03, 0xE8, b'b', b'y', b'e']);
        assert_eq!(frame.close_code(), Some(1000));
        assert_eq!(Frame::close(None, "").close_code(), None);
    }

    #[test]
    fn test_invalid_utf8_text() {
        let frame = Frame::new(OpCode::Text, vec![0xff, 0xfe]);
        assert_eq!(frame.as_text(), Err(Error::InvalidUtf8));
    }

    #[test]
    fn test_validate_control_frames() {
        assert!(Frame::ping(vec![0; 125]).validate().is_ok());
        assert_eq!(
            Frame::ping(vec![0; 126]).validate(),
            Err(Error::ControlFrameTooLarge(126))
        );

        let mut fragmented = Frame::close(None, "");
        fragmented.fin = false;
        assert_eq!(fragmented.validate(), Err(Error::FragmentedControlFrame));

        let mut partial_text = Frame::text("a");
        partial_text.fin = false;
        assert!(partial_text.validate().is_ok());
    }
}
