//! WebSocket frame parsing and serialization (RFC 6455 / HyBi).
//!
//! Decoding is incremental: [`Frame::parse`] looks at whatever bytes are
//! buffered and either yields a frame plus the number of bytes it used, or
//! reports how large the frame will be once complete. Nothing is consumed
//! from the caller's buffer until a whole frame is present.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::parse::Parse;
use crate::protocol::validation::FrameValidator;
use crate::protocol::OpCode;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Decoded frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload_len: usize,
    /// Header bytes, extended length and mask key included.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a frame header from the front of `buf`.
    ///
    /// Control frame rules are checked here so an oversized or fragmented
    /// control frame is refused before its payload arrives.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedOpcode` / `Error::InvalidOpcode` for unknown opcodes
    /// - `Error::FragmentedControlFrame`, `Error::ControlFrameTooLarge`
    /// - `Error::InvalidFrame` if the 64-bit length has its high bit set
    /// - `Error::PayloadTooLargeForPlatform` if the length does not fit `usize`
    pub fn parse(buf: &[u8]) -> Result<Parse<Self>> {
        if buf.len() < 2 {
            return Ok(Parse::Incomplete { hint: 2 });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];

        let fin = (byte0 & 0x80) != 0;
        let rsv1 = (byte0 & 0x40) != 0;
        let rsv2 = (byte0 & 0x20) != 0;
        let rsv3 = (byte0 & 0x10) != 0;
        let opcode = OpCode::from_u8(byte0 & 0x0F)?;

        let masked = (byte1 & 0x80) != 0;
        let len_marker = byte1 & 0x7F;

        let (payload_len, len_end) = match len_marker {
            0..=125 => (len_marker as usize, 2),
            126 => {
                if buf.len() < 4 {
                    return Ok(Parse::Incomplete { hint: 4 });
                }
                (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
            }
            _ => {
                if buf.len() < 10 {
                    return Ok(Parse::Incomplete { hint: 10 });
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                let len_u64 = u64::from_be_bytes(raw);
                if len_u64 >> 63 != 0 {
                    return Err(Error::InvalidFrame(
                        "most significant bit of 64-bit length is set".into(),
                    ));
                }
                let len = usize::try_from(len_u64).map_err(|_| {
                    Error::PayloadTooLargeForPlatform {
                        size: len_u64,
                        max: usize::MAX as u64,
                    }
                })?;
                (len, 10)
            }
        };

        if opcode.is_control() {
            if !fin {
                return Err(Error::FragmentedControlFrame);
            }
            if payload_len > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(payload_len));
            }
        }

        let header_len = if masked { len_end + 4 } else { len_end };
        if buf.len() < header_len {
            return Ok(Parse::Incomplete { hint: header_len });
        }

        let mask = masked.then(|| [buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]]);

        Ok(Parse::Complete(FrameHeader {
            fin,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            mask,
            payload_len,
            header_len,
        }))
    }

    /// Total size of the frame on the wire.
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLargeForPlatform` if the sum overflows.
    pub fn frame_len(&self) -> Result<usize> {
        self.header_len
            .checked_add(self.payload_len)
            .ok_or(Error::PayloadTooLargeForPlatform {
                size: self.payload_len as u64,
                max: usize::MAX as u64,
            })
    }
}

/// A WebSocket frame.
///
/// The payload is always held unmasked. `mask` records the key the frame was
/// received with, or the key it will be sent with.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                   Masking key (if present)                    |
/// +---------------------------------------------------------------+
/// |                         Payload data                          |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    payload: Bytes,
}

impl Frame {
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Attach the key this frame will be masked with.
    #[must_use]
    pub fn with_mask(mut self, mask: Option<[u8; 4]>) -> Self {
        self.mask = mask;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Parse one frame from the front of `buf` without any policy checks.
    ///
    /// # Errors
    ///
    /// Any error from [`FrameHeader::parse`].
    pub fn parse(buf: &[u8]) -> Result<Parse<(Self, usize)>> {
        Self::parse_inner(buf, None)
    }

    /// Parse one frame, letting `validator` veto the header before the
    /// payload is waited for.
    ///
    /// # Errors
    ///
    /// Any error from [`FrameHeader::parse`] or [`FrameValidator::validate_header`].
    pub fn parse_checked(buf: &[u8], validator: &FrameValidator) -> Result<Parse<(Self, usize)>> {
        Self::parse_inner(buf, Some(validator))
    }

    fn parse_inner(buf: &[u8], validator: Option<&FrameValidator>) -> Result<Parse<(Self, usize)>> {
        let header = match FrameHeader::parse(buf)? {
            Parse::Complete(header) => header,
            Parse::Incomplete { hint } => return Ok(Parse::Incomplete { hint }),
        };

        if let Some(validator) = validator {
            validator.validate_header(&header)?;
        }

        let total = header.frame_len()?;
        if buf.len() < total {
            return Ok(Parse::Incomplete { hint: total });
        }

        let mut payload = BytesMut::from(&buf[header.header_len..total]);
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }

        let frame = Frame {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            mask: header.mask,
            payload: payload.freeze(),
        };
        Ok(Parse::Complete((frame, total)))
    }

    /// Check the structural rules every frame must satisfy.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV bits are set
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload > 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
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

    /// Append the wire form of this frame to `dst`, masking with `self.mask`.
    pub fn encode(&self, dst: &mut BytesMut) {
        let payload_len = self.payload.len();
        dst.reserve(self.wire_size());

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        dst.put_u8(byte0);

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= 125 {
            dst.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= 65535 {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(payload_len as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(payload_len as u64);
        }

        match self.mask {
            Some(mask) => {
                dst.put_slice(&mask);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask_fast(&mut dst[start..], mask);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Encode into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Number of bytes [`Frame::encode`] will write.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_size = if self.mask.is_some() { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}
