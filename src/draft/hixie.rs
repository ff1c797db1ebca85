//! Hixie-75 and Hixie-76: sentinel delimited text framing.
//!
//! A text frame is `0x00 <utf-8> 0xFF`. Hixie-76 adds the close frame
//! `0xFF 0x00` and an MD5 challenge computed from two header keys plus
//! eight raw bytes sent after the request headers.

use bytes::{BufMut, Bytes, BytesMut};
use md5::{Digest, Md5};
use tracing::{debug, trace};

use super::{CloseHandshakeType, HandshakeState, basic_accept};
use crate::config::{Config, Limits};
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::handshake::Handshake;
use crate::protocol::mask::{MaskGenerator, fill_random};
use crate::protocol::parse::Parse;
use crate::protocol::{Frame, OpCode};

const FRAME_START: u8 = 0x00;
const FRAME_END: u8 = 0xFF;
const CLOSE_FRAME: [u8; 2] = [FRAME_END, 0x00];

/// Key bytes a client appends to its request.
const REQUEST_KEY_LEN: usize = 8;
/// Challenge bytes a server appends to its response.
const CHALLENGE_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HixieVersion {
    Hixie75,
    Hixie76,
}

/// State of a Hixie draft: the handshake flavour plus the byte-level
/// frame decoder.
#[derive(Debug, Clone)]
pub struct Hixie {
    version: HixieVersion,
    role: Role,
    limits: Limits,
    /// Inside a `0x00 .. 0xFF` frame.
    reading: bool,
    /// Saw `0xFF` outside a frame, expecting the `0x00` of a close.
    close_pending: bool,
    current: BytesMut,
    rng: MaskGenerator,
}

impl Hixie {
    #[must_use]
    pub fn new(version: HixieVersion) -> Self {
        Self {
            version,
            role: Role::Server,
            limits: Limits::default(),
            reading: false,
            close_pending: false,
            current: BytesMut::new(),
            rng: MaskGenerator::new(),
        }
    }

    #[must_use]
    pub fn version(&self) -> HixieVersion {
        self.version
    }

    pub(crate) fn instantiate(&self, role: Role, config: &Config) -> Self {
        Self {
            role,
            limits: config.limits,
            ..Self::new(self.version)
        }
    }

    pub(crate) fn close_handshake_type(&self) -> CloseHandshakeType {
        match self.version {
            HixieVersion::Hixie75 => CloseHandshakeType::None,
            HixieVersion::Hixie76 => CloseHandshakeType::OneWay,
        }
    }

    /// Parse a handshake and, on Hixie-76, the raw key bytes after it.
    ///
    /// Complete headers with missing key bytes come back without content,
    /// so the accept step can answer [`HandshakeState::Matching`].
    pub(crate) fn parse_handshake(&mut self, buf: &[u8]) -> Result<Parse<(Handshake, usize)>> {
        let (mut handshake, used) = match Handshake::parse(buf, self.role)? {
            Parse::Complete(done) => done,
            Parse::Incomplete { hint } => return Ok(Parse::Incomplete { hint }),
        };
        if self.version == HixieVersion::Hixie75 || handshake.has_header("Sec-WebSocket-Version") {
            return Ok(Parse::Complete((handshake, used)));
        }
        if self.role == Role::Server && !handshake.has_header("Sec-WebSocket-Key1") {
            return Ok(Parse::Complete((handshake, used)));
        }

        let needed = match self.role {
            Role::Server => REQUEST_KEY_LEN,
            Role::Client => CHALLENGE_LEN,
        };
        if buf.len() < used + needed {
            trace!(have = buf.len() - used, needed, "waiting for Hixie-76 key bytes");
            return Ok(Parse::Complete((handshake, used)));
        }
        handshake.set_content(Some(buf[used..used + needed].to_vec()));
        Ok(Parse::Complete((handshake, used + needed)))
    }

    pub(crate) fn accept_as_server(&mut self, request: &Handshake) -> HandshakeState {
        if !request.has_header("Origin") || !basic_accept(request) {
            return HandshakeState::NotMatched;
        }
        match self.version {
            HixieVersion::Hixie75 => {
                // A request carrying newer key material belongs to a newer draft.
                if request.has_header("Sec-WebSocket-Key1") || request.has_header("Sec-WebSocket-Version") {
                    HandshakeState::NotMatched
                } else {
                    HandshakeState::Matched
                }
            }
            HixieVersion::Hixie76 => {
                let key1 = request.header_or_empty("Sec-WebSocket-Key1");
                let key2 = request.header_or_empty("Sec-WebSocket-Key2");
                if key1.is_empty() || key2.is_empty() {
                    return HandshakeState::NotMatched;
                }
                if key_part(key1).is_err() || key_part(key2).is_err() {
                    debug!("malformed Hixie-76 keys");
                    return HandshakeState::NotMatched;
                }
                match request.content() {
                    None => HandshakeState::Matching,
                    Some(key3) if key3.len() == REQUEST_KEY_LEN => HandshakeState::Matched,
                    Some(_) => HandshakeState::NotMatched,
                }
            }
        }
    }

    pub(crate) fn accept_as_client(&mut self, request: &Handshake, response: &Handshake) -> HandshakeState {
        if response.status() != Some(101) || !basic_accept(response) {
            return HandshakeState::NotMatched;
        }
        let origin = request.header("Origin");
        match self.version {
            HixieVersion::Hixie75 => {
                if response.header("WebSocket-Origin") == origin {
                    HandshakeState::Matched
                } else {
                    HandshakeState::NotMatched
                }
            }
            HixieVersion::Hixie76 => {
                if response.header("Sec-WebSocket-Origin") != origin {
                    return HandshakeState::NotMatched;
                }
                let Some(answer) = response.content() else {
                    return HandshakeState::Matching;
                };
                let expected = hixie76_challenge(
                    request.header_or_empty("Sec-WebSocket-Key1"),
                    request.header_or_empty("Sec-WebSocket-Key2"),
                    request.content().unwrap_or_default(),
                );
                match expected {
                    Ok(expected) if answer == expected => HandshakeState::Matched,
                    _ => {
                        debug!("Hixie-76 challenge mismatch");
                        HandshakeState::NotMatched
                    }
                }
            }
        }
    }

    pub(crate) fn post_process_request_as_client(&mut self, request: &mut Handshake) {
        request.set_header("Upgrade", "WebSocket");
        request.set_header("Connection", "Upgrade");
        if !request.has_header("Origin") {
            request.set_header("Origin", format!("random{}", self.rng.next_u32()));
        }
        if self.version == HixieVersion::Hixie76 {
            request.set_header("Sec-WebSocket-Key1", generate_key(&mut self.rng));
            request.set_header("Sec-WebSocket-Key2", generate_key(&mut self.rng));
            let mut key3 = vec![0u8; REQUEST_KEY_LEN];
            fill_random(&mut key3);
            request.set_content(Some(key3));
        }
    }

    pub(crate) fn post_process_response_as_server(
        &mut self,
        request: &Handshake,
        response: &mut Handshake,
    ) -> Result<()> {
        let location = format!(
            "ws://{}{}",
            request.header_or_empty("Host"),
            request.resource().unwrap_or("/")
        );
        let origin = request.header_or_empty("Origin").to_string();

        response.set_header("Upgrade", "WebSocket");
        response.set_header("Connection", request.header_or_empty("Connection"));
        match self.version {
            HixieVersion::Hixie75 => {
                response.set_status_message("Web Socket Protocol Handshake");
                response.set_header("WebSocket-Origin", origin);
                response.set_header("WebSocket-Location", location);
            }
            HixieVersion::Hixie76 => {
                response.set_status_message("WebSocket Protocol Handshake");
                response.set_header("Sec-WebSocket-Origin", origin);
                response.set_header("Sec-WebSocket-Location", location);
                let key3 = request
                    .content()
                    .filter(|k| k.len() == REQUEST_KEY_LEN)
                    .ok_or_else(|| Error::InvalidHandshake("bad keys".into()))?;
                let challenge = hixie76_challenge(
                    request.header_or_empty("Sec-WebSocket-Key1"),
                    request.header_or_empty("Sec-WebSocket-Key2"),
                    key3,
                )?;
                response.set_content(Some(challenge.to_vec()));
            }
        }
        Ok(())
    }

    pub(crate) fn encode_frames(&mut self, opcode: OpCode, payload: Bytes, fin: bool) -> Result<Vec<Frame>> {
        match opcode {
            OpCode::Text if fin => Ok(vec![Frame::text(payload)]),
            OpCode::Text | OpCode::Continuation => Err(Error::NotSendable("fragmented messages")),
            _ => Err(Error::NotSendable("binary messages")),
        }
    }

    pub(crate) fn encode_frame(&mut self, frame: &Frame) -> Result<Bytes> {
        match frame.opcode {
            OpCode::Text => {
                let mut buf = BytesMut::with_capacity(frame.payload().len() + 2);
                buf.put_u8(FRAME_START);
                buf.put_slice(frame.payload());
                buf.put_u8(FRAME_END);
                Ok(buf.freeze())
            }
            OpCode::Close if self.version == HixieVersion::Hixie76 => Ok(Bytes::from_static(&CLOSE_FRAME)),
            OpCode::Close => Err(Error::NotSendable("close frames")),
            OpCode::Ping | OpCode::Pong => Err(Error::NotSendable("ping/pong frames")),
            _ => Err(Error::NotSendable("binary messages")),
        }
    }

    pub(crate) fn decode(&mut self, data: &[u8], out: &mut Vec<Frame>) -> Result<()> {
        let result = data.iter().try_for_each(|&byte| self.decode_byte(byte, out));
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn decode_byte(&mut self, byte: u8, out: &mut Vec<Frame>) -> Result<()> {
        if self.close_pending {
            self.close_pending = false;
            if byte != 0x00 {
                return Err(Error::InvalidFrame(format!("unexpected byte {byte:#04x} after 0xFF")));
            }
            trace!("Hixie-76 close frame");
            // Reported as a normal closure.
            out.push(Frame::new(true, OpCode::Close, vec![0x03, 0xE8]));
            return Ok(());
        }

        match (byte, self.reading) {
            (FRAME_START, false) => {
                self.reading = true;
                self.current.clear();
            }
            (FRAME_START, true) => return Err(Error::InvalidFrame("unexpected start of frame".into())),
            (FRAME_END, true) => {
                self.reading = false;
                out.push(Frame::text(self.current.split().freeze()));
            }
            (FRAME_END, false) if self.version == HixieVersion::Hixie76 => self.close_pending = true,
            (_, true) => {
                self.limits.check_frame_size(self.current.len() + 1)?;
                self.current.put_u8(byte);
            }
            (_, false) => {
                return Err(Error::InvalidFrame(format!("unexpected byte {byte:#04x} outside a frame")));
            }
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.reading = false;
        self.close_pending = false;
        self.current.clear();
    }

    pub(crate) fn has_buffered_data(&self) -> bool {
        self.reading || self.close_pending
    }
}

/// Hixie-76 challenge response: MD5 over both key numbers and `key3`.
///
/// # Errors
///
/// Returns `Error::InvalidHandshake` if a key has no digits, no spaces,
/// or a quotient that does not fit 32 bits, or if `key3` is not 8 bytes.
pub fn hixie76_challenge(key1: &str, key2: &str, key3: &[u8]) -> Result<[u8; 16]> {
    if key3.len() != REQUEST_KEY_LEN {
        return Err(Error::InvalidHandshake("key3 must be 8 bytes".into()));
    }
    let mut hasher = Md5::new();
    hasher.update(key_part(key1)?.to_be_bytes());
    hasher.update(key_part(key2)?.to_be_bytes());
    hasher.update(key3);
    let mut challenge = [0u8; 16];
    challenge.copy_from_slice(&hasher.finalize());
    Ok(challenge)
}

/// The digits of `key` read as a number, divided by its space count.
fn key_part(key: &str) -> Result<u32> {
    let digits: String = key.chars().filter(char::is_ascii_digit).collect();
    let number: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidHandshake(format!("invalid Sec-WebSocket-Key: {key}")))?;
    let spaces = key.chars().filter(|&c| c == ' ').count() as u64;
    if spaces == 0 {
        return Err(Error::InvalidHandshake(format!("Sec-WebSocket-Key without spaces: {key}")));
    }
    u32::try_from(number / spaces)
        .map_err(|_| Error::InvalidHandshake(format!("Sec-WebSocket-Key out of range: {key}")))
}

/// A random Hixie-76 key: `number * spaces` with 1 to 12 non-digit
/// characters and then `spaces` spaces scattered through it.
fn generate_key(rng: &mut MaskGenerator) -> String {
    let spaces = rng.next_in(1, 12);
    let number = rng.next_in(1, u32::MAX / spaces);
    let mut key: Vec<u8> = (u64::from(number) * u64::from(spaces)).to_string().into_bytes();

    for _ in 0..rng.next_in(1, 12) {
        let position = rng.next_in(0, key.len() as u32 - 1) as usize;
        let mut c = rng.next_in(33, 126) as u8;
        if c.is_ascii_digit() {
            c -= 15;
        }
        key.insert(position, c);
    }
    for _ in 0..spaces {
        let position = rng.next_in(1, key.len() as u32 - 1) as usize;
        key.insert(position, b' ');
    }
    String::from_utf8_lossy(&key).into_owned()
}
