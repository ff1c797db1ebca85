//! Protocol-version variants ("drafts").
//!
//! A [`Draft`] bundles the handshake acceptance rules, the framing and the
//! close-handshake policy of one protocol revision:
//!
//! | variant   | handshake proof            | framing                  | close    |
//! |-----------|----------------------------|--------------------------|----------|
//! | Hixie-75  | none                       | `0x00 text 0xFF`         | None     |
//! | Hixie-76  | MD5 challenge, 8 key bytes | `0x00 text 0xFF`, `FF 00`| OneWay   |
//! | HyBi-10   | SHA-1 accept, version 7/8  | binary frames            | TwoWay   |
//! | RFC 6455  | SHA-1 accept, version 13   | binary frames            | TwoWay   |
//!
//! Drafts held in [`Config`] are templates. A connection always works on
//! its own instance obtained through [`Draft::instantiate`], because every
//! instance buffers partially received bytes.

mod hixie;
mod hybi;

pub use hixie::{Hixie, HixieVersion, hixie76_challenge};
pub use hybi::{Hybi, HybiVersion};

use std::fmt;

use bytes::Bytes;

use crate::config::Config;
use crate::connection::Role;
use crate::error::Result;
use crate::extensions::Extension;
use crate::protocol::handshake::Handshake;
use crate::protocol::parse::Parse;
use crate::protocol::{Frame, OpCode};

/// Probe sent by Flash players before opening a socket.
pub const FLASH_POLICY_REQUEST: &[u8] = b"<policy-file-request/>\0";

/// Verdict of a draft on a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Matched,
    NotMatched,
    /// The draft recognises the request but needs more bytes to decide.
    Matching,
}

/// How a draft ends a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseHandshakeType {
    /// No close frame, the transport is simply closed.
    None,
    /// One side sends a close frame, nobody answers it.
    OneWay,
    /// Close frames are exchanged in both directions.
    TwoWay,
}

/// Identifies a draft without its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftKind {
    Hixie75,
    Hixie76,
    Hybi10,
    Rfc6455,
}

impl fmt::Display for DraftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DraftKind::Hixie75 => "Hixie-75",
            DraftKind::Hixie76 => "Hixie-76",
            DraftKind::Hybi10 => "HyBi-10",
            DraftKind::Rfc6455 => "RFC 6455",
        })
    }
}

/// A protocol revision plus its per-connection state.
#[derive(Debug, Clone)]
pub enum Draft {
    Hixie(Hixie),
    Hybi(Hybi),
}

impl Draft {
    #[must_use]
    pub fn hixie75() -> Self {
        Draft::Hixie(Hixie::new(HixieVersion::Hixie75))
    }

    #[must_use]
    pub fn hixie76() -> Self {
        Draft::Hixie(Hixie::new(HixieVersion::Hixie76))
    }

    #[must_use]
    pub fn hybi10() -> Self {
        Draft::Hybi(Hybi::new(HybiVersion::Hybi10))
    }

    #[must_use]
    pub fn rfc6455() -> Self {
        Draft::Hybi(Hybi::new(HybiVersion::Rfc6455))
    }

    /// RFC 6455 with subprotocol and extension negotiation.
    #[must_use]
    pub fn rfc6455_with(protocols: Vec<String>, extensions: Vec<Extension>) -> Self {
        Draft::Hybi(
            Hybi::new(HybiVersion::Rfc6455)
                .with_protocols(protocols)
                .with_extensions(extensions),
        )
    }

    /// Every supported draft, newest first.
    #[must_use]
    pub fn all() -> Vec<Self> {
        vec![
            Self::rfc6455(),
            Self::hybi10(),
            Self::hixie76(),
            Self::hixie75(),
        ]
    }

    #[must_use]
    pub fn kind(&self) -> DraftKind {
        match self {
            Draft::Hixie(h) => match h.version() {
                HixieVersion::Hixie75 => DraftKind::Hixie75,
                HixieVersion::Hixie76 => DraftKind::Hixie76,
            },
            Draft::Hybi(h) => match h.version() {
                HybiVersion::Hybi10 => DraftKind::Hybi10,
                HybiVersion::Rfc6455 => DraftKind::Rfc6455,
            },
        }
    }

    /// A fresh instance bound to `role`, sharing only configuration.
    #[must_use]
    pub fn instantiate(&self, role: Role, config: &Config) -> Self {
        match self {
            Draft::Hixie(h) => Draft::Hixie(h.instantiate(role, config)),
            Draft::Hybi(h) => Draft::Hybi(h.instantiate(role, config)),
        }
    }

    #[must_use]
    pub fn close_handshake_type(&self) -> CloseHandshakeType {
        match self {
            Draft::Hixie(h) => h.close_handshake_type(),
            Draft::Hybi(_) => CloseHandshakeType::TwoWay,
        }
    }

    /// Parse the peer's handshake, trailing key material included.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` for malformed input.
    pub fn parse_handshake(&mut self, buf: &[u8]) -> Result<Parse<(Handshake, usize)>> {
        match self {
            Draft::Hixie(h) => h.parse_handshake(buf),
            Draft::Hybi(h) => Handshake::parse(buf, h.role()),
        }
    }

    pub fn accept_as_server(&mut self, request: &Handshake) -> HandshakeState {
        match self {
            Draft::Hixie(h) => h.accept_as_server(request),
            Draft::Hybi(h) => h.accept_as_server(request),
        }
    }

    pub fn accept_as_client(&mut self, request: &Handshake, response: &Handshake) -> HandshakeState {
        match self {
            Draft::Hixie(h) => h.accept_as_client(request, response),
            Draft::Hybi(h) => h.accept_as_client(request, response),
        }
    }

    /// Add the headers (and key material) this draft needs in a request.
    pub fn post_process_request_as_client(&mut self, request: &mut Handshake) {
        match self {
            Draft::Hixie(h) => h.post_process_request_as_client(request),
            Draft::Hybi(h) => h.post_process_request_as_client(request),
        }
    }

    /// Fill in the response to an accepted request.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` if the request lacks what the
    /// response must be derived from.
    pub fn post_process_response_as_server(
        &mut self,
        request: &Handshake,
        response: &mut Handshake,
    ) -> Result<()> {
        match self {
            Draft::Hixie(h) => h.post_process_response_as_server(request, response),
            Draft::Hybi(h) => h.post_process_response_as_server(request, response),
        }
    }

    /// Frames carrying one data message, or one fragment stream step when
    /// `fin` is false.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSendable` for messages the draft cannot express.
    pub fn encode_frames(&mut self, opcode: OpCode, payload: Bytes, fin: bool) -> Result<Vec<Frame>> {
        match self {
            Draft::Hixie(h) => h.encode_frames(opcode, payload, fin),
            Draft::Hybi(h) => Ok(h.encode_frames(opcode, payload, fin)),
        }
    }

    /// Wire bytes for one frame, masked when the role requires it.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSendable` or control frame errors.
    pub fn encode_frame(&mut self, frame: Frame) -> Result<Bytes> {
        match self {
            Draft::Hixie(h) => h.encode_frame(&frame),
            Draft::Hybi(h) => h.encode_frame(frame),
        }
    }

    /// Decode as many frames as `data` (plus earlier leftovers) completes.
    ///
    /// Frames decoded before an error are left in `out`.
    ///
    /// # Errors
    ///
    /// Any framing violation. Buffered bytes are discarded on error.
    pub fn decode(&mut self, data: &[u8], out: &mut Vec<Frame>) -> Result<()> {
        match self {
            Draft::Hixie(h) => h.decode(data, out),
            Draft::Hybi(h) => h.decode(data, out),
        }
    }

    /// Drop any partially decoded input.
    pub fn reset(&mut self) {
        match self {
            Draft::Hixie(h) => h.reset(),
            Draft::Hybi(h) => h.reset(),
        }
    }

    #[must_use]
    pub fn has_buffered_data(&self) -> bool {
        match self {
            Draft::Hixie(h) => h.has_buffered_data(),
            Draft::Hybi(h) => h.has_buffered_data(),
        }
    }

    /// Subprotocol agreed during the handshake.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        match self {
            Draft::Hixie(_) => None,
            Draft::Hybi(h) => h.protocol(),
        }
    }

    /// Extensions agreed during the handshake.
    #[must_use]
    pub fn active_extensions(&self) -> &[Extension] {
        match self {
            Draft::Hixie(_) => &[],
            Draft::Hybi(h) => h.active_extensions(),
        }
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind().fmt(f)
    }
}

/// `Upgrade: websocket` and a `Connection` header mentioning upgrade.
pub(crate) fn basic_accept(handshake: &Handshake) -> bool {
    handshake
        .header("Upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
        && handshake
            .header("Connection")
            .is_some_and(|v| v.to_ascii_lowercase().contains("upgrade"))
}

/// Outcome of testing buffered bytes for the flash policy probe.
pub(crate) fn match_flash_policy(buf: &[u8]) -> HandshakeState {
    if buf.len() >= FLASH_POLICY_REQUEST.len() {
        if buf.starts_with(FLASH_POLICY_REQUEST) {
            HandshakeState::Matched
        } else {
            HandshakeState::NotMatched
        }
    } else if FLASH_POLICY_REQUEST.starts_with(buf) {
        HandshakeState::Matching
    } else {
        HandshakeState::NotMatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_close_types() {
        let expected = [
            (DraftKind::Rfc6455, CloseHandshakeType::TwoWay),
            (DraftKind::Hybi10, CloseHandshakeType::TwoWay),
            (DraftKind::Hixie76, CloseHandshakeType::OneWay),
            (DraftKind::Hixie75, CloseHandshakeType::None),
        ];
        for (draft, (kind, close)) in Draft::all().iter().zip(expected) {
            assert_eq!(draft.kind(), kind);
            assert_eq!(draft.close_handshake_type(), close);
        }
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let template = Draft::rfc6455();
        let config = Config::default();
        let mut a = template.instantiate(Role::Client, &config);
        let b = template.instantiate(Role::Client, &config);

        let mut out = Vec::new();
        a.decode(&[0x81], &mut out).unwrap();
        assert!(a.has_buffered_data());
        assert!(!b.has_buffered_data());
        assert!(!template.has_buffered_data());
    }

    #[test]
    fn test_flash_policy_probe() {
        assert_eq!(match_flash_policy(FLASH_POLICY_REQUEST), HandshakeState::Matched);
        assert_eq!(match_flash_policy(b"<policy-file"), HandshakeState::Matching);
        assert_eq!(match_flash_policy(b"GET / HTTP/1.1\r\n"), HandshakeState::NotMatched);
        assert_eq!(match_flash_policy(b""), HandshakeState::Matching);
    }

    #[test]
    fn test_basic_accept() {
        let mut request = Handshake::request("/");
        request.set_header("Upgrade", "WebSocket");
        request.set_header("Connection", "keep-alive, Upgrade");
        assert!(basic_accept(&request));
        request.set_header("Connection", "close");
        assert!(!basic_accept(&request));
    }

    #[test]
    fn test_display() {
        assert_eq!(Draft::hixie76().to_string(), "Hixie-76");
        assert_eq!(Draft::rfc6455().to_string(), "RFC 6455");
    }
}
