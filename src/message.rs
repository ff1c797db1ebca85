//! WebSocket message types and close codes.
//!
//! Besides the RFC 6455 status codes, [`CloseCode`] carries three local-only
//! sentinels (`NeverConnected`, `BuggyClose`, `FlashPolicy`) which are recorded
//! and reported to the listener but never written to the wire.

use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;

/// WebSocket close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away (server shutdown, page navigation).
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003). Endpoint refuses this type of data.
    UnsupportedData,
    /// No status received (1005). Close frame carried no code.
    NoStatus,
    /// Abnormal closure (1006). The transport went away without a close frame.
    Abnormal,
    /// Invalid payload (1007). Non-UTF-8 text or inconsistent data.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010). Client expected an extension the server did not negotiate.
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// TLS handshake failure (1015).
    TlsHandshake,
    /// Local: the connection never completed its handshake (-1).
    NeverConnected,
    /// Local: the peer closed in a way the draft does not allow (-2).
    BuggyClose,
    /// Local: the connection served a flash policy file (-3).
    FlashPolicy,
    /// Any other wire code (1012-1014 registered, 3000-4999 applications).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its wire value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            1015 => CloseCode::TlsHandshake,
            other => CloseCode::Other(other),
        }
    }

    /// Numeric value, negative for the local sentinels.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        match self {
            CloseCode::NeverConnected => -1,
            CloseCode::BuggyClose => -2,
            CloseCode::FlashPolicy => -3,
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Other(code) => *code as i32,
        }
    }

    /// Wire value, `None` for the local sentinels.
    #[must_use]
    pub const fn as_u16(&self) -> Option<u16> {
        if self.is_local() {
            None
        } else {
            Some(self.as_i32() as u16)
        }
    }

    /// Returns `true` for codes that exist only inside this process.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            CloseCode::NeverConnected | CloseCode::BuggyClose | CloseCode::FlashPolicy
        )
    }

    /// Check if this close code may appear in a close frame.
    ///
    /// Valid codes are 1000-1003, 1007-1014 and 3000-4999. 1004-1006 and 1015
    /// are reserved, everything else is unassigned.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.as_u16(), Some(1000..=1003 | 1007..=1014 | 3000..=4999))
    }

    /// Check if this close code is reserved and MUST NOT be sent in a close frame.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), Some(1004..=1006 | 1015))
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Close frame containing status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code. `NoStatus` when the payload was empty.
    pub code: CloseCode,
    /// Human-readable reason for closing.
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode the payload of a received close frame.
    ///
    /// An empty payload yields `NoStatus`. A one byte payload, a code that may
    /// not be sent, or a reason that is not UTF-8 are rejected.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidFrame` for a truncated code
    /// - `Error::InvalidCloseCode` for reserved or unassigned codes
    /// - `Error::InvalidUtf8` if the reason is not UTF-8
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        match payload.len() {
            0 => Ok(Self::new(CloseCode::NoStatus, "")),
            1 => Err(Error::InvalidFrame(
                "close frame payload of one byte".into(),
            )),
            _ => {
                let raw = u16::from_be_bytes([payload[0], payload[1]]);
                let code = CloseCode::from_u16(raw);
                if !code.is_valid() {
                    return Err(Error::InvalidCloseCode(raw));
                }
                let reason = std::str::from_utf8(&payload[2..])?;
                Ok(Self::new(code, reason))
            }
        }
    }

    /// Encode this close frame into a control frame payload.
    ///
    /// `NoStatus` produces an empty payload. The reason is cut at a character
    /// boundary so the payload never exceeds the control frame limit.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCloseCode` if the code may not be sent.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        if self.code == CloseCode::NoStatus {
            return Ok(Vec::new());
        }
        let raw = match self.code.as_u16() {
            Some(raw) if self.code.is_valid() => raw,
            Some(raw) => return Err(Error::InvalidCloseCode(raw)),
            None => return Err(Error::InvalidCloseCode(0)),
        };

        let mut end = self.reason.len().min(MAX_CONTROL_FRAME_PAYLOAD - 2);
        while !self.reason.is_char_boundary(end) {
            end -= 1;
        }

        let mut payload = Vec::with_capacity(2 + end);
        payload.extend_from_slice(&raw.to_be_bytes());
        payload.extend_from_slice(&self.reason.as_bytes()[..end]);
        Ok(payload)
    }
}

/// WebSocket message types.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
    /// A ping frame (control frame, payload <= 125 bytes).
    Ping(Vec<u8>),
    /// A pong frame (control frame, payload <= 125 bytes).
    Pong(Vec<u8>),
    /// A close request, optionally with status code and reason.
    Close(Option<CloseFrame>),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// Create a ping message.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Message::Ping(data.into())
    }

    /// Create a close message with status code and reason.
    #[must_use]
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Message::Close(Some(CloseFrame::new(code, reason)))
    }

    /// Returns `true` if this is a data message (text or binary).
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Message::Text(_) | Message::Binary(_))
    }

    /// Borrow the text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the binary content, if this is a binary message.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Message::Binary(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_creation() {
        let msg = Message::text("hello");
        assert_eq!(msg.as_text(), Some("hello"));
        assert!(msg.is_data());
    }

    #[test]
    fn test_message_close_with_code() {
        let msg = Message::close(CloseCode::Normal, "goodbye");
        match msg {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, CloseCode::Normal);
                assert_eq!(frame.reason, "goodbye");
            }
            _ => panic!("Expected Close message with frame"),
        }
    }

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1005), CloseCode::NoStatus);
        assert_eq!(CloseCode::from_u16(1006), CloseCode::Abnormal);
        assert_eq!(CloseCode::from_u16(1007), CloseCode::InvalidPayload);
        assert_eq!(CloseCode::from_u16(1015), CloseCode::TlsHandshake);
        assert_eq!(CloseCode::from_u16(4999), CloseCode::Other(4999));
    }

    #[test]
    fn test_close_code_sentinels() {
        assert_eq!(CloseCode::NeverConnected.as_i32(), -1);
        assert_eq!(CloseCode::BuggyClose.as_i32(), -2);
        assert_eq!(CloseCode::FlashPolicy.as_i32(), -3);
        assert_eq!(CloseCode::FlashPolicy.as_u16(), None);
        assert!(CloseCode::NeverConnected.is_local());
        assert!(!CloseCode::NeverConnected.is_valid());
        assert_eq!(CloseCode::Normal.as_u16(), Some(1000));
    }

    #[test]
    fn test_close_code_validity() {
        assert!(CloseCode::Normal.is_valid());
        assert!(CloseCode::MessageTooBig.is_valid());
        assert!(CloseCode::Other(1012).is_valid());
        assert!(CloseCode::Other(3000).is_valid());
        assert!(CloseCode::Other(4999).is_valid());

        assert!(!CloseCode::Other(999).is_valid());
        assert!(!CloseCode::Other(1004).is_valid());
        assert!(!CloseCode::NoStatus.is_valid());
        assert!(!CloseCode::Abnormal.is_valid());
        assert!(!CloseCode::TlsHandshake.is_valid());
        assert!(!CloseCode::Other(2999).is_valid());
        assert!(!CloseCode::Other(5000).is_valid());

        assert!(CloseCode::NoStatus.is_reserved());
        assert!(!CloseCode::Other(1012).is_reserved());
    }

    #[test]
    fn test_close_payload_empty_is_no_status() {
        let frame = CloseFrame::from_payload(&[]).unwrap();
        assert_eq!(frame.code, CloseCode::NoStatus);
        assert!(frame.reason.is_empty());
        assert!(frame.to_payload().unwrap().is_empty());
    }

    #[test]
    fn test_close_payload_with_reason() {
        let frame = CloseFrame::from_payload(&[0x03, 0xe8, b'b', b'y', b'e']).unwrap();
        assert_eq!(frame, CloseFrame::new(CloseCode::Normal, "bye"));
        assert_eq!(frame.to_payload().unwrap(), vec![0x03, 0xe8, b'b', b'y', b'e']);
    }

    #[test]
    fn test_close_payload_rejects_bad_input() {
        assert!(matches!(
            CloseFrame::from_payload(&[0x03]),
            Err(Error::InvalidFrame(_))
        ));
        // 1005 must never appear on the wire
        assert_eq!(
            CloseFrame::from_payload(&[0x03, 0xed]),
            Err(Error::InvalidCloseCode(1005))
        );
        assert_eq!(
            CloseFrame::from_payload(&[0x03, 0xe8, 0xff]),
            Err(Error::InvalidUtf8)
        );
    }

    #[test]
    fn test_close_payload_refuses_sentinels() {
        let frame = CloseFrame::new(CloseCode::Abnormal, "");
        assert_eq!(frame.to_payload(), Err(Error::InvalidCloseCode(1006)));
        let frame = CloseFrame::new(CloseCode::NeverConnected, "");
        assert!(frame.to_payload().is_err());
    }

    #[test]
    fn test_close_reason_truncated_at_char_boundary() {
        let reason = "é".repeat(100);
        let payload = CloseFrame::new(CloseCode::Normal, reason).to_payload().unwrap();
        assert!(payload.len() <= MAX_CONTROL_FRAME_PAYLOAD);
        assert!(std::str::from_utf8(&payload[2..]).is_ok());
    }
}
