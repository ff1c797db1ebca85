//! Error types for the WebSocket protocol engine.
//!
//! Every error that can terminate a connection knows which close code it maps
//! to, see [`Error::close_code`]. Running out of input is not an error: parse
//! functions report it through [`Parse::Incomplete`](crate::protocol::Parse).

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in a text frame or close reason.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Declared payload length does not fit in `usize`.
    #[error("Payload length {size} exceeds platform maximum {max}")]
    PayloadTooLargeForPlatform {
        /// Declared length.
        size: u64,
        /// Largest addressable length.
        max: u64,
    },

    /// Handshake exceeds the configured maximum before its terminator was seen.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// A header value would break the handshake framing.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was refused.
        reason: String,
    },

    /// Origin is not on the configured allow-list.
    #[error("Origin not allowed: {origin}")]
    OriginNotAllowed {
        /// The offending origin.
        origin: String,
    },

    /// The application refused the handshake.
    #[error("Handshake rejected ({code}): {reason}")]
    Rejected {
        /// Close code recorded for the refused connection.
        code: CloseCode,
        /// Human readable reason.
        reason: String,
    },

    /// Operation requires an open connection.
    #[error("Connection is not open")]
    NotConnected,

    /// The bound draft cannot carry this kind of message.
    #[error("{0} cannot be sent with this draft")]
    NotSendable(&'static str),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid close code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Invalid extension configuration or negotiation.
    #[error("Invalid extension: {0}")]
    InvalidExtension(String),
}

impl Error {
    /// Close code sent (or recorded) when this error ends a connection.
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        match self {
            Error::InvalidUtf8 => CloseCode::InvalidPayload,
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. }
            | Error::PayloadTooLargeForPlatform { .. } => CloseCode::MessageTooBig,
            Error::OriginNotAllowed { .. } => CloseCode::PolicyViolation,
            Error::Rejected { code, .. } => *code,
            Error::InvalidExtension(_) => CloseCode::MandatoryExtension,
            Error::Io(_) => CloseCode::Abnormal,
            _ => CloseCode::ProtocolError,
        }
    }

    /// Shorthand for an application rejection.
    #[must_use]
    pub fn rejected(code: CloseCode, reason: impl Into<String>) -> Self {
        Error::Rejected {
            code,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
