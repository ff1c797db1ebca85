//! # wsdraft - Transport-agnostic WebSocket protocol engine
//!
//! `wsdraft` implements the WebSocket wire protocol without owning a socket.
//! It speaks RFC 6455 and the earlier drafts still found in the wild
//! (HyBi-10, Hixie-76, Hixie-75), negotiating the right one per connection.
//!
//! ## Features
//!
//! - **Incremental decoding**: bytes may arrive split at any position
//! - **Draft negotiation**: a server tries every configured draft in order
//! - **Close handshake** with one-way and two-way variants
//! - **Resource limits** on frames, messages, fragments and handshakes
//! - **Blocking and tokio pumps** in [`io`] and `codec`
//!
//! ## Quick Start
//!
//! ```
//! use wsdraft::{Config, Connection, Handshake, Message, ReadyState};
//!
//! let mut server = Connection::server(Config::server(), ());
//! server.feed(
//!     b"GET /chat HTTP/1.1\r\n\
//!       Host: example.com\r\n\
//!       Upgrade: websocket\r\n\
//!       Connection: Upgrade\r\n\
//!       Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
//!       Sec-WebSocket-Version: 13\r\n\r\n",
//! );
//! assert_eq!(server.ready_state(), ReadyState::Open);
//!
//! server.send(Message::text("hello")).unwrap();
//! while let Some(bytes) = server.pop_outbound() {
//!     // write `bytes` to the socket
//!     let _ = bytes;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod draft;
pub mod error;
pub mod extensions;
pub mod io;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod codec;

pub use config::{Config, Limits};
pub use connection::{CloseInfo, Connection, Listener, ReadyState, Role};
pub use draft::{CloseHandshakeType, Draft, DraftKind, HandshakeState};
pub use error::{Error, Result};
pub use extensions::{Extension, ExtensionOffer};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{Frame, Handshake, OpCode, Parse, WS_GUID, compute_accept_key};

#[cfg(feature = "async-tokio")]
pub use codec::AsyncTransport;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Limits>();
        assert_send::<Message>();
        assert_send::<CloseCode>();
        assert_send::<CloseFrame>();
        assert_send::<ReadyState>();
        assert_send::<Role>();
        assert_send::<Draft>();
        assert_send::<Handshake>();
        assert_send::<Connection<()>>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Limits>();
        assert_sync::<Message>();
        assert_sync::<CloseCode>();
        assert_sync::<CloseFrame>();
        assert_sync::<ReadyState>();
        assert_sync::<Role>();
        assert_sync::<Draft>();
    }
}
