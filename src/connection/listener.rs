//! Events a [`Connection`](super::Connection) reports to the application.

use crate::error::{Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::Frame;
use crate::protocol::handshake::Handshake;

/// Reply served to `<policy-file-request/>` probes unless overridden.
pub const DEFAULT_FLASH_POLICY: &str =
    "<cross-domain-policy><allow-access-from domain=\"*\" to-ports=\"*\" /></cross-domain-policy>\0";

/// Event sink owned by a connection.
///
/// Every method has a default, so an implementation only overrides what it
/// cares about. Callbacks run inside `feed`, `send` and `close` and must not
/// block. Errors returned from the fallible callbacks are reported back
/// through [`Listener::on_error`]; the connection state stays consistent.
pub trait Listener {
    /// A draft accepted `request`. Fill in extra response headers or refuse
    /// with [`Error::Rejected`], which answers `404` and closes with the given
    /// code. Any other error answers `500`.
    fn on_handshake_received_as_server(&mut self, request: &Handshake, response: &mut Handshake) -> Result<()> {
        let _ = (request, response);
        Ok(())
    }

    /// The server answered and the draft accepted the answer.
    fn on_handshake_received_as_client(&mut self, request: &Handshake, response: &Handshake) -> Result<()> {
        let _ = (request, response);
        Ok(())
    }

    /// The client request is about to be queued.
    fn on_handshake_sent(&mut self, request: &Handshake) -> Result<()> {
        let _ = request;
        Ok(())
    }

    /// The handshake finished. `handshake` is the peer's half of it.
    fn on_open(&mut self, handshake: &Handshake) -> Result<()> {
        let _ = handshake;
        Ok(())
    }

    /// A complete text or binary message arrived.
    fn on_message(&mut self, message: Message) -> Result<()> {
        let _ = message;
        Ok(())
    }

    /// A piece of a fragmented message, seen before reassembly.
    fn on_fragment(&mut self, frame: &Frame) {
        let _ = frame;
    }

    /// Returns the payload of the pong sent in reply.
    fn on_ping(&mut self, payload: &[u8]) -> Vec<u8> {
        payload.to_vec()
    }

    fn on_pong(&mut self, payload: &[u8]) {
        let _ = payload;
    }

    /// This endpoint is about to send a close frame of its own.
    fn on_close_initiated(&mut self, code: CloseCode, reason: &str) {
        let _ = (code, reason);
    }

    /// No more application data will be accepted; the transport should be
    /// closed once the outbound queue drains.
    fn on_closing(&mut self, code: CloseCode, reason: &str, remote: bool) {
        let _ = (code, reason, remote);
    }

    /// Reported exactly once per connection.
    fn on_close(&mut self, code: CloseCode, reason: &str, remote: bool) {
        let _ = (code, reason, remote);
    }

    fn on_error(&mut self, error: &Error) {
        let _ = error;
    }

    /// Bytes were queued for writing.
    fn on_write_demand(&mut self) {}

    fn flash_policy(&mut self) -> String {
        DEFAULT_FLASH_POLICY.to_string()
    }
}

/// Ignores every event.
impl Listener for () {}
