//! Test harness for driving wsdraft connections over real TCP sockets.
//!
//! The server echoes every data message back; clients are thin wrappers
//! around [`AsyncTransport`](wsdraft::AsyncTransport).

#![allow(dead_code)]

mod client;
mod server;

use std::collections::VecDeque;

use wsdraft::{CloseCode, Listener, Message, Result};

pub use client::TestClient;
pub use server::TestServer;

/// Listener that queues everything it receives.
#[derive(Debug, Default)]
pub struct Inbox {
    pub messages: VecDeque<Message>,
    pub closed: Option<(CloseCode, bool)>,
}

impl Listener for Inbox {
    fn on_message(&mut self, message: Message) -> Result<()> {
        self.messages.push_back(message);
        Ok(())
    }

    fn on_close(&mut self, code: CloseCode, _reason: &str, remote: bool) {
        self.closed = Some((code, remote));
    }
}
