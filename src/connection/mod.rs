//! The connection state machine.
//!
//! A [`Connection`] owns one negotiated [`Draft`](crate::draft::Draft), an
//! outbound byte queue and a [`Listener`]. It never performs I/O itself:
//! the embedding code feeds it bytes and writes out what it queues.
//!
//! ## Connection Lifecycle
//!
//! 1. **NotYetConnected** - no handshake yet
//! 2. **Connecting** - client request sent
//! 3. **Open** - handshake done, data flows
//! 4. **Closing** - close started, queue draining
//! 5. **Closed** - terminal, `on_close` reported

mod fragmenter;
mod listener;
mod role;
mod state;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::{CloseInfo, Connection};
pub use fragmenter::MessageFragmenter;
pub use listener::{DEFAULT_FLASH_POLICY, Listener};
pub use role::Role;
pub use state::ReadyState;
