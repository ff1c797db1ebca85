//! Async transport pump for tokio streams.
//!
//! This module drives a [`Connection`](crate::Connection) over any
//! `AsyncRead + AsyncWrite` stream.

mod transport;

pub use transport::AsyncTransport;
