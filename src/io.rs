//! Blocking transport pump.
//!
//! [`read`] moves bytes from a channel into a [`Connection`], [`batch`]
//! writes its outbound queue back out. Channels that transform bytes (TLS
//! and the like) implement [`WrappedChannel`] to tell the pump about data
//! they hold on to; plain streams go through [`Plain`].

use std::io::{self, Read, Write};

use tracing::{trace, warn};

use crate::connection::{Connection, Listener};
use crate::error::{Error, Result};
use crate::message::CloseCode;

/// A byte channel that may buffer data of its own.
pub trait WrappedChannel: Read + Write {
    /// Bytes accepted earlier still have to reach the wire.
    fn needs_more_write(&self) -> bool {
        false
    }

    /// Push out what [`needs_more_write`](Self::needs_more_write) reported.
    fn write_more(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Decoded bytes are waiting that did not fit the last read.
    fn needs_more_read(&self) -> bool {
        false
    }

    /// Hand out already decoded bytes without touching the underlying stream.
    fn read_more(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _ = buf;
        Ok(0)
    }

    fn is_blocking(&self) -> bool {
        true
    }
}

/// A stream with no buffering of its own.
#[derive(Debug)]
pub struct Plain<T>(pub T);

impl<T> Plain<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Read> Read for Plain<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<T: Write> Write for Plain<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<T: Read + Write> WrappedChannel for Plain<T> {}

/// Read once from `channel` and feed whatever arrived to `conn`.
///
/// End of stream is reported to the connection through
/// [`Connection::eot`]. Returns `true` if bytes were fed. Channels that
/// decode internally may hold more; drain them with [`read_more`] while
/// [`WrappedChannel::needs_more_read`] says so.
///
/// # Errors
///
/// Any I/O error other than `WouldBlock` or `Interrupted`. The connection
/// is closed with `CloseCode::Abnormal` before the error is returned.
pub fn read<L, C>(conn: &mut Connection<L>, channel: &mut C, buf: &mut [u8]) -> Result<bool>
where
    L: Listener,
    C: WrappedChannel,
{
    let n = match channel.read(buf) {
        Ok(n) => n,
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => return Ok(false),
        Err(e) => return Err(abort(conn, e.into())),
    };
    if n == 0 {
        trace!("end of stream");
        conn.eot();
        return Ok(false);
    }
    conn.feed(&buf[..n]);
    Ok(true)
}

/// Drain data a [`WrappedChannel`] decoded but could not return earlier.
///
/// Returns whether even more is waiting.
///
/// # Errors
///
/// Any I/O error from [`WrappedChannel::read_more`], after closing the
/// connection with `CloseCode::Abnormal`.
pub fn read_more<L, C>(conn: &mut Connection<L>, channel: &mut C, buf: &mut [u8]) -> Result<bool>
where
    L: Listener,
    C: WrappedChannel,
{
    let n = channel.read_more(buf).map_err(|e| abort(conn, e.into()))?;
    if n > 0 {
        conn.feed(&buf[..n]);
    }
    Ok(channel.needs_more_write() || channel.needs_more_read())
}

/// Write as much of the outbound queue as the channel takes.
///
/// Once the queue is empty and a close is underway the connection is
/// finalised with [`Connection::close_connection`]; the caller then drops
/// the stream. Returns `true` when nothing is left to write.
///
/// # Errors
///
/// Any I/O error other than `WouldBlock` or `Interrupted`. The connection
/// is closed with `CloseCode::Abnormal` before the error is returned.
pub fn batch<L, C>(conn: &mut Connection<L>, channel: &mut C) -> Result<bool>
where
    L: Listener,
    C: WrappedChannel,
{
    write_queue(conn, channel).map_err(|e| abort(conn, e))
}

fn write_queue<L, C>(conn: &mut Connection<L>, channel: &mut C) -> Result<bool>
where
    L: Listener,
    C: WrappedChannel,
{
    if conn.has_buffered_data() {
        while let Some(chunk) = conn.front_outbound() {
            match channel.write(chunk) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => {
                    let partial = n < chunk.len();
                    conn.advance_outbound(n);
                    if partial && !channel.is_blocking() {
                        return Ok(false);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        channel.flush()?;
    } else if channel.needs_more_write() {
        channel.write_more()?;
    }

    if conn.should_close_transport() {
        trace!(role = %conn.role(), "queue drained, closing transport");
        conn.close_connection();
    }
    Ok(!channel.needs_more_write())
}

/// A broken transport: report the error and close abnormally.
fn abort<L: Listener>(conn: &mut Connection<L>, error: Error) -> Error {
    warn!(role = %conn.role(), error = %error, "transport failed");
    conn.listener_mut().on_error(&error);
    conn.close_connection_with(CloseCode::Abnormal, &error.to_string(), false);
    error
}
