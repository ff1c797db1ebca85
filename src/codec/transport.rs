use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::connection::{Connection, Listener, ReadyState};
use crate::error::Result;

/// A [`Connection`] bound to a tokio stream.
///
/// The connection stays sans-IO; this type only shovels bytes. Use
/// [`connection_mut`](Self::connection_mut) to send and
/// [`flush`](Self::flush) to put the queued bytes on the wire.
pub struct AsyncTransport<T, L> {
    io: T,
    conn: Connection<L>,
    read_buf: BytesMut,
}

impl<T, L: Listener> AsyncTransport<T, L> {
    #[must_use]
    pub fn new(io: T, conn: Connection<L>) -> Self {
        let read_buf = BytesMut::with_capacity(conn.config().read_buffer_size);
        Self { io, conn, read_buf }
    }

    #[must_use]
    pub fn connection(&self) -> &Connection<L> {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection<L> {
        &mut self.conn
    }

    #[must_use]
    pub fn into_parts(self) -> (T, Connection<L>) {
        (self.io, self.conn)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin, L: Listener> AsyncTransport<T, L> {
    /// Read once and feed the bytes to the connection.
    ///
    /// Returns the number of bytes read; `0` means end of stream, which has
    /// been reported through [`Connection::eot`].
    ///
    /// # Errors
    ///
    /// Any I/O error from the stream.
    pub async fn read_once(&mut self) -> Result<usize> {
        self.read_buf.clear();
        self.read_buf.reserve(self.conn.config().read_buffer_size.max(1));
        let n = self.io.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            trace!("end of stream");
            self.conn.eot();
        } else {
            self.conn.feed(&self.read_buf);
        }
        Ok(n)
    }

    /// Write the whole outbound queue.
    ///
    /// When a close is underway and this side owns the transport, the stream
    /// is shut down and the connection finalised.
    ///
    /// # Errors
    ///
    /// Any I/O error from the stream.
    pub async fn flush(&mut self) -> Result<()> {
        while let Some(chunk) = self.conn.pop_outbound() {
            self.io.write_all(&chunk).await?;
        }
        self.io.flush().await?;

        if self.conn.should_close_transport() {
            trace!(role = %self.conn.role(), "queue drained, shutting down");
            self.io.shutdown().await?;
            self.conn.close_connection();
        }
        Ok(())
    }

    /// Pump until the connection is closed or the stream ends.
    ///
    /// # Errors
    ///
    /// Any I/O error from the stream. The connection is finalised with
    /// `CloseCode::Abnormal` before the error is returned.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.pump().await;
        if let Err(e) = &result {
            self.conn.listener_mut().on_error(e);
            self.conn.close_connection_with(e.close_code(), &e.to_string(), false);
        }
        result
    }

    async fn pump(&mut self) -> Result<()> {
        loop {
            self.flush().await?;
            if self.conn.ready_state() == ReadyState::Closed {
                return Ok(());
            }
            if self.read_once().await? == 0 {
                return Ok(());
            }
        }
    }
}
