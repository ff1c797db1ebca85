//! Client side of the harness.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use wsdraft::{AsyncTransport, CloseCode, Config, Connection, Draft, Error, Handshake, Message, ReadyState, Result};

use super::Inbox;

pub struct TestClient {
    transport: AsyncTransport<TcpStream, Inbox>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_with(addr, &Draft::rfc6455(), "/").await
    }

    pub async fn connect_with_id(addr: SocketAddr, id: usize) -> Result<Self> {
        Self::connect_with(addr, &Draft::rfc6455(), &format!("/client/{id}")).await
    }

    pub async fn connect_with(addr: SocketAddr, draft: &Draft, resource: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let conn = Connection::client(Config::client(), draft, Inbox::default());
        let mut transport = AsyncTransport::new(stream, conn);

        let mut request = Handshake::request(resource);
        request.set_header("Host", addr.to_string());
        transport.connection_mut().start_handshake(request)?;
        transport.flush().await?;

        while transport.connection().ready_state() != ReadyState::Open {
            if transport.connection().is_flush_and_close() || transport.read_once().await? == 0 {
                return Err(Error::InvalidHandshake("server refused the handshake".into()));
            }
        }
        Ok(Self { transport })
    }

    pub fn connection(&self) -> &Connection<Inbox> {
        self.transport.connection()
    }

    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.transport.connection_mut().send_text(text)?;
        self.transport.flush().await
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.transport.connection_mut().send_binary(data)?;
        self.transport.flush().await
    }

    /// Next message, or `None` once the connection is gone.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(message) = self.transport.connection_mut().listener_mut().messages.pop_front() {
                return Ok(Some(message));
            }
            if !self.transport.connection().ready_state().can_receive() {
                return Ok(None);
            }
            if self.transport.read_once().await? == 0 {
                return Ok(None);
            }
        }
    }

    pub async fn recv_text(&mut self) -> Result<Option<String>> {
        Ok(self.recv().await?.and_then(|m| m.as_text().map(str::to_string)))
    }

    /// Close and wait for the server to finish the close handshake.
    pub async fn close(&mut self) -> Result<Option<(CloseCode, bool)>> {
        self.transport.connection_mut().close(CloseCode::Normal, "");
        self.transport.run().await?;
        Ok(self.transport.connection().listener().closed)
    }
}
