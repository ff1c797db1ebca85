//! Echo server on a random port.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use wsdraft::{AsyncTransport, Config, Connection, ReadyState};

use super::Inbox;

pub struct TestServer {
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a server accepting every known draft.
    pub async fn spawn() -> (Self, SocketAddr) {
        Self::spawn_with(Config::server()).await
    }

    pub async fn spawn_with(config: Config) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let config = config.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, config).await;
                });
            }
        });

        (Self { handle }, addr)
    }

    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn serve(stream: TcpStream, config: Config) -> wsdraft::Result<()> {
    let mut transport = AsyncTransport::new(stream, Connection::server(config, Inbox::default()));
    loop {
        transport.flush().await?;
        if transport.connection().ready_state() == ReadyState::Closed {
            return Ok(());
        }
        if transport.read_once().await? == 0 {
            return Ok(());
        }

        let conn = transport.connection_mut();
        while let Some(message) = conn.listener_mut().messages.pop_front() {
            conn.send(message)?;
        }
    }
}
