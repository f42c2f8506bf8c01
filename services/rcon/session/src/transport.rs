//! TCP transport for remote console sessions.
//!
//! [`TcpConnector`] opens plain TCP connections and wraps them in the
//! `rcon-wire` codec. [`TcpRconClient`] implements the request/response
//! discipline on top of the packet stream.

use crate::client::{ClientError, Connector, RconClient};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use rcon_wire::{Packet, PacketType, RconCodec, AUTH_FAILED_ID, DEFAULT_MAX_PACKET_SIZE};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

/// Servers split long output into packets of roughly this body size; a
/// shorter packet marks the end of a response.
pub const RESPONSE_SPLIT_THRESHOLD: usize = 4000;

/// Opens TCP connections framed with [`RconCodec`]
#[derive(Debug, Clone)]
pub struct TcpConnector {
    max_packet_size: usize,
}

impl TcpConnector {
    /// Create a connector with the default packet size limit
    pub fn new() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    /// Override the packet size limit
    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn RconClient>, ClientError> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        debug!("Opened TCP connection to {}:{}", host, port);

        let codec = RconCodec::with_max_packet_size(self.max_packet_size);
        Ok(Box::new(TcpRconClient::new(Framed::new(stream, codec))))
    }
}

/// RCON client over a framed TCP stream
pub struct TcpRconClient {
    framed: Framed<TcpStream, RconCodec>,
    next_id: i32,
    connected: bool,
    authenticated: bool,
    broken: bool,
}

impl TcpRconClient {
    /// Wrap an already framed stream
    pub fn new(framed: Framed<TcpStream, RconCodec>) -> Self {
        Self {
            framed,
            next_id: 0,
            connected: true,
            authenticated: false,
            broken: false,
        }
    }

    fn allocate_id(&mut self) -> i32 {
        // Stay positive; -1 is the auth failure marker
        self.next_id = if self.next_id >= i32::MAX - 1 {
            1
        } else {
            self.next_id + 1
        };
        self.next_id
    }

    fn mark_broken(&mut self) {
        self.broken = true;
        self.connected = false;
        self.authenticated = false;
    }

    async fn send(&mut self, packet: Packet) -> Result<(), ClientError> {
        if let Err(e) = self.framed.send(packet).await {
            self.mark_broken();
            return Err(e.into());
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Packet, ClientError> {
        match self.framed.next().await {
            Some(Ok(packet)) => Ok(packet),
            Some(Err(e)) => {
                self.mark_broken();
                Err(e.into())
            }
            None => {
                self.mark_broken();
                Err(ClientError::Closed)
            }
        }
    }
}

#[async_trait]
impl RconClient for TcpRconClient {
    async fn authenticate(&mut self, secret: &str) -> Result<(), ClientError> {
        let id = self.allocate_id();
        self.send(Packet::auth(id, secret)).await?;

        loop {
            let packet = self.recv().await?;
            if packet.kind != PacketType::AUTH_RESPONSE {
                // Servers send an empty RESPONSE_VALUE ahead of the verdict
                trace!("Skipping packet type={} while authenticating", packet.kind);
                continue;
            }

            if packet.id == AUTH_FAILED_ID {
                self.authenticated = false;
                return Err(ClientError::AuthRejected);
            }
            if packet.id == id {
                self.authenticated = true;
                return Ok(());
            }
            trace!("Ignoring auth response for stale id {}", packet.id);
        }
    }

    async fn execute(&mut self, command: &str) -> Result<String, ClientError> {
        if !self.authenticated {
            return Err(ClientError::NotAuthenticated);
        }

        let id = self.allocate_id();
        self.send(Packet::exec(id, command)).await?;

        let mut response = String::new();
        loop {
            let packet = self.recv().await?;

            if packet.kind == PacketType::AUTH_RESPONSE && packet.id == AUTH_FAILED_ID {
                warn!("Server revoked authentication");
                self.authenticated = false;
                return Err(ClientError::AuthRejected);
            }
            if packet.id != id {
                // Late answer to a command the caller already gave up on
                trace!("Discarding packet for stale id {} (want {})", packet.id, id);
                continue;
            }

            response.push_str(&packet.body_text());
            if packet.body.len() < RESPONSE_SPLIT_THRESHOLD {
                return Ok(response);
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn is_writable(&self) -> bool {
        self.connected && !self.broken
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.connected = false;
        self.authenticated = false;

        // Flush and shut down the write half, then wait for the peer's EOF
        let result = self.framed.close().await;
        while let Some(item) = self.framed.next().await {
            if item.is_err() {
                break;
            }
        }
        self.broken = true;
        result.map_err(ClientError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tokio::net::TcpListener;

    /// Minimal server: accepts one connection, checks the secret, answers
    /// every command with `echo: <command>`.
    async fn spawn_server(secret: &'static str) -> SocketAddr {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, RconCodec::new());

            while let Some(Ok(packet)) = framed.next().await {
                if packet.kind == PacketType::AUTH {
                    let ok = &packet.body[..] == secret.as_bytes();
                    let reply_id = if ok { packet.id } else { AUTH_FAILED_ID };
                    framed
                        .send(Packet::new(packet.id, PacketType::RESPONSE_VALUE, ""))
                        .await
                        .unwrap();
                    framed
                        .send(Packet::new(reply_id, PacketType::AUTH_RESPONSE, ""))
                        .await
                        .unwrap();
                } else {
                    let body = format!("echo: {}", packet.body_text());
                    framed
                        .send(Packet::new(packet.id, PacketType::RESPONSE_VALUE, body))
                        .await
                        .unwrap();
                }
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_tcp_auth_and_execute() {
        let addr = spawn_server("secret").await;
        let mut client = TcpConnector::new()
            .open(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();

        assert!(client.is_connected());
        assert!(!client.is_authenticated());
        client.authenticate("secret").await.unwrap();
        assert!(client.is_authenticated());

        let response = client.execute("hostname").await.unwrap();
        assert_eq!(response, "echo: hostname");

        client.close().await.unwrap();
        assert!(!client.is_connected());
        assert!(!client.is_writable());
    }

    #[tokio::test]
    async fn test_tcp_auth_rejected() {
        let addr = spawn_server("secret").await;
        let mut client = TcpConnector::new()
            .open(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();

        let err = client.authenticate("wrong").await.unwrap_err();
        assert!(matches!(err, ClientError::AuthRejected));
        assert!(!client.is_authenticated());
        assert!(matches!(
            client.execute("status").await,
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_tcp_peer_close_marks_unwritable() {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut client = TcpConnector::new()
            .open(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();
        assert!(client.authenticate("secret").await.is_err());
        assert!(!client.is_writable());
        assert!(!client.is_connected());
    }
}
