// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! WebSocket Transport
//!
//! Production transport using tungstenite for WebSocket connections.
//! Supports both native-tls and rustls TLS backends; the relay core
//! never touches transport security directly.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

#[cfg(all(feature = "network-native-tls", not(feature = "network-rustls")))]
use native_tls::TlsConnector;

#[cfg(feature = "network-rustls")]
use rustls::pki_types::ServerName;
#[cfg(feature = "network-rustls")]
use std::sync::Arc;

use serde::Serialize;
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use super::codec::FRAME_HEADER_SIZE;
use super::error::RelayError;
use super::transport::{Credentials, Transport, TransportConfig, TransportResult};

/// Login frame sent as the first element after the stream is up. The
/// server closes the stream on bad credentials, which surfaces as
/// `ConnectionClosed` on the first read.
#[derive(Serialize)]
struct LoginFrame<'a> {
    message_type: &'static str,
    identity: &'a str,
    secret: &'a str,
}

/// WebSocket transport for the relay connection.
///
/// Supports both ws:// (plaintext, for local testing) and wss:// (TLS).
pub struct WebSocketTransport {
    socket: Option<WebSocket<MaybeTlsStream<TcpStream>>>,
    connected: bool,
}

impl WebSocketTransport {
    /// Creates a new WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport {
            socket: None,
            connected: false,
        }
    }

    /// Parses a WebSocket URL into host, port, and TLS flag.
    fn parse_url(url: &str) -> Result<(String, u16, bool), RelayError> {
        let is_tls = url.starts_with("wss://");
        let url_without_scheme = url
            .strip_prefix("wss://")
            .or_else(|| url.strip_prefix("ws://"))
            .ok_or_else(|| {
                RelayError::ConnectFailed("invalid URL scheme (expected ws:// or wss://)".into())
            })?;

        // Split host:port/path
        let host_port = url_without_scheme
            .split('/')
            .next()
            .unwrap_or(url_without_scheme);

        let (host, port) = if let Some(colon_pos) = host_port.rfind(':') {
            let host = &host_port[..colon_pos];
            let port_str = &host_port[colon_pos + 1..];
            let port: u16 = port_str
                .parse()
                .map_err(|_| RelayError::ConnectFailed(format!("invalid port: {}", port_str)))?;
            (host.to_string(), port)
        } else {
            let default_port = if is_tls { 443 } else { 80 };
            (host_port.to_string(), default_port)
        };

        Ok((host, port, is_tls))
    }

    /// Create a TLS stream using native-tls
    #[cfg(all(feature = "network-native-tls", not(feature = "network-rustls")))]
    fn create_tls_stream(
        host: &str,
        tcp_stream: TcpStream,
    ) -> Result<MaybeTlsStream<TcpStream>, RelayError> {
        let connector = TlsConnector::new()
            .map_err(|e| RelayError::ConnectFailed(format!("TLS error: {}", e)))?;
        let tls_stream = connector
            .connect(host, tcp_stream)
            .map_err(|e| RelayError::ConnectFailed(format!("TLS handshake failed: {}", e)))?;
        Ok(MaybeTlsStream::NativeTls(tls_stream))
    }

    /// Create a TLS stream using rustls
    #[cfg(feature = "network-rustls")]
    fn create_tls_stream(
        host: &str,
        tcp_stream: TcpStream,
    ) -> Result<MaybeTlsStream<TcpStream>, RelayError> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let server_name: ServerName<'_> = host
            .try_into()
            .map_err(|_| RelayError::ConnectFailed(format!("invalid server name: {}", host)))?;

        let tls_conn = rustls::ClientConnection::new(Arc::new(config), server_name.to_owned())
            .map_err(|e| RelayError::ConnectFailed(format!("TLS setup failed: {}", e)))?;

        let tls_stream = rustls::StreamOwned::new(tls_conn, tcp_stream);
        Ok(MaybeTlsStream::Rustls(tls_stream))
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, config: &TransportConfig) -> TransportResult<()> {
        if self.connected {
            return Ok(());
        }

        let (host, port, is_tls) = Self::parse_url(&config.server_url)?;
        let addr = format!("{}:{}", host, port);

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| RelayError::ConnectFailed(e.to_string()))?
            .next()
            .ok_or_else(|| RelayError::ConnectFailed(format!("no address for {}", addr)))?;

        let tcp_stream = TcpStream::connect_timeout(
            &socket_addr,
            Duration::from_millis(config.connect_timeout_ms),
        )
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                RelayError::Timeout
            } else {
                RelayError::ConnectFailed(e.to_string())
            }
        })?;

        tcp_stream
            .set_read_timeout(Some(Duration::from_millis(config.io_timeout_ms)))
            .map_err(|e| RelayError::ConnectFailed(e.to_string()))?;
        tcp_stream
            .set_write_timeout(Some(Duration::from_millis(config.io_timeout_ms)))
            .map_err(|e| RelayError::ConnectFailed(e.to_string()))?;

        // Wrap in TLS if needed
        let stream: MaybeTlsStream<TcpStream> = if is_tls {
            Self::create_tls_stream(&host, tcp_stream)?
        } else {
            MaybeTlsStream::Plain(tcp_stream)
        };

        // WebSocket handshake - use IntoClientRequest for proper HTTP/1.1 request
        let request = config
            .server_url
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::ConnectFailed(format!("invalid WebSocket request: {}", e)))?;

        let (socket, _response) = tungstenite::client(request, stream)
            .map_err(|e| RelayError::ConnectFailed(format!("WebSocket handshake failed: {}", e)))?;

        self.socket = Some(socket);
        self.connected = true;
        Ok(())
    }

    fn authenticate(&mut self, credentials: &Credentials) -> TransportResult<()> {
        let socket = self.socket.as_mut().ok_or(RelayError::NotConnected)?;

        let login = LoginFrame {
            message_type: "auth",
            identity: &credentials.identity,
            secret: &credentials.secret,
        };
        let json = serde_json::to_vec(&login)
            .map_err(|e| RelayError::AuthenticationFailed(e.to_string()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + json.len());
        frame.extend_from_slice(&(json.len() as u32).to_be_bytes());
        frame.extend_from_slice(&json);

        socket
            .send(Message::Binary(frame))
            .map_err(|e| RelayError::AuthenticationFailed(e.to_string()))?;
        socket
            .flush()
            .map_err(|e| RelayError::AuthenticationFailed(e.to_string()))?;
        Ok(())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None); // Ignore errors on close
        }
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_frame(&mut self, frame: &[u8]) -> TransportResult<()> {
        let socket = self.socket.as_mut().ok_or(RelayError::NotConnected)?;

        socket.send(Message::Binary(frame.to_vec())).map_err(|e| {
            if matches!(
                e,
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
            ) {
                self.connected = false;
                RelayError::ConnectionClosed
            } else {
                RelayError::SendFailed(e.to_string())
            }
        })?;

        // Flush to ensure the frame is on the wire
        socket
            .flush()
            .map_err(|e| RelayError::SendFailed(format!("flush failed: {}", e)))?;
        Ok(())
    }

    fn receive_frame(&mut self) -> TransportResult<Option<Vec<u8>>> {
        let socket = self.socket.as_mut().ok_or(RelayError::NotConnected)?;

        match socket.read() {
            Ok(Message::Binary(data)) => Ok(Some(data)),
            Ok(Message::Ping(data)) => {
                // Respond to ping with pong
                let _ = socket.send(Message::Pong(data));
                Ok(None)
            }
            Ok(Message::Pong(_)) => Ok(None),
            Ok(Message::Close(_)) => {
                self.connected = false;
                Err(RelayError::ConnectionClosed)
            }
            Ok(Message::Text(_)) => {
                // The relay protocol is binary-framed only.
                Err(RelayError::MalformedEnvelope("unexpected text frame".into()))
            }
            Ok(Message::Frame(_)) => Ok(None),
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                // No frame available within the io timeout
                Ok(None)
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                self.connected = false;
                Err(RelayError::ConnectionClosed)
            }
            Err(e) => Err(RelayError::ReceiveFailed(e.to_string())),
        }
    }

    fn has_pending(&self) -> bool {
        // WebSocket doesn't provide a non-blocking check easily;
        // callers use receive_frame() with the io timeout instead.
        false
    }
}
