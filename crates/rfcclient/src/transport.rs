//! # Transport Abstraction
//!
//! A minimal, async interface for moving bytes to the remote system.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The Transport knows nothing about frames, values or
//!   signatures. It moves opaque buffers.
//! - **Request-Response**: The interaction model is "send bytes, await bytes".
//! - **Connectors Build Transports**: A `Connector` turns a validated `Route`
//!   into a live transport, so sessions never care how bytes travel.

use std::fmt;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::select;

use crate::config::ConnectionParameters;
use crate::config::Route;

/// Largest frame accepted in either direction.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote endpoint could not be reached.
    Unreachable(String),
    /// The connection was dropped mid-exchange.
    ConnectionLost(String),
    /// The operation did not finish within the configured timeout.
    Timeout(Duration),
    /// A frame exceeded `MAX_FRAME_LEN`.
    PayloadTooLarge(usize),
    /// The transport was already shut down.
    Closed,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(msg) => write!(f, "Partner not reached: {}", msg),
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Timeout(after) => write!(f, "Timed out after {:?}", after),
            Self::PayloadTooLarge(len) => write!(f, "Frame of {} bytes exceeds the transport limit", len),
            Self::Closed => write!(f, "Transport is closed"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Self::ConnectionLost(e.to_string()),
            ErrorKind::ConnectionRefused | ErrorKind::NotFound | ErrorKind::AddrNotAvailable => {
                Self::Unreachable(e.to_string())
            }
            _ => Self::Io(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A mechanism to send a byte buffer and receive a reply.
///
/// Object safe, owned exclusively by one session (`Box<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Sends a payload and waits for the reply.
    ///
    /// # Invariants
    /// - Must return `Ok(vec)` with the raw reply bytes on success.
    /// - Must return `Err` if the network fails.
    /// - Should not interpret the payload content.
    async fn call(&mut self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Releases the underlying connection. Later calls fail with `Closed`.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Produces transports for validated routes.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, route: &Route, params: &ConnectionParameters) -> Result<Box<dyn Transport>>;
}

// ============================================================================
//  TCP
// ============================================================================

/// Connects over TCP with length-prefixed frames.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub const GATEWAY_BASE_PORT: u16 = 3300;
    pub const MESSAGE_SERVER_BASE_PORT: u16 = 3600;

    /// Resolves host and port for a route.
    ///
    /// `server_port` wins. Otherwise application servers listen on
    /// `3300 + sysnr`, gateways on a numeric `gwserv` or `sapgwNN`, and
    /// message servers on a numeric `msserv` or `3600`.
    pub fn endpoint(route: &Route, params: &ConnectionParameters) -> Result<(String, u16)> {
        let host = route.host().to_string();
        if let Some(port) = params.server_port {
            return Ok((host, port));
        }

        let port = match route {
            Route::Application { sysnr, .. } => instance_port(Self::GATEWAY_BASE_PORT, sysnr),
            Route::Gateway { service, .. } => service
                .parse()
                .ok()
                .or_else(|| service.strip_prefix("sapgw").and_then(|nr| instance_port(Self::GATEWAY_BASE_PORT, nr))),
            Route::MessageServer { service: Some(service), .. } => service.parse().ok(),
            Route::MessageServer { service: None, .. } => Some(Self::MESSAGE_SERVER_BASE_PORT),
        };

        port.map(|p| (host, p))
            .ok_or_else(|| TransportError::Unreachable(format!("no port for route {}", route)))
    }
}

fn instance_port(base: u16, sysnr: &str) -> Option<u16> {
    let nr: u16 = sysnr.parse().ok()?;
    (nr < 100).then(|| base + nr)
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, route: &Route, params: &ConnectionParameters) -> Result<Box<dyn Transport>> {
        let (host, port) = Self::endpoint(route, params)?;
        let timeout = params.timeout();

        let stream = match timeout {
            None => {
                tracing::debug!("Connecting to {}:{}", host, port);
                TcpStream::connect((host.as_str(), port)).await?
            }
            Some(after) => {
                tracing::debug!("Connecting to {}:{} with timeout {:?}", host, port, after);
                select! {
                    res = TcpStream::connect((host.as_str(), port)) => res?,
                    _ = tokio::time::sleep(after) => return Err(TransportError::Timeout(after)),
                }
            }
        };
        stream.set_nodelay(true)?;

        Ok(Box::new(TcpTransport { stream: Some(stream), timeout }))
    }
}

/// A connected TCP stream carrying one request/reply at a time.
///
/// Any failed exchange drops the stream; later calls fail with `Closed`.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    timeout: Option<Duration>,
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn call(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        let exchange = async {
            write_frame(stream, payload).await?;
            read_frame(stream).await?.ok_or_else(|| TransportError::ConnectionLost("closed by peer".into()))
        };
        let result = match timeout {
            None => exchange.await,
            Some(after) => tokio::time::timeout(after, exchange)
                .await
                .unwrap_or(Err(TransportError::Timeout(after))),
        };

        // A late or partial reply would be read as the answer to the next
        // request.
        if let Err(e) = &result {
            tracing::debug!("Dropping stream after failed exchange: {}", e);
            self.stream = None;
        }
        result
    }

    async fn shutdown(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(mut stream) => Ok(stream.shutdown().await?),
            None => Ok(()),
        }
    }
}

/// Writes one frame: a big-endian `u32` length, then the payload.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(TransportError::PayloadTooLarge(payload.len()));
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. `Ok(None)` on a clean end of stream before the header.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(TransportError::PayloadTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}
