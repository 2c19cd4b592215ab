//! # Session
//!
//! Connection lifecycle: validate, connect, logon, exchange frames, close.
//!
//! ## Invariants
//! - **Validate Before I/O**: Incomplete parameters never reach a connector.
//! - **Monotonic Liveness**: `alive` is true only between a successful logon
//!   and the first `close` or broken exchange; once false it never becomes
//!   true again.
//! - **Single Release**: The transport is shut down exactly once, on close,
//!   on a broken exchange, or on any failed open.
//! - **Serialized Exchanges**: The transport sits behind an async mutex, so
//!   concurrent requests on one session run one at a time.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use rfcpack::Decoder;
use rfcproto::FunctionSignature;
use rfcproto::RemoteError;
use rfcproto::ReplyDecoder;
use rfcproto::Request;
use rfcproto::ReturnCode;
use rfcproto::Structure;

use crate::config::ConnectionParameters;
use crate::error::Error;
use crate::error::Result;
use crate::transport::Connector;
use crate::transport::TcpConnector;
use crate::transport::Transport;

/// Attributes reported by the remote system on logon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionAttributes {
    pub sysid: String,
    pub client: String,
    pub user: String,
    pub language: String,
    pub host: String,
    pub partner_release: String,
}

impl ConnectionAttributes {
    pub const SYSID: &'static str = "SYSID";
    pub const CLIENT: &'static str = "CLIENT";
    pub const USER: &'static str = "USER";
    pub const LANGUAGE: &'static str = "LANGUAGE";
    pub const HOST: &'static str = "HOST";
    pub const PARTNER_RELEASE: &'static str = "PARTNER_REL";

    /// Reads attributes from a logon reply. Missing entries stay empty.
    pub fn from_structure(s: &Structure) -> Self {
        let text = |name: &str| s.get(name).and_then(|v| v.as_str()).unwrap_or_default().to_string();
        Self {
            sysid: text(Self::SYSID),
            client: text(Self::CLIENT),
            user: text(Self::USER),
            language: text(Self::LANGUAGE),
            host: text(Self::HOST),
            partner_release: text(Self::PARTNER_RELEASE),
        }
    }

    pub fn to_structure(&self) -> Structure {
        Structure::new()
            .with(Self::SYSID, self.sysid.as_str())
            .with(Self::CLIENT, self.client.as_str())
            .with(Self::USER, self.user.as_str())
            .with(Self::LANGUAGE, self.language.as_str())
            .with(Self::HOST, self.host.as_str())
            .with(Self::PARTNER_RELEASE, self.partner_release.as_str())
    }
}

/// A logged-on connection to the remote system.
///
/// Sessions can be wrapped in `Arc` and shared across tasks.
pub struct Session {
    params: ConnectionParameters,
    attributes: ConnectionAttributes,
    alive: AtomicBool,
    seq_gen: AtomicU64,
    transport: Mutex<Option<Box<dyn Transport>>>,
    pub(crate) signatures: DashMap<String, Arc<FunctionSignature>>,
}

impl Session {
    /// Opens a session over TCP.
    pub async fn open(params: ConnectionParameters) -> Result<Self> {
        Self::open_with(params, &TcpConnector).await
    }

    /// Opens a session through the given connector.
    ///
    /// # Errors
    /// - `Rfc` when no parameters were supplied at all.
    /// - `ExternalRuntime` (`RFC_INVALID_PARAMETER`) for incomplete routing.
    /// - `Communication` when the remote system cannot be reached.
    /// - `Logon` when the remote system rejects the credentials.
    pub async fn open_with(params: ConnectionParameters, connector: &dyn Connector) -> Result<Self> {
        let route = params.route()?;
        info!(%route, user = params.user.as_deref().unwrap_or(""), "Opening session");

        let mut transport = connector.connect(&route, &params).await.map_err(|e| {
            warn!(%route, error = %e, "Connect failed");
            Error::from(e)
        })?;

        let seq_gen = AtomicU64::new(1);
        let fields = params.logon_fields();
        let logon = Request::Logon {
            seq: seq_gen.fetch_add(1, Ordering::Relaxed),
            fields: fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
        };

        let attributes = match settle(exchange(&mut *transport, &logon).await) {
            Ok(body) => rfcproto::decode_parameters(&body)
                .map(|s| ConnectionAttributes::from_structure(&s))
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        let attributes = match attributes {
            Ok(attributes) => attributes,
            Err(e) => {
                warn!(%route, error = %e, "Logon failed");
                if let Err(shutdown) = transport.shutdown().await {
                    debug!(error = %shutdown, "Shutdown after failed logon");
                }
                return Err(e);
            }
        };

        info!(sysid = %attributes.sysid, client = %attributes.client, "Logged on");
        Ok(Self {
            params,
            attributes,
            alive: AtomicBool::new(true),
            seq_gen,
            transport: Mutex::new(Some(transport)),
            signatures: DashMap::new(),
        })
    }

    /// True between a successful logon and the first `close`.
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn attributes(&self) -> &ConnectionAttributes {
        &self.attributes
    }

    pub fn parameters(&self) -> &ConnectionParameters {
        &self.params
    }

    /// Round-trips a no-op request. Does not change liveness.
    pub async fn ping(&self) -> Result<()> {
        self.request(|seq| Request::Ping { seq }).await?;
        Ok(())
    }

    /// Closes the session.
    ///
    /// The session is marked closed before the remote is told, so `alive()`
    /// is false afterwards even when this returns an error. Closing a closed
    /// session is a no-op.
    pub async fn close(&self) -> Result<()> {
        if !self.alive.swap(false, Ordering::AcqRel) {
            debug!("Close on a closed session");
            return Ok(());
        }

        let Some(mut transport) = self.transport.lock().await.take() else {
            return Ok(());
        };

        let seq = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let farewell = settle(exchange(&mut *transport, &Request::Close { seq }).await);
        let shutdown = transport.shutdown().await.map_err(Error::from);
        info!(sysid = %self.attributes.sysid, "Session closed");

        farewell?;
        shutdown
    }

    /// Fails with `RFC_INVALID_HANDLE` once the session is closed.
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.alive() {
            Ok(())
        } else {
            Err(Error::external_runtime(ReturnCode::InvalidHandle, "Connection is closed"))
        }
    }

    /// Sends a request built for the next sequence number and returns the
    /// reply body.
    ///
    /// A transport failure or an unreadable reply leaves the stream out of
    /// step, so the session is closed and the transport released before the
    /// error is returned.
    pub(crate) async fn request<'a>(&self, build: impl FnOnce(u64) -> Request<'a>) -> Result<Vec<u8>> {
        let mut guard = self.transport.lock().await;
        let transport = match guard.as_mut() {
            Some(transport) if self.alive() => transport,
            _ => return Err(Error::external_runtime(ReturnCode::InvalidHandle, "Connection is closed")),
        };
        let request = build(self.seq_gen.fetch_add(1, Ordering::Relaxed));

        match exchange(&mut **transport, &request).await {
            Ok(reply) => reply.map_err(Error::from),
            Err(e) => {
                warn!(sysid = %self.attributes.sysid, error = %e, "Exchange broke the connection");
                self.alive.store(false, Ordering::Release);
                if let Some(mut transport) = guard.take() {
                    if let Err(shutdown) = transport.shutdown().await {
                        debug!(error = %shutdown, "Shutdown after broken exchange");
                    }
                }
                Err(e)
            }
        }
    }
}

/// Sends one request and matches the reply to it.
///
/// The outer error means the connection can no longer be trusted. The inner
/// one is a failure the remote system reported in a well-formed reply.
async fn exchange(
    transport: &mut dyn Transport,
    request: &Request<'_>,
) -> Result<std::result::Result<Vec<u8>, RemoteError>> {
    let payload = request.to_bytes()?;
    let reply_bytes = transport.call(&payload).await?;

    let reply = ReplyDecoder::decode(&mut Decoder::new(&reply_bytes))?;
    if reply.seq != request.seq() {
        let message = format!("Sequence mismatch: expected {}, received {}", request.seq(), reply.seq);
        return Err(rfcproto::Error::ProtocolViolation(message).into());
    }

    match reply.status {
        Ok(body) => Ok(Ok(body.to_vec())),
        Err(remote) => {
            debug!(seq = reply.seq, key = %remote.key, code = remote.code, "Remote failure");
            Ok(Err(remote))
        }
    }
}

fn settle(outcome: Result<std::result::Result<Vec<u8>, RemoteError>>) -> Result<Vec<u8>> {
    outcome.and_then(|reply| reply.map_err(Error::from))
}
