//! # Loopback Backend
//!
//! An in-process stand-in for the remote system: users, a function registry
//! and handlers, answering the same frames a real partner would.
//!
//! Reach it with a `LoopbackConnector`, or over TCP with
//! `LoopbackSystem::serve`. Counters let tests assert what reached the
//! backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tokio::net::TcpListener;
use tracing::debug;
use tracing::warn;

use rfcpack::Decoder;
use rfcpack::Encoder;
use rfcproto::AbapMessage;
use rfcproto::Direction;
use rfcproto::ErrorGroup;
use rfcproto::FieldType;
use rfcproto::FunctionSignature;
use rfcproto::RemoteError;
use rfcproto::ReplyErrEncoder;
use rfcproto::ReplyOkEncoder;
use rfcproto::Request;
use rfcproto::ReturnCode;
use rfcproto::Structure;
use rfcproto::TypeDesc;
use rfcproto::Value;
use rfcproto::codec::encode_structure_untyped;

use crate::config::ConnectionParameters;
use crate::config::Route;
use crate::session::ConnectionAttributes;
use crate::transport;
use crate::transport::Connector;
use crate::transport::Transport;
use crate::transport::TransportError;
use crate::transport::read_frame;
use crate::transport::write_frame;

/// A remote function implementation.
pub type Handler = Arc<dyn Fn(&Structure) -> Result<Structure, RemoteError> + Send + Sync>;

struct Function {
    signature: Arc<FunctionSignature>,
    handler: Handler,
}

/// A simulated remote system.
pub struct LoopbackSystem {
    sysid: String,
    release: String,
    users: HashMap<String, String>,
    functions: HashMap<String, Function>,
    describes: AtomicUsize,
    calls: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl LoopbackSystem {
    pub fn new(sysid: impl Into<String>) -> Self {
        Self {
            sysid: sysid.into(),
            release: "753".into(),
            users: HashMap::new(),
            functions: HashMap::new(),
            describes: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// Registers a user that may log on.
    pub fn user(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(name.into(), password.into());
        self
    }

    /// Registers a function under its signature's name.
    pub fn function<F>(mut self, signature: FunctionSignature, handler: F) -> Self
    where
        F: Fn(&Structure) -> Result<Structure, RemoteError> + Send + Sync + 'static,
    {
        let name = signature.name.clone();
        let function = Function { signature: Arc::new(signature), handler: Arc::new(handler) };
        self.functions.insert(name, function);
        self
    }

    /// System `LBK` with user `DEMO` (password `welcome`) and the
    /// `STFC_CONNECTION` and `STFC_STRUCTURE` test functions.
    pub fn demo() -> Self {
        let sysid = "LBK".to_string();
        let banner = format!("Loopback system {}", sysid);
        Self::new(sysid)
            .user("DEMO", "welcome")
            .function(stfc_connection(), move |params| {
                let text = params.get("REQUTEXT").and_then(Value::as_str).unwrap_or_default();
                Ok(Structure::new()
                    .with("ECHOTEXT", text)
                    .with("RESPTEXT", format!("{}: {}", banner, text)))
            })
            .function(stfc_structure(), |params| {
                let echo = params
                    .get("IMPORTSTRUCT")
                    .and_then(Value::as_structure)
                    .cloned()
                    .unwrap_or_default();
                let mut rows = params
                    .get("RFCTABLE")
                    .and_then(Value::as_table)
                    .map(<[Structure]>::to_vec)
                    .unwrap_or_default();
                rows.push(echo.clone());
                Ok(Structure::new()
                    .with("ECHOSTRUCT", echo)
                    .with("RESPTEXT", format!("{} rows", rows.len()))
                    .with("RFCTABLE", rows))
            })
    }

    pub fn sysid(&self) -> &str {
        &self.sysid
    }

    /// Number of signature lookups received.
    pub fn describe_requests(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }

    /// Number of function calls received.
    pub fn call_requests(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of connections shut down by the client.
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Opens a fresh, logged-off connection.
    pub fn connection(self: &Arc<Self>) -> LoopbackConnection {
        LoopbackConnection { system: self.clone(), attributes: None, shut: false }
    }

    /// Answers length-prefixed frames on every accepted connection.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (mut stream, peer) = listener.accept().await?;
            let mut conn = self.connection();
            tokio::spawn(async move {
                debug!(%peer, "Loopback connection accepted");
                loop {
                    let frame = match read_frame(&mut stream).await {
                        Ok(Some(frame)) => frame,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(%peer, error = %e, "Loopback read failed");
                            break;
                        }
                    };
                    let written = match conn.handle(&frame) {
                        Ok(reply) => write_frame(&mut stream, &reply).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = written {
                        warn!(%peer, error = %e, "Loopback connection dropped");
                        break;
                    }
                }
                debug!(%peer, "Loopback connection finished");
            });
        }
    }
}

/// One client connection to a `LoopbackSystem`.
pub struct LoopbackConnection {
    system: Arc<LoopbackSystem>,
    attributes: Option<ConnectionAttributes>,
    shut: bool,
}

impl LoopbackConnection {
    /// Answers one request frame with one reply frame.
    pub fn handle(&mut self, payload: &[u8]) -> transport::Result<Vec<u8>> {
        let request = match Request::decode(&mut Decoder::new(payload)) {
            Ok(request) => request,
            Err(e) => {
                let seq = rfcproto::decode_seq(payload)
                    .map_err(|_| TransportError::Io(format!("unreadable frame: {}", e)))?;
                return encode_reply(seq, Err(e.to_remote()));
            }
        };

        let seq = request.seq();
        let logged_on = self.attributes.is_some();
        let outcome = match (&request, logged_on) {
            (Request::Logon { fields, .. }, _) => self.logon(fields),
            (_, false) => Err(RemoteError::new(
                ErrorGroup::ExternalRuntimeFailure,
                ReturnCode::IllegalState,
                "No logon on this connection",
            )),
            (Request::Describe { function, .. }, true) => self.describe(function),
            (Request::Call { function, params, .. }, true) => self.invoke(function, params),
            (Request::Ping { .. }, true) => Ok(Vec::new()),
            (Request::Close { .. }, true) => {
                self.attributes = None;
                Ok(Vec::new())
            }
        };
        encode_reply(seq, outcome)
    }

    fn logon(&mut self, fields: &[(&str, &str)]) -> Result<Vec<u8>, RemoteError> {
        let field = |name: &str| fields.iter().find(|(k, _)| *k == name).map(|(_, v)| *v);
        let user = field("USER").unwrap_or_default();
        let password = field("PASSWD").unwrap_or_default();

        if self.system.users.get(user).map(String::as_str) != Some(password) {
            return Err(RemoteError::new(
                ErrorGroup::LogonFailure,
                ReturnCode::LogonFailure,
                "Name or password is incorrect (repeat logon)",
            ));
        }

        let attributes = ConnectionAttributes {
            sysid: self.system.sysid.clone(),
            client: field("CLIENT").unwrap_or("000").to_string(),
            user: user.to_string(),
            language: field("LANG").unwrap_or("E").to_string(),
            host: "loopback".into(),
            partner_release: self.system.release.clone(),
        };
        let body = structure_bytes(&attributes.to_structure())?;
        self.attributes = Some(attributes);
        Ok(body)
    }

    fn describe(&self, name: &str) -> Result<Vec<u8>, RemoteError> {
        self.system.describes.fetch_add(1, Ordering::SeqCst);
        let function = self.system.functions.get(name).ok_or_else(|| function_not_found(name))?;

        let mut enc = Encoder::new();
        function.signature.encode(&mut enc).map_err(|e| e.to_remote())?;
        enc.into_bytes().map_err(|e| rfcproto::Error::from(e).to_remote())
    }

    fn invoke(&self, name: &str, params: &[u8]) -> Result<Vec<u8>, RemoteError> {
        self.system.calls.fetch_add(1, Ordering::SeqCst);
        let function = self.system.functions.get(name).ok_or_else(|| function_not_found(name))?;

        let params = rfcproto::decode_parameters(params).map_err(|e| e.to_remote())?;
        rfcproto::encode_parameters(&params, &function.signature).map_err(|e| e.to_remote())?;

        let results = (function.handler)(&params)?;
        structure_bytes(&results)
    }
}

#[async_trait::async_trait]
impl Transport for LoopbackConnection {
    async fn call(&mut self, payload: &[u8]) -> transport::Result<Vec<u8>> {
        if self.shut {
            return Err(TransportError::Closed);
        }
        self.handle(payload)
    }

    async fn shutdown(&mut self) -> transport::Result<()> {
        if !self.shut {
            self.shut = true;
            self.system.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Connects sessions to a `LoopbackSystem` in-process.
pub struct LoopbackConnector {
    system: Arc<LoopbackSystem>,
    attempts: AtomicUsize,
    reachable: bool,
}

impl LoopbackConnector {
    pub fn new(system: Arc<LoopbackSystem>) -> Self {
        Self { system, attempts: AtomicUsize::new(0), reachable: true }
    }

    /// A connector whose every attempt fails as if the host were down.
    pub fn unreachable(system: Arc<LoopbackSystem>) -> Self {
        Self { reachable: false, ..Self::new(system) }
    }

    /// Number of connect attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn system(&self) -> &Arc<LoopbackSystem> {
        &self.system
    }
}

#[async_trait::async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, route: &Route, _params: &ConnectionParameters) -> transport::Result<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(TransportError::Unreachable(format!("{} is not reachable", route.host())));
        }
        Ok(Box::new(self.system.connection()))
    }
}

// ============================================================================
//  HELPERS
// ============================================================================

fn encode_reply(seq: u64, outcome: Result<Vec<u8>, RemoteError>) -> transport::Result<Vec<u8>> {
    let bytes = match &outcome {
        Ok(body) => ReplyOkEncoder::new(seq, body).to_bytes(),
        Err(error) => ReplyErrEncoder::new(seq, error).to_bytes(),
    };
    bytes.map_err(|e| TransportError::Io(e.to_string()))
}

fn structure_bytes(s: &Structure) -> Result<Vec<u8>, RemoteError> {
    let mut enc = Encoder::new();
    encode_structure_untyped(&mut enc, s).map_err(|e| e.to_remote())?;
    enc.into_bytes().map_err(|e| rfcproto::Error::from(e).to_remote())
}

fn function_not_found(name: &str) -> RemoteError {
    let abap = AbapMessage::new("FL", "E", "046").with_vars(&[name]);
    RemoteError::new(ErrorGroup::AbapApplicationFailure, ReturnCode::AbapException, abap.summary())
        .with_key("FU_NOT_FOUND")
        .with_abap(abap)
}

fn rfctest() -> Arc<TypeDesc> {
    Arc::new(
        TypeDesc::new("RFCTEST")
            .field("RFCFLOAT", FieldType::Float)
            .field("RFCCHAR1", FieldType::Char { length: 1 })
            .field("RFCINT2", FieldType::Int)
            .field("RFCINT1", FieldType::Int)
            .field("RFCCHAR4", FieldType::Char { length: 4 })
            .field("RFCINT4", FieldType::Int)
            .field("RFCHEX3", FieldType::Bytes { length: 3 })
            .field("RFCCHAR2", FieldType::Char { length: 2 })
            .field("RFCTIME", FieldType::Time)
            .field("RFCDATE", FieldType::Date)
            .field("RFCDATA1", FieldType::Char { length: 50 })
            .field("RFCDATA2", FieldType::Char { length: 50 }),
    )
}

fn stfc_connection() -> FunctionSignature {
    FunctionSignature::new("STFC_CONNECTION")
        .param("REQUTEXT", Direction::Import, FieldType::Char { length: 255 })
        .param("ECHOTEXT", Direction::Export, FieldType::Char { length: 255 })
        .param("RESPTEXT", Direction::Export, FieldType::Char { length: 255 })
}

fn stfc_structure() -> FunctionSignature {
    FunctionSignature::new("STFC_STRUCTURE")
        .param("IMPORTSTRUCT", Direction::Import, FieldType::Structure(rfctest()))
        .param("ECHOSTRUCT", Direction::Export, FieldType::Structure(rfctest()))
        .param("RESPTEXT", Direction::Export, FieldType::Char { length: 255 })
        .optional("RFCTABLE", Direction::Tables, FieldType::Table(rfctest()))
}
