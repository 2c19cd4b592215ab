//! # Error Definitions
//!
//! Local protocol failures (`Error`) and the remote failure record
//! (`RemoteError`) that travels inside a failed reply.

use rfcpack::Error as WireError;

use crate::rc::ErrorGroup;
use crate::rc::ReturnCode;

/// Failures while encoding, validating or decoding protocol data.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The underlying wire codec failed.
    Wire(WireError),
    /// A parameter or field name is not part of the signature.
    FieldNotFound(String),
    /// A value does not fit the declared type of its field.
    Conversion { field: String, expected: String, found: &'static str },
    /// A frame or signature was structurally malformed.
    ProtocolViolation(String),
    /// An unknown frame, type or direction tag was encountered.
    UnknownVariant(String),
    /// The nested depth of a value exceeded the safety limit.
    RecursionLimitExceeded,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wire(e) => write!(f, "wire error: {}", e),
            Self::FieldNotFound(name) => write!(f, "field '{}' not found", name),
            Self::Conversion { field, expected, found } => {
                write!(f, "field '{}': expected {}, received {}", field, expected, found)
            }
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
            Self::UnknownVariant(name) => write!(f, "unknown variant: {}", name),
            Self::RecursionLimitExceeded => write!(f, "value nesting exceeds the recursion limit"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self { Self::Wire(e) }
}

impl Error {
    /// The failure as the remote runtime reports it.
    ///
    /// Name and type problems are parameter rejections; everything else is a
    /// serialization failure.
    pub fn to_remote(&self) -> RemoteError {
        let rc = match self {
            Self::FieldNotFound(_) => ReturnCode::InvalidParameter,
            Self::Conversion { .. } => ReturnCode::ConversionFailure,
            Self::Wire(_)
            | Self::ProtocolViolation(_)
            | Self::UnknownVariant(_)
            | Self::RecursionLimitExceeded => ReturnCode::SerializationFailure,
        };
        RemoteError::new(ErrorGroup::ExternalRuntimeFailure, rc, self.to_string())
    }
}

/// A specialized Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured application message attached to remote failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AbapMessage {
    pub class: String,
    pub kind: String,
    pub number: String,
    pub v1: String,
    pub v2: String,
    pub v3: String,
    pub v4: String,
}

impl AbapMessage {
    pub fn new(class: impl Into<String>, kind: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            kind: kind.into(),
            number: number.into(),
            ..Self::default()
        }
    }

    pub fn with_vars(mut self, vars: &[&str]) -> Self {
        let mut slots = [&mut self.v1, &mut self.v2, &mut self.v3, &mut self.v4];
        for (slot, var) in slots.iter_mut().zip(vars) {
            **slot = var.to_string();
        }
        self
    }

    /// One-line rendering, e.g. `ID:FL Type:E Number:046 undefined`.
    pub fn summary(&self) -> String {
        let mut line = format!("ID:{} Type:{} Number:{}", self.class, self.kind, self.number);
        for var in [&self.v1, &self.v2, &self.v3, &self.v4] {
            if !var.is_empty() {
                line.push(' ');
                line.push_str(var);
            }
        }
        line
    }
}

/// A failure reported by the remote system (the "Err" side of a reply).
///
/// `code` and `key` identify the condition; `message` is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub group: ErrorGroup,
    pub code: u32,
    pub key: String,
    pub message: Vec<String>,
    pub abap: Option<AbapMessage>,
}

impl RemoteError {
    pub fn new(group: ErrorGroup, rc: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            group,
            code: rc.code(),
            key: rc.key().to_string(),
            message: vec![message.into()],
            abap: None,
        }
    }

    /// Overrides the symbolic key, e.g. with an application exception name.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_abap(mut self, abap: AbapMessage) -> Self {
        self.abap = Some(abap);
        self
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (rc={}) {}", self.key, self.code, self.message.join(" | "))
    }
}
