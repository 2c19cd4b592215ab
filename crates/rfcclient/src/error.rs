//! # Error Taxonomy
//!
//! Every failure surfaced by the client is exactly one of five kinds.
//!
//! ## Philosophy
//!
//! - **One Enum**: Callers match on `Error` to handle leaf kinds, or use
//!   `kind()`, `code()`, `key()` and `message()` to handle all of them alike.
//! - **Classify By Group**: Remote failures carry an error group; the group,
//!   not the code, decides the kind. Groups without a leaf kind become the
//!   base kind with the remote record preserved untouched.
//! - **Local First**: Usage errors are raised before any transport activity.

use rfcproto::AbapMessage;
use rfcproto::ErrorGroup;
use rfcproto::RemoteError;
use rfcproto::ReturnCode;
use rfcproto::Scalar;
use rfcproto::Value;

use crate::transport::TransportError;

/// The five error kinds, most generic first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Rfc,
    Logon,
    Communication,
    AbapApplication,
    ExternalRuntime,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rfc => "RFCError",
            Self::Logon => "LogonError",
            Self::Communication => "CommunicationError",
            Self::AbapApplication => "ABAPApplicationError",
            Self::ExternalRuntime => "ExternalRuntimeError",
        };
        f.write_str(name)
    }
}

/// Code, key and message lines of a classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: u32,
    pub key: String,
    pub message: Vec<String>,
    pub abap: Option<AbapMessage>,
}

impl ErrorInfo {
    pub fn new(rc: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            code: rc.code(),
            key: rc.key().to_string(),
            message: vec![message.into()],
            abap: None,
        }
    }
}

impl From<RemoteError> for ErrorInfo {
    fn from(e: RemoteError) -> Self {
        Self { code: e.code, key: e.key, message: e.message, abap: e.abap }
    }
}

/// Payload of the base kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RfcError {
    /// No connection parameters were supplied at all.
    ParametersMissing,
    /// `call` was given no function name.
    MissingArguments { given: usize },
    /// `call` was given more positional arguments than the function name.
    TooManyArguments { given: usize },
    /// The function name was not text.
    InvalidFunctionName { value: Value },
    /// A remote failure whose group has no leaf kind.
    Unclassified { group: ErrorGroup, info: ErrorInfo },
}

impl RfcError {
    /// The free-form argument list, first item being the description.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::ParametersMissing => vec!["Connection parameters missing".into()],
            Self::MissingArguments { given } => {
                vec![format!("call() takes at least 1 positional argument ({} given)", given)]
            }
            Self::TooManyArguments { given } => {
                vec![format!("call() takes exactly 1 positional argument ({} given)", given)]
            }
            Self::InvalidFunctionName { value } => vec![
                "Remote function module name must be unicode string, received:".into(),
                render_value(value),
                value.kind_name().into(),
            ],
            Self::Unclassified { info, .. } => info.message.clone(),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Scalar(Scalar::Char(s)) => format!("{:?}", s),
        Value::Scalar(s) => s.to_string(),
        Value::Structure(s) => format!("<structure of {} fields>", s.len()),
        Value::Table(rows) => format!("<table of {} rows>", rows.len()),
    }
}

/// A classified client error.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Rfc(RfcError),
    Logon(ErrorInfo),
    Communication(ErrorInfo),
    AbapApplication(ErrorInfo),
    ExternalRuntime(ErrorInfo),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rfc(_) => ErrorKind::Rfc,
            Self::Logon(_) => ErrorKind::Logon,
            Self::Communication(_) => ErrorKind::Communication,
            Self::AbapApplication(_) => ErrorKind::AbapApplication,
            Self::ExternalRuntime(_) => ErrorKind::ExternalRuntime,
        }
    }

    /// Code, key and message lines, if this error carries them.
    ///
    /// Only in-process usage errors have none.
    pub fn info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Rfc(RfcError::Unclassified { info, .. })
            | Self::Logon(info)
            | Self::Communication(info)
            | Self::AbapApplication(info)
            | Self::ExternalRuntime(info) => Some(info),
            Self::Rfc(_) => None,
        }
    }

    pub fn code(&self) -> Option<u32> {
        self.info().map(|i| i.code)
    }

    pub fn key(&self) -> Option<&str> {
        self.info().map(|i| i.key.as_str())
    }

    /// Message lines joined by a newline.
    pub fn message(&self) -> String {
        match self {
            Self::Rfc(rfc) => rfc.args().join(" "),
            _ => self.info().map(|i| i.message.join("\n")).unwrap_or_default(),
        }
    }

    /// True for any error that did not originate on the remote side.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Rfc(rfc) if !matches!(rfc, RfcError::Unclassified { .. }))
    }

    pub(crate) fn external_runtime(rc: ReturnCode, message: impl Into<String>) -> Self {
        Self::ExternalRuntime(ErrorInfo::new(rc, message))
    }

    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::external_runtime(ReturnCode::InvalidParameter, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rfc(RfcError::Unclassified { group, info }) => write!(
                f,
                "{} (rc={}, group={}): {}",
                info.key,
                info.code,
                group.as_u32(),
                info.message.join(" | ")
            ),
            Self::Rfc(rfc) => f.write_str(&rfc.args().join(" ")),
            Self::Logon(info)
            | Self::Communication(info)
            | Self::AbapApplication(info)
            | Self::ExternalRuntime(info) => {
                write!(f, "{} (rc={}): {}", info.key, info.code, info.message.join(" | "))
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<RemoteError> for Error {
    /// Classifies a remote failure by its error group.
    fn from(e: RemoteError) -> Self {
        let group = e.group;
        let info = ErrorInfo::from(e);
        match group {
            ErrorGroup::AbapApplicationFailure => Self::AbapApplication(info),
            ErrorGroup::LogonFailure => Self::Logon(info),
            ErrorGroup::CommunicationFailure => Self::Communication(info),
            ErrorGroup::ExternalRuntimeFailure => Self::ExternalRuntime(info),
            ErrorGroup::Ok
            | ErrorGroup::AbapRuntimeFailure
            | ErrorGroup::ExternalApplicationFailure
            | ErrorGroup::ExternalAuthorizationFailure
            | ErrorGroup::Other(_) => Self::Rfc(RfcError::Unclassified { group, info }),
        }
    }
}

impl From<rfcproto::Error> for Error {
    fn from(e: rfcproto::Error) -> Self {
        Self::from(e.to_remote())
    }
}

impl From<rfcpack::Error> for Error {
    fn from(e: rfcpack::Error) -> Self {
        Self::from(rfcproto::Error::from(e))
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        let rc = match e {
            TransportError::Timeout(_) => ReturnCode::Timeout,
            TransportError::Closed => ReturnCode::Closed,
            _ => ReturnCode::CommunicationFailure,
        };
        Self::Communication(ErrorInfo::new(rc, e.to_string()))
    }
}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
