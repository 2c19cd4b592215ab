//! # Return Codes and Error Groups
//!
//! The remote system's numeric failure vocabulary. These numbers are an
//! external contract: the values below must never be renumbered.

/// Return codes reported by the remote runtime.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Ok = 0,
    CommunicationFailure = 1,
    LogonFailure = 2,
    AbapRuntimeFailure = 3,
    AbapMessage = 4,
    AbapException = 5,
    Closed = 6,
    Canceled = 7,
    Timeout = 8,
    MemoryInsufficient = 9,
    VersionMismatch = 10,
    InvalidProtocol = 11,
    SerializationFailure = 12,
    InvalidHandle = 13,
    Retry = 14,
    ExternalFailure = 15,
    Executed = 16,
    NotFound = 17,
    NotSupported = 18,
    IllegalState = 19,
    InvalidParameter = 20,
    CodepageConversionFailure = 21,
    ConversionFailure = 22,
    BufferTooSmall = 23,
    TableMoveBof = 24,
    TableMoveEof = 25,
    StartSapguiFailure = 26,
    AbapClassException = 27,
    UnknownError = 28,
    AuthorizationFailure = 29,
}

const ALL_CODES: [ReturnCode; 30] = [
    ReturnCode::Ok,
    ReturnCode::CommunicationFailure,
    ReturnCode::LogonFailure,
    ReturnCode::AbapRuntimeFailure,
    ReturnCode::AbapMessage,
    ReturnCode::AbapException,
    ReturnCode::Closed,
    ReturnCode::Canceled,
    ReturnCode::Timeout,
    ReturnCode::MemoryInsufficient,
    ReturnCode::VersionMismatch,
    ReturnCode::InvalidProtocol,
    ReturnCode::SerializationFailure,
    ReturnCode::InvalidHandle,
    ReturnCode::Retry,
    ReturnCode::ExternalFailure,
    ReturnCode::Executed,
    ReturnCode::NotFound,
    ReturnCode::NotSupported,
    ReturnCode::IllegalState,
    ReturnCode::InvalidParameter,
    ReturnCode::CodepageConversionFailure,
    ReturnCode::ConversionFailure,
    ReturnCode::BufferTooSmall,
    ReturnCode::TableMoveBof,
    ReturnCode::TableMoveEof,
    ReturnCode::StartSapguiFailure,
    ReturnCode::AbapClassException,
    ReturnCode::UnknownError,
    ReturnCode::AuthorizationFailure,
];

impl ReturnCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    /// The symbolic key, e.g. `RFC_INVALID_PARAMETER`.
    pub fn key(self) -> &'static str {
        match self {
            Self::Ok => "RFC_OK",
            Self::CommunicationFailure => "RFC_COMMUNICATION_FAILURE",
            Self::LogonFailure => "RFC_LOGON_FAILURE",
            Self::AbapRuntimeFailure => "RFC_ABAP_RUNTIME_FAILURE",
            Self::AbapMessage => "RFC_ABAP_MESSAGE",
            Self::AbapException => "RFC_ABAP_EXCEPTION",
            Self::Closed => "RFC_CLOSED",
            Self::Canceled => "RFC_CANCELED",
            Self::Timeout => "RFC_TIMEOUT",
            Self::MemoryInsufficient => "RFC_MEMORY_INSUFFICIENT",
            Self::VersionMismatch => "RFC_VERSION_MISMATCH",
            Self::InvalidProtocol => "RFC_INVALID_PROTOCOL",
            Self::SerializationFailure => "RFC_SERIALIZATION_FAILURE",
            Self::InvalidHandle => "RFC_INVALID_HANDLE",
            Self::Retry => "RFC_RETRY",
            Self::ExternalFailure => "RFC_EXTERNAL_FAILURE",
            Self::Executed => "RFC_EXECUTED",
            Self::NotFound => "RFC_NOT_FOUND",
            Self::NotSupported => "RFC_NOT_SUPPORTED",
            Self::IllegalState => "RFC_ILLEGAL_STATE",
            Self::InvalidParameter => "RFC_INVALID_PARAMETER",
            Self::CodepageConversionFailure => "RFC_CODEPAGE_CONVERSION_FAILURE",
            Self::ConversionFailure => "RFC_CONVERSION_FAILURE",
            Self::BufferTooSmall => "RFC_BUFFER_TOO_SMALL",
            Self::TableMoveBof => "RFC_TABLE_MOVE_BOF",
            Self::TableMoveEof => "RFC_TABLE_MOVE_EOF",
            Self::StartSapguiFailure => "RFC_START_SAPGUI_FAILURE",
            Self::AbapClassException => "RFC_ABAP_CLASS_EXCEPTION",
            Self::UnknownError => "RFC_UNKNOWN_ERROR",
            Self::AuthorizationFailure => "RFC_AUTHORIZATION_FAILURE",
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        ALL_CODES.get(code as usize).copied()
    }
}

/// Error groups: which side of the conversation failed.
///
/// The group decides how a failure is classified on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorGroup {
    Ok,
    AbapApplicationFailure,
    AbapRuntimeFailure,
    LogonFailure,
    CommunicationFailure,
    ExternalRuntimeFailure,
    ExternalApplicationFailure,
    ExternalAuthorizationFailure,
    /// A group number this client does not know.
    Other(u32),
}

impl ErrorGroup {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::AbapApplicationFailure => 1,
            Self::AbapRuntimeFailure => 2,
            Self::LogonFailure => 3,
            Self::CommunicationFailure => 4,
            Self::ExternalRuntimeFailure => 5,
            Self::ExternalApplicationFailure => 6,
            Self::ExternalAuthorizationFailure => 7,
            Self::Other(n) => n,
        }
    }

    pub fn from_u32(n: u32) -> Self {
        match n {
            0 => Self::Ok,
            1 => Self::AbapApplicationFailure,
            2 => Self::AbapRuntimeFailure,
            3 => Self::LogonFailure,
            4 => Self::CommunicationFailure,
            5 => Self::ExternalRuntimeFailure,
            6 => Self::ExternalApplicationFailure,
            7 => Self::ExternalAuthorizationFailure,
            n => Self::Other(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_indexed_by_value() {
        for (idx, rc) in ALL_CODES.iter().enumerate() {
            assert_eq!(rc.code() as usize, idx);
            assert_eq!(ReturnCode::from_code(rc.code()), Some(*rc));
        }
        assert_eq!(ReturnCode::from_code(30), None);
    }

    #[test]
    fn fixed_contract_values() {
        assert_eq!(ReturnCode::LogonFailure.code(), 2);
        assert_eq!(ReturnCode::AbapException.code(), 5);
        assert_eq!(ReturnCode::InvalidParameter.code(), 20);
        assert_eq!(ReturnCode::InvalidParameter.key(), "RFC_INVALID_PARAMETER");
    }

    #[test]
    fn unknown_groups_survive_roundtrip() {
        assert_eq!(ErrorGroup::from_u32(42), ErrorGroup::Other(42));
        assert_eq!(ErrorGroup::from_u32(42).as_u32(), 42);
        assert_eq!(ErrorGroup::from_u32(3), ErrorGroup::LogonFailure);
    }
}
