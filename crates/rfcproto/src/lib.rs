//! # Rfcproto
//!
//! Values, signatures and frames for remote function calls over `rfcpack`.
//!
//! ## Architecture
//!
//! - `value`: host-side `Value`s (scalars, structures, tables).
//! - `signature`: the remote system's declaration of a function.
//! - `codec`: signature-checked encoding and untyped decoding of values.
//! - `frame`: the request/reply envelope, with parameter sets as opaque blobs.
//! - `rc`: the remote system's return codes and error groups.

pub mod codec;
pub mod error;
pub mod frame;
pub mod rc;
pub mod signature;
pub mod value;

#[cfg(test)]
mod tests;

pub use codec::decode_parameters;
pub use codec::encode_parameters;
pub use error::AbapMessage;
pub use error::Error;
pub use error::RemoteError;
pub use error::Result;
pub use frame::ReplyDecoder;
pub use frame::ReplyErrEncoder;
pub use frame::ReplyOkEncoder;
pub use frame::Request;
pub use frame::decode_seq;
pub use rc::ErrorGroup;
pub use rc::ReturnCode;
pub use signature::Direction;
pub use signature::FieldDesc;
pub use signature::FieldType;
pub use signature::FunctionSignature;
pub use signature::Parameter;
pub use signature::TypeDesc;
pub use value::Scalar;
pub use value::Structure;
pub use value::Value;
