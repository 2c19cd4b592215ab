//! # Rfcclient
//!
//! Sessions and calls against a remote system speaking the `rfcproto` frames.
//!
//! ## Architecture
//!
//! - `config`: connection parameters and their validation into a `Route`.
//! - `transport`: the byte-level `Transport`/`Connector` seam and TCP.
//! - `session`: open, logon, liveness, close.
//! - `dispatch`: signature lookup, parameter validation, calls.
//! - `error`: the five-kind error taxonomy.
//! - `loopback`: an in-process remote system for tests and demos.
//!
//! ```no_run
//! # async fn demo() -> rfcclient::Result<()> {
//! use rfcclient::ConnectionParameters;
//! use rfcclient::Session;
//! use rfcclient::Structure;
//!
//! let params = ConnectionParameters::from_pairs([
//!     ("ashost", "10.0.0.1"),
//!     ("sysnr", "00"),
//!     ("client", "001"),
//!     ("user", "DEMO"),
//!     ("passwd", "welcome"),
//! ])?;
//! let session = Session::open(params).await?;
//! let _reply = session
//!     .call("STFC_CONNECTION", &Structure::new().with("REQUTEXT", "hello"))
//!     .await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod loopback;
pub mod session;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::ConnectionParameters;
pub use config::Route;
pub use error::Error;
pub use error::ErrorInfo;
pub use error::ErrorKind;
pub use error::Result;
pub use error::RfcError;
pub use loopback::LoopbackConnector;
pub use loopback::LoopbackSystem;
pub use session::ConnectionAttributes;
pub use session::Session;
pub use transport::Connector;
pub use transport::TcpConnector;
pub use transport::Transport;
pub use transport::TransportError;

pub use rfcproto::FunctionSignature;
pub use rfcproto::Scalar;
pub use rfcproto::Structure;
pub use rfcproto::Value;
