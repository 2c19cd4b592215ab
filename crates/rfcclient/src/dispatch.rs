//! # Call Dispatch
//!
//! Resolves a function's signature, validates and encodes the parameters,
//! sends the call and decodes the results.
//!
//! A call moves through `NotSent -> Validating -> Dispatched` and ends either
//! with the full result set or with one classified error, never with partial
//! results.

use std::sync::Arc;

use tracing::debug;

use rfcpack::Decoder;
use rfcproto::FunctionSignature;
use rfcproto::Request;
use rfcproto::Structure;
use rfcproto::Value;

use crate::error::Error;
use crate::error::Result;
use crate::error::RfcError;
use crate::session::Session;

impl Session {
    /// Invokes a remote function.
    ///
    /// # Errors
    /// - `ExternalRuntime` (`RFC_INVALID_HANDLE`) on a closed session.
    /// - `AbapApplication` (`FU_NOT_FOUND`) for an unknown function.
    /// - `ExternalRuntime` (`RFC_INVALID_PARAMETER`) for the first parameter
    ///   or field, at any depth, that the signature does not declare.
    pub async fn call(&self, function: &str, params: &Structure) -> Result<Structure> {
        self.ensure_open()?;

        let sig = self.function_description(function).await?;
        let body = rfcproto::encode_parameters(params, &sig).map_err(|e| {
            debug!(function, error = %e, "Parameters rejected");
            Error::from(e)
        })?;

        debug!(function, bytes = body.len(), "Dispatching call");
        let reply = self
            .request(|seq| Request::Call { seq, function, params: &body })
            .await?;

        Ok(rfcproto::decode_parameters(&reply)?)
    }

    /// Invokes a remote function named by the first positional argument.
    ///
    /// Usage errors are detected before anything else, in this order: no
    /// positional argument, more than one, a name that is not text.
    pub async fn call_dynamic(&self, positional: &[Value], params: &Structure) -> Result<Structure> {
        let name = match positional {
            [] => return Err(Error::Rfc(RfcError::MissingArguments { given: 0 })),
            [name] => name,
            more => return Err(Error::Rfc(RfcError::TooManyArguments { given: more.len() })),
        };
        let Some(function) = name.as_str() else {
            return Err(Error::Rfc(RfcError::InvalidFunctionName { value: name.clone() }));
        };
        self.call(function, params).await
    }

    /// Returns the signature of a remote function, fetching it on first use.
    pub async fn function_description(&self, function: &str) -> Result<Arc<FunctionSignature>> {
        self.ensure_open()?;

        if let Some(sig) = self.signatures.get(function) {
            return Ok(sig.clone());
        }

        debug!(function, "Fetching signature");
        let body = self.request(|seq| Request::Describe { seq, function }).await?;
        let sig = Arc::new(FunctionSignature::decode(&mut Decoder::new(&body))?);
        self.signatures.insert(function.to_string(), sig.clone());
        Ok(sig)
    }

    /// Drops every cached signature.
    pub fn clear_function_cache(&self) {
        self.signatures.clear();
    }

    /// Drops one cached signature. Returns whether it was cached.
    pub fn forget_function(&self, function: &str) -> bool {
        self.signatures.remove(function).is_some()
    }
}
