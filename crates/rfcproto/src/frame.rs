//! # Protocol Frames
//!
//! The request/reply envelope exchanged between client and remote system.
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on unknown data.
//! - **Forward Compatibility**: Unknown header fields are skipped.
//! - **Opaque Bodies**: Parameter sets and reply bodies travel as byte blobs,
//!   encoded separately by the codec so the frame layer never sees values.

use rfcpack::Decoder;
use rfcpack::Encoder;

use crate::error::AbapMessage;
use crate::error::Error;
use crate::error::RemoteError;
use crate::error::Result;
use crate::rc::ErrorGroup;

/// An outbound or inbound request frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Request<'a> {
    /// Opens the session. Fields are upper-case logon parameter names.
    Logon { seq: u64, fields: Vec<(&'a str, &'a str)> },
    /// Asks for a function's signature.
    Describe { seq: u64, function: &'a str },
    /// Invokes a function with a pre-encoded parameter set.
    Call { seq: u64, function: &'a str, params: &'a [u8] },
    Ping { seq: u64 },
    Close { seq: u64 },
}

impl<'a> Request<'a> {
    pub fn seq(&self) -> u64 {
        match self {
            Self::Logon { seq, .. }
            | Self::Describe { seq, .. }
            | Self::Call { seq, .. }
            | Self::Ping { seq }
            | Self::Close { seq } => *seq,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Logon { .. } => "Logon",
            Self::Describe { .. } => "Describe",
            Self::Call { .. } => "Call",
            Self::Ping { .. } => "Ping",
            Self::Close { .. } => "Close",
        }
    }

    /// Encode this request into the encoder.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.field_begin(self.tag())?;
        enc.structure_begin()?;
        write_field_u64(enc, "seq", self.seq())?;

        match self {
            Self::Logon { fields, .. } => {
                enc.field_begin("fields")?;
                enc.structure_begin()?;
                for (key, val) in fields {
                    write_field_str(enc, key, val)?;
                }
                enc.structure_end()?;
                enc.field_end()?;
            }
            Self::Describe { function, .. } => write_field_str(enc, "function", function)?,
            Self::Call { function, params, .. } => {
                write_field_str(enc, "function", function)?;
                enc.field_begin("params")?;
                enc.bytes(params)?;
                enc.field_end()?;
            }
            Self::Ping { .. } | Self::Close { .. } => {}
        }

        enc.structure_end()?;
        enc.field_end()?;
        Ok(())
    }

    /// Encode this request into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.into_bytes()?)
    }

    /// Decode a request frame.
    pub fn decode(dec: &mut Decoder<'a>) -> Result<Self> {
        let (tag, mut body) = dec.field()?;
        let mut header = body.structure()?;

        let mut seq = None;
        let mut function = None;
        let mut params = None;
        let mut fields = Vec::new();

        while let Some((key, mut val)) = header.next()? {
            match key {
                "seq" => seq = Some(read_u64(&mut val)?),
                "function" => function = Some(val.text()?),
                "params" => params = Some(val.bytes()?),
                "fields" => {
                    let mut iter = val.structure()?;
                    while let Some((k, mut v)) = iter.next()? {
                        fields.push((k, v.text()?));
                    }
                }
                _ => val.skip()?,
            }
        }

        let seq = seq.ok_or(Error::ProtocolViolation("Missing seq".into()))?;
        let function = || function.ok_or(Error::ProtocolViolation("Missing function".into()));

        match tag {
            "Logon" => Ok(Self::Logon { seq, fields }),
            "Describe" => Ok(Self::Describe { seq, function: function()? }),
            "Call" => Ok(Self::Call {
                seq,
                function: function()?,
                params: params.ok_or(Error::ProtocolViolation("Missing params".into()))?,
            }),
            "Ping" => Ok(Self::Ping { seq }),
            "Close" => Ok(Self::Close { seq }),
            other => Err(Error::UnknownVariant(format!("Request frame: {}", other))),
        }
    }
}

/// Encodes a successful reply carrying an opaque body.
pub struct ReplyOkEncoder<'a> {
    pub seq: u64,
    pub body: &'a [u8],
}

impl<'a> ReplyOkEncoder<'a> {
    pub fn new(seq: u64, body: &'a [u8]) -> Self {
        Self { seq, body }
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.field_begin("Reply")?;
        enc.result_ok_begin()?;
        enc.structure_begin()?;
        write_field_u64(enc, "seq", self.seq)?;
        enc.field_begin("body")?;
        enc.bytes(self.body)?;
        enc.field_end()?;
        enc.structure_end()?;
        enc.result_ok_end()?;
        enc.field_end()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.into_bytes()?)
    }
}

/// Encodes a failed reply.
pub struct ReplyErrEncoder<'a> {
    pub seq: u64,
    pub error: &'a RemoteError,
}

impl<'a> ReplyErrEncoder<'a> {
    pub fn new(seq: u64, error: &'a RemoteError) -> Self {
        Self { seq, error }
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.field_begin("Reply")?;
        enc.result_err_begin()?;
        enc.structure_begin()?;
        write_field_u64(enc, "seq", self.seq)?;
        enc.field_begin("error")?;
        encode_remote_error(enc, self.error)?;
        enc.field_end()?;
        enc.structure_end()?;
        enc.result_err_end()?;
        enc.field_end()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.into_bytes()?)
    }
}

/// Decodes an inbound reply frame.
pub struct ReplyDecoder<'a> {
    pub seq: u64,
    /// - `Ok(body)`: success; body layout depends on the request.
    /// - `Err(RemoteError)`: the remote system reported a failure.
    pub status: std::result::Result<&'a [u8], RemoteError>,
}

impl<'a> ReplyDecoder<'a> {
    pub fn decode(dec: &mut Decoder<'a>) -> Result<Self> {
        let (tag, mut body) = dec.field()?;
        if tag != "Reply" {
            return Err(Error::UnknownVariant(format!("Expected Reply frame, found {}", tag)));
        }
        match body.result()? {
            Ok(ok_body) => Self::decode_success(ok_body),
            Err(err_body) => Self::decode_failure(err_body),
        }
    }

    fn decode_success(mut ok_body: Decoder<'a>) -> Result<Self> {
        let mut map = ok_body.structure()?;
        let mut seq = None;
        let mut payload = None;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "seq" => seq = Some(read_u64(&mut val)?),
                "body" => payload = Some(val.bytes()?),
                _ => val.skip()?,
            }
        }

        Ok(ReplyDecoder {
            seq: seq.ok_or(Error::ProtocolViolation("Missing seq".into()))?,
            status: Ok(payload.ok_or(Error::ProtocolViolation("Missing body".into()))?),
        })
    }

    fn decode_failure(mut err_body: Decoder<'a>) -> Result<Self> {
        let mut map = err_body.structure()?;
        let mut seq = None;
        let mut error = None;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "seq" => seq = Some(read_u64(&mut val)?),
                "error" => error = Some(decode_remote_error(&mut val)?),
                _ => val.skip()?,
            }
        }

        Ok(ReplyDecoder {
            seq: seq.ok_or(Error::ProtocolViolation("Missing seq".into()))?,
            status: Err(error.ok_or(Error::ProtocolViolation("Missing error".into()))?),
        })
    }
}

/// Decodes just the sequence number from a raw request or reply.
///
/// Used to answer frames whose full decoding fails.
pub fn decode_seq(bytes: &[u8]) -> Result<u64> {
    let mut dec = Decoder::new(bytes);
    let (tag, mut body) = dec.field()?;
    let mut map = match tag {
        "Reply" => match body.result()? {
            Ok(mut ok) => ok.structure()?,
            Err(mut err) => err.structure()?,
        },
        _ => body.structure()?,
    };

    while let Some((key, mut val)) = map.next()? {
        if key == "seq" {
            return read_u64(&mut val);
        }
        val.skip()?;
    }

    Err(Error::ProtocolViolation("Missing seq".into()))
}

fn encode_remote_error(enc: &mut Encoder, error: &RemoteError) -> Result<()> {
    enc.structure_begin()?;
    write_field_u64(enc, "group", error.group.as_u32().into())?;
    write_field_u64(enc, "code", error.code.into())?;
    write_field_str(enc, "key", &error.key)?;
    enc.field_begin("message")?;
    enc.list_begin()?;
    for line in &error.message {
        enc.text(line)?;
    }
    enc.list_end()?;
    enc.field_end()?;
    if let Some(abap) = &error.abap {
        enc.field_begin("abap")?;
        enc.structure_begin()?;
        write_field_str(enc, "class", &abap.class)?;
        write_field_str(enc, "kind", &abap.kind)?;
        write_field_str(enc, "number", &abap.number)?;
        write_field_str(enc, "v1", &abap.v1)?;
        write_field_str(enc, "v2", &abap.v2)?;
        write_field_str(enc, "v3", &abap.v3)?;
        write_field_str(enc, "v4", &abap.v4)?;
        enc.structure_end()?;
        enc.field_end()?;
    }
    enc.structure_end()?;
    Ok(())
}

fn decode_remote_error(dec: &mut Decoder) -> Result<RemoteError> {
    let mut map = dec.structure()?;
    let mut group = None;
    let mut code = None;
    let mut key = None;
    let mut message = Vec::new();
    let mut abap = None;

    while let Some((name, mut val)) = map.next()? {
        match name {
            "group" => group = Some(read_u32(&mut val)?),
            "code" => code = Some(read_u32(&mut val)?),
            "key" => key = Some(val.text()?.to_string()),
            "message" => {
                let mut lines = val.list()?;
                while let Some(mut line) = lines.next()? {
                    message.push(line.text()?.to_string());
                }
            }
            "abap" => abap = Some(decode_abap(&mut val)?),
            _ => val.skip()?,
        }
    }

    Ok(RemoteError {
        group: ErrorGroup::from_u32(group.ok_or(Error::ProtocolViolation("Missing group".into()))?),
        code: code.ok_or(Error::ProtocolViolation("Missing code".into()))?,
        key: key.ok_or(Error::ProtocolViolation("Missing key".into()))?,
        message,
        abap,
    })
}

fn decode_abap(dec: &mut Decoder) -> Result<AbapMessage> {
    let mut msg = AbapMessage::default();
    let mut map = dec.structure()?;
    while let Some((name, mut val)) = map.next()? {
        let slot = match name {
            "class" => &mut msg.class,
            "kind" => &mut msg.kind,
            "number" => &mut msg.number,
            "v1" => &mut msg.v1,
            "v2" => &mut msg.v2,
            "v3" => &mut msg.v3,
            "v4" => &mut msg.v4,
            _ => {
                val.skip()?;
                continue;
            }
        };
        *slot = val.text()?.to_string();
    }
    Ok(msg)
}

// Helper functions

fn write_field_u64(enc: &mut Encoder, key: &str, val: u64) -> Result<()> {
    let val = i64::try_from(val).map_err(|_| Error::ProtocolViolation(format!("{} out of range", key)))?;
    enc.field_begin(key)?;
    enc.int(val)?;
    enc.field_end()?;
    Ok(())
}

fn write_field_str(enc: &mut Encoder, key: &str, val: &str) -> Result<()> {
    enc.field_begin(key)?;
    enc.text(val)?;
    enc.field_end()?;
    Ok(())
}

fn read_u64(dec: &mut Decoder) -> Result<u64> {
    u64::try_from(dec.int()?).map_err(|_| Error::ProtocolViolation("negative number".into()))
}

fn read_u32(dec: &mut Decoder) -> Result<u32> {
    u32::try_from(dec.int()?).map_err(|_| Error::ProtocolViolation("number out of range".into()))
}
