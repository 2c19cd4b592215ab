//! # Parameter Codec
//!
//! Translates `Value`s to and from the wire, validating names and types
//! against a `FunctionSignature` on the way out.
//!
//! ## Invariants
//! - **Fail Fast**: Encoding stops at the first unknown field, scanning input
//!   in insertion order. Table rows are scanned in order with the same rule.
//! - **Exact Decimals**: Decimals keep mantissa and scale; no float detour.
//!   Values wider than the declared precision are rejected, never rounded.
//! - **Recursion Safety**: Untyped decoding is bounded by `MAX_RECURSION_DEPTH`.

use chrono::Datelike;
use chrono::NaiveDate;
use chrono::NaiveTime;
use chrono::Timelike;
use rust_decimal::Decimal;

use rfcpack::Decoder;
use rfcpack::Encoder;
use rfcpack::Tag;

use crate::error::Error;
use crate::error::Result;
use crate::signature::FieldType;
use crate::signature::FunctionSignature;
use crate::signature::TypeDesc;
use crate::value::Scalar;
use crate::value::Structure;
use crate::value::Value;

/// The maximum nesting depth for decoded values.
const MAX_RECURSION_DEPTH: usize = 64;

/// Encodes a parameter set against a function signature.
///
/// # Errors
/// `Error::FieldNotFound` for the first name not declared at its level,
/// `Error::Conversion` for a value that does not fit its declared type.
pub fn encode_parameters(params: &Structure, sig: &FunctionSignature) -> Result<Vec<u8>> {
    let mut enc = Encoder::new();
    enc.structure_begin()?;
    for (name, value) in params.iter() {
        let param = sig.get(name).ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        enc.field_begin(name)?;
        encode_value(&mut enc, name, value, &param.ty)?;
        enc.field_end()?;
    }
    enc.structure_end()?;
    Ok(enc.into_bytes()?)
}

/// Decodes a parameter set without consulting a signature.
pub fn decode_parameters(bytes: &[u8]) -> Result<Structure> {
    let mut dec = Decoder::new(bytes);
    let params = decode_structure(&mut dec, 0)?;
    if dec.remaining() != 0 {
        return Err(Error::ProtocolViolation("trailing bytes after parameters".into()));
    }
    Ok(params)
}

/// Encodes one value, checking it against the declared field type.
pub fn encode_value(enc: &mut Encoder, field: &str, value: &Value, ty: &FieldType) -> Result<()> {
    let mismatch = || Error::Conversion {
        field: field.to_string(),
        expected: ty.describe(),
        found: value.kind_name(),
    };

    match (ty, value) {
        (FieldType::Structure(desc), Value::Structure(s)) => encode_structure(enc, s, desc),
        (FieldType::Table(desc), Value::Table(rows)) => {
            enc.list_begin()?;
            for row in rows {
                encode_structure(enc, row, desc)?;
            }
            enc.list_end()?;
            Ok(())
        }
        (FieldType::Structure(_) | FieldType::Table(_), _) => Err(mismatch()),
        (_, Value::Scalar(scalar)) => encode_scalar(enc, field, scalar, ty),
        (_, Value::Structure(_) | Value::Table(_)) => Err(mismatch()),
    }
}

fn encode_structure(enc: &mut Encoder, s: &Structure, desc: &TypeDesc) -> Result<()> {
    enc.structure_begin()?;
    for (name, value) in s.iter() {
        let field = desc.get(name).ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        enc.field_begin(name)?;
        encode_value(enc, name, value, &field.ty)?;
        enc.field_end()?;
    }
    enc.structure_end()?;
    Ok(())
}

fn encode_scalar(enc: &mut Encoder, field: &str, scalar: &Scalar, ty: &FieldType) -> Result<()> {
    let conversion = |expected: String| Error::Conversion {
        field: field.to_string(),
        expected,
        found: scalar.kind_name(),
    };

    match (ty, scalar) {
        (FieldType::Char { .. } | FieldType::String, Scalar::Char(s)) => enc.text(s)?,
        (FieldType::Numc { length }, Scalar::Char(s)) => {
            if !s.chars().all(|c| c.is_ascii_digit()) {
                return Err(conversion(format!("NUMC({})", length)));
            }
            enc.text(s)?
        }
        (FieldType::Numc { .. }, Scalar::Int(v)) if *v >= 0 => enc.text(&v.to_string())?,
        (FieldType::Int, Scalar::Int(v)) => enc.int(*v)?,
        (FieldType::Float, Scalar::Float(v)) => enc.float(*v)?,
        (FieldType::Float, Scalar::Int(v)) => enc.float(*v as f64)?,
        (FieldType::Decimal { digits, decimals }, Scalar::Decimal(d)) => {
            if d.scale() > u32::from(*decimals) || !fits_precision(d, *digits, *decimals) {
                return Err(conversion(ty.describe()));
            }
            write_decimal(enc, d)?
        }
        (FieldType::Decimal { digits, decimals }, Scalar::Int(v)) => {
            let d = Decimal::from(*v);
            if !fits_precision(&d, *digits, *decimals) {
                return Err(conversion(ty.describe()));
            }
            write_decimal(enc, &d)?
        }
        (FieldType::Date, Scalar::Date(d)) => enc.date(pack_date(d)?)?,
        (FieldType::Time, Scalar::Time(t)) => enc.time(t.num_seconds_from_midnight())?,
        (FieldType::Bytes { .. }, Scalar::Bytes(b)) => enc.bytes(b)?,
        _ => return Err(conversion(ty.describe())),
    }
    Ok(())
}

/// Encodes a value without a signature.
///
/// Used for payloads that are not bound to a function, e.g. logon
/// attributes.
pub fn encode_untyped(enc: &mut Encoder, value: &Value) -> Result<()> {
    match value {
        Value::Scalar(s) => write_scalar_untyped(enc, s),
        Value::Structure(s) => encode_structure_untyped(enc, s),
        Value::Table(rows) => {
            enc.list_begin()?;
            for row in rows {
                encode_structure_untyped(enc, row)?;
            }
            enc.list_end()?;
            Ok(())
        }
    }
}

pub fn encode_structure_untyped(enc: &mut Encoder, s: &Structure) -> Result<()> {
    enc.structure_begin()?;
    for (name, value) in s.iter() {
        enc.field_begin(name)?;
        encode_untyped(enc, value)?;
        enc.field_end()?;
    }
    enc.structure_end()?;
    Ok(())
}

fn write_scalar_untyped(enc: &mut Encoder, s: &Scalar) -> Result<()> {
    match s {
        Scalar::Char(v) => enc.text(v)?,
        Scalar::Int(v) => enc.int(*v)?,
        Scalar::Float(v) => enc.float(*v)?,
        Scalar::Decimal(d) => write_decimal(enc, d)?,
        Scalar::Date(d) => enc.date(pack_date(d)?)?,
        Scalar::Time(t) => enc.time(t.num_seconds_from_midnight())?,
        Scalar::Bytes(b) => enc.bytes(b)?,
    }
    Ok(())
}

/// Decodes a single value from its wire tag.
pub fn decode_value(dec: &mut Decoder) -> Result<Value> {
    decode_value_impl(dec, 0)
}

fn decode_value_impl(dec: &mut Decoder, depth: usize) -> Result<Value> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    let scalar = match dec.peek_tag()? {
        Tag::Text => Scalar::Char(dec.text()?.to_string()),
        Tag::Int => Scalar::Int(dec.int()?),
        Tag::Float => Scalar::Float(dec.float()?),
        Tag::Decimal => {
            let (mantissa, scale) = dec.decimal()?;
            let d = Decimal::try_from_i128_with_scale(mantissa, scale.into())
                .map_err(|e| Error::ProtocolViolation(format!("decimal out of range: {}", e)))?;
            Scalar::Decimal(d)
        }
        Tag::Date => Scalar::Date(unpack_date(dec.date()?)?),
        Tag::Time => {
            let secs = dec.time()?;
            let t = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
                .ok_or_else(|| Error::ProtocolViolation(format!("invalid time {}", secs)))?;
            Scalar::Time(t)
        }
        Tag::Bytes => Scalar::Bytes(dec.bytes()?.to_vec()),
        Tag::Structure => return Ok(Value::Structure(decode_structure(dec, depth + 1)?)),
        Tag::List => {
            let mut rows = Vec::new();
            let mut items = dec.list()?;
            while let Some(mut item) = items.next()? {
                rows.push(decode_structure(&mut item, depth + 1)?);
            }
            return Ok(Value::Table(rows));
        }
        other => return Err(Error::UnknownVariant(format!("value tag {:?}", other))),
    };
    Ok(Value::Scalar(scalar))
}

fn decode_structure(dec: &mut Decoder, depth: usize) -> Result<Structure> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }
    let mut s = Structure::new();
    let mut fields = dec.structure()?;
    while let Some((name, mut val)) = fields.next()? {
        s.insert(name, decode_value_impl(&mut val, depth + 1)?);
    }
    Ok(s)
}

/// Whether the integer part fits in `digits - decimals` places.
fn fits_precision(d: &Decimal, digits: u8, decimals: u8) -> bool {
    let places = u32::from(digits.saturating_sub(decimals));
    if places > 28 {
        return true;
    }
    d.trunc().abs() < Decimal::from_i128_with_scale(10i128.pow(places), 0)
}

fn write_decimal(enc: &mut Encoder, d: &Decimal) -> Result<()> {
    // scale is at most 28
    enc.decimal(d.mantissa(), d.scale() as u8)?;
    Ok(())
}

fn pack_date(d: &NaiveDate) -> Result<u32> {
    let year = u32::try_from(d.year())
        .map_err(|_| Error::ProtocolViolation(format!("date {} before year 0", d)))?;
    Ok(year * 10_000 + d.month() * 100 + d.day())
}

fn unpack_date(packed: u32) -> Result<NaiveDate> {
    let (year, month, day) = (packed / 10_000, packed / 100 % 100, packed % 100);
    i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, month, day))
        .ok_or_else(|| Error::ProtocolViolation(format!("invalid date {}", packed)))
}
