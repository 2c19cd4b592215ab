//! # Function Signatures
//!
//! The remote system's declaration of a function: its parameters, their
//! directions and types, and the field layout of every structure and table.
//!
//! Signatures travel in Describe replies, so they have a wire encoding too.

use std::sync::Arc;

use rfcpack::Decoder;
use rfcpack::Encoder;

use crate::error::Error;
use crate::error::Result;

const MAX_TYPE_DEPTH: usize = 32;

/// Parameter direction as seen from the called function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Import,
    Export,
    Changing,
    Tables,
}

impl Direction {
    fn as_tag(self) -> &'static str {
        match self {
            Self::Import => "IMPORT",
            Self::Export => "EXPORT",
            Self::Changing => "CHANGING",
            Self::Tables => "TABLES",
        }
    }

    fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "IMPORT" => Ok(Self::Import),
            "EXPORT" => Ok(Self::Export),
            "CHANGING" => Ok(Self::Changing),
            "TABLES" => Ok(Self::Tables),
            other => Err(Error::UnknownVariant(format!("direction {}", other))),
        }
    }

    /// Whether the called function reads this parameter.
    ///
    /// Informational. The codec accepts any declared parameter regardless of
    /// direction; the remote runtime decides what it reads.
    pub fn is_input(self) -> bool {
        !matches!(self, Self::Export)
    }
}

/// Declared type of a parameter or field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Char { length: u32 },
    /// Digits-only text.
    Numc { length: u32 },
    String,
    Int,
    Float,
    /// Packed fixed-point number.
    Decimal { digits: u8, decimals: u8 },
    Date,
    Time,
    Bytes { length: u32 },
    Structure(Arc<TypeDesc>),
    Table(Arc<TypeDesc>),
}

impl FieldType {
    /// Human-readable type name used in conversion errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Char { length } => format!("CHAR({})", length),
            Self::Numc { length } => format!("NUMC({})", length),
            Self::String => "STRING".into(),
            Self::Int => "INT".into(),
            Self::Float => "FLOAT".into(),
            Self::Decimal { digits, decimals } => format!("BCD({},{})", digits, decimals),
            Self::Date => "DATE".into(),
            Self::Time => "TIME".into(),
            Self::Bytes { length } => format!("BYTE({})", length),
            Self::Structure(desc) => format!("STRUCTURE {}", desc.name),
            Self::Table(desc) => format!("TABLE OF {}", desc.name),
        }
    }
}

/// One field of a structure type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub name: String,
    pub ty: FieldType,
}

/// A named structure type with fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDesc {
    pub name: String,
    pub fields: Vec<FieldDesc>,
}

impl TypeDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new() }
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDesc { name: name.into(), ty });
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDesc> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A declared function parameter.
///
/// `direction` and `optional` are carried for callers that introspect a
/// signature. Encoding checks names and types only, so a missing mandatory
/// import is reported by the remote system, not locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub direction: Direction,
    pub ty: FieldType,
    pub optional: bool,
}

/// The declared parameter set of a remote function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), parameters: Vec::new() }
    }

    /// Adds a mandatory parameter.
    pub fn param(self, name: impl Into<String>, direction: Direction, ty: FieldType) -> Self {
        self.push(name.into(), direction, ty, false)
    }

    /// Adds an optional parameter.
    pub fn optional(self, name: impl Into<String>, direction: Direction, ty: FieldType) -> Self {
        self.push(name.into(), direction, ty, true)
    }

    fn push(mut self, name: String, direction: Direction, ty: FieldType, optional: bool) -> Self {
        self.parameters.push(Parameter { name, direction, ty, optional });
        self
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Encodes this signature as a Describe reply body.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.structure_begin()?;
        write_field_text(enc, "name", &self.name)?;
        enc.field_begin("parameters")?;
        enc.list_begin()?;
        for p in &self.parameters {
            enc.structure_begin()?;
            write_field_text(enc, "name", &p.name)?;
            write_field_text(enc, "direction", p.direction.as_tag())?;
            enc.field_begin("optional")?;
            enc.bool(p.optional)?;
            enc.field_end()?;
            enc.field_begin("type")?;
            encode_type(enc, &p.ty)?;
            enc.field_end()?;
            enc.structure_end()?;
        }
        enc.list_end()?;
        enc.field_end()?;
        enc.structure_end()?;
        Ok(())
    }

    /// Decodes a signature from a Describe reply body.
    pub fn decode(dec: &mut Decoder) -> Result<Self> {
        let mut fields = dec.structure()?;
        let mut name = None;
        let mut parameters = Vec::new();

        while let Some((key, mut val)) = fields.next()? {
            match key {
                "name" => name = Some(val.text()?.to_string()),
                "parameters" => {
                    let mut items = val.list()?;
                    while let Some(mut item) = items.next()? {
                        parameters.push(decode_parameter(&mut item)?);
                    }
                }
                _ => val.skip()?,
            }
        }

        Ok(Self {
            name: name.ok_or(Error::ProtocolViolation("signature without name".into()))?,
            parameters,
        })
    }
}

fn decode_parameter(dec: &mut Decoder) -> Result<Parameter> {
    let mut fields = dec.structure()?;
    let mut name = None;
    let mut direction = None;
    let mut optional = false;
    let mut ty = None;

    while let Some((key, mut val)) = fields.next()? {
        match key {
            "name" => name = Some(val.text()?.to_string()),
            "direction" => direction = Some(Direction::from_tag(val.text()?)?),
            "optional" => optional = val.bool()?,
            "type" => ty = Some(decode_type(&mut val, 0)?),
            _ => val.skip()?,
        }
    }

    Ok(Parameter {
        name: name.ok_or(Error::ProtocolViolation("parameter without name".into()))?,
        direction: direction.ok_or(Error::ProtocolViolation("parameter without direction".into()))?,
        ty: ty.ok_or(Error::ProtocolViolation("parameter without type".into()))?,
        optional,
    })
}

fn encode_type(enc: &mut Encoder, ty: &FieldType) -> Result<()> {
    match ty {
        FieldType::Char { length } => write_sized(enc, "CHAR", *length),
        FieldType::Numc { length } => write_sized(enc, "NUMC", *length),
        FieldType::Bytes { length } => write_sized(enc, "BYTE", *length),
        FieldType::String => write_unit_tag(enc, "STRING"),
        FieldType::Int => write_unit_tag(enc, "INT"),
        FieldType::Float => write_unit_tag(enc, "FLOAT"),
        FieldType::Date => write_unit_tag(enc, "DATE"),
        FieldType::Time => write_unit_tag(enc, "TIME"),
        FieldType::Decimal { digits, decimals } => {
            enc.field_begin("BCD")?;
            enc.list_begin()?;
            enc.int((*digits).into())?;
            enc.int((*decimals).into())?;
            enc.list_end()?;
            enc.field_end()?;
            Ok(())
        }
        FieldType::Structure(desc) => write_desc(enc, "STRUCTURE", desc),
        FieldType::Table(desc) => write_desc(enc, "TABLE", desc),
    }
}

fn decode_type(dec: &mut Decoder, depth: usize) -> Result<FieldType> {
    if depth > MAX_TYPE_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }
    let (tag, mut body) = dec.field()?;
    match tag {
        "CHAR" => Ok(FieldType::Char { length: read_length(&mut body)? }),
        "NUMC" => Ok(FieldType::Numc { length: read_length(&mut body)? }),
        "BYTE" => Ok(FieldType::Bytes { length: read_length(&mut body)? }),
        "STRING" => { body.unit()?; Ok(FieldType::String) },
        "INT" => { body.unit()?; Ok(FieldType::Int) },
        "FLOAT" => { body.unit()?; Ok(FieldType::Float) },
        "DATE" => { body.unit()?; Ok(FieldType::Date) },
        "TIME" => { body.unit()?; Ok(FieldType::Time) },
        "BCD" => {
            let mut items = body.list()?;
            let mut next_u8 = || -> Result<u8> {
                let mut item = items.next()?.ok_or(Error::ProtocolViolation("BCD needs digits and decimals".into()))?;
                u8::try_from(item.int()?).map_err(|_| Error::ProtocolViolation("BCD size out of range".into()))
            };
            let digits = next_u8()?;
            let decimals = next_u8()?;
            Ok(FieldType::Decimal { digits, decimals })
        }
        "STRUCTURE" => Ok(FieldType::Structure(Arc::new(read_desc(&mut body, depth)?))),
        "TABLE" => Ok(FieldType::Table(Arc::new(read_desc(&mut body, depth)?))),
        other => Err(Error::UnknownVariant(format!("type {}", other))),
    }
}

fn write_desc(enc: &mut Encoder, tag: &str, desc: &TypeDesc) -> Result<()> {
    enc.field_begin(tag)?;
    enc.structure_begin()?;
    write_field_text(enc, "name", &desc.name)?;
    enc.field_begin("fields")?;
    enc.structure_begin()?;
    for field in &desc.fields {
        enc.field_begin(&field.name)?;
        encode_type(enc, &field.ty)?;
        enc.field_end()?;
    }
    enc.structure_end()?;
    enc.field_end()?;
    enc.structure_end()?;
    enc.field_end()?;
    Ok(())
}

fn read_desc(dec: &mut Decoder, depth: usize) -> Result<TypeDesc> {
    let mut entries = dec.structure()?;
    let mut name = None;
    let mut fields = Vec::new();

    while let Some((key, mut val)) = entries.next()? {
        match key {
            "name" => name = Some(val.text()?.to_string()),
            "fields" => {
                let mut iter = val.structure()?;
                while let Some((field_name, mut field_ty)) = iter.next()? {
                    fields.push(FieldDesc {
                        name: field_name.to_string(),
                        ty: decode_type(&mut field_ty, depth + 1)?,
                    });
                }
            }
            _ => val.skip()?,
        }
    }

    Ok(TypeDesc {
        name: name.ok_or(Error::ProtocolViolation("type without name".into()))?,
        fields,
    })
}

fn write_sized(enc: &mut Encoder, tag: &str, length: u32) -> Result<()> {
    enc.field_begin(tag)?;
    enc.int(length.into())?;
    enc.field_end()?;
    Ok(())
}

fn read_length(dec: &mut Decoder) -> Result<u32> {
    u32::try_from(dec.int()?).map_err(|_| Error::ProtocolViolation("negative length".into()))
}

fn write_unit_tag(enc: &mut Encoder, tag: &str) -> Result<()> {
    enc.field_begin(tag)?;
    enc.unit()?;
    enc.field_end()?;
    Ok(())
}

fn write_field_text(enc: &mut Encoder, key: &str, val: &str) -> Result<()> {
    enc.field_begin(key)?;
    enc.text(val)?;
    enc.field_end()?;
    Ok(())
}
