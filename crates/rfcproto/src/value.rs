//! # Structured Values
//!
//! Host-side representation of call parameters: scalars, structures and
//! tables of structures.

use chrono::NaiveDate;
use chrono::NaiveTime;
use rust_decimal::Decimal;

/// A single typed scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Char(String),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Short type name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Char(_) => "str",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "Decimal",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Char(s) => write!(f, "{}", s),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Decimal(v) => write!(f, "{}", v),
            Self::Date(d) => write!(f, "{}", d.format("%Y%m%d")),
            Self::Time(t) => write!(f, "{}", t.format("%H%M%S")),
            Self::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// A structured parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Structure(Structure),
    Table(Vec<Structure>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.kind_name(),
            Self::Structure(_) => "structure",
            Self::Table(_) => "table",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Char(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Scalar(Scalar::Decimal(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&Structure> {
        match self {
            Self::Structure(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&[Structure]> {
        match self {
            Self::Table(rows) => Some(rows),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self { Self::Scalar(s) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::Scalar(Scalar::Char(s.to_string())) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::Scalar(Scalar::Char(s)) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Self::Scalar(Scalar::Int(v)) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Self::Scalar(Scalar::Int(v.into())) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Self::Scalar(Scalar::Float(v)) }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self { Self::Scalar(Scalar::Decimal(v)) }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self { Self::Scalar(Scalar::Date(v)) }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self { Self::Scalar(Scalar::Time(v)) }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self { Self::Scalar(Scalar::Bytes(v)) }
}

impl From<Structure> for Value {
    fn from(s: Structure) -> Self { Self::Structure(s) }
}

impl From<Vec<Structure>> for Value {
    fn from(rows: Vec<Structure>) -> Self { Self::Table(rows) }
}

/// Named fields in insertion order.
///
/// Also used for the top-level parameter and result sets of a call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    fields: Vec<(String, Value)>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, replacing an existing value of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Structure {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut s = Structure::new();
        for (k, v) in iter {
            s.insert(k, v);
        }
        s
    }
}

impl IntoIterator for Structure {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
