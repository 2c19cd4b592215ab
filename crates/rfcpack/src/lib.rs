//! # Rfcpack
//!
//! A small, bounded TLV wire format for remote function call parameters.
//!
//! ## Philosophy
//!
//! - **Self-describing**: Every item carries a tag, so replies can be decoded
//!   without the function signature at hand.
//! - **Strict Scopes**: Structures only hold named fields, fields hold exactly
//!   one payload. The encoder refuses anything else.
//! - **Exact Numbers**: Decimals travel as `(mantissa, scale)`, never as floats.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are Little-Endian.

#[cfg(test)]
mod tests;

/// Wire serialization and deserialization errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Byte does not correspond to a valid `Tag`.
    InvalidTag(u8),
    /// Read a tag that differs from the one the caller asked for.
    UnexpectedTag { expected: Tag, found: Tag },
    /// Text data is not valid UTF-8.
    InvalidUtf8,
    /// Closing a scope that does not match the active scope stack.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the Root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Blob or container length exceeds `u32::MAX`.
    BlobTooLarge(usize),
    /// Attempted to write more than one payload into a Field or Result scope.
    TooManyItems(Scope),
    /// Closed a Field or Result scope without a payload.
    EmptyScope(Scope),
    /// Attempted to write something other than a Field directly into a Structure.
    InvalidStructureEntry,
    /// Date or time payload outside its calendar range.
    InvalidCalendar(u32),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "invalid tag byte: {:#04x}", b),
            Error::UnexpectedTag { expected, found } => {
                write!(f, "expected {:?}, found {:?}", expected, found)
            }
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "scope mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::TooManyItems(s) => write!(f, "too many items in scope {:?}; expected exactly 1", s),
            Error::EmptyScope(s) => write!(f, "empty scope {:?}; expected exactly 1 item", s),
            Error::InvalidCalendar(v) => write!(f, "invalid calendar value {}", v),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for wire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the type of the encoded value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Padding (skipped).
    Pad = 0x00,

    // Fixed-width scalars
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    Int = 0x03,
    Float = 0x04,
    /// `[i128 mantissa][u8 scale]`
    Decimal = 0x05,
    /// `yyyymmdd` as u32.
    Date = 0x06,
    /// Seconds since midnight as u32.
    Time = 0x07,
    Unit = 0x0E,

    // Blobs (Tag + u32 Len + Bytes)
    Text = 0x10,
    Bytes = 0x11,

    // Containers (Tag + u32 Len + Body)
    List = 0x20,
    Structure = 0x21,
    ResultOk = 0x31,
    ResultErr = 0x32,
    /// Named payload: `[Text name][item]`.
    Field = 0x33,
}

impl Tag {
    /// Returns the Tag for a given byte, or `None` if invalid.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Tag::Pad),
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::Int),
            0x04 => Some(Tag::Float),
            0x05 => Some(Tag::Decimal),
            0x06 => Some(Tag::Date),
            0x07 => Some(Tag::Time),
            0x0E => Some(Tag::Unit),
            0x10 => Some(Tag::Text),
            0x11 => Some(Tag::Bytes),
            0x20 => Some(Tag::List),
            0x21 => Some(Tag::Structure),
            0x31 => Some(Tag::ResultOk),
            0x32 => Some(Tag::ResultErr),
            0x33 => Some(Tag::Field),
            _ => None,
        }
    }

    /// Width of the fixed payload following the tag, or `None` for
    /// length-prefixed items.
    fn fixed_width(self) -> Option<usize> {
        match self {
            Tag::Pad | Tag::BoolTrue | Tag::BoolFalse | Tag::Unit => Some(0),
            Tag::Int | Tag::Float => Some(8),
            Tag::Decimal => Some(17),
            Tag::Date | Tag::Time => Some(4),
            Tag::Text | Tag::Bytes | Tag::List | Tag::Structure
            | Tag::ResultOk | Tag::ResultErr | Tag::Field => None,
        }
    }
}

/// Open container kinds on the `Encoder` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any item.
    Root,
    /// Ordered sequence; any number of items. Tables are lists of structures.
    List,
    /// Named fields only.
    Structure,
    /// Exactly one item.
    Result,
    /// Exactly one item (the payload) after the name.
    Field,
}

struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
}

/// A scope-checked encoder that back-patches container lengths.
///
/// # Structural Invariants
///
/// 1.  **Structure Scopes**: Only `Tag::Field` items may be written.
/// 2.  **Field/Result Scopes**: Exactly one item must be written.
/// 3.  **Root Scope**: The encoder must end in the Root scope to finalize bytes.
pub struct Encoder {
    buf: Vec<u8>,
    /// Open containers. Empty means Root.
    stack: Vec<Frame>,
    root_count: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
            stack: Vec::with_capacity(8),
            root_count: 0,
        }
    }

    /// Consumes the encoder and returns the final bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if !self.stack.is_empty() {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    /// Number of top-level items written so far.
    pub fn root_items(&self) -> usize {
        self.root_count
    }

    fn current_scope(&self) -> (Scope, usize) {
        match self.stack.last() {
            Some(frame) => (frame.scope, frame.count),
            None => (Scope::Root, self.root_count),
        }
    }

    fn check_write(&self, tag: Tag) -> Result<()> {
        let (scope, count) = self.current_scope();
        match scope {
            Scope::Root | Scope::List => Ok(()),
            Scope::Structure if tag == Tag::Field => Ok(()),
            Scope::Structure => Err(Error::InvalidStructureEntry),
            Scope::Result | Scope::Field if count >= 1 => Err(Error::TooManyItems(scope)),
            Scope::Result | Scope::Field => Ok(()),
        }
    }

    fn on_item_written(&mut self) {
        match self.stack.last_mut() {
            Some(frame) => frame.count += 1,
            None => self.root_count += 1,
        }
    }

    fn scalar(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(data);
        self.on_item_written();
        Ok(())
    }

    fn blob(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| Error::BlobTooLarge(data.len()))?;
        self.scalar(tag, &len.to_le_bytes())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0, 0, 0, 0]);
        self.stack.push(Frame { start: self.buf.len(), scope, count: 0 });
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        let frame = self.stack.pop().ok_or(Error::ScopeUnderflow)?;
        if frame.scope != expected {
            let actual = frame.scope;
            self.stack.push(frame);
            return Err(Error::ScopeMismatch { expected, actual });
        }
        if matches!(frame.scope, Scope::Result | Scope::Field) && frame.count == 0 {
            let scope = frame.scope;
            self.stack.push(frame);
            return Err(Error::EmptyScope(scope));
        }

        let body_len = self.buf.len() - frame.start;
        let len = u32::try_from(body_len).map_err(|_| Error::BlobTooLarge(body_len))?;
        self.buf[frame.start - 4..frame.start].copy_from_slice(&len.to_le_bytes());

        self.on_item_written();
        Ok(())
    }

    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.scalar(if v { Tag::BoolTrue } else { Tag::BoolFalse }, &[])
    }

    /// Encodes a signed integer (i64 LE).
    pub fn int(&mut self, v: i64) -> Result<()> { self.scalar(Tag::Int, &v.to_le_bytes()) }

    /// Encodes a binary float (f64 LE).
    pub fn float(&mut self, v: f64) -> Result<()> { self.scalar(Tag::Float, &v.to_le_bytes()) }

    /// Encodes an exact decimal as mantissa and scale.
    pub fn decimal(&mut self, mantissa: i128, scale: u8) -> Result<()> {
        let mut data = [0u8; 17];
        data[..16].copy_from_slice(&mantissa.to_le_bytes());
        data[16] = scale;
        self.scalar(Tag::Decimal, &data)
    }

    /// Encodes a calendar date packed as `yyyymmdd`.
    pub fn date(&mut self, yyyymmdd: u32) -> Result<()> {
        if yyyymmdd > 9999_12_31 {
            return Err(Error::InvalidCalendar(yyyymmdd));
        }
        self.scalar(Tag::Date, &yyyymmdd.to_le_bytes())
    }

    /// Encodes a time of day as seconds since midnight.
    pub fn time(&mut self, seconds: u32) -> Result<()> {
        if seconds >= 86_400 {
            return Err(Error::InvalidCalendar(seconds));
        }
        self.scalar(Tag::Time, &seconds.to_le_bytes())
    }

    pub fn unit(&mut self) -> Result<()> { self.scalar(Tag::Unit, &[]) }

    /// Encodes UTF-8 text.
    pub fn text(&mut self, v: &str) -> Result<()> { self.blob(Tag::Text, v.as_bytes()) }

    /// Encodes a raw byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> { self.blob(Tag::Bytes, v) }

    pub fn list_begin(&mut self) -> Result<()> { self.begin_scope(Tag::List, Scope::List) }
    pub fn list_end(&mut self) -> Result<()> { self.end_scope(Scope::List) }

    /// Begins a Structure. Only `field_begin()` is allowed as a direct child.
    pub fn structure_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Structure, Scope::Structure) }
    pub fn structure_end(&mut self) -> Result<()> { self.end_scope(Scope::Structure) }

    pub fn result_ok_begin(&mut self) -> Result<()> { self.begin_scope(Tag::ResultOk, Scope::Result) }
    pub fn result_ok_end(&mut self) -> Result<()> { self.end_scope(Scope::Result) }

    pub fn result_err_begin(&mut self) -> Result<()> { self.begin_scope(Tag::ResultErr, Scope::Result) }
    pub fn result_err_end(&mut self) -> Result<()> { self.end_scope(Scope::Result) }

    /// Begins a named Field. Exactly one payload item must follow.
    pub fn field_begin(&mut self, name: &str) -> Result<()> {
        self.begin_scope(Tag::Field, Scope::Field)?;
        self.text(name)?;
        // The name is metadata, not the payload.
        if let Some(frame) = self.stack.last_mut() {
            frame.count = 0;
        }
        Ok(())
    }
    pub fn field_end(&mut self) -> Result<()> { self.end_scope(Scope::Field) }
}

/// A zero-copy, bounds-checked cursor over a byte slice.
///
/// Container reads return new decoders restricted to the container's body.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Returns the remaining bytes in the view.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Peeks the next Tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let b = *self.buf.first().ok_or(Error::UnexpectedEnd)?;
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() { return Err(Error::UnexpectedEnd); }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn expect_tag(&mut self, expected: Tag) -> Result<()> {
        let found = self.peek_tag()?;
        if found != expected {
            return Err(Error::UnexpectedTag { expected, found });
        }
        self.read_bytes(1)?;
        Ok(())
    }

    /// Skips the next item and its nested children.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.read_bytes(1)?;
        match tag.fixed_width() {
            Some(width) => { self.read_bytes(width)?; }
            None => {
                let len = self.read_len()?;
                self.read_bytes(len)?;
            }
        }
        Ok(())
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::BoolTrue => { self.read_bytes(1)?; Ok(true) },
            Tag::BoolFalse => { self.read_bytes(1)?; Ok(false) },
            found => Err(Error::UnexpectedTag { expected: Tag::BoolTrue, found }),
        }
    }

    pub fn int(&mut self) -> Result<i64> { self.expect_tag(Tag::Int)?; Ok(i64::from_le_bytes(self.read_array()?)) }

    pub fn float(&mut self) -> Result<f64> { self.expect_tag(Tag::Float)?; Ok(f64::from_le_bytes(self.read_array()?)) }

    /// Decodes an exact decimal as `(mantissa, scale)`.
    pub fn decimal(&mut self) -> Result<(i128, u8)> {
        self.expect_tag(Tag::Decimal)?;
        let mantissa = i128::from_le_bytes(self.read_array()?);
        let [scale] = self.read_array::<1>()?;
        Ok((mantissa, scale))
    }

    /// Decodes a date packed as `yyyymmdd`.
    pub fn date(&mut self) -> Result<u32> { self.expect_tag(Tag::Date)?; Ok(u32::from_le_bytes(self.read_array()?)) }

    /// Decodes a time of day as seconds since midnight.
    pub fn time(&mut self) -> Result<u32> { self.expect_tag(Tag::Time)?; Ok(u32::from_le_bytes(self.read_array()?)) }

    pub fn unit(&mut self) -> Result<()> { self.expect_tag(Tag::Unit) }

    pub fn text(&mut self) -> Result<&'a str> {
        self.expect_tag(Tag::Text)?;
        let len = self.read_len()?;
        std::str::from_utf8(self.read_bytes(len)?).map_err(|_| Error::InvalidUtf8)
    }

    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.expect_tag(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    fn enter_container(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.expect_tag(expected)?;
        let len = self.read_len()?;
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    /// Decodes a List into an iterator over its items.
    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::List)? })
    }

    /// Decodes a Structure into an iterator over its fields.
    pub fn structure(&mut self) -> Result<FieldIter<'a>> {
        Ok(FieldIter { dec: self.enter_container(Tag::Structure)? })
    }

    /// Decodes a Result, returning the payload decoder on either side.
    pub fn result(&mut self) -> Result<std::result::Result<Decoder<'a>, Decoder<'a>>> {
        match self.peek_tag()? {
            Tag::ResultOk => Ok(Ok(self.enter_container(Tag::ResultOk)?)),
            Tag::ResultErr => Ok(Err(self.enter_container(Tag::ResultErr)?)),
            found => Err(Error::UnexpectedTag { expected: Tag::ResultOk, found }),
        }
    }

    /// Decodes a Field, returning `(name, payload)`.
    pub fn field(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter_container(Tag::Field)?;
        let name = inner.text()?;
        Ok((name, inner))
    }
}

/// Iterator over the items of a List.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> ListIter<'a> {
    /// Returns a decoder for the next item, `Ok(None)` at the end.
    pub fn next(&mut self) -> Result<Option<Decoder<'a>>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        let mut probe = self.dec.clone();
        probe.skip()?;
        let len = self.dec.remaining() - probe.remaining();
        Ok(Some(Decoder::new(self.dec.read_bytes(len)?)))
    }
}

/// Iterator over the named fields of a Structure, in wire order.
#[derive(Debug)]
pub struct FieldIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> FieldIter<'a> {
    /// Returns `(name, payload)` for the next field, `Ok(None)` at the end.
    pub fn next(&mut self) -> Result<Option<(&'a str, Decoder<'a>)>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        Ok(Some(self.dec.field()?))
    }
}
