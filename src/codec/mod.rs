//! Self-describing tagged-value codec.
//!
//! The encoding is the subset of Go's `encoding/gob` stream format needed to
//! carry flat records: every stream opens with a type definition naming the
//! record and its fields, followed by the value itself.  A reader therefore
//! needs no schema beyond the target type's field names.
//!
//! ```text
//! message  := uint(len) int(type_id) body
//! type_id < 0  → body is a struct definition for id -type_id
//! type_id > 0  → body is a value of that type
//! struct   := (uint(field_delta) value)* 0       zero-valued fields omitted
//! ```
//!
//! Implement [`TaggedValue`] for a record type, then use [`encode`] and
//! [`decode`].  Decoding matches fields by name, ignores fields the target
//! does not know, and leaves absent fields at their zero value.

pub mod types;
pub mod wire;

use std::collections::HashMap;
use thiserror::Error;

use types::{walk_struct, TypeId, WireField, WireStruct, FIRST_USER_ID};
use types::{T_BOOL, T_BYTES, T_FLOAT, T_INT, T_STRING, T_UINT};
use wire::{put_bytes, put_int, put_str, put_uint, Reader};

/// Nested struct depth accepted by the decoder.
pub const MAX_DEPTH: usize = 32;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated input: needed {needed} bytes at offset {offset}")]
    Truncated { needed: usize, offset: usize },
    #[error("invalid unsigned integer prefix {prefix:#04x} at offset {offset}")]
    BadUint { offset: usize, prefix: u8 },
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("unknown type id {0}")]
    UnknownType(TypeId),
    #[error("unsupported wire type definition (wireType field {field})")]
    UnsupportedWireType { field: i64 },
    #[error("top-level value of type id {0} is not a struct")]
    NotAStruct(TypeId),
    #[error("field {field:?}: cannot decode {found} as {expected}")]
    FieldType { field: String, expected: &'static str, found: &'static str },
    #[error("stream contains no value")]
    NoValue,
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("malformed stream: {0}")]
    Malformed(&'static str),
}

// ── Schema ───────────────────────────────────────────────────────────────────

/// Field kinds a [`TaggedValue`] may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Uint,
    Bytes,
    String,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Borrowed field value handed to the encoder, in [`TaggedValue::FIELDS`] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Bytes(&'a [u8]),
    Str(&'a str),
}

impl FieldValue<'_> {
    fn is_zero(&self) -> bool {
        match *self {
            FieldValue::Bool(b)  => !b,
            FieldValue::Int(i)   => i == 0,
            FieldValue::Uint(u)  => u == 0,
            FieldValue::Bytes(b) => b.is_empty(),
            FieldValue::Str(s)   => s.is_empty(),
        }
    }

    fn put(&self, buf: &mut Vec<u8>) {
        match *self {
            FieldValue::Bool(b)  => put_uint(buf, b as u64),
            FieldValue::Int(i)   => put_int(buf, i),
            FieldValue::Uint(u)  => put_uint(buf, u),
            FieldValue::Bytes(b) => put_bytes(buf, b),
            FieldValue::Str(s)   => put_str(buf, s),
        }
    }
}

/// A record type that can travel through the codec.
pub trait TaggedValue: Sized {
    /// Name recorded in the type definition.
    const TYPE_NAME: &'static str;
    const FIELDS: &'static [FieldDef];

    /// One value per entry of `FIELDS`, same order.
    fn field_values(&self) -> Vec<FieldValue<'_>>;

    fn from_record(record: Record) -> Result<Self, DecodeError>;
}

// ── Decoded values ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    Struct(Record),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_)   => "bool",
            Value::Int(_)    => "int",
            Value::Uint(_)   => "uint",
            Value::Float(_)  => "float",
            Value::Bytes(_)  => "bytes",
            Value::String(_) => "string",
            Value::Struct(_) => "struct",
        }
    }
}

/// A decoded struct: its declared name and the fields present on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn take(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.swap_remove(idx).1)
    }

    fn mismatch(name: &str, expected: &'static str, found: &Value) -> DecodeError {
        DecodeError::FieldType { field: name.to_owned(), expected, found: found.kind_name() }
    }

    pub fn take_string(&mut self, name: &str) -> Result<String, DecodeError> {
        match self.take(name) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s),
            Some(Value::Bytes(b)) => {
                String::from_utf8(b).map_err(|_| DecodeError::FieldType {
                    field: name.to_owned(),
                    expected: "string",
                    found: "non-UTF-8 bytes",
                })
            }
            Some(other) => Err(Self::mismatch(name, "string", &other)),
        }
    }

    pub fn take_bytes(&mut self, name: &str) -> Result<Vec<u8>, DecodeError> {
        match self.take(name) {
            None => Ok(Vec::new()),
            Some(Value::Bytes(b)) => Ok(b),
            Some(Value::String(s)) => Ok(s.into_bytes()),
            Some(other) => Err(Self::mismatch(name, "bytes", &other)),
        }
    }

    pub fn take_bool(&mut self, name: &str) -> Result<bool, DecodeError> {
        match self.take(name) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(Self::mismatch(name, "bool", &other)),
        }
    }

    pub fn take_int(&mut self, name: &str) -> Result<i64, DecodeError> {
        match self.take(name) {
            None => Ok(0),
            Some(Value::Int(i)) => Ok(i),
            Some(Value::Uint(u)) => {
                i64::try_from(u).map_err(|_| Self::mismatch(name, "int", &Value::Uint(u)))
            }
            Some(other) => Err(Self::mismatch(name, "int", &other)),
        }
    }

    pub fn take_uint(&mut self, name: &str) -> Result<u64, DecodeError> {
        match self.take(name) {
            None => Ok(0),
            Some(Value::Uint(u)) => Ok(u),
            Some(Value::Int(i)) => {
                u64::try_from(i).map_err(|_| Self::mismatch(name, "uint", &Value::Int(i)))
            }
            Some(other) => Err(Self::mismatch(name, "uint", &other)),
        }
    }
}

// ── Encode ───────────────────────────────────────────────────────────────────

fn put_message(out: &mut Vec<u8>, body: &[u8]) {
    put_uint(out, body.len() as u64);
    out.extend_from_slice(body);
}

/// Encode `value` as a definition message followed by a value message.
/// Output depends only on the value and the type's declared shape.
pub fn encode<T: TaggedValue>(value: &T) -> Vec<u8> {
    let def = WireStruct {
        name: T::TYPE_NAME.to_owned(),
        id: FIRST_USER_ID,
        fields: T::FIELDS
            .iter()
            .map(|f| WireField { name: f.name.to_owned(), id: f.kind.type_id() })
            .collect(),
    };

    let mut out = Vec::new();
    let mut body = Vec::new();
    put_int(&mut body, -FIRST_USER_ID);
    def.encode(&mut body);
    put_message(&mut out, &body);

    body.clear();
    put_int(&mut body, FIRST_USER_ID);
    let mut last: i64 = -1;
    for (i, v) in value.field_values().iter().enumerate() {
        if v.is_zero() {
            continue;
        }
        let i = i as i64;
        put_uint(&mut body, (i - last) as u64);
        v.put(&mut body);
        last = i;
    }
    put_uint(&mut body, 0);
    put_message(&mut out, &body);
    out
}

// ── Decode ───────────────────────────────────────────────────────────────────

pub fn decode<T: TaggedValue>(bytes: &[u8]) -> Result<T, DecodeError> {
    T::from_record(decode_record(bytes)?)
}

/// Decode the first value in `bytes` without a target type.
pub fn decode_record(bytes: &[u8]) -> Result<Record, DecodeError> {
    let mut r = Reader::new(bytes);
    let mut registry: HashMap<TypeId, WireStruct> = HashMap::new();

    while !r.is_empty() {
        let len = usize::try_from(r.uint()?).map_err(|_| DecodeError::Malformed("message length"))?;
        let mut msg = Reader::new(r.take(len)?);
        let id = msg.int()?;
        if id < 0 {
            let def_id = id.checked_neg().ok_or(DecodeError::Malformed("type id overflow"))?;
            if def_id < FIRST_USER_ID {
                return Err(DecodeError::Malformed("definition of a reserved type id"));
            }
            let def = WireStruct::decode(&mut msg)?;
            registry.insert(def_id, def);
            continue;
        }
        return match registry.get(&id) {
            Some(def) => decode_struct(&mut msg, def, &registry, 0),
            None if id < FIRST_USER_ID => Err(DecodeError::NotAStruct(id)),
            None => Err(DecodeError::UnknownType(id)),
        };
    }
    Err(DecodeError::NoValue)
}

fn decode_struct(
    r: &mut Reader<'_>,
    def: &WireStruct,
    registry: &HashMap<TypeId, WireStruct>,
    depth: usize,
) -> Result<Record, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::TooDeep);
    }
    let mut record = Record { type_name: def.name.clone(), fields: Vec::new() };
    walk_struct(r, |field, r| {
        let wf = usize::try_from(field)
            .ok()
            .and_then(|i| def.fields.get(i))
            .ok_or(DecodeError::Malformed("field number outside type definition"))?;
        let value = decode_value(r, wf.id, registry, depth)?;
        record.fields.push((wf.name.clone(), value));
        Ok(())
    })?;
    Ok(record)
}

fn decode_value(
    r: &mut Reader<'_>,
    id: TypeId,
    registry: &HashMap<TypeId, WireStruct>,
    depth: usize,
) -> Result<Value, DecodeError> {
    Ok(match id {
        T_BOOL   => Value::Bool(r.bool()?),
        T_INT    => Value::Int(r.int()?),
        T_UINT   => Value::Uint(r.uint()?),
        T_FLOAT  => Value::Float(r.float()?),
        T_BYTES  => Value::Bytes(r.bytes()?.to_vec()),
        T_STRING => Value::String(r.string()?),
        other => match registry.get(&other) {
            Some(def) => Value::Struct(decode_struct(r, def, registry, depth + 1)?),
            None => return Err(DecodeError::UnknownType(other)),
        },
    })
}
