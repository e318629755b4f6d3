//! Type identifiers and struct type definitions.
//!
//! A definition message carries a `wireType` value, itself a struct whose
//! third field (`StructT`) holds the struct's name, id and field list.  Only
//! struct definitions are understood; array, slice, map and marshaler
//! definitions are rejected.

use super::wire::{put_int, put_str, put_uint, Reader};
use super::{DecodeError, FieldKind};

pub type TypeId = i64;

// Predefined ids.  Never change; they are part of the wire format.
pub const T_BOOL:      TypeId = 1;
pub const T_INT:       TypeId = 2;
pub const T_UINT:      TypeId = 3;
pub const T_FLOAT:     TypeId = 4;
pub const T_BYTES:     TypeId = 5;
pub const T_STRING:    TypeId = 6;
pub const T_COMPLEX:   TypeId = 7;
pub const T_INTERFACE: TypeId = 8;

/// First id handed out to user-defined types in a stream.
pub const FIRST_USER_ID: TypeId = 65;

// wireType field numbers
const WIRE_STRUCT_T: i64 = 2;

impl FieldKind {
    pub fn type_id(self) -> TypeId {
        match self {
            FieldKind::Bool   => T_BOOL,
            FieldKind::Int    => T_INT,
            FieldKind::Uint   => T_UINT,
            FieldKind::Bytes  => T_BYTES,
            FieldKind::String => T_STRING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireField {
    pub name: String,
    pub id: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireStruct {
    pub name: String,
    pub id: TypeId,
    pub fields: Vec<WireField>,
}

impl WireStruct {
    /// Body of a definition message (everything after the negated id).
    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_uint(buf, (WIRE_STRUCT_T + 1) as u64);
        // structType.CommonType
        put_uint(buf, 1);
        if !self.name.is_empty() {
            put_uint(buf, 1);
            put_str(buf, &self.name);
            put_uint(buf, 1);
        } else {
            put_uint(buf, 2);
        }
        put_int(buf, self.id);
        put_uint(buf, 0);
        // structType.Field
        if !self.fields.is_empty() {
            put_uint(buf, 1);
            put_uint(buf, self.fields.len() as u64);
            for f in &self.fields {
                put_uint(buf, 1);
                put_str(buf, &f.name);
                put_uint(buf, 1);
                put_int(buf, f.id);
                put_uint(buf, 0);
            }
        }
        put_uint(buf, 0);
        put_uint(buf, 0);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut def = None;
        walk_struct(r, |field, r| {
            if field == WIRE_STRUCT_T {
                def = Some(Self::decode_struct_type(r)?);
                Ok(())
            } else {
                Err(DecodeError::UnsupportedWireType { field })
            }
        })?;
        def.ok_or(DecodeError::UnsupportedWireType { field: -1 })
    }

    fn decode_struct_type(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut out = WireStruct { name: String::new(), id: 0, fields: Vec::new() };
        walk_struct(r, |field, r| match field {
            0 => walk_struct(r, |field, r| match field {
                0 => {
                    out.name = r.string()?;
                    Ok(())
                }
                1 => {
                    out.id = r.int()?;
                    Ok(())
                }
                _ => Err(DecodeError::Malformed("unexpected commonType field")),
            }),
            1 => {
                let count = r.uint()?;
                for _ in 0..count {
                    let mut f = WireField { name: String::new(), id: 0 };
                    walk_struct(r, |field, r| match field {
                        0 => {
                            f.name = r.string()?;
                            Ok(())
                        }
                        1 => {
                            f.id = r.int()?;
                            Ok(())
                        }
                        _ => Err(DecodeError::Malformed("unexpected fieldType field")),
                    })?;
                    out.fields.push(f);
                }
                Ok(())
            }
            _ => Err(DecodeError::Malformed("unexpected structType field")),
        })?;
        Ok(out)
    }
}

/// Visit each present field of an encoded struct, in order, until the
/// terminating zero delta.
pub fn walk_struct<F>(r: &mut Reader<'_>, mut visit: F) -> Result<(), DecodeError>
where
    F: FnMut(i64, &mut Reader<'_>) -> Result<(), DecodeError>,
{
    let mut field: i64 = -1;
    loop {
        let delta = r.uint()?;
        if delta == 0 {
            return Ok(());
        }
        field = i64::try_from(delta)
            .ok()
            .and_then(|d| field.checked_add(d))
            .ok_or(DecodeError::Malformed("field delta overflow"))?;
        visit(field, r)?;
    }
}
