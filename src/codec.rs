//! Schema-driven BOLT wire codec.
//!
//! A frame is laid out as:
//!
//! ```bytes
//! 0-1     wire type (big-endian u16)
//! 2..     fields, in schema order
//! ```
//!
//! Integers are big-endian at their declared width, fixed blobs are copied
//! as-is and var-bytes fields are preceded by an element count at the
//! declared prefix width. Bytes left over after the last schema field are
//! an extension stream and are ignored on decode.

use crate::catalog::{Catalog, FieldKind, FieldSpec, IntWidth, MessageDefinition};
use crate::error::{Error, Result};
use crate::payload::{FieldValue, Payload};
use serde_json::{Map, Value};
use std::convert::TryInto;
use std::sync::Arc;

/// One concrete message. The definition is referenced by type name and
/// looked up in the catalog when needed.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub msg_type: String,
    pub wire_type: u16,
    pub payload: Payload,
    pub encoded: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct Codec {
    catalog: Arc<Catalog>,
}

impl Codec {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Codec { catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn encode(&self, definition: &MessageDefinition, payload: &Payload) -> Result<Vec<u8>> {
        if let Some((unknown, _)) = payload.iter().find(|(name, _)| definition.field(name).is_none()) {
            return Err(Error::schema(
                unknown,
                format!("not part of the {} schema", definition.msg_type),
            ));
        }

        let mut vbytes: Vec<u8> = Vec::with_capacity(2 + definition.min_size());
        vbytes.extend(&definition.wire_type.to_be_bytes());
        for spec in &definition.field_schema {
            let zero;
            let value = match payload.get(&spec.name) {
                Some(value) => value,
                None if spec.required => {
                    return Err(Error::schema(&spec.name, "required field is missing"))
                }
                None => {
                    zero = FieldValue::zero(&spec.kind);
                    &zero
                }
            };
            value.check(spec)?;
            write_field(&mut vbytes, spec, value);
        }
        Ok(vbytes)
    }

    pub fn decode(&self, msg_type: &str, bytes: &[u8]) -> Result<(Arc<MessageDefinition>, Payload)> {
        let definition = self.catalog.lookup(msg_type)?;
        let mut reader = Reader::new(&definition.msg_type, bytes);
        let wire_type = reader.int(IntWidth::U16)? as u16;
        if wire_type != definition.wire_type {
            return Err(Error::Malformed(format!(
                "frame carries wire type {} but {} is {}",
                wire_type, definition.msg_type, definition.wire_type
            )));
        }
        let payload = read_fields(&definition, &mut reader)?;
        Ok((definition, payload))
    }

    /// Decodes a frame whose type is only known from its prefix.
    pub fn decode_frame(&self, bytes: &[u8]) -> Result<(Arc<MessageDefinition>, Payload)> {
        let mut reader = Reader::new("frame", bytes);
        let wire_type = reader.int(IntWidth::U16)? as u16;
        let definition = self.catalog.lookup_wire(wire_type)?;
        let mut reader = Reader::new(&definition.msg_type, bytes);
        reader.pos = 2;
        let payload = read_fields(&definition, &mut reader)?;
        Ok((definition, payload))
    }

    /// Builds a message from a catalog entry and caller overrides.
    pub fn build(&self, msg_type: &str, overrides: &Map<String, Value>) -> Result<WireMessage> {
        let definition = self.catalog.lookup(msg_type)?;
        let payload = Payload::with_overrides(&definition, overrides)?;
        self.message(&definition, payload)
    }

    pub fn message(&self, definition: &MessageDefinition, payload: Payload) -> Result<WireMessage> {
        let encoded = self.encode(definition, &payload)?;
        Ok(WireMessage {
            msg_type: definition.msg_type.clone(),
            wire_type: definition.wire_type,
            payload,
            encoded,
        })
    }

    /// Parses an inbound frame.
    pub fn parse(&self, frame: &[u8]) -> Result<WireMessage> {
        let (definition, payload) = self.decode_frame(frame)?;
        Ok(WireMessage {
            msg_type: definition.msg_type.clone(),
            wire_type: definition.wire_type,
            payload,
            encoded: frame.to_vec(),
        })
    }
}

fn write_int(vbytes: &mut Vec<u8>, width: IntWidth, value: u64) {
    match width {
        IntWidth::U8 => vbytes.push(value as u8),
        IntWidth::U16 => vbytes.extend(&(value as u16).to_be_bytes()),
        IntWidth::U32 => vbytes.extend(&(value as u32).to_be_bytes()),
        IntWidth::U64 => vbytes.extend(&value.to_be_bytes()),
    }
}

// Values are checked against their field schema before they get here.
fn write_field(vbytes: &mut Vec<u8>, spec: &FieldSpec, value: &FieldValue) {
    match (&spec.kind, value) {
        (FieldKind::Int { width }, FieldValue::Int(value)) => write_int(vbytes, *width, *value),
        (FieldKind::Bytes { .. }, FieldValue::Bytes(bytes)) => vbytes.extend(bytes),
        (FieldKind::VarBytes { prefix, unit, .. }, FieldValue::Bytes(bytes)) => {
            write_int(vbytes, *prefix, (bytes.len() / (*unit).max(1)) as u64);
            vbytes.extend(bytes);
        }
        _ => {}
    }
}

fn read_fields(definition: &MessageDefinition, reader: &mut Reader) -> Result<Payload> {
    let mut payload = Payload::new();
    for spec in &definition.field_schema {
        let value = match &spec.kind {
            FieldKind::Int { width } => FieldValue::Int(reader.int(*width)?),
            FieldKind::Bytes { len } => FieldValue::Bytes(reader.take(*len)?.to_vec()),
            FieldKind::VarBytes { prefix, unit, .. } => {
                let count = reader.int(*prefix)?;
                let len = (count as usize)
                    .checked_mul((*unit).max(1))
                    .ok_or_else(|| Error::Malformed(format!("{} length overflows", spec.name)))?;
                FieldValue::Bytes(reader.take(len)?.to_vec())
            }
        };
        payload.insert(spec.name.clone(), value);
    }
    Ok(payload)
}

struct Reader<'a> {
    msg_type: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(msg_type: &'a str, bytes: &'a [u8]) -> Self {
        Reader {
            msg_type,
            bytes,
            pos: 0,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.saturating_add(len);
        if end > self.bytes.len() {
            return Err(Error::TruncatedMessage {
                msg_type: self.msg_type.to_string(),
                needed: end,
                available: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn int(&mut self, width: IntWidth) -> Result<u64> {
        let slice = self.take(width.bytes())?;
        let value = match width {
            IntWidth::U8 => slice[0] as u64,
            IntWidth::U16 => u16::from_be_bytes(slice.try_into().map_err(|_| self.short())?) as u64,
            IntWidth::U32 => u32::from_be_bytes(slice.try_into().map_err(|_| self.short())?) as u64,
            IntWidth::U64 => u64::from_be_bytes(slice.try_into().map_err(|_| self.short())?),
        };
        Ok(value)
    }

    fn short(&self) -> Error {
        Error::Malformed(format!("short integer read in {}", self.msg_type))
    }
}
