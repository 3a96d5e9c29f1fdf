//! Typed field values of a wire message.
//!
//! Over JSON, integers travel as decimal numbers and every byte field as a
//! `0x`-prefixed hex string. Incoming hex may omit the prefix; callers
//! send bare hex (`"00"`) as often as prefixed hex.

use crate::catalog::{FieldKind, FieldSpec, MessageDefinition};
use crate::error::{Error, Result};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(u64),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// The value an absent optional field takes on the wire.
    pub fn zero(kind: &FieldKind) -> FieldValue {
        match kind {
            FieldKind::Int { .. } => FieldValue::Int(0),
            FieldKind::Bytes { len } => FieldValue::Bytes(vec![0; *len]),
            FieldKind::VarBytes { .. } => FieldValue::Bytes(vec![]),
        }
    }

    pub fn from_json(spec: &FieldSpec, value: &Value) -> Result<FieldValue> {
        let parsed = match (&spec.kind, value) {
            (FieldKind::Int { .. }, Value::Number(number)) => number
                .as_u64()
                .map(FieldValue::Int)
                .ok_or_else(|| Error::schema(&spec.name, "expected an unsigned integer"))?,
            (FieldKind::Int { .. }, Value::String(text)) => text
                .trim()
                .parse::<u64>()
                .map(FieldValue::Int)
                .map_err(|_| Error::schema(&spec.name, "expected a decimal integer"))?,
            (FieldKind::Int { .. }, _) => {
                return Err(Error::schema(&spec.name, "expected an unsigned integer"))
            }
            (_, Value::String(text)) => FieldValue::Bytes(parse_hex(&spec.name, text)?),
            (_, _) => return Err(Error::schema(&spec.name, "expected a hex string")),
        };
        parsed.check(spec)?;
        Ok(parsed)
    }

    /// Checks the value against the field's declared semantic type.
    pub fn check(&self, spec: &FieldSpec) -> Result<()> {
        match (&spec.kind, self) {
            (FieldKind::Int { width }, FieldValue::Int(value)) => {
                if *value > width.max() {
                    return Err(Error::schema(
                        &spec.name,
                        format!("{} does not fit in {} bytes", value, width.bytes()),
                    ));
                }
            }
            (FieldKind::Bytes { len }, FieldValue::Bytes(bytes)) => {
                if bytes.len() != *len {
                    return Err(Error::schema(
                        &spec.name,
                        format!("expected exactly {} bytes, got {}", len, bytes.len()),
                    ));
                }
            }
            (FieldKind::VarBytes { prefix, unit, .. }, FieldValue::Bytes(bytes)) => {
                let unit = (*unit).max(1);
                if bytes.len() % unit != 0 {
                    return Err(Error::schema(
                        &spec.name,
                        format!("length {} is not a multiple of {}", bytes.len(), unit),
                    ));
                }
                if (bytes.len() / unit) as u64 > prefix.max() {
                    return Err(Error::schema(
                        &spec.name,
                        format!("{} elements overflow a {}-byte length prefix", bytes.len() / unit, prefix.bytes()),
                    ));
                }
            }
            (FieldKind::Int { .. }, FieldValue::Bytes(_)) => {
                return Err(Error::schema(&spec.name, "expected an integer, got bytes"))
            }
            (_, FieldValue::Int(_)) => {
                return Err(Error::schema(&spec.name, "expected bytes, got an integer"))
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Int(value) => Value::from(*value),
            FieldValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Int(value) => serializer.serialize_u64(*value),
            FieldValue::Bytes(bytes) => {
                serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
            }
        }
    }
}

fn parse_hex(field: &str, text: &str) -> Result<Vec<u8>> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(digits).map_err(|err| Error::schema(field, format!("invalid hex: {}", err)))
}

/// Field name to value. Wire order comes from the schema, never from here.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, FieldValue>);

impl Payload {
    pub fn new() -> Self {
        Payload(BTreeMap::new())
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn int(&self, field: &str) -> Option<u64> {
        match self.0.get(field) {
            Some(FieldValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn bytes(&self, field: &str) -> Option<&[u8]> {
        match self.0.get(field) {
            Some(FieldValue::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.0.insert(field.into(), value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Starts from the definition's default payload and applies caller
    /// overrides. A BOLT length field (`byteslen`, `flen`...) may be given
    /// instead of its data: the data is then zero-filled to that length.
    /// `null` keeps the default.
    pub fn with_overrides(definition: &MessageDefinition, overrides: &Map<String, Value>) -> Result<Payload> {
        let mut payload = definition.default_payload.clone();
        let mut lengths: Vec<(&FieldSpec, &str, u64)> = vec![];

        for (key, value) in overrides {
            if value.is_null() {
                continue;
            }
            if let Some(spec) = definition.field(key) {
                payload.insert(key.clone(), FieldValue::from_json(spec, value)?);
                continue;
            }
            match definition.field_by_length_name(key) {
                Some(spec) => {
                    let count = match value {
                        Value::Number(number) => number.as_u64(),
                        Value::String(text) => text.trim().parse::<u64>().ok(),
                        _ => None,
                    }
                    .ok_or_else(|| Error::schema(key, "expected an unsigned integer length"))?;
                    lengths.push((spec, key, count));
                }
                None => {
                    return Err(Error::schema(
                        key,
                        format!("not part of the {} schema", definition.msg_type),
                    ))
                }
            }
        }

        for (spec, length_name, count) in lengths {
            let (unit, limit) = match &spec.kind {
                FieldKind::VarBytes { unit, prefix, .. } => ((*unit).max(1), prefix.max()),
                _ => (1, 0),
            };
            if count > limit {
                return Err(Error::schema(
                    length_name,
                    format!("{} overflows a {}-element length prefix", count, limit),
                ));
            }
            if overrides.get(&spec.name).map_or(false, |value| !value.is_null()) {
                let given = payload.bytes(&spec.name).map_or(0, |bytes| bytes.len() / unit);
                if given as u64 != count {
                    return Err(Error::schema(
                        length_name,
                        format!("says {} but {} carries {}", count, spec.name, given),
                    ));
                }
            } else {
                let size = usize::try_from(count)
                    .ok()
                    .and_then(|count| count.checked_mul(unit))
                    .ok_or_else(|| Error::schema(length_name, format!("{} elements do not fit in memory", count)))?;
                let filled = FieldValue::Bytes(vec![0; size]);
                filled.check(spec)?;
                payload.insert(spec.name.clone(), filled);
            }
        }

        Ok(payload)
    }

    /// JSON view in schema order, with BOLT length fields rendered next to
    /// their data so the UI sees the names the BOLTs use.
    pub fn to_view(&self, definition: &MessageDefinition) -> Map<String, Value> {
        let mut view = Map::new();
        for spec in &definition.field_schema {
            let Some(value) = self.get(&spec.name) else {
                continue;
            };
            if let (FieldKind::VarBytes { length_field: Some(length_field), unit, .. }, FieldValue::Bytes(bytes)) =
                (&spec.kind, value)
            {
                view.insert(length_field.clone(), Value::from((bytes.len() / (*unit).max(1)) as u64));
            }
            view.insert(spec.name.clone(), value.to_json());
        }
        view
    }
}

impl FromIterator<(String, FieldValue)> for Payload {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Payload(iter.into_iter().collect())
    }
}
