//! Registry of named BOLT message definitions.
//!
//! Each definition carries the ordered field schema the codec walks, plus the
//! default payload a caller's overrides are merged onto. Layouts follow
//! BOLT #1, #2 and #7; only the fixed fields are modelled, trailing TLV
//! streams are left to the codec's "ignore what follows" rule.

use crate::error::{Error, Result};
use crate::payload::{FieldValue, Payload};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub const INIT: &str = "init";
pub const PING: &str = "ping";

/// A ping asking for this many pong bytes or more must not be answered.
pub const PING_NO_REPLY_THRESHOLD: u64 = 65532;

const POINT: &str = "023da092f6980e58d2c037173180e9a465476026ee50f96695963e8efe436f54eb";
const CHAIN_HASH: &str = "6fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000";
const POINT_LEN: usize = 33;
const HASH_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;
const ONION_PACKET_LEN: usize = 1366;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IntWidth {
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::U8 => 1,
            IntWidth::U16 => 2,
            IntWidth::U32 => 4,
            IntWidth::U64 => 8,
        }
    }

    pub fn max(self) -> u64 {
        match self {
            IntWidth::U8 => u8::MAX as u64,
            IntWidth::U16 => u16::MAX as u64,
            IntWidth::U32 => u32::MAX as u64,
            IntWidth::U64 => u64::MAX,
        }
    }
}

fn one() -> usize {
    1
}

fn required_default() -> bool {
    true
}

/// Semantic type of a schema field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Big-endian unsigned integer.
    Int { width: IntWidth },
    /// Fixed-length blob: hashes, channel ids, points, signatures.
    Bytes { len: usize },
    /// Length-prefixed data. The prefix counts elements of `unit` bytes.
    VarBytes {
        prefix: IntWidth,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length_field: Option<String>,
        #[serde(default = "one")]
        unit: usize,
    },
}

impl FieldKind {
    /// Bytes the field occupies at minimum on the wire.
    pub fn min_size(&self) -> usize {
        match self {
            FieldKind::Int { width } => width.bytes(),
            FieldKind::Bytes { len } => *len,
            FieldKind::VarBytes { prefix, .. } => prefix.bytes(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default = "required_default")]
    pub required: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Connection,
    Channel,
    Commitment,
    Routing,
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        match text.to_ascii_lowercase().as_str() {
            "connection" => Ok(Category::Connection),
            "channel" => Ok(Category::Channel),
            "commitment" => Ok(Category::Commitment),
            "routing" => Ok(Category::Routing),
            other => Err(Error::InvalidRequest(format!("unknown category `{}`", other))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Connection => "connection",
            Category::Channel => "channel",
            Category::Commitment => "commitment",
            Category::Routing => "routing",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDefinition {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub wire_type: u16,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub field_schema: Vec<FieldSpec>,
    pub default_payload: Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl MessageDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.field_schema.iter().find(|spec| spec.name == name)
    }

    /// The var-bytes field whose BOLT length field is called `name`.
    pub fn field_by_length_name(&self, name: &str) -> Option<&FieldSpec> {
        self.field_schema.iter().find(|spec| {
            matches!(&spec.kind, FieldKind::VarBytes { length_field: Some(length), .. } if length == name)
        })
    }

    /// Sum of the fixed-size part of the schema.
    pub fn min_size(&self) -> usize {
        self.field_schema.iter().map(|spec| spec.kind.min_size()).sum()
    }

    pub fn is_init(&self) -> bool {
        self.msg_type == INIT
    }

    fn from_raw(raw: RawDefinition) -> Result<MessageDefinition> {
        let mut seen: Vec<&str> = vec![];
        for spec in &raw.field_schema {
            if seen.contains(&spec.name.as_str()) {
                return Err(Error::schema(&spec.name, format!("declared twice in {}", raw.msg_type)));
            }
            if let FieldKind::VarBytes { unit: 0, .. } = spec.kind {
                return Err(Error::schema(&spec.name, "element unit must be at least one byte"));
            }
            seen.push(&spec.name);
        }

        let mut default_payload = Payload::new();
        for spec in &raw.field_schema {
            let value = match raw.default_payload.get(&spec.name) {
                Some(value) => FieldValue::from_json(spec, value)?,
                None => FieldValue::zero(&spec.kind),
            };
            default_payload.insert(spec.name.clone(), value);
        }
        if let Some(extra) = raw.default_payload.keys().find(|key| !seen.contains(&key.as_str())) {
            return Err(Error::schema(extra, format!("default for a field {} does not declare", raw.msg_type)));
        }

        Ok(MessageDefinition {
            msg_type: raw.msg_type,
            wire_type: raw.wire_type,
            name: raw.name,
            description: raw.description,
            category: raw.category,
            field_schema: raw.field_schema,
            default_payload,
            reply: raw.reply,
        })
    }
}

/// Definition as written in an extension file: defaults are still JSON.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct RawDefinition {
    #[serde(rename = "type")]
    msg_type: String,
    wire_type: u16,
    name: String,
    #[serde(default)]
    description: String,
    category: Category,
    field_schema: Vec<FieldSpec>,
    #[serde(default)]
    default_payload: Map<String, Value>,
    #[serde(default)]
    reply: Option<String>,
}

impl RawDefinition {
    fn new(wire_type: u16, msg_type: &str, name: &str, category: Category, description: &str) -> Self {
        RawDefinition {
            msg_type: msg_type.to_string(),
            wire_type,
            name: name.to_string(),
            description: description.to_string(),
            category,
            field_schema: vec![],
            default_payload: Map::new(),
            reply: None,
        }
    }

    fn push(mut self, name: &str, kind: FieldKind) -> Self {
        self.field_schema.push(FieldSpec {
            name: name.to_string(),
            kind,
            required: true,
        });
        self
    }

    fn int(self, name: &str, width: IntWidth) -> Self {
        self.push(name, FieldKind::Int { width })
    }

    fn bytes(self, name: &str, len: usize) -> Self {
        self.push(name, FieldKind::Bytes { len })
    }

    fn var(self, name: &str, prefix: IntWidth, length_field: &str) -> Self {
        self.array(name, prefix, length_field, 1)
    }

    fn array(self, name: &str, prefix: IntWidth, length_field: &str, unit: usize) -> Self {
        self.push(
            name,
            FieldKind::VarBytes {
                prefix,
                length_field: Some(length_field.to_string()),
                unit,
            },
        )
    }

    fn default(mut self, name: &str, value: Value) -> Self {
        self.default_payload.insert(name.to_string(), value);
        self
    }

    fn reply(mut self, msg_type: &str) -> Self {
        self.reply = Some(msg_type.to_string());
        self
    }

    /// The six basepoints/points shared by open_channel and accept_channel.
    fn channel_points(self) -> Self {
        [
            "funding_pubkey",
            "revocation_basepoint",
            "payment_basepoint",
            "delayed_payment_basepoint",
            "htlc_basepoint",
            "first_per_commitment_point",
        ]
        .iter()
        .fold(self, |raw, name| raw.bytes(name, POINT_LEN).default(name, json!(POINT)))
    }
}

fn builtin_definitions() -> Vec<RawDefinition> {
    use Category::*;
    use IntWidth::*;

    let signature = json!("01".repeat(SIGNATURE_LEN));
    vec![
        // BOLT #1
        RawDefinition::new(1, "warning", "Warning", Connection, "Reports a warning to the connected peer")
            .bytes("channel_id", HASH_LEN)
            .var("data", U16, "len"),
        RawDefinition::new(16, INIT, "Init", Connection, "Initializes a connection between nodes")
            .var("globalfeatures", U16, "gflen")
            .var("features", U16, "flen")
            .default("globalfeatures", json!("00"))
            .default("features", json!("01"))
            .reply(INIT),
        RawDefinition::new(17, "error", "Error", Connection, "Reports an error to the connected peer")
            .bytes("channel_id", HASH_LEN)
            .var("data", U16, "len"),
        RawDefinition::new(18, PING, "Ping", Connection, "Ping message to check liveness")
            .int("num_pong_bytes", U16)
            .var("ignored", U16, "byteslen")
            .default("num_pong_bytes", json!(1))
            .reply("pong"),
        RawDefinition::new(19, "pong", "Pong", Connection, "Pong response to a ping")
            .var("ignored", U16, "byteslen"),
        // BOLT #2, channel establishment
        RawDefinition::new(32, "open_channel", "Open Channel", Channel, "Request to open a new payment channel")
            .bytes("chain_hash", HASH_LEN)
            .bytes("temporary_channel_id", HASH_LEN)
            .int("funding_satoshis", U64)
            .int("push_msat", U64)
            .int("dust_limit_satoshis", U64)
            .int("max_htlc_value_in_flight_msat", U64)
            .int("channel_reserve_satoshis", U64)
            .int("htlc_minimum_msat", U64)
            .int("feerate_per_kw", U32)
            .int("to_self_delay", U16)
            .int("max_accepted_htlcs", U16)
            .channel_points()
            .int("channel_flags", U8)
            .default("chain_hash", json!(CHAIN_HASH))
            .default("funding_satoshis", json!(100000))
            .default("dust_limit_satoshis", json!(546))
            .default("max_htlc_value_in_flight_msat", json!(100000000u64))
            .default("channel_reserve_satoshis", json!(1000))
            .default("feerate_per_kw", json!(253))
            .default("to_self_delay", json!(144))
            .default("max_accepted_htlcs", json!(483))
            .default("channel_flags", json!(1))
            .reply("accept_channel"),
        RawDefinition::new(33, "accept_channel", "Accept Channel", Channel, "Accept a channel opening request")
            .bytes("temporary_channel_id", HASH_LEN)
            .int("dust_limit_satoshis", U64)
            .int("max_htlc_value_in_flight_msat", U64)
            .int("channel_reserve_satoshis", U64)
            .int("htlc_minimum_msat", U64)
            .int("minimum_depth", U32)
            .int("to_self_delay", U16)
            .int("max_accepted_htlcs", U16)
            .channel_points()
            .default("dust_limit_satoshis", json!(546))
            .default("max_htlc_value_in_flight_msat", json!(100000000u64))
            .default("channel_reserve_satoshis", json!(1000))
            .default("minimum_depth", json!(3))
            .default("to_self_delay", json!(144))
            .default("max_accepted_htlcs", json!(483)),
        RawDefinition::new(34, "funding_created", "Funding Created", Channel, "Funding transaction outpoint and first commitment signature")
            .bytes("temporary_channel_id", HASH_LEN)
            .bytes("funding_txid", HASH_LEN)
            .int("funding_output_index", U16)
            .bytes("signature", SIGNATURE_LEN)
            .default("signature", signature.clone())
            .reply("funding_signed"),
        RawDefinition::new(35, "funding_signed", "Funding Signed", Channel, "Signature for the funder's first commitment transaction")
            .bytes("channel_id", HASH_LEN)
            .bytes("signature", SIGNATURE_LEN)
            .default("signature", signature.clone()),
        RawDefinition::new(36, "channel_ready", "Channel Ready", Channel, "Funding transaction reached minimum depth")
            .bytes("channel_id", HASH_LEN)
            .bytes("second_per_commitment_point", POINT_LEN)
            .default("second_per_commitment_point", json!(POINT)),
        // BOLT #2, channel close
        RawDefinition::new(38, "shutdown", "Shutdown", Channel, "Begin a mutual close of the channel")
            .bytes("channel_id", HASH_LEN)
            .var("scriptpubkey", U16, "len")
            .reply("shutdown"),
        RawDefinition::new(39, "closing_signed", "Closing Signed", Channel, "Propose a closing fee and sign the closing transaction")
            .bytes("channel_id", HASH_LEN)
            .int("fee_satoshis", U64)
            .bytes("signature", SIGNATURE_LEN)
            .default("fee_satoshis", json!(253))
            .default("signature", signature.clone())
            .reply("closing_signed"),
        // BOLT #2, normal operation
        RawDefinition::new(128, "update_add_htlc", "Update Add HTLC", Commitment, "Offer an HTLC to the peer")
            .bytes("channel_id", HASH_LEN)
            .int("id", U64)
            .int("amount_msat", U64)
            .bytes("payment_hash", HASH_LEN)
            .int("cltv_expiry", U32)
            .bytes("onion_routing_packet", ONION_PACKET_LEN)
            .default("amount_msat", json!(1000))
            .default("cltv_expiry", json!(144)),
        RawDefinition::new(130, "update_fulfill_htlc", "Update Fulfill HTLC", Commitment, "Settle an HTLC with its preimage")
            .bytes("channel_id", HASH_LEN)
            .int("id", U64)
            .bytes("payment_preimage", HASH_LEN),
        RawDefinition::new(131, "update_fail_htlc", "Update Fail HTLC", Commitment, "Fail an HTLC back to its origin")
            .bytes("channel_id", HASH_LEN)
            .int("id", U64)
            .var("reason", U16, "len"),
        RawDefinition::new(132, "commitment_signed", "Commitment Signed", Commitment, "Sign the peer's next commitment transaction")
            .bytes("channel_id", HASH_LEN)
            .bytes("signature", SIGNATURE_LEN)
            .array("htlc_signature", U16, "num_htlcs", SIGNATURE_LEN)
            .default("signature", signature.clone())
            .reply("revoke_and_ack"),
        RawDefinition::new(133, "revoke_and_ack", "Revoke And Ack", Commitment, "Revoke the previous commitment transaction")
            .bytes("channel_id", HASH_LEN)
            .bytes("per_commitment_secret", HASH_LEN)
            .bytes("next_per_commitment_point", POINT_LEN)
            .default("next_per_commitment_point", json!(POINT)),
        RawDefinition::new(134, "update_fee", "Update Fee", Commitment, "Change the commitment feerate")
            .bytes("channel_id", HASH_LEN)
            .int("feerate_per_kw", U32)
            .default("feerate_per_kw", json!(253)),
        // BOLT #7
        RawDefinition::new(258, "channel_update", "Channel Update", Routing, "Advertise a channel's routing policy")
            .bytes("signature", SIGNATURE_LEN)
            .bytes("chain_hash", HASH_LEN)
            .int("short_channel_id", U64)
            .int("timestamp", U32)
            .int("message_flags", U8)
            .int("channel_flags", U8)
            .int("cltv_expiry_delta", U16)
            .int("htlc_minimum_msat", U64)
            .int("fee_base_msat", U32)
            .int("fee_proportional_millionths", U32)
            .int("htlc_maximum_msat", U64)
            .default("signature", signature.clone())
            .default("chain_hash", json!(CHAIN_HASH))
            .default("message_flags", json!(1))
            .default("cltv_expiry_delta", json!(144))
            .default("htlc_maximum_msat", json!(100000000u64)),
        RawDefinition::new(259, "announcement_signatures", "Announcement Signatures", Routing, "Exchange signatures for a channel announcement")
            .bytes("channel_id", HASH_LEN)
            .int("short_channel_id", U64)
            .bytes("node_signature", SIGNATURE_LEN)
            .bytes("bitcoin_signature", SIGNATURE_LEN)
            .default("node_signature", signature.clone())
            .default("bitcoin_signature", signature),
        RawDefinition::new(263, "query_channel_range", "Query Channel Range", Routing, "Ask for channels in a block range")
            .bytes("chain_hash", HASH_LEN)
            .int("first_blocknum", U32)
            .int("number_of_blocks", U32)
            .default("chain_hash", json!(CHAIN_HASH))
            .default("number_of_blocks", json!(1000)),
        RawDefinition::new(265, "gossip_timestamp_filter", "Gossip Timestamp Filter", Routing, "Limit gossip to a timestamp window")
            .bytes("chain_hash", HASH_LEN)
            .int("first_timestamp", U32)
            .int("timestamp_range", U32)
            .default("chain_hash", json!(CHAIN_HASH))
            .default("timestamp_range", json!(u32::MAX)),
    ]
}

/// Immutable after loading; shared as `Arc<Catalog>`.
#[derive(Debug, Default)]
pub struct Catalog {
    by_type: HashMap<String, Arc<MessageDefinition>>,
    by_wire: BTreeMap<u16, Arc<MessageDefinition>>,
}

impl Catalog {
    pub fn empty() -> Self {
        Catalog::default()
    }

    /// The built-in BOLT message set.
    pub fn bolt() -> Result<Catalog> {
        let mut catalog = Catalog::empty();
        for raw in builtin_definitions() {
            catalog.register(MessageDefinition::from_raw(raw)?)?;
        }
        catalog.check_replies()?;
        Ok(catalog)
    }

    pub fn register(&mut self, definition: MessageDefinition) -> Result<()> {
        if self.by_type.contains_key(&definition.msg_type) {
            return Err(Error::schema(
                &definition.msg_type,
                "message type is already registered",
            ));
        }
        if let Some(existing) = self.by_wire.get(&definition.wire_type) {
            return Err(Error::schema(
                &definition.msg_type,
                format!("wire type {} is already used by {}", definition.wire_type, existing.msg_type),
            ));
        }
        let definition = Arc::new(definition);
        self.by_type.insert(definition.msg_type.clone(), definition.clone());
        self.by_wire.insert(definition.wire_type, definition);
        Ok(())
    }

    /// Adds the definitions of a JSON file holding an array of message
    /// definitions. Nothing is registered unless the whole file is valid.
    pub fn load_extensions(&mut self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        let raws: Vec<RawDefinition> = serde_json::from_str(&text)?;
        let mut staged = Catalog {
            by_type: self.by_type.clone(),
            by_wire: self.by_wire.clone(),
        };
        let count = raws.len();
        for raw in raws {
            staged.register(MessageDefinition::from_raw(raw)?)?;
        }
        staged.check_replies()?;
        *self = staged;
        Ok(count)
    }

    fn check_replies(&self) -> Result<()> {
        for definition in self.by_wire.values() {
            if let Some(reply) = &definition.reply {
                if !self.by_type.contains_key(reply) {
                    return Err(Error::schema(
                        &definition.msg_type,
                        format!("reply type `{}` is not registered", reply),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn lookup(&self, msg_type: &str) -> Result<Arc<MessageDefinition>> {
        self.by_type
            .get(msg_type)
            .cloned()
            .ok_or_else(|| Error::UnknownType(msg_type.to_string()))
    }

    pub fn lookup_wire(&self, wire_type: u16) -> Result<Arc<MessageDefinition>> {
        self.by_wire
            .get(&wire_type)
            .cloned()
            .ok_or_else(|| Error::UnknownType(wire_type.to_string()))
    }

    /// Definitions in ascending wire-type order.
    pub fn list(&self, category: Option<Category>) -> Vec<Arc<MessageDefinition>> {
        self.by_wire
            .values()
            .filter(|definition| category.map_or(true, |category| definition.category == category))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bolt_catalog_loads() {
        let catalog = Catalog::bolt().unwrap();
        assert_eq!(catalog.len(), 22);
        let init = catalog.lookup("init").unwrap();
        assert_eq!(init.wire_type, 16);
        assert_eq!(init.reply.as_deref(), Some("init"));
        assert_eq!(init.default_payload.bytes("globalfeatures"), Some(&[0u8][..]));
        assert_eq!(init.default_payload.bytes("features"), Some(&[1u8][..]));
        assert_eq!(catalog.lookup_wire(19).unwrap().msg_type, "pong");
    }

    #[test]
    fn lookup_miss_is_unknown_type() {
        let catalog = Catalog::bolt().unwrap();
        match catalog.lookup("bogus_type") {
            Err(Error::UnknownType(name)) => assert_eq!(name, "bogus_type"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(catalog.lookup_wire(9999), Err(Error::UnknownType(_))));
    }

    #[test]
    fn list_filters_by_category_in_wire_order() {
        let catalog = Catalog::bolt().unwrap();
        let connection: Vec<String> = catalog
            .list(Some(Category::Connection))
            .iter()
            .map(|definition| definition.msg_type.clone())
            .collect();
        assert_eq!(connection, vec!["warning", "init", "error", "ping", "pong"]);

        let all = catalog.list(None);
        assert_eq!(all.len(), catalog.len());
        assert!(all.windows(2).all(|pair| pair[0].wire_type < pair[1].wire_type));
    }

    #[test]
    fn open_channel_fixed_size() {
        let catalog = Catalog::bolt().unwrap();
        let open_channel = catalog.lookup("open_channel").unwrap();
        // 2 hashes, 6 u64, u32, 2 u16, 6 points, u8
        assert_eq!(open_channel.min_size(), 64 + 48 + 4 + 4 + 6 * 33 + 1);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut catalog = Catalog::bolt().unwrap();
        let ping = (*catalog.lookup("ping").unwrap()).clone();
        assert!(catalog.register(ping.clone()).is_err());

        let mut renamed = ping;
        renamed.msg_type = String::from("ping2");
        assert!(catalog.register(renamed).is_err());
    }

    #[test]
    fn extensions_load_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "type": "custom_beacon",
                "wireType": 32801,
                "name": "Custom Beacon",
                "category": "connection",
                "fieldSchema": [
                    {{"name": "nonce", "kind": "int", "width": "u32"}},
                    {{"name": "blob", "kind": "var_bytes", "prefix": "u8", "length_field": "bloblen"}}
                ],
                "defaultPayload": {{"nonce": 7}},
                "reply": "pong"
            }}]"#
        )
        .unwrap();

        let mut catalog = Catalog::bolt().unwrap();
        assert_eq!(catalog.load_extensions(file.path()).unwrap(), 1);
        let beacon = catalog.lookup("custom_beacon").unwrap();
        assert_eq!(beacon.default_payload.int("nonce"), Some(7));
        assert_eq!(beacon.default_payload.bytes("blob"), Some(&[][..]));
        assert_eq!(catalog.lookup_wire(32801).unwrap().msg_type, "custom_beacon");
    }

    #[test]
    fn invalid_extension_leaves_catalog_untouched() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"type": "ok_one", "wireType": 40001, "name": "Ok", "category": "routing", "fieldSchema": []}},
                {{"type": "bad_one", "wireType": 40003, "name": "Bad", "category": "routing",
                  "fieldSchema": [{{"name": "x", "kind": "int", "width": "u8"}}],
                  "defaultPayload": {{"x": 300}}}}
            ]"#
        )
        .unwrap();

        let mut catalog = Catalog::bolt().unwrap();
        assert!(catalog.load_extensions(file.path()).is_err());
        assert!(catalog.lookup("ok_one").is_err());
        assert_eq!(catalog.len(), 22);
    }
}
