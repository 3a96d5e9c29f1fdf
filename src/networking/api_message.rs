use crate::catalog::Catalog;
use crate::exchange_log::{Direction, EntryStatus, LogEntry};
use crate::session::ConnectRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectBody {
    pub source_privkey: Option<String>,
    pub target_privkey: Option<String>,
    pub globalfeatures: Option<String>,
    pub features: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl ConnectBody {
    pub fn into_request(self) -> (ConnectRequest, Option<Duration>) {
        let request = ConnectRequest {
            source_privkey: self.source_privkey,
            target_privkey: self.target_privkey,
            globalfeatures: self.globalfeatures,
            features: self.features,
        };
        (request, self.timeout_ms.map(Duration::from_millis))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DisconnectBody {
    pub connprivkey: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawMessageBody {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub connprivkey: String,
    #[serde(default)]
    pub content: Option<Map<String, Value>>,
    pub timeout_ms: Option<u64>,
}

/// One message as the visualizers draw it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MessageView {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    pub content: Map<String, Value>,
}

impl MessageView {
    pub fn from_entry(entry: &LogEntry, catalog: &Catalog) -> Self {
        MessageView {
            from: entry.from.clone(),
            to: entry.to.clone(),
            msg_type: entry.msg_type().map(String::from),
            content: content(entry, catalog),
        }
    }
}

/// A log entry as returned by `/message-flow`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LogEntryView {
    pub id: u64,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    pub direction: Direction,
    pub status: EntryStatus,
    pub content: Map<String, Value>,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: u64,
}

impl LogEntryView {
    pub fn from_entry(entry: &LogEntry, catalog: &Catalog) -> Self {
        LogEntryView {
            id: entry.id,
            from: entry.from.clone(),
            to: entry.to.clone(),
            msg_type: entry.msg_type().map(String::from),
            direction: entry.direction,
            status: entry.status,
            content: content(entry, catalog),
            raw: format!("0x{}", hex::encode(&entry.raw)),
            error: entry.error.clone(),
            timestamp: entry.timestamp,
        }
    }
}

fn content(entry: &LogEntry, catalog: &Catalog) -> Map<String, Value> {
    entry
        .message
        .as_ref()
        .and_then(|message| {
            let definition = catalog.lookup(&message.msg_type).ok()?;
            Some(message.payload.to_view(&definition))
        })
        .unwrap_or_default()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub connection_id: String,
    pub status: String,
    pub node_id: Option<String>,
    pub sent: MessageView,
    pub received: MessageView,
    pub messages: Vec<MessageView>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RawMessageResponse {
    #[serde(flatten)]
    pub sent: MessageView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<MessageView>,
    pub messages: Vec<MessageView>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
    pub message: String,
    pub runner_status: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfoResponse {
    pub node_id: String,
    pub peer: String,
    pub active_connections: usize,
    pub features: Value,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(rename = "type")]
    pub kind: String,
}
