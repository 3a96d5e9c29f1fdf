//! Append-only, per-connection record of every message sent and received.

use crate::codec::WireMessage;
use crate::error::{Error, Result};
use crate::time::create_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{event, Level};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Ok,
    Error,
}

/// What a caller hands to `append`; the log assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub connection_id: String,
    pub direction: Direction,
    pub from: String,
    pub to: String,
    pub message: Option<WireMessage>,
    pub raw: Vec<u8>,
    pub error: Option<String>,
}

impl EntryDraft {
    pub fn message(connection_id: &str, direction: Direction, from: &str, to: &str, message: WireMessage) -> Self {
        EntryDraft {
            connection_id: connection_id.to_string(),
            direction,
            from: from.to_string(),
            to: to.to_string(),
            raw: message.encoded.clone(),
            message: Some(message),
            error: None,
        }
    }

    /// An inbound frame that could not be decoded.
    pub fn undecodable(connection_id: &str, from: &str, to: &str, raw: Vec<u8>, error: &Error) -> Self {
        EntryDraft {
            connection_id: connection_id.to_string(),
            direction: Direction::Received,
            from: from.to_string(),
            to: to.to_string(),
            message: None,
            raw,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: u64,
    pub connection_id: String,
    pub direction: Direction,
    pub status: EntryStatus,
    pub from: String,
    pub to: String,
    pub message: Option<WireMessage>,
    pub raw: Vec<u8>,
    pub error: Option<String>,
    pub timestamp: u64,
}

impl LogEntry {
    pub fn msg_type(&self) -> Option<&str> {
        self.message.as_ref().map(|message| message.msg_type.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogFilter {
    pub direction: Option<Direction>,
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    /// Only entries with an id greater than this.
    pub after: Option<u64>,
}

impl LogFilter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.direction.map_or(true, |direction| entry.direction == direction)
            && self
                .msg_type
                .as_deref()
                .map_or(true, |msg_type| entry.msg_type() == Some(msg_type))
            && self.after.map_or(true, |after| entry.id > after)
    }
}

/// A stable view of one connection's entries. `iter` can be called any
/// number of times and always yields the same order.
#[derive(Debug, Clone)]
pub struct LogSnapshot {
    entries: Vec<Arc<LogEntry>>,
    filter: LogFilter,
}

impl LogSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries
            .iter()
            .map(|entry| entry.as_ref())
            .filter(move |entry| self.filter.matches(entry))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

#[derive(Debug, Default)]
struct LogStore {
    next_id: u64,
    entries: HashMap<String, Vec<Arc<LogEntry>>>,
}

#[derive(Debug)]
pub struct ExchangeLog {
    capacity: usize,
    store: RwLock<LogStore>,
}

impl ExchangeLog {
    /// `capacity` bounds the entries kept per connection.
    pub fn new(capacity: usize) -> Self {
        ExchangeLog {
            capacity,
            store: RwLock::new(LogStore::default()),
        }
    }

    /// Fails with `StorageExhausted` unless `count` more entries fit for
    /// `connection_id`. Nothing is held back: callers that must not lose
    /// the room serialize their appends per connection.
    pub async fn reserve(&self, connection_id: &str, count: usize) -> Result<()> {
        let store = self.store.read().await;
        self.check_room(&store, connection_id, count)
    }

    fn check_room(&self, store: &LogStore, connection_id: &str, count: usize) -> Result<()> {
        let held = store.entries.get(connection_id).map_or(0, |entries| entries.len());
        if held.saturating_add(count) > self.capacity {
            event!(Level::WARN, "exchange log for {} is full", connection_id);
            return Err(Error::StorageExhausted {
                connection_id: connection_id.to_string(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub async fn append(&self, draft: EntryDraft) -> Result<Arc<LogEntry>> {
        let mut appended = self.append_batch(vec![draft]).await?;
        appended
            .pop()
            .ok_or_else(|| Error::Malformed(String::from("empty log append")))
    }

    /// Appends every draft or none of them. Ids increase strictly and
    /// timestamps never go backwards within a connection.
    pub async fn append_batch(&self, drafts: Vec<EntryDraft>) -> Result<Vec<Arc<LogEntry>>> {
        let mut store = self.store.write().await;

        let mut incoming: HashMap<&str, usize> = HashMap::new();
        for draft in &drafts {
            *incoming.entry(draft.connection_id.as_str()).or_insert(0) += 1;
        }
        for (connection_id, count) in incoming {
            self.check_room(&store, connection_id, count)?;
        }

        let mut appended = Vec::with_capacity(drafts.len());
        for draft in drafts {
            store.next_id += 1;
            let id = store.next_id;
            let entries = store.entries.entry(draft.connection_id.clone()).or_default();
            let timestamp = entries
                .last()
                .map_or(0, |last| last.timestamp)
                .max(create_timestamp());
            let entry = Arc::new(LogEntry {
                id,
                status: if draft.error.is_some() {
                    EntryStatus::Error
                } else {
                    EntryStatus::Ok
                },
                connection_id: draft.connection_id,
                direction: draft.direction,
                from: draft.from,
                to: draft.to,
                message: draft.message,
                raw: draft.raw,
                error: draft.error,
                timestamp,
            });
            entries.push(entry.clone());
            appended.push(entry);
        }
        Ok(appended)
    }

    pub async fn query(&self, connection_id: &str, filter: LogFilter) -> LogSnapshot {
        let store = self.store.read().await;
        LogSnapshot {
            entries: store.entries.get(connection_id).cloned().unwrap_or_default(),
            filter,
        }
    }

    pub async fn clear(&self, connection_id: &str) {
        let mut store = self.store.write().await;
        if let Some(entries) = store.entries.get_mut(connection_id) {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Payload;

    fn message(msg_type: &str) -> WireMessage {
        WireMessage {
            msg_type: msg_type.to_string(),
            wire_type: 0,
            payload: Payload::new(),
            encoded: vec![1, 2],
        }
    }

    fn sent(connection_id: &str, msg_type: &str) -> EntryDraft {
        EntryDraft::message(connection_id, Direction::Sent, "runner", "ldk", message(msg_type))
    }

    #[tokio::test]
    async fn append_and_query_in_order() {
        let log = ExchangeLog::new(100);
        log.append(sent("02", "init")).await.unwrap();
        log.append(sent("02", "ping")).await.unwrap();
        log.append(sent("03", "init")).await.unwrap();

        let snapshot = log.query("02", LogFilter::default()).await;
        let types: Vec<_> = snapshot.iter().filter_map(|entry| entry.msg_type()).collect();
        assert_eq!(types, vec!["init", "ping"]);
        // restartable
        assert_eq!(snapshot.iter().count(), 2);
        assert!(snapshot
            .iter()
            .zip(snapshot.iter().skip(1))
            .all(|(a, b)| a.id < b.id && a.timestamp <= b.timestamp));

        assert_eq!(log.query("03", LogFilter::default()).await.len(), 1);
        assert!(log.query("99", LogFilter::default()).await.is_empty());
    }

    #[tokio::test]
    async fn filters() {
        let log = ExchangeLog::new(100);
        let first = log.append(sent("02", "init")).await.unwrap();
        let raw = vec![0xff];
        log.append(EntryDraft::undecodable(
            "02",
            "ldk",
            "runner",
            raw,
            &Error::UnknownType(String::from("65280")),
        ))
        .await
        .unwrap();
        log.append(sent("02", "ping")).await.unwrap();

        let received = log
            .query("02", LogFilter { direction: Some(Direction::Received), ..LogFilter::default() })
            .await;
        let entries: Vec<_> = received.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Error);
        assert!(entries[0].error.as_deref().unwrap_or("").contains("65280"));

        let pings = log
            .query("02", LogFilter { msg_type: Some(String::from("ping")), ..LogFilter::default() })
            .await;
        assert_eq!(pings.len(), 1);

        let after_first = log
            .query("02", LogFilter { after: Some(first.id), ..LogFilter::default() })
            .await;
        assert_eq!(after_first.len(), 2);
    }

    #[tokio::test]
    async fn clear_is_idempotent_and_per_connection() {
        let log = ExchangeLog::new(100);
        log.append(sent("02", "init")).await.unwrap();
        log.append(sent("03", "init")).await.unwrap();
        log.clear("02").await;
        log.clear("02").await;
        log.clear("never-seen").await;
        assert!(log.query("02", LogFilter::default()).await.is_empty());
        assert_eq!(log.query("03", LogFilter::default()).await.len(), 1);

        let next = log.append(sent("02", "ping")).await.unwrap();
        assert_eq!(log.query("02", LogFilter::default()).await.len(), 1);
        assert!(next.id > 2);
    }

    #[tokio::test]
    async fn capacity_is_all_or_nothing() {
        let log = ExchangeLog::new(3);
        log.append(sent("02", "init")).await.unwrap();
        log.append(sent("02", "init")).await.unwrap();
        let result = log
            .append_batch(vec![sent("02", "ping"), sent("02", "pong")])
            .await;
        assert!(matches!(result, Err(Error::StorageExhausted { capacity: 3, .. })));
        assert_eq!(log.query("02", LogFilter::default()).await.len(), 2);
        log.append(sent("02", "ping")).await.unwrap();
        assert!(log.append(sent("02", "ping")).await.is_err());
        // other connections are unaffected
        assert!(log.append(sent("03", "init")).await.is_ok());
    }

    #[tokio::test]
    async fn reserve_checks_room_without_appending() {
        let log = ExchangeLog::new(3);
        log.append(sent("02", "init")).await.unwrap();
        assert!(log.reserve("02", 2).await.is_ok());
        assert!(log.reserve("02", 2).await.is_ok());
        assert!(matches!(
            log.reserve("02", 3).await,
            Err(Error::StorageExhausted { capacity: 3, .. })
        ));
        assert!(log.reserve("03", 3).await.is_ok());
        assert!(log.reserve("03", usize::MAX).await.is_err());
        assert_eq!(log.query("02", LogFilter::default()).await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writers_keep_per_connection_order() {
        let log = Arc::new(ExchangeLog::new(1000));
        let mut handles = vec![];
        for connection_id in ["02", "03"] {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..100u64 {
                    let mut draft = sent(connection_id, "ping");
                    draft.raw = n.to_be_bytes().to_vec();
                    log.append(draft).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        for connection_id in ["02", "03"] {
            let snapshot = log.query(connection_id, LogFilter::default()).await;
            let order: Vec<u64> = snapshot
                .iter()
                .map(|entry| {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&entry.raw);
                    u64::from_be_bytes(bytes)
                })
                .collect();
            assert_eq!(order, (0..100).collect::<Vec<_>>());
        }
    }
}
