//! Sequences catalog, codec, connection state and log around the peer.
//!
//! Operations on one connection run one at a time in call order; each
//! connection's state machine sits behind its own FIFO `tokio::sync::Mutex`.
//! Different connections proceed concurrently. Every peer interaction is
//! bounded by a timeout, and a timed-out operation leaves both the
//! connection and the log as they were.

use crate::catalog::{Catalog, INIT, PING, PING_NO_REPLY_THRESHOLD};
use crate::codec::{Codec, WireMessage};
use crate::connection::{Connection, ConnectionState, ConnectionStateMachine};
use crate::error::{Error, Result};
use crate::exchange_log::{Direction, EntryDraft, ExchangeLog, LogEntry, LogFilter, LogSnapshot};
use crate::keypair::{canonical_privkey, Keypair};
use crate::networking::peer::{Link, SharedPeer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout_at, Instant};
use tracing::{event, Level};

/// The connection key used when a connect request names none.
pub const DEFAULT_CONNPRIVKEY: &str = "02";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub local_endpoint: String,
    /// Private key of the peer under test when a connect request names none.
    pub peer_privkey: String,
    pub timeout: Duration,
    /// Log entries kept per connection.
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectRequest {
    pub source_privkey: Option<String>,
    pub target_privkey: Option<String>,
    pub globalfeatures: Option<String>,
    pub features: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    pub connection: Connection,
    pub sent: Arc<LogEntry>,
    pub received: Arc<LogEntry>,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub sent: Arc<LogEntry>,
    pub received: Option<Arc<LogEntry>>,
}

type Machines = RwLock<HashMap<String, Arc<Mutex<ConnectionStateMachine>>>>;

#[derive(Debug)]
pub struct Session {
    codec: Codec,
    peer: SharedPeer,
    log: ExchangeLog,
    options: SessionOptions,
    machines: Machines,
}

impl Session {
    pub fn new(codec: Codec, peer: SharedPeer, options: SessionOptions) -> Self {
        Session {
            codec,
            peer,
            log: ExchangeLog::new(options.max_entries),
            options,
            machines: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.codec.catalog()
    }

    pub fn peer_name(&self) -> &str {
        self.peer.name()
    }

    pub fn default_timeout(&self) -> Duration {
        self.options.timeout
    }

    /// Node id of the peer under test, from its configured key.
    pub fn peer_node_id(&self) -> Result<String> {
        Ok(Keypair::from_privkey(&self.options.peer_privkey)?.node_id())
    }

    /// Opens the link and performs the `init` handshake.
    pub async fn connect(&self, request: ConnectRequest, timeout: Option<Duration>) -> Result<ConnectOutcome> {
        let connection_id = canonical_privkey(
            request
                .source_privkey
                .as_deref()
                .unwrap_or(DEFAULT_CONNPRIVKEY),
        );
        let target_privkey = request
            .target_privkey
            .unwrap_or_else(|| self.options.peer_privkey.clone());
        let local = Keypair::from_privkey(&connection_id)?;
        let remote = Keypair::from_privkey(&target_privkey)?;

        let mut overrides = Map::new();
        if let Some(globalfeatures) = request.globalfeatures {
            overrides.insert(String::from("globalfeatures"), Value::String(globalfeatures));
        }
        if let Some(features) = request.features {
            overrides.insert(String::from("features"), Value::String(features));
        }
        let init = self.codec.build(INIT, &overrides)?;

        let machine_lock = self.machine_or_insert(&connection_id).await;
        let mut machine = machine_lock.lock().await;
        let snapshot = machine.clone();
        machine.begin_connect(local.node_id(), remote.node_id())?;
        if let Err(err) = self.log.reserve(&connection_id, 2).await {
            *machine = snapshot;
            return Err(err);
        }

        let link = Link {
            connection_id: connection_id.clone(),
            local_node_id: local.node_id(),
            remote_node_id: remote.node_id(),
        };
        let timeout = timeout.unwrap_or(self.options.timeout);
        let deadline = Instant::now() + timeout;

        let reply = match timeout_at(deadline, self.peer.open(&link)).await {
            Ok(Ok(())) => {
                machine.transport_ready()?;
                timeout_at(deadline, self.peer.exchange(&connection_id, &init.encoded, true)).await
            }
            Ok(Err(err)) => Ok(Err(err)),
            Err(elapsed) => Err(elapsed),
        };

        let reply = match reply {
            Err(_) => {
                *machine = snapshot;
                self.close_later(&connection_id);
                event!(Level::WARN, "connect {} timed out after {:?}", connection_id, timeout);
                return Err(Error::Timeout {
                    operation: String::from("connect"),
                    after_ms: timeout.as_millis() as u64,
                });
            }
            Ok(Err(err)) => {
                let err = connection_failed(err);
                machine.fail(&err.to_string());
                self.peer.close(&connection_id).await;
                event!(Level::WARN, "connect {} failed: {}", connection_id, err);
                return Err(err);
            }
            Ok(Ok(reply)) => reply,
        };

        let sent = self.sent_draft(&connection_id, init);
        let frame = match reply {
            Some(frame) => frame,
            None => {
                self.append_after_failure(vec![sent]).await;
                return Err(self
                    .abandon(&mut machine, String::from("peer did not answer init"))
                    .await);
            }
        };

        match self.codec.parse(&frame) {
            Ok(message) if message.msg_type == INIT => {
                let received = self.received_draft(&connection_id, message);
                let mut entries = match self.log.append_batch(vec![sent, received]).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        *machine = snapshot;
                        self.peer.close(&connection_id).await;
                        return Err(err);
                    }
                };
                machine.record_exchange(INIT, Some(INIT));
                event!(Level::INFO, "connected {} to {}", connection_id, self.peer.name());

                let received = entries.pop();
                let sent = entries.pop();
                match (sent, received) {
                    (Some(sent), Some(received)) => Ok(ConnectOutcome {
                        connection: machine.connection().clone(),
                        sent,
                        received,
                    }),
                    _ => Err(Error::Malformed(String::from("handshake entries missing from log"))),
                }
            }
            Ok(message) => {
                let reason = format!("peer answered init with {}", message.msg_type);
                let received = self.received_draft(&connection_id, message);
                self.append_after_failure(vec![sent, received]).await;
                Err(self.abandon(&mut machine, reason).await)
            }
            Err(err) => {
                let reason = format!("undecodable init reply: {}", err);
                let received = EntryDraft::undecodable(
                    &connection_id,
                    self.peer.name(),
                    &self.options.local_endpoint,
                    frame,
                    &err,
                );
                self.append_after_failure(vec![sent, received]).await;
                Err(self.abandon(&mut machine, reason).await)
            }
        }
    }

    /// Builds a message from the catalog defaults plus `overrides`, sends it
    /// on an established connection and records the exchange.
    pub async fn send_raw(
        &self,
        connection_id: &str,
        msg_type: &str,
        overrides: &Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<SendOutcome> {
        let connection_id = canonical_privkey(connection_id);
        let connection_id = connection_id.as_str();
        let message = self.codec.build(msg_type, overrides)?;
        let expect_reply = self.expects_reply(&message)?;

        let machine_lock = match self.machine(connection_id).await {
            Some(machine_lock) => machine_lock,
            None => {
                let transient = self.new_machine(connection_id);
                transient.authorize(msg_type)?;
                return Err(Error::ConnectionFailed(String::from("not connected")));
            }
        };
        let mut machine = machine_lock.lock().await;
        if let Err(err) = machine.authorize(msg_type) {
            event!(Level::WARN, "refused {} on {}: {}", msg_type, connection_id, err);
            return Err(err);
        }
        // room for the message and its reply, before the peer sees anything
        self.log
            .reserve(connection_id, 1 + usize::from(expect_reply))
            .await?;

        let timeout = timeout.unwrap_or(self.options.timeout);
        let reply = match tokio::time::timeout(
            timeout,
            self.peer.exchange(connection_id, &message.encoded, expect_reply),
        )
        .await
        {
            Err(_) => {
                event!(Level::WARN, "{} on {} timed out after {:?}", msg_type, connection_id, timeout);
                return Err(Error::Timeout {
                    operation: format!("{} exchange", msg_type),
                    after_ms: timeout.as_millis() as u64,
                });
            }
            Ok(Err(err)) => {
                let err = connection_failed(err);
                machine.fail(&err.to_string());
                event!(Level::WARN, "{} on {} failed: {}", msg_type, connection_id, err);
                return Err(err);
            }
            Ok(Ok(reply)) => reply,
        };

        let mut drafts = vec![self.sent_draft(connection_id, message)];
        let mut received_type = None;
        if let Some(frame) = reply {
            match self.codec.parse(&frame) {
                Ok(reply) => {
                    received_type = Some(reply.msg_type.clone());
                    drafts.push(self.received_draft(connection_id, reply));
                }
                Err(err) => {
                    event!(Level::WARN, "undecodable reply on {}: {}", connection_id, err);
                    drafts.push(EntryDraft::undecodable(
                        connection_id,
                        self.peer.name(),
                        &self.options.local_endpoint,
                        frame,
                        &err,
                    ));
                }
            }
        }

        let mut entries = self.log.append_batch(drafts).await?.into_iter();
        machine.record_exchange(msg_type, received_type.as_deref());
        event!(
            Level::INFO,
            "{} sent on {}, reply {}",
            msg_type,
            connection_id,
            received_type.as_deref().unwrap_or("none")
        );
        match entries.next() {
            Some(sent) => Ok(SendOutcome {
                sent,
                received: entries.next(),
            }),
            None => Err(Error::Malformed(String::from("sent entry missing from log"))),
        }
    }

    /// Drops the link and resets the connection. The log is kept.
    pub async fn disconnect(&self, connection_id: &str) -> Result<Connection> {
        let connection_id = canonical_privkey(connection_id);
        let connection_id = connection_id.as_str();
        let machine_lock = self
            .machine(connection_id)
            .await
            .ok_or_else(|| Error::UnknownConnection(connection_id.to_string()))?;
        let mut machine = machine_lock.lock().await;
        self.peer.close(connection_id).await;
        machine.disconnect();
        event!(Level::INFO, "disconnected {}", connection_id);
        Ok(machine.connection().clone())
    }

    pub async fn fetch_log(&self, connection_id: &str, filter: LogFilter) -> LogSnapshot {
        self.log.query(&canonical_privkey(connection_id), filter).await
    }

    pub async fn reset_log(&self, connection_id: &str) {
        let connection_id = canonical_privkey(connection_id);
        self.log.clear(&connection_id).await;
        event!(Level::DEBUG, "log reset for {}", connection_id);
    }

    pub async fn connection(&self, connection_id: &str) -> Option<Connection> {
        let machine_lock = self.machine(&canonical_privkey(connection_id)).await?;
        let machine = machine_lock.lock().await;
        Some(machine.connection().clone())
    }

    /// All known connections ordered by id.
    pub async fn connections(&self) -> Vec<Connection> {
        let machine_locks: Vec<_> = self.machines.read().await.values().cloned().collect();
        let mut connections = Vec::with_capacity(machine_locks.len());
        for machine_lock in machine_locks {
            connections.push(machine_lock.lock().await.connection().clone());
        }
        connections.sort_by(|a, b| a.id.cmp(&b.id));
        connections
    }

    pub async fn active_connections(&self) -> usize {
        self.connections()
            .await
            .iter()
            .filter(|connection| connection.state == ConnectionState::Connected)
            .count()
    }

    fn expects_reply(&self, message: &WireMessage) -> Result<bool> {
        let definition = self.codec.catalog().lookup(&message.msg_type)?;
        if message.msg_type == PING {
            let num_pong_bytes = message.payload.int("num_pong_bytes").unwrap_or(0);
            return Ok(num_pong_bytes < PING_NO_REPLY_THRESHOLD);
        }
        Ok(definition.reply.is_some())
    }

    fn new_machine(&self, connection_id: &str) -> ConnectionStateMachine {
        ConnectionStateMachine::new(connection_id, &self.options.local_endpoint, self.peer.name())
    }

    async fn machine(&self, connection_id: &str) -> Option<Arc<Mutex<ConnectionStateMachine>>> {
        self.machines.read().await.get(connection_id).cloned()
    }

    async fn machine_or_insert(&self, connection_id: &str) -> Arc<Mutex<ConnectionStateMachine>> {
        if let Some(machine_lock) = self.machine(connection_id).await {
            return machine_lock;
        }
        let mut machines = self.machines.write().await;
        machines
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(self.new_machine(connection_id))))
            .clone()
    }

    fn sent_draft(&self, connection_id: &str, message: WireMessage) -> EntryDraft {
        EntryDraft::message(
            connection_id,
            Direction::Sent,
            &self.options.local_endpoint,
            self.peer.name(),
            message,
        )
    }

    fn received_draft(&self, connection_id: &str, message: WireMessage) -> EntryDraft {
        EntryDraft::message(
            connection_id,
            Direction::Received,
            self.peer.name(),
            &self.options.local_endpoint,
            message,
        )
    }

    async fn append_after_failure(&self, drafts: Vec<EntryDraft>) {
        if let Err(err) = self.log.append_batch(drafts).await {
            event!(Level::WARN, "could not record failed handshake: {}", err);
        }
    }

    async fn abandon(&self, machine: &mut ConnectionStateMachine, reason: String) -> Error {
        let connection_id = machine.connection().id.clone();
        machine.fail(&reason);
        self.peer.close(&connection_id).await;
        event!(Level::WARN, "handshake on {} failed: {}", connection_id, reason);
        Error::ConnectionFailed(reason)
    }

    fn close_later(&self, connection_id: &str) {
        let peer = self.peer.clone();
        let connection_id = connection_id.to_string();
        tokio::spawn(async move {
            peer.close(&connection_id).await;
        });
    }
}

fn connection_failed(err: Error) -> Error {
    match err {
        Error::ConnectionFailed(_) | Error::Malformed(_) => err,
        other => Error::ConnectionFailed(other.to_string()),
    }
}
