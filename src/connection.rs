use crate::catalog::INIT;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// One logical link between the runner and the peer under test. The id is
/// the runner-side connection key (`"02"` and so on).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub local_endpoint: String,
    pub remote_endpoint: String,
    pub local_node_id: Option<String>,
    pub remote_node_id: Option<String>,
    pub state: ConnectionState,
    pub handshake_complete: bool,
    pub last_error: Option<String>,
}

/// Owns a `Connection` and is the only thing that mutates it. Every
/// transition either applies fully or returns an error without touching
/// the connection.
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    connection: Connection,
}

impl ConnectionStateMachine {
    pub fn new(id: &str, local_endpoint: &str, remote_endpoint: &str) -> Self {
        ConnectionStateMachine {
            connection: Connection {
                id: id.to_string(),
                local_endpoint: local_endpoint.to_string(),
                remote_endpoint: remote_endpoint.to_string(),
                local_node_id: None,
                remote_node_id: None,
                state: ConnectionState::Disconnected,
                handshake_complete: false,
                last_error: None,
            },
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.connection.handshake_complete
    }

    /// disconnected | error -> connecting
    pub fn begin_connect(&mut self, local_node_id: String, remote_node_id: String) -> Result<()> {
        match self.connection.state {
            ConnectionState::Disconnected | ConnectionState::Error => {}
            ConnectionState::Connecting | ConnectionState::Connected => {
                return Err(Error::AlreadyConnected(self.connection.id.clone()))
            }
        }
        self.connection.local_node_id = Some(local_node_id);
        self.connection.remote_node_id = Some(remote_node_id);
        self.connection.handshake_complete = false;
        self.connection.last_error = None;
        self.transition(ConnectionState::Connecting);
        Ok(())
    }

    /// connecting -> connected, once the transport link is up.
    pub fn transport_ready(&mut self) -> Result<()> {
        if self.connection.state != ConnectionState::Connecting {
            return Err(Error::ConnectionFailed(format!(
                "connection {} is {:?}, not connecting",
                self.connection.id, self.connection.state
            )));
        }
        self.transition(ConnectionState::Connected);
        Ok(())
    }

    pub fn fail(&mut self, reason: &str) {
        self.connection.handshake_complete = false;
        self.connection.last_error = Some(reason.to_string());
        self.transition(ConnectionState::Error);
    }

    /// Checks a message may be emitted right now. Only `init` is allowed
    /// before the handshake has completed.
    pub fn authorize(&self, msg_type: &str) -> Result<()> {
        if !self.connection.handshake_complete && msg_type != INIT {
            return Err(Error::HandshakeRequired {
                msg_type: msg_type.to_string(),
            });
        }
        if self.connection.state != ConnectionState::Connected {
            return Err(Error::ConnectionFailed(String::from("not connected")));
        }
        Ok(())
    }

    /// Notes a completed exchange; an init answered by an init completes
    /// the handshake.
    pub fn record_exchange(&mut self, sent: &str, received: Option<&str>) {
        if self.connection.state == ConnectionState::Connected
            && sent == INIT
            && received == Some(INIT)
            && !self.connection.handshake_complete
        {
            self.connection.handshake_complete = true;
            event!(Level::INFO, "handshake complete on {}", self.connection.id);
        }
    }

    pub fn disconnect(&mut self) {
        self.connection.handshake_complete = false;
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, next: ConnectionState) {
        event!(
            Level::DEBUG,
            "connection {}: {:?} -> {:?}",
            self.connection.id,
            self.connection.state,
            next
        );
        self.connection.state = next;
    }
}
