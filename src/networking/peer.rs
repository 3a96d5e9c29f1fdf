use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

/// What a peer needs to know to open one connection.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub connection_id: String,
    pub local_node_id: String,
    pub remote_node_id: String,
}

/// The implementation under test, seen from the runner. Frames are whole
/// BOLT messages (2-byte type followed by the payload). Transport problems
/// surface as `Error::ConnectionFailed`.
#[async_trait]
pub trait Peer: Send + Sync + Debug {
    /// Shown as the `from`/`to` of log entries, e.g. "ldk".
    fn name(&self) -> &str;

    async fn open(&self, link: &Link) -> Result<()>;

    /// Sends one frame and, when `expect_reply` is set, waits for exactly
    /// one frame back. `Ok(None)` means the peer stayed silent.
    ///
    /// The future may be dropped part-way when the caller times out. A
    /// reply that arrives after that must never be handed to a later
    /// exchange; failing the next exchange is fine.
    async fn exchange(
        &self,
        connection_id: &str,
        frame: &[u8],
        expect_reply: bool,
    ) -> Result<Option<Vec<u8>>>;

    /// Closing a link that is not open does nothing.
    async fn close(&self, connection_id: &str);
}

pub type SharedPeer = Arc<dyn Peer>;
