use crate::catalog::Catalog;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::networking::loopback::LoopbackPeer;
use crate::networking::peer::{Link, Peer};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// How a `MockPeer` reacts to the next calls.
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehaviour {
    /// Answers like the loopback peer.
    Loopback,
    /// Every open and exchange fails.
    Unreachable,
    /// Sleeps before answering like the loopback peer.
    Delay(Duration),
    /// Answers every exchange that expects a reply with these bytes.
    Reply(Vec<u8>),
}

/// A scripted peer that records every frame it was handed.
#[derive(Debug)]
pub struct MockPeer {
    inner: LoopbackPeer,
    behaviour: RwLock<MockBehaviour>,
    frames: RwLock<Vec<(String, Vec<u8>)>>,
}

impl MockPeer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        MockPeer {
            inner: LoopbackPeer::new("ldk", Codec::new(catalog)),
            behaviour: RwLock::new(MockBehaviour::Loopback),
            frames: RwLock::new(vec![]),
        }
    }

    pub async fn set_behaviour(&self, behaviour: MockBehaviour) {
        *self.behaviour.write().await = behaviour;
    }

    pub async fn frames(&self) -> Vec<(String, Vec<u8>)> {
        self.frames.read().await.clone()
    }

    pub async fn is_open(&self, connection_id: &str) -> bool {
        self.inner.is_open(connection_id).await
    }
}

#[async_trait]
impl Peer for MockPeer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn open(&self, link: &Link) -> Result<()> {
        let behaviour = self.behaviour.read().await.clone();
        match behaviour {
            MockBehaviour::Unreachable => Err(Error::ConnectionFailed(String::from(
                "connection refused",
            ))),
            _ => self.inner.open(link).await,
        }
    }

    async fn exchange(
        &self,
        connection_id: &str,
        frame: &[u8],
        expect_reply: bool,
    ) -> Result<Option<Vec<u8>>> {
        self.frames
            .write()
            .await
            .push((connection_id.to_string(), frame.to_vec()));
        let behaviour = self.behaviour.read().await.clone();
        match behaviour {
            MockBehaviour::Loopback => self.inner.exchange(connection_id, frame, expect_reply).await,
            MockBehaviour::Unreachable => {
                Err(Error::ConnectionFailed(String::from("connection reset")))
            }
            MockBehaviour::Delay(delay) => {
                tokio::time::sleep(delay).await;
                self.inner.exchange(connection_id, frame, expect_reply).await
            }
            MockBehaviour::Reply(bytes) => Ok(if expect_reply { Some(bytes) } else { None }),
        }
    }

    async fn close(&self, connection_id: &str) {
        self.inner.close(connection_id).await
    }
}
