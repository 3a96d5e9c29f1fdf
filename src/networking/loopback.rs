use crate::catalog::{MessageDefinition, PING, PING_NO_REPLY_THRESHOLD};
use crate::codec::{Codec, WireMessage};
use crate::error::{Error, Result};
use crate::networking::peer::{Link, Peer};
use crate::payload::{FieldValue, Payload};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{event, Level};

const ERROR: &str = "error";
const PONG: &str = "pong";

/// An in-process stand-in for the implementation under test. It answers
/// every message that has a reply with the reply's defaults, carrying over
/// any field the request shares with the reply, and answers frames it
/// cannot decode with an `error` message.
#[derive(Debug)]
pub struct LoopbackPeer {
    name: String,
    codec: Codec,
    links: RwLock<HashSet<String>>,
}

impl LoopbackPeer {
    pub fn new(name: &str, codec: Codec) -> Self {
        LoopbackPeer {
            name: name.to_string(),
            codec,
            links: RwLock::new(HashSet::new()),
        }
    }

    pub async fn is_open(&self, connection_id: &str) -> bool {
        self.links.read().await.contains(connection_id)
    }

    /// The message this peer sends back for `request`, if any.
    pub fn answer(&self, request: &WireMessage) -> Result<Option<WireMessage>> {
        let catalog = self.codec.catalog();
        let definition = catalog.lookup(&request.msg_type)?;
        let reply_type = match &definition.reply {
            Some(reply_type) => reply_type,
            None => return Ok(None),
        };
        if request.msg_type == PING
            && request.payload.int("num_pong_bytes").unwrap_or(0) >= PING_NO_REPLY_THRESHOLD
        {
            return Ok(None);
        }

        let reply = catalog.lookup(reply_type)?;
        let mut payload = mirror(&reply, &request.payload);
        if reply.msg_type == PONG {
            let num_pong_bytes = request.payload.int("num_pong_bytes").unwrap_or(0) as usize;
            payload.insert("ignored", FieldValue::Bytes(vec![0; num_pong_bytes]));
        }
        self.codec.message(&reply, payload).map(Some)
    }

    fn error_reply(&self, reason: &Error) -> Result<WireMessage> {
        let definition = self.codec.catalog().lookup(ERROR)?;
        let mut payload = definition.default_payload.clone();
        let mut data = reason.to_string().into_bytes();
        data.truncate(u16::MAX as usize);
        payload.insert("data", FieldValue::Bytes(data));
        self.codec.message(&definition, payload)
    }
}

/// Reply defaults, overwritten by request fields of the same name that fit
/// the reply's schema.
fn mirror(reply: &MessageDefinition, request: &Payload) -> Payload {
    let mut payload = reply.default_payload.clone();
    for (name, value) in request.iter() {
        if let Some(spec) = reply.field(name) {
            if value.check(spec).is_ok() {
                payload.insert(name.clone(), value.clone());
            }
        }
    }
    payload
}

#[async_trait]
impl Peer for LoopbackPeer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self, link: &Link) -> Result<()> {
        event!(
            Level::DEBUG,
            "loopback link {} open for {}",
            link.connection_id,
            link.local_node_id
        );
        self.links.write().await.insert(link.connection_id.clone());
        Ok(())
    }

    async fn exchange(
        &self,
        connection_id: &str,
        frame: &[u8],
        expect_reply: bool,
    ) -> Result<Option<Vec<u8>>> {
        if !self.is_open(connection_id).await {
            return Err(Error::ConnectionFailed(format!(
                "{} has no open link for {}",
                self.name, connection_id
            )));
        }
        let reply = match self.codec.parse(frame) {
            Ok(request) => self.answer(&request)?,
            Err(err) => {
                event!(Level::WARN, "loopback could not decode frame: {}", err);
                Some(self.error_reply(&err)?)
            }
        };
        if !expect_reply {
            return Ok(None);
        }
        Ok(reply.map(|message| message.encoded))
    }

    async fn close(&self, connection_id: &str) {
        self.links.write().await.remove(connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    fn peer() -> LoopbackPeer {
        LoopbackPeer::new("ldk", Codec::new(Arc::new(Catalog::bolt().unwrap())))
    }

    fn link() -> Link {
        Link {
            connection_id: String::from("02"),
            local_node_id: String::from("local"),
            remote_node_id: String::from("remote"),
        }
    }

    fn overrides(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn answers_init_with_init() {
        let peer = peer();
        peer.open(&link()).await.unwrap();
        let init = peer.codec.build("init", &Map::new()).unwrap();
        let reply = peer.exchange("02", &init.encoded, true).await.unwrap().unwrap();
        let reply = peer.codec.parse(&reply).unwrap();
        assert_eq!(reply.msg_type, "init");
        assert_eq!(reply.payload.bytes("features"), Some(&[1u8][..]));
    }

    #[tokio::test]
    async fn answers_ping_with_requested_pong_bytes() {
        let peer = peer();
        peer.open(&link()).await.unwrap();
        let ping = peer
            .codec
            .build("ping", &overrides(json!({"num_pong_bytes": 4})))
            .unwrap();
        let reply = peer.exchange("02", &ping.encoded, true).await.unwrap().unwrap();
        let reply = peer.codec.parse(&reply).unwrap();
        assert_eq!(reply.msg_type, "pong");
        assert_eq!(reply.payload.bytes("ignored"), Some(&[0u8; 4][..]));

        let silent = peer
            .codec
            .build("ping", &overrides(json!({"num_pong_bytes": 65532})))
            .unwrap();
        assert_eq!(peer.answer(&silent).unwrap(), None);
    }

    #[tokio::test]
    async fn mirrors_shared_fields() {
        let peer = peer();
        let channel_id = format!("0x{}", "ab".repeat(32));
        let open = peer
            .codec
            .build("open_channel", &overrides(json!({"temporary_channel_id": channel_id})))
            .unwrap();
        let reply = peer.answer(&open).unwrap().unwrap();
        assert_eq!(reply.msg_type, "accept_channel");
        assert_eq!(
            reply.payload.bytes("temporary_channel_id"),
            Some(&[0xab; 32][..])
        );
    }

    #[tokio::test]
    async fn garbage_gets_an_error_message() {
        let peer = peer();
        peer.open(&link()).await.unwrap();
        let reply = peer.exchange("02", &[0xff, 0x00], true).await.unwrap().unwrap();
        let reply = peer.codec.parse(&reply).unwrap();
        assert_eq!(reply.msg_type, "error");
        assert!(!reply.payload.bytes("data").unwrap_or(&[]).is_empty());
    }

    #[tokio::test]
    async fn refuses_unopened_links() {
        let peer = peer();
        let init = peer.codec.build("init", &Map::new()).unwrap();
        assert!(matches!(
            peer.exchange("02", &init.encoded, true).await,
            Err(Error::ConnectionFailed(_))
        ));
        peer.open(&link()).await.unwrap();
        peer.close("02").await;
        peer.close("02").await;
        assert!(!peer.is_open("02").await);
    }

    #[tokio::test]
    async fn no_reply_when_not_expected() {
        let peer = peer();
        peer.open(&link()).await.unwrap();
        let init = peer.codec.build("init", &Map::new()).unwrap();
        assert_eq!(peer.exchange("02", &init.encoded, false).await.unwrap(), None);
    }
}
