pub mod mocks;

use crate::catalog::Catalog;
use crate::codec::Codec;
use crate::session::{Session, SessionOptions};
use mocks::MockPeer;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub fn make_mock_session(max_entries: usize) -> (Arc<Session>, Arc<MockPeer>) {
    let catalog = Arc::new(Catalog::bolt().unwrap());
    let peer = Arc::new(MockPeer::new(catalog.clone()));
    let options = SessionOptions {
        local_endpoint: String::from("runner"),
        peer_privkey: String::from("01"),
        timeout: Duration::from_millis(500),
        max_entries,
    };
    let session = Session::new(Codec::new(catalog), peer.clone(), options);
    (Arc::new(session), peer)
}

pub fn overrides(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
