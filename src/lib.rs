/*!
# Welcome to boltflow

boltflow is a message-flow test harness for the Lightning Network peer
protocol. It sits between a browser visualizer and a Lightning
implementation under test, builds BOLT wire messages from a catalog of
named definitions, enforces the `init` handshake per connection, and keeps
an ordered record of every message sent and received.

The pieces, leaf first:

- [`catalog`]: named BOLT message definitions (wire type, field schema,
  defaults, expected reply).
- [`payload`] and [`codec`]: typed field values and the binary wire
  encoding.
- [`connection`]: the per-connection state machine and handshake gate.
- [`exchange_log`]: the append-only per-connection message record.
- [`session`]: sequences all of the above against a
  [`networking::peer::Peer`].
- [`networking`]: the HTTP/JSON API and the peer transports.

# Usage

```bash
boltflow --config boltflow.toml
curl -X POST localhost:5000/connect
curl -X POST localhost:5000/raw-msg -d '{"type":"ping","connprivkey":"02","content":{"num_pong_bytes":4}}'
curl localhost:5000/message-flow/02
```

Offline encoding and decoding is available through `boltcli`.
*/
pub mod catalog;
pub mod codec;
pub mod connection;
pub mod error;
pub mod exchange_log;
pub mod keypair;
pub mod networking;
pub mod payload;
pub mod server;
pub mod session;
pub mod settings;
pub mod time;

#[cfg(test)]
pub mod test_utilities;

pub use error::{Error, Result};
