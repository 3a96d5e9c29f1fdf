/*!

# Networking Interfaces and Methods

## Introduction

boltflow talks to two parties. Browser visualizers drive it through a small
HTTP/JSON API, and the Lightning implementation under test is reached
through a `Peer` (in-process loopback, or plain TCP to an external
harness).

## HTTP API

Every body is JSON. Byte fields are `0x`-prefixed hex, integers are decimal
numbers. CORS is open to any origin.

```text
GET    /health                       {status, time, message, runnerStatus}
GET    /node-info                    {nodeId, peer, activeConnections, features}
GET    /catalog?category=            [MessageDefinition]
POST   /connect                      {sourcePrivkey?, targetPrivkey?, globalfeatures?, features?, timeoutMs?}
POST   /disconnect                   {connprivkey}
POST   /raw-msg                      {type, connprivkey, content?, timeoutMs?}
GET    /message-flow/{id}            ?direction=sent|received&type=&after=
DELETE /message-flow/{id}
GET    /connections
```

A failure is a non-2xx status with

```json
{"success": false, "error": "handshake required: ...", "type": "HandshakeRequired"}
```

| type | status |
|---|---|
| UnknownType, UnknownConnection | 404 |
| SchemaViolation, TruncatedMessage, Malformed, InvalidRequest | 400 |
| HandshakeRequired, AlreadyConnected | 409 |
| ConnectionFailed | 502 |
| Timeout | 504 |
| StorageExhausted | 507 |

## Peer framing

Messages handed to a peer are whole BOLT #1 messages:

```bytes
0-1     type (big-endian u16)
2..     fields in schema order, then an optional TLV stream
```

`TcpPeer` prefixes each message with its length as a big-endian u16.

*/

pub mod api_message;
pub mod filters;
pub mod handlers;
pub mod loopback;
pub mod peer;
pub mod socket;
