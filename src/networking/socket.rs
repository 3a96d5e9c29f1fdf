use crate::error::{Error, Result};
use crate::networking::peer::{Link, Peer};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tracing::{event, Level};

/// A stream plus whether an exchange on it was abandoned part-way, e.g.
/// by a caller's timeout. Such a stream may still hold half a frame or a
/// late reply, so it is never read from again.
#[derive(Debug)]
struct Channel {
    stream: TcpStream,
    in_flight: bool,
}

type Streams = RwLock<HashMap<String, Arc<Mutex<Channel>>>>;

/// Reaches an external harness over plain TCP, one stream per connection.
/// Each message travels as a 2-byte big-endian length followed by the
/// message itself, i.e. BOLT 8 framing with the Noise layer left to the
/// other side.
#[derive(Debug)]
pub struct TcpPeer {
    name: String,
    address: String,
    streams: Streams,
}

impl TcpPeer {
    pub fn new(name: &str, address: &str) -> Self {
        TcpPeer {
            name: name.to_string(),
            address: address.to_string(),
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn channel(&self, connection_id: &str) -> Result<Arc<Mutex<Channel>>> {
        self.streams
            .read()
            .await
            .get(connection_id)
            .cloned()
            .ok_or_else(|| {
                Error::ConnectionFailed(format!("{} has no open link for {}", self.name, connection_id))
            })
    }

    /// Forgets the stream unless a newer link already replaced it.
    async fn drop_channel(&self, connection_id: &str, channel: &Arc<Mutex<Channel>>) {
        let mut streams = self.streams.write().await;
        if streams
            .get(connection_id)
            .map_or(false, |current| Arc::ptr_eq(current, channel))
        {
            streams.remove(connection_id);
        }
    }
}

pub async fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> Result<()> {
    if frame.len() > u16::MAX as usize {
        return Err(Error::Malformed(format!(
            "{} byte message does not fit a 2-byte length",
            frame.len()
        )));
    }
    let mut vbytes: Vec<u8> = Vec::with_capacity(frame.len() + 2);
    vbytes.extend(&(frame.len() as u16).to_be_bytes());
    vbytes.extend(frame);
    stream.write_all(&vbytes).await?;
    stream.flush().await?;
    Ok(())
}

pub async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut length = [0u8; 2];
    stream.read_exact(&mut length).await?;
    let mut frame = vec![0u8; u16::from_be_bytes(length) as usize];
    stream.read_exact(&mut frame).await?;
    Ok(frame)
}

#[async_trait]
impl Peer for TcpPeer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self, link: &Link) -> Result<()> {
        let stream = TcpStream::connect(&self.address).await.map_err(|err| {
            Error::ConnectionFailed(format!("cannot reach {} at {}: {}", self.name, self.address, err))
        })?;
        event!(
            Level::INFO,
            "connected {} to {} at {}",
            link.connection_id,
            self.name,
            self.address
        );
        self.streams
            .write()
            .await
            .insert(
                link.connection_id.clone(),
                Arc::new(Mutex::new(Channel {
                    stream,
                    in_flight: false,
                })),
            );
        Ok(())
    }

    async fn exchange(
        &self,
        connection_id: &str,
        frame: &[u8],
        expect_reply: bool,
    ) -> Result<Option<Vec<u8>>> {
        let channel_lock = self.channel(connection_id).await?;
        let mut channel = channel_lock.lock().await;
        if channel.in_flight {
            drop(channel);
            self.drop_channel(connection_id, &channel_lock).await;
            event!(Level::WARN, "dropping stream for {}: earlier exchange was abandoned", connection_id);
            return Err(Error::ConnectionFailed(format!(
                "link to {} for {} was left mid-exchange",
                self.name, connection_id
            )));
        }

        channel.in_flight = true;
        let mut result = write_frame(&mut channel.stream, frame).await;
        let mut reply = None;
        if result.is_ok() && expect_reply {
            match read_frame(&mut channel.stream).await {
                Ok(frame) => reply = Some(frame),
                Err(err) => result = Err(err),
            }
        }

        match result {
            Ok(()) => {
                channel.in_flight = false;
                Ok(reply)
            }
            // refused before anything was written
            Err(Error::Malformed(reason)) => {
                channel.in_flight = false;
                Err(Error::Malformed(reason))
            }
            Err(err) => {
                event!(Level::WARN, "dropping stream for {}: {}", connection_id, err);
                drop(channel);
                self.drop_channel(connection_id, &channel_lock).await;
                Err(Error::ConnectionFailed(err.to_string()))
            }
        }
    }

    async fn close(&self, connection_id: &str) {
        let removed = self.streams.write().await.remove(connection_id);
        if let Some(channel) = removed {
            let mut channel = channel.lock().await;
            if let Err(err) = channel.stream.shutdown().await {
                event!(Level::DEBUG, "shutdown of {} failed: {}", connection_id, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn link(connection_id: &str) -> Link {
        Link {
            connection_id: connection_id.to_string(),
            local_node_id: String::from("local"),
            remote_node_id: String::from("remote"),
        }
    }

    #[tokio::test]
    async fn exchanges_frames_with_a_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // ping in, pong with one byte out
            let ping = read_frame(&mut socket).await.unwrap();
            assert_eq!(&ping[..2], &[0x00, 0x12]);
            write_frame(&mut socket, &hex::decode("0013000100").unwrap())
                .await
                .unwrap();
            // init in, no answer expected
            let init = read_frame(&mut socket).await.unwrap();
            assert_eq!(&init[..2], &[0x00, 0x10]);
        });

        let peer = TcpPeer::new("ldk", &address);
        peer.open(&link("02")).await.unwrap();
        let reply = peer
            .exchange("02", &hex::decode("0012000100000000").unwrap(), true)
            .await
            .unwrap();
        assert_eq!(reply, Some(hex::decode("0013000100").unwrap()));
        let reply = peer
            .exchange("02", &hex::decode("0010000100000101").unwrap(), false)
            .await
            .unwrap();
        assert_eq!(reply, None);
        peer.close("02").await;
        assert!(peer.exchange("02", &[0, 16], false).await.is_err());
    }

    #[tokio::test]
    async fn unreachable_address_fails_to_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let peer = TcpPeer::new("ldk", &address);
        assert!(matches!(
            peer.open(&link("02")).await,
            Err(Error::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn peer_hangup_drops_the_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let peer = TcpPeer::new("ldk", &address);
        peer.open(&link("02")).await.unwrap();
        let result = peer
            .exchange("02", &hex::decode("0012000100000000").unwrap(), true)
            .await;
        assert!(matches!(result, Err(Error::ConnectionFailed(_))));
        assert!(peer.channel("02").await.is_err());
    }

    #[tokio::test]
    async fn abandoned_exchange_never_delivers_a_late_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_frame(&mut socket).await.unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            write_frame(&mut socket, &hex::decode("0013000100").unwrap())
                .await
                .unwrap();
            // hold the socket open until the client lets go
            let _ = read_frame(&mut socket).await;
        });

        let peer = TcpPeer::new("ldk", &address);
        peer.open(&link("02")).await.unwrap();
        let first = tokio::time::timeout(
            Duration::from_millis(50),
            peer.exchange("02", &hex::decode("0012000100000000").unwrap(), true),
        )
        .await;
        assert!(first.is_err());

        // the one-byte pong is now waiting in the socket
        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = peer
            .exchange("02", &hex::decode("0012000500000000").unwrap(), true)
            .await;
        assert!(matches!(second, Err(Error::ConnectionFailed(_))));
        assert!(peer.channel("02").await.is_err());
    }

    #[tokio::test]
    async fn oversized_frames_are_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _accepted = listener.accept().await;
        });

        let peer = TcpPeer::new("ldk", &address);
        peer.open(&link("02")).await.unwrap();
        let frame = vec![0u8; 70_000];
        assert!(matches!(
            peer.exchange("02", &frame, false).await,
            Err(Error::Malformed(_))
        ));
    }
}
