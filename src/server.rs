use crate::catalog::Catalog;
use crate::codec::Codec;
use crate::error::Error;
use crate::keypair::Keypair;
use crate::networking::filters::routes;
use crate::networking::loopback::LoopbackPeer;
use crate::networking::peer::SharedPeer;
use crate::networking::socket::TcpPeer;
use crate::session::{Session, SessionOptions};
use crate::settings::{PeerMode, Settings};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{event, Level};

/// Wires catalog, codec, peer and session together from settings.
pub fn build_session(settings: &Settings) -> crate::Result<Arc<Session>> {
    //
    // catalog, with any extension definitions
    //
    let mut catalog = Catalog::bolt()?;
    if let Some(path) = &settings.catalog.extensions {
        let added = catalog.load_extensions(path)?;
        event!(Level::INFO, "loaded {} message definitions from {}", added, path.display());
    }
    let codec = Codec::new(Arc::new(catalog));

    //
    // the peer under test
    //
    Keypair::from_privkey(&settings.peer.node_privkey)?;
    let peer: SharedPeer = match settings.peer.mode {
        PeerMode::Loopback => Arc::new(LoopbackPeer::new(&settings.peer.name, codec.clone())),
        PeerMode::Tcp => Arc::new(TcpPeer::new(&settings.peer.name, &settings.peer.address)),
    };
    event!(
        Level::INFO,
        "peer {} in {:?} mode",
        settings.peer.name,
        settings.peer.mode
    );

    let options = SessionOptions {
        local_endpoint: settings.session.local_endpoint.clone(),
        peer_privkey: settings.peer.node_privkey.clone(),
        timeout: settings.session.timeout(),
        max_entries: settings.log.max_entries,
    };
    Ok(Arc::new(Session::new(codec, peer, options)))
}

/// Run the boltflow server until `shutdown` completes. In-flight requests
/// are allowed to finish.
pub async fn run(settings: Settings, shutdown: impl Future + Send + 'static) -> crate::Result<()> {
    let session = build_session(&settings)?;

    let host: IpAddr = settings.server.host.parse().map_err(|err| {
        Error::Config(config::ConfigError::Message(format!(
            "server.host `{}` is not an IP address: {}",
            settings.server.host, err
        )))
    })?;
    let (address, server) = warp::serve(routes(session)).try_bind_with_graceful_shutdown(
        SocketAddr::new(host, settings.server.port),
        async move {
            shutdown.await;
            event!(Level::INFO, "shutting down");
        },
    )?;
    event!(Level::INFO, "listening on http://{}", address);

    server.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn builds_a_loopback_session() {
        let session = build_session(&Settings::default()).unwrap();
        assert_eq!(session.peer_name(), "ldk");
        assert_eq!(session.catalog().len(), 22);
        assert!(session.connections().await.is_empty());
    }

    #[tokio::test]
    async fn builds_with_extensions_and_tcp_peer() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"type": "custom_beacon", "wireType": 32769, "name": "Custom Beacon",
                 "description": "experimental message", "category": "connection",
                 "fieldSchema": [{{"name": "nonce", "kind": "int", "width": "u32"}}]}}]"#
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.catalog.extensions = Some(file.path().to_path_buf());
        settings.peer.mode = PeerMode::Tcp;
        settings.peer.name = String::from("cln");
        let session = build_session(&settings).unwrap();
        assert_eq!(session.peer_name(), "cln");
        assert!(session.catalog().lookup("custom_beacon").is_ok());
    }

    #[tokio::test]
    async fn bad_settings_are_refused() {
        let mut settings = Settings::default();
        settings.peer.node_privkey = String::from("zz");
        assert!(build_session(&settings).is_err());

        let mut settings = Settings::default();
        settings.catalog.extensions = Some("/nonexistent/definitions.json".into());
        assert!(build_session(&settings).is_err());

        let mut settings = Settings::default();
        settings.server.host = String::from("localhost.invalid");
        assert!(matches!(
            run(settings, async {}).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(run(settings, async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }
}
