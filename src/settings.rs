use crate::error::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "boltflow";
pub const ENV_PREFIX: &str = "BOLTFLOW";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: String::from("127.0.0.1"),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub local_endpoint: String,
    pub timeout_ms: u64,
}

impl SessionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            local_endpoint: String::from("runner"),
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Copy, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PeerMode {
    Loopback,
    Tcp,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PeerSettings {
    pub mode: PeerMode,
    pub name: String,
    /// Only read in tcp mode.
    pub address: String,
    pub node_privkey: String,
}

impl Default for PeerSettings {
    fn default() -> Self {
        PeerSettings {
            mode: PeerMode::Loopback,
            name: String::from("ldk"),
            address: String::from("127.0.0.1:9735"),
            node_privkey: String::from("01"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    pub max_entries: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings { max_entries: 10_000 }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON file of extra message definitions.
    pub extensions: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub peer: PeerSettings,
    pub log: LogSettings,
    pub catalog: CatalogSettings,
}

impl Settings {
    /// Layers defaults, then the config file, then `BOLTFLOW_*` variables
    /// (`BOLTFLOW_SERVER__PORT=8080`). A file named on the command line
    /// must exist; the default `boltflow` file is optional.
    pub fn load(config_name: Option<&str>) -> Result<Settings> {
        let mut settings = config::Config::default();
        match config_name {
            Some(name) => settings.merge(config::File::with_name(name))?,
            None => settings.merge(config::File::with_name(DEFAULT_CONFIG_NAME).required(false))?,
        };
        settings.merge(config::Environment::with_prefix(ENV_PREFIX).separator("__"))?;
        Ok(settings.try_into()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_file_and_environment() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.peer.mode, PeerMode::Loopback);
        assert_eq!(settings.session.timeout(), Duration::from_millis(5000));
        assert_eq!(settings.catalog.extensions, None);

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 6001\n\n[peer]\nmode = \"tcp\"\naddress = \"10.0.0.2:9735\"\n\n[log]\nmax_entries = 50"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.server.port, 6001);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.peer.mode, PeerMode::Tcp);
        assert_eq!(settings.peer.address, "10.0.0.2:9735");
        assert_eq!(settings.peer.name, "ldk");
        assert_eq!(settings.log.max_entries, 50);

        std::env::set_var("BOLTFLOW_SESSION__TIMEOUT_MS", "250");
        let settings = Settings::load(Some(&path)).unwrap();
        std::env::remove_var("BOLTFLOW_SESSION__TIMEOUT_MS");
        assert_eq!(settings.session.timeout_ms, 250);
        assert_eq!(settings.server.port, 6001);
    }

    #[test]
    fn missing_named_file_is_an_error() {
        assert!(Settings::load(Some("/nonexistent/boltflow-settings")).is_err());
    }
}
