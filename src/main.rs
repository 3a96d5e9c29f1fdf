/*!
# boltflow server

## Help

```bash
boltflow --help
```

## Example Usage

```bash
boltflow --config boltflow.toml --port 5001
RUST_LOG=boltflow=debug BOLTFLOW_PEER__MODE=tcp boltflow
```

## Dev

To run from source:

```bash
cargo run -- --help
cargo run -- --config boltflow.example.toml
```
*/

use boltflow::{server, settings::Settings, Error};
use clap::{App, Arg};
use tokio::signal;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() -> boltflow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = App::new("boltflow")
        .about("Runs the BOLT message flow harness API")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("config file name"),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .takes_value(true)
                .help("port to listen on, overrides server.port"),
        )
        .get_matches();

    let mut settings = Settings::load(matches.value_of("config"))?;
    if let Some(port) = matches.value_of("port") {
        settings.server.port = port
            .parse()
            .map_err(|_| Error::InvalidRequest(format!("invalid port `{}`", port)))?;
    }

    server::run(settings, async {
        if let Err(err) = signal::ctrl_c().await {
            error!("cannot listen for ctrl-c: {}", err);
        }
    })
    .await
}
