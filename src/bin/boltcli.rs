/*!
# boltflow Command Line Interface

Encode, decode and list BOLT messages without a running server.

## Usage

```bash
boltcli help [subcommand]
```

## Available subcommands

**catalog**

lists message definitions, optionally for one category

**encode**

builds a message from its defaults plus JSON overrides and prints the hex frame

**decode**

decodes a hex frame and prints its fields

## Example

```bash
boltcli catalog --category connection
boltcli encode --type ping --content '{"num_pong_bytes": 4}'
boltcli decode --hex 0012000400000000
```

## Dev

To run from source:

```bash
cargo run --bin boltcli -- encode -t init
```
*/
use boltflow::{
    catalog::{Catalog, Category},
    codec::Codec,
    Error,
};
use clap::{App, Arg, ArgMatches};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;

pub fn main() -> boltflow::Result<()> {
    let command_matches = App::new("boltflow Command Line Interface")
        .about("Encode, decode and list BOLT messages")
        .arg(
            Arg::with_name("extensions")
                .short("x")
                .long("extensions")
                .takes_value(true)
                .help("JSON file of extra message definitions"),
        )
        .subcommand(
            App::new("catalog")
                .about("lists message definitions")
                .arg(
                    Arg::with_name("category")
                        .short("c")
                        .long("category")
                        .takes_value(true)
                        .help("connection, channel, commitment or routing"),
                ),
        )
        .subcommand(
            App::new("encode")
                .about("encodes a message to a hex frame")
                .arg(
                    Arg::with_name("type")
                        .short("t")
                        .long("type")
                        .required(true)
                        .takes_value(true)
                        .help("message type, e.g. init"),
                )
                .arg(
                    Arg::with_name("content")
                        .short("c")
                        .long("content")
                        .takes_value(true)
                        .help("JSON object of field overrides"),
                ),
        )
        .subcommand(
            App::new("decode")
                .about("decodes a hex frame")
                .arg(
                    Arg::with_name("hex")
                        .long("hex")
                        .required(true)
                        .takes_value(true)
                        .help("frame as hex, type prefix included"),
                ),
        )
        .get_matches();

    let mut catalog = Catalog::bolt()?;
    if let Some(path) = command_matches.value_of("extensions") {
        catalog.load_extensions(Path::new(path))?;
    }
    let codec = Codec::new(Arc::new(catalog));

    let output = match command_matches.subcommand() {
        ("catalog", Some(matches)) => list(&codec, matches)?,
        ("encode", Some(matches)) => encode(&codec, matches)?,
        ("decode", Some(matches)) => decode(&codec, matches)?,
        _ => {
            println!("{}", command_matches.usage());
            return Ok(());
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn list(codec: &Codec, matches: &ArgMatches) -> boltflow::Result<Value> {
    let category = match matches.value_of("category") {
        Some(category) => Some(category.parse::<Category>()?),
        None => None,
    };
    let definitions: Vec<Value> = codec
        .catalog()
        .list(category)
        .iter()
        .map(|definition| {
            json!({
                "type": definition.msg_type,
                "wireType": definition.wire_type,
                "category": definition.category,
                "description": definition.description,
            })
        })
        .collect();
    Ok(Value::Array(definitions))
}

fn encode(codec: &Codec, matches: &ArgMatches) -> boltflow::Result<Value> {
    let msg_type = matches.value_of("type").unwrap_or_default();
    let overrides: Map<String, Value> = match matches.value_of("content") {
        Some(content) => serde_json::from_str(content)?,
        None => Map::new(),
    };
    let message = codec.build(msg_type, &overrides)?;
    Ok(json!({
        "type": message.msg_type,
        "wireType": message.wire_type,
        "hex": hex::encode(&message.encoded),
    }))
}

fn decode(codec: &Codec, matches: &ArgMatches) -> boltflow::Result<Value> {
    let text = matches.value_of("hex").unwrap_or_default();
    let frame = hex::decode(text.strip_prefix("0x").unwrap_or(text))
        .map_err(|err| Error::InvalidRequest(format!("invalid hex: {}", err)))?;
    let (definition, payload) = codec.decode_frame(&frame)?;
    Ok(json!({
        "type": definition.msg_type,
        "wireType": definition.wire_type,
        "content": payload.to_view(&definition),
    }))
}
