use crate::error::{Error, Result};
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use std::fmt;

/// Expands a short hex private key (`"02"`) to 32 bytes by left-padding
/// with zeros, the way Lightning test harnesses name their test keys.
pub fn privkey_expand(short_hex: &str) -> Result<[u8; 32]> {
    let digits = short_hex.strip_prefix("0x").unwrap_or(short_hex);
    let bytes = hex::decode(digits)
        .map_err(|err| Error::InvalidRequest(format!("private key `{}` is not hex: {}", short_hex, err)))?;
    if bytes.is_empty() || bytes.len() > 32 {
        return Err(Error::InvalidRequest(format!(
            "private key `{}` must be between 1 and 32 bytes",
            short_hex
        )));
    }
    let mut expanded = [0u8; 32];
    expanded[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(expanded)
}

/// The one spelling of a short private key used to name a connection:
/// no `0x`, lowercase, no leading zero bytes. `"0x02"`, `"0002"` and `"02"`
/// all expand to the same key and all become `"02"`. Text that is not hex
/// only loses its prefix and case, and is left for `privkey_expand` to refuse.
pub fn canonical_privkey(text: &str) -> String {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
        .to_ascii_lowercase();
    let mut canonical = digits.as_str();
    while canonical.len() > 2 && canonical.len() % 2 == 0 && canonical.starts_with("00") {
        canonical = &canonical[2..];
    }
    canonical.to_string()
}

/// An secp256k1 keypair naming one end of a connection. Only the public
/// half is ever shown; nothing is signed.
#[derive(Debug, PartialEq)]
pub struct Keypair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Keypair {
    /// Create and return a keypair with the given u8 array as the private key
    pub fn from_secret_slice(slice: &[u8]) -> Result<Keypair> {
        let secret_key = SecretKey::from_slice(slice)
            .map_err(|err| Error::InvalidRequest(format!("invalid private key: {}", err)))?;
        let public_key = PublicKey::from_secret_key(&SECP256K1, &secret_key);

        Ok(Keypair {
            secret_key,
            public_key,
        })
    }

    /// Create and return a keypair from a short or full hex private key
    pub fn from_privkey(short_hex: &str) -> Result<Keypair> {
        Keypair::from_secret_slice(&privkey_expand(short_hex)?)
    }

    /// The compressed public key as hex, i.e. the BOLT node id.
    pub fn node_id(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }
}

impl fmt::Display for Keypair {
    /// formats a Keypair for println!, public half only
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_id:{}", self.node_id())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn privkey_expand_test() {
        let expanded = privkey_expand("02").unwrap();
        assert_eq!(expanded[31], 2);
        assert!(expanded[..31].iter().all(|byte| *byte == 0));
        assert_eq!(privkey_expand("0x0102").unwrap()[30..], [1, 2]);

        assert!(privkey_expand("randomtext").is_err());
        assert!(privkey_expand("").is_err());
        assert!(privkey_expand(&"01".repeat(33)).is_err());
    }

    #[test]
    fn canonical_privkey_test() {
        for spelling in ["02", "0x02", "0X02", " 0x0002 ", "000002"] {
            assert_eq!(canonical_privkey(spelling), "02");
        }
        assert_eq!(canonical_privkey("0xAB01"), "ab01");
        assert_eq!(canonical_privkey("00"), "00");
        assert_eq!(canonical_privkey("002"), "002");
        assert_eq!(
            privkey_expand(&canonical_privkey("0x0002")).unwrap(),
            privkey_expand("02").unwrap()
        );
    }

    #[test]
    fn keypair_node_id_test() {
        let keypair = Keypair::from_privkey("01").unwrap();
        assert_eq!(
            keypair.node_id(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        let keypair = Keypair::from_privkey("02").unwrap();
        assert_eq!(
            keypair.node_id(),
            "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5"
        );
        assert_eq!(keypair.secret_key().to_string(), format!("{}02", "0".repeat(62)));
        assert!(keypair.to_string().starts_with("node_id:02c6047f"));
    }

    #[test]
    fn keypair_rejects_zero_key() {
        assert!(matches!(
            Keypair::from_privkey("00"),
            Err(Error::InvalidRequest(_))
        ));
    }
}
