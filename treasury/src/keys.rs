//! Treasury key loading.
//!
//! The key comes from a file (`--keypair` or the `keypair` setting) or from
//! the `CINDER_TREASURY_KEY` environment variable. Either holds a JSON byte
//! array or a base58 string; 64 bytes are secret‖public, 32 bytes are the
//! secret alone. Raw key material only lives in `Zeroizing` buffers.

use std::{fs, path::Path};
use zeroize::Zeroizing;

use cinder_supply::{
    authority::{Authority, Keypair},
    error::ConfigError,
    record::DeploymentRecord,
};

/// Environment variable holding the treasury key.
pub const KEY_ENV: &str = "CINDER_TREASURY_KEY";

/// Parse key text in either accepted encoding.
pub fn parse_key(text: &str) -> Result<Keypair, ConfigError> {
    let text = text.trim();
    let bytes: Zeroizing<Vec<u8>> = if text.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(text)
            .map(Zeroizing::new)
            .map_err(|e| ConfigError::MalformedKey(format!("invalid JSON byte array: {}", e)))?
    } else {
        bs58::decode(text)
            .into_vec()
            .map(Zeroizing::new)
            .map_err(|e| ConfigError::MalformedKey(format!("invalid base58: {}", e)))?
    };
    Keypair::from_bytes(&bytes)
}

/// Load the treasury key from `path`, or from [`KEY_ENV`] when no path is
/// given.
pub fn load_key(path: Option<&Path>) -> Result<Keypair, ConfigError> {
    let text = match path {
        Some(path) => Zeroizing::new(fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?),
        None => Zeroizing::new(std::env::var(KEY_ENV).map_err(|_| ConfigError::MissingKey)?),
    };
    parse_key(&text)
}

/// Load the key and check it is the deployment's treasury authority.
pub fn load_treasury_key(
    path: Option<&Path>,
    record: &DeploymentRecord,
) -> Result<Keypair, ConfigError> {
    let keypair = load_key(path)?;
    record.check_authority(&keypair.address())?;
    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SEED: [u8; 32] = [7u8; 32];

    fn json_seed() -> String {
        serde_json::to_string(&SEED.to_vec()).unwrap()
    }

    #[test]
    fn test_parse_json_array_seed() {
        let keypair = parse_key(&json_seed()).unwrap();
        assert_eq!(keypair.address(), Keypair::from_seed(&SEED).address());
    }

    #[test]
    fn test_parse_base58_seed() {
        let encoded = bs58::encode(SEED).into_string();
        let keypair = parse_key(&format!("  {}\n", encoded)).unwrap();
        assert_eq!(keypair.address(), Keypair::from_seed(&SEED).address());
    }

    #[test]
    fn test_parse_full_keypair_bytes() {
        let public = Keypair::from_seed(&SEED).address();
        let mut pair = SEED.to_vec();
        pair.extend_from_slice(public.as_bytes());

        let keypair = parse_key(&serde_json::to_string(&pair).unwrap()).unwrap();
        assert_eq!(keypair.address(), public);
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert!(matches!(parse_key("[1, 2, 3]"), Err(ConfigError::MalformedKey(_))));
        assert!(matches!(parse_key("not-base58-0OIl"), Err(ConfigError::MalformedKey(_))));
        assert!(matches!(parse_key("[1, 2,"), Err(ConfigError::MalformedKey(_))));
    }

    #[test]
    fn test_load_key_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json_seed().as_bytes()).unwrap();

        let keypair = load_key(Some(file.path())).unwrap();
        assert_eq!(keypair.address(), Keypair::from_seed(&SEED).address());
    }

    #[test]
    fn test_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_key(Some(&dir.path().join("treasury.json"))),
            Err(ConfigError::Io { .. })
        ));
    }
}
