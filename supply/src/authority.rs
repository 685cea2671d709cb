//! Treasury Authority signing capability.
//!
//! The engine never reaches for an ambient key: every mutating call takes an
//! [`Authority`] argument, so tests can hand in a throwaway keypair and the
//! operator binary hands in the one loaded from disk.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{address::Address, error::ConfigError};

/// Ed25519 signature over an instruction message.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TxSignature([u8; 64]);

impl TxSignature {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 64] {
        self.0
    }

    /// Check this signature against `signer` over `message`.
    pub fn verify(&self, signer: &Address, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&self.0);
        key.verify(message, &signature).is_ok()
    }
}

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxSignature({})", self)
    }
}

impl Serialize for TxSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = bs58::decode(&s).into_vec().map_err(de::Error::custom)?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| de::Error::invalid_length(v.len(), &"64 bytes"))?;
        Ok(Self(bytes))
    }
}

/// A ready-to-sign identity.
pub trait Authority: Send + Sync {
    /// Public address of this identity.
    fn address(&self) -> Address;

    /// Sign an instruction message.
    fn sign(&self, message: &[u8]) -> TxSignature;
}

/// Ed25519 keypair acting as an [`Authority`].
///
/// The secret scalar is zeroized when the keypair is dropped.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Build from raw key bytes: either a 32-byte secret or a 64-byte
    /// secret‖public pair whose halves must agree.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let signing_key = match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(bytes);
                let key = SigningKey::from_bytes(&seed);
                zeroize::Zeroize::zeroize(&mut seed);
                key
            }
            64 => {
                let mut pair = [0u8; 64];
                pair.copy_from_slice(bytes);
                let key = SigningKey::from_keypair_bytes(&pair);
                zeroize::Zeroize::zeroize(&mut pair);
                key.map_err(|e| ConfigError::MalformedKey(e.to_string()))?
            }
            n => {
                return Err(ConfigError::MalformedKey(format!(
                    "expected 32 or 64 key bytes, got {}",
                    n
                )))
            }
        };
        Ok(Self { signing_key })
    }
}

impl Authority for Keypair {
    fn address(&self) -> Address {
        Address::new(self.signing_key.verifying_key().to_bytes())
    }

    fn sign(&self, message: &[u8]) -> TxSignature {
        TxSignature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::from_seed(&[1u8; 32]);
        let sig = keypair.sign(b"burn 100");
        assert!(sig.verify(&keypair.address(), b"burn 100"));
        assert!(!sig.verify(&keypair.address(), b"burn 101"));
        assert!(!sig.verify(&Keypair::generate().address(), b"burn 100"));
    }

    #[test]
    fn test_from_bytes_secret_and_pair_agree() {
        let keypair = Keypair::from_seed(&[9u8; 32]);
        let mut pair = [9u8; 64];
        pair[32..].copy_from_slice(keypair.address().as_bytes());

        let from_secret = Keypair::from_bytes(&[9u8; 32]).unwrap();
        let from_pair = Keypair::from_bytes(&pair).unwrap();
        assert_eq!(from_secret.address(), keypair.address());
        assert_eq!(from_pair.address(), keypair.address());
    }

    #[test]
    fn test_from_bytes_rejects_inconsistent_pair() {
        let pair = [9u8; 64];
        assert!(matches!(
            Keypair::from_bytes(&pair),
            Err(ConfigError::MalformedKey(_))
        ));
        assert!(matches!(
            Keypair::from_bytes(&[0u8; 31]),
            Err(ConfigError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let sig = Keypair::from_seed(&[3u8; 32]).sign(b"msg");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(serde_json::from_str::<TxSignature>(&json).unwrap(), sig);
    }
}
