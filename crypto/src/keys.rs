//! Ed25519 key generation, key-file loading and the poison key pair.

use brvs_types::{BrvsError, KeyPair, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

/// Generate a new Ed25519 key pair from a secure random source.
pub fn generate_keypair() -> KeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    KeyPair {
        public: PublicKey(verifying_key.to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    let signing_key = SigningKey::from_bytes(&private.0);
    PublicKey(signing_key.verifying_key().to_bytes())
}

/// Reconstruct a full key pair from a private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_from_private(PrivateKey(*seed))
}

/// Load a key pair from a hex-encoded 32-byte private key, as stored in a key file.
///
/// Surrounding whitespace is ignored.
pub fn keypair_from_hex(text: &str) -> Result<KeyPair, BrvsError> {
    let bytes = hex::decode(text.trim())
        .map_err(|e| BrvsError::InvalidKey(format!("private key is not hex: {e}")))?;
    let private: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        BrvsError::InvalidKey(format!("private key must be 32 bytes, got {}", bytes.len()))
    })?;
    Ok(keypair_from_private(PrivateKey(private)))
}

/// Hex-encode a private key for writing to a key file.
pub fn private_key_to_hex(private: &PrivateKey) -> String {
    hex::encode(private.0)
}

/// The well-known, publicly documented poison key pair: all-zero public key,
/// all-zero private key.
///
/// The two halves do not belong together, and the zero public key is never an
/// account signatory, so a signature produced with this pair can never satisfy
/// the ledger's signature check. Appending it to a transaction guarantees the
/// ledger rejects that transaction instead of leaving it pending.
pub fn poison_keypair() -> KeyPair {
    KeyPair {
        public: PublicKey::ZERO,
        private: PrivateKey([0u8; 32]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_valid_keypair() {
        let kp = generate_keypair();
        assert_ne!(kp.public.0, [0u8; 32]);
        assert_eq!(public_from_private(&kp.private), kp.public);
    }

    #[test]
    fn keypair_from_seed_deterministic() {
        let kp1 = keypair_from_seed(&[42u8; 32]);
        let kp2 = keypair_from_seed(&[42u8; 32]);
        assert_eq!(kp1.public, kp2.public);
        assert_ne!(kp1.public, keypair_from_seed(&[43u8; 32]).public);
    }

    #[test]
    fn hex_key_file_roundtrip() {
        let kp = keypair_from_seed(&[9u8; 32]);
        let text = format!("  {}\n", private_key_to_hex(&kp.private));
        let loaded = keypair_from_hex(&text).unwrap();
        assert_eq!(loaded.public, kp.public);
    }

    #[test]
    fn hex_key_rejects_bad_input() {
        assert!(keypair_from_hex("not hex").is_err());
        assert!(keypair_from_hex("abcd").is_err());
    }

    #[test]
    fn poison_pair_is_all_zero_and_mismatched() {
        let poison = poison_keypair();
        assert!(poison.public.is_zero());
        assert_eq!(poison.private.0, [0u8; 32]);
        assert_ne!(public_from_private(&poison.private), poison.public);
    }
}
