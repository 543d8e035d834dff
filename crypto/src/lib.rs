//! Cryptographic primitives for the BRVS validator.
//!
//! - **Ed25519** for signing and signature verification
//! - **Blake2b-256** for transaction payload hashing
//! - the well-known **poison key pair** used to force ledger-side rejection

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, hash_payload};
pub use keys::{
    generate_keypair, keypair_from_hex, keypair_from_private, keypair_from_seed, poison_keypair,
    private_key_to_hex, public_from_private,
};
pub use sign::{sign_message, verify_signature};
