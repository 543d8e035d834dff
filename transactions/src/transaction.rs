//! Transactions, their signatures and batch metadata.

use std::collections::BTreeSet;

use brvs_crypto::{hash_payload, sign_message, verify_signature};
use brvs_types::{AccountId, KeyPair, PublicKey, Signature, TxHash};
use serde::{Deserialize, Serialize};

use crate::command::{put_str, Command};

/// How the ledger treats the members of a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    /// All members commit or none do.
    Atomic,
    /// Members commit in order; failures do not roll back earlier members.
    Ordered,
}

/// Batch metadata embedded in every member transaction.
///
/// `reduced_hashes` lists the reduced hash of every member in batch order; its
/// length is the batch-size hint used to regroup pending transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMeta {
    pub batch_type: BatchType,
    pub reduced_hashes: Vec<TxHash>,
}

/// One signature attached to a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// A ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub creator_account_id: AccountId,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_time: u64,
    /// Number of valid signatures the ledger requires to commit this transaction.
    pub quorum: u32,
    pub commands: Vec<Command>,
    #[serde(default)]
    pub batch_meta: Option<BatchMeta>,
    #[serde(default)]
    pub signatures: Vec<TxSignature>,
}

impl Transaction {
    pub fn new(creator: AccountId, created_time: u64, quorum: u32, commands: Vec<Command>) -> Self {
        Self {
            creator_account_id: creator,
            created_time,
            quorum,
            commands,
            batch_meta: None,
            signatures: Vec::new(),
        }
    }

    pub fn with_batch_meta(mut self, meta: BatchMeta) -> Self {
        self.batch_meta = Some(meta);
        self
    }

    pub fn creator(&self) -> &AccountId {
        &self.creator_account_id
    }

    /// Canonical encoding of the signed payload. Signatures are never part of it.
    fn encode_payload(&self, include_batch_meta: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        put_str(&mut out, self.creator_account_id.as_str());
        out.extend_from_slice(&self.created_time.to_le_bytes());
        out.extend_from_slice(&self.quorum.to_le_bytes());
        out.extend_from_slice(&(self.commands.len() as u64).to_le_bytes());
        for command in &self.commands {
            command.encode(&mut out);
        }
        if include_batch_meta {
            if let Some(meta) = &self.batch_meta {
                out.push(match meta.batch_type {
                    BatchType::Atomic => 1,
                    BatchType::Ordered => 2,
                });
                out.extend_from_slice(&(meta.reduced_hashes.len() as u64).to_le_bytes());
                for hash in &meta.reduced_hashes {
                    out.extend_from_slice(hash.as_bytes());
                }
            } else {
                out.push(0);
            }
        }
        out
    }

    /// Full payload hash: identifies the transaction and is what signatures cover.
    pub fn hash(&self) -> TxHash {
        hash_payload(&self.encode_payload(true))
    }

    /// Payload hash without batch metadata, as listed in `BatchMeta::reduced_hashes`.
    pub fn reduced_hash(&self) -> TxHash {
        hash_payload(&self.encode_payload(false))
    }

    /// Number of batch members announced by this transaction (1 when unbatched).
    pub fn batch_size_hint(&self) -> usize {
        self.batch_meta
            .as_ref()
            .map(|meta| meta.reduced_hashes.len())
            .filter(|n| *n > 0)
            .unwrap_or(1)
    }

    /// Append a signature over the payload hash.
    pub fn sign(&mut self, keypair: &KeyPair) {
        let signature = sign_message(self.hash().as_bytes(), &keypair.private);
        self.signatures.push(TxSignature {
            public_key: keypair.public.clone(),
            signature,
        });
    }

    /// Builder-style [`Transaction::sign`].
    pub fn signed_by(mut self, keypair: &KeyPair) -> Self {
        self.sign(keypair);
        self
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Distinct signing keys other than `exclude`.
    pub fn user_signature_keys(&self, exclude: &PublicKey) -> BTreeSet<PublicKey> {
        self.signatures
            .iter()
            .map(|s| &s.public_key)
            .filter(|key| *key != exclude)
            .cloned()
            .collect()
    }

    /// Count of distinct signatures not produced by `exclude` (the validator's own key).
    pub fn user_signature_count(&self, exclude: &PublicKey) -> usize {
        self.user_signature_keys(exclude).len()
    }

    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        self.signatures.iter().any(|s| &s.public_key == key)
    }

    /// Signatures that verify against the current payload hash.
    pub fn valid_signatures(&self) -> impl Iterator<Item = &TxSignature> {
        let hash = self.hash();
        self.signatures
            .iter()
            .filter(move |s| verify_signature(hash.as_bytes(), &s.signature, &s.public_key))
    }

    pub fn has_transfer(&self) -> bool {
        self.commands.iter().any(Command::is_transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brvs_crypto::{keypair_from_seed, poison_keypair};
    use brvs_types::Amount;

    fn detail_tx() -> Transaction {
        Transaction::new(
            AccountId::new("alice@d"),
            1_700_000_000_000,
            2,
            vec![Command::SetAccountDetail {
                account_id: AccountId::new("alice@d"),
                key: "email".into(),
                value: "a@example.org".into(),
            }],
        )
    }

    #[test]
    fn signatures_do_not_change_hash() {
        let tx = detail_tx();
        let before = tx.hash();
        let signed = tx.signed_by(&keypair_from_seed(&[1u8; 32]));
        assert_eq!(signed.hash(), before);
        assert_eq!(signed.signature_count(), 1);
    }

    #[test]
    fn batch_meta_changes_hash_but_not_reduced_hash() {
        let tx = detail_tx();
        let meta = BatchMeta {
            batch_type: BatchType::Atomic,
            reduced_hashes: vec![tx.reduced_hash()],
        };
        let batched = tx.clone().with_batch_meta(meta);
        assert_ne!(batched.hash(), tx.hash());
        assert_eq!(batched.reduced_hash(), tx.reduced_hash());
    }

    #[test]
    fn user_signatures_exclude_validator_key_and_duplicates() {
        let user = keypair_from_seed(&[1u8; 32]);
        let brvs = keypair_from_seed(&[2u8; 32]);
        let mut tx = detail_tx();
        tx.sign(&user);
        tx.sign(&user);
        tx.sign(&brvs);
        assert_eq!(tx.signature_count(), 3);
        assert_eq!(tx.user_signature_count(&brvs.public), 1);
        assert!(tx.is_signed_by(&brvs.public));
    }

    #[test]
    fn poison_signature_is_not_valid() {
        let user = keypair_from_seed(&[1u8; 32]);
        let tx = detail_tx().signed_by(&user).signed_by(&poison_keypair());
        let valid: Vec<_> = tx.valid_signatures().map(|s| s.public_key.clone()).collect();
        assert_eq!(valid, vec![user.public]);
    }

    #[test]
    fn batch_size_hint_defaults_to_one() {
        let tx = detail_tx();
        assert_eq!(tx.batch_size_hint(), 1);
        let empty_meta = tx.clone().with_batch_meta(BatchMeta {
            batch_type: BatchType::Ordered,
            reduced_hashes: vec![],
        });
        assert_eq!(empty_meta.batch_size_hint(), 1);
    }

    #[test]
    fn transfer_detection() {
        let mut tx = detail_tx();
        assert!(!tx.has_transfer());
        tx.commands.push(Command::TransferAsset {
            src_account_id: AccountId::new("alice@d"),
            dest_account_id: AccountId::new("bob@d"),
            asset_id: "x#d".into(),
            description: String::new(),
            amount: Amount::from_units(1),
        });
        assert!(tx.has_transfer());
    }
}
