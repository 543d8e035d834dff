//! Nullable stores: thread-safe in-memory verdicts and registered accounts.

use brvs_store::{AccountRegistry, RegisteredAccount, StoreError, VerdictStore};
use brvs_types::{AccountId, TxHash, Verdict};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::broadcast;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// An in-memory verdict store.
///
/// Every write is also appended to a log so tests can assert on the order and
/// content of verdict transitions.
pub struct NullVerdictStore {
    verdicts: Mutex<HashMap<TxHash, Verdict>>,
    log: Mutex<Vec<(TxHash, Verdict)>>,
    rejected_or_failed: broadcast::Sender<TxHash>,
}

impl NullVerdictStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// A store whose rejected/failed stream buffers at most `capacity` hashes
    /// per lagging receiver.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (rejected_or_failed, _) = broadcast::channel(capacity);
        Self {
            verdicts: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            rejected_or_failed,
        }
    }

    /// Every write in the order it happened.
    pub fn write_log(&self) -> Vec<(TxHash, Verdict)> {
        self.log.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.verdicts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, hash: &TxHash, verdict: Verdict) {
        let announce = verdict.is_rejected_or_failed();
        self.verdicts.lock().unwrap().insert(*hash, verdict.clone());
        self.log.lock().unwrap().push((*hash, verdict));
        if announce {
            // No subscribers is fine.
            let _ = self.rejected_or_failed.send(*hash);
        }
    }
}

impl Default for NullVerdictStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictStore for NullVerdictStore {
    fn has_verdict(&self, hash: &TxHash) -> Result<bool, StoreError> {
        Ok(self.verdicts.lock().unwrap().contains_key(hash))
    }

    fn mark_pending(&self, hash: &TxHash) -> Result<bool, StoreError> {
        let mut verdicts = self.verdicts.lock().unwrap();
        if verdicts.contains_key(hash) {
            return Ok(false);
        }
        verdicts.insert(*hash, Verdict::Pending);
        self.log.lock().unwrap().push((*hash, Verdict::Pending));
        Ok(true)
    }

    fn mark_validated(&self, hash: &TxHash) -> Result<(), StoreError> {
        self.put(hash, Verdict::Validated);
        Ok(())
    }

    fn mark_rejected(&self, hash: &TxHash, reason: &str) -> Result<(), StoreError> {
        self.put(hash, Verdict::Rejected(reason.to_string()));
        Ok(())
    }

    fn mark_failed(&self, hash: &TxHash, reason: &str) -> Result<(), StoreError> {
        self.put(hash, Verdict::Failed(reason.to_string()));
        Ok(())
    }

    fn mark_terminal_if_pending(
        &self,
        hash: &TxHash,
        verdict: Verdict,
    ) -> Result<bool, StoreError> {
        if !verdict.is_terminal() {
            return Err(StoreError::InvalidTransition(format!(
                "{verdict} is not a terminal verdict"
            )));
        }
        let announce = verdict.is_rejected_or_failed();
        {
            let mut verdicts = self.verdicts.lock().unwrap();
            if verdicts.get(hash) != Some(&Verdict::Pending) {
                return Ok(false);
            }
            verdicts.insert(*hash, verdict.clone());
            self.log.lock().unwrap().push((*hash, verdict));
        }
        if announce {
            let _ = self.rejected_or_failed.send(*hash);
        }
        Ok(true)
    }

    fn get_verdict(&self, hash: &TxHash) -> Result<Option<Verdict>, StoreError> {
        Ok(self.verdicts.lock().unwrap().get(hash).cloned())
    }

    fn subscribe_rejected_or_failed(&self) -> broadcast::Receiver<TxHash> {
        self.rejected_or_failed.subscribe()
    }
}

/// An in-memory registry of accounts enrolled with BRVS.
pub struct NullAccountRegistry {
    accounts: Mutex<BTreeMap<AccountId, RegisteredAccount>>,
}

impl NullAccountRegistry {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(BTreeMap::new()),
        }
    }

    /// A registry pre-populated with `accounts`, user key counts unknown.
    pub fn with_accounts<'a>(accounts: impl IntoIterator<Item = &'a AccountId>) -> Self {
        let registry = Self::new();
        {
            let mut map = registry.accounts.lock().unwrap();
            for account in accounts {
                map.insert(
                    account.clone(),
                    RegisteredAccount {
                        account_id: account.clone(),
                        user_key_count: None,
                    },
                );
            }
        }
        registry
    }
}

impl Default for NullAccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountRegistry for NullAccountRegistry {
    fn registered_accounts(&self) -> Result<Vec<AccountId>, StoreError> {
        Ok(self.accounts.lock().unwrap().keys().cloned().collect())
    }

    fn is_registered(&self, account: &AccountId) -> Result<bool, StoreError> {
        Ok(self.accounts.lock().unwrap().contains_key(account))
    }

    fn user_key_count(&self, account: &AccountId) -> Result<Option<u32>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(account)
            .and_then(|a| a.user_key_count))
    }

    fn register(&self, account: RegisteredAccount) -> Result<(), StoreError> {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.account_id.clone(), account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_pending_is_store_if_absent() {
        let store = NullVerdictStore::new();
        let hash = TxHash::new([1u8; 32]);
        assert!(store.mark_pending(&hash).unwrap());
        assert!(!store.mark_pending(&hash).unwrap());
        store.mark_validated(&hash).unwrap();
        assert!(!store.mark_pending(&hash).unwrap());
        assert_eq!(store.get_verdict(&hash).unwrap(), Some(Verdict::Validated));
        assert_eq!(store.write_log().len(), 2);
    }

    #[test]
    fn terminal_transition_requires_pending() {
        let store = NullVerdictStore::new();
        let mut rx = store.subscribe_rejected_or_failed();
        let (unknown, hash) = (TxHash::new([1u8; 32]), TxHash::new([2u8; 32]));

        assert!(!store
            .mark_terminal_if_pending(&unknown, Verdict::Validated)
            .unwrap());
        assert!(!store.has_verdict(&unknown).unwrap());

        store.mark_pending(&hash).unwrap();
        assert!(store
            .mark_terminal_if_pending(&hash, Verdict::Failed("boom".into()))
            .unwrap());
        assert!(!store
            .mark_terminal_if_pending(&hash, Verdict::Validated)
            .unwrap());
        assert_eq!(
            store.get_verdict(&hash).unwrap(),
            Some(Verdict::Failed("boom".into()))
        );
        assert_eq!(rx.try_recv().unwrap(), hash);
        assert!(rx.try_recv().is_err());

        assert!(matches!(
            store.mark_terminal_if_pending(&hash, Verdict::Pending),
            Err(StoreError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn rejected_and_failed_are_announced() {
        let store = NullVerdictStore::new();
        let mut rx = store.subscribe_rejected_or_failed();
        let (a, b, c) = (
            TxHash::new([1u8; 32]),
            TxHash::new([2u8; 32]),
            TxHash::new([3u8; 32]),
        );
        store.mark_validated(&a).unwrap();
        store.mark_rejected(&b, "no").unwrap();
        store.mark_failed(&c, "boom").unwrap();
        assert_eq!(rx.recv().await.unwrap(), b);
        assert_eq!(rx.recv().await.unwrap(), c);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn registry_tracks_key_counts() {
        let alice = AccountId::new("alice@d");
        let registry = NullAccountRegistry::with_accounts([&alice]);
        assert!(registry.is_registered(&alice).unwrap());
        assert_eq!(registry.user_key_count(&alice).unwrap(), None);
        registry
            .register(RegisteredAccount {
                account_id: alice.clone(),
                user_key_count: Some(2),
            })
            .unwrap();
        assert_eq!(registry.user_key_count(&alice).unwrap(), Some(2));
        assert_eq!(registry.registered_accounts().unwrap(), vec![alice]);
    }
}
