// SPDX-License-Identifier: MIT
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use revm::db::{AccountState, DbAccount};
use revm::primitives::{AccountInfo, Bytecode, KECCAK_EMPTY};
use revm::DatabaseRef;
use tracing::{debug, info};

use vmbridge_types::types::StoreFilterDecision;

use crate::store_filter::{StoreFilters, VersionStamp};

/// Committed key-value state of one module.
///
/// Writes land in `pending` during a block and only reach `data` when the
/// commit filter includes the module at that height.
#[derive(Debug, Default, Clone)]
pub struct ModuleStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    upgrade_version: Option<u64>,
    versions: BTreeSet<u64>,
}

impl ModuleStore {
    /// Latest value, including writes pending in the current block.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        match self.pending.get(key) {
            Some(Some(value)) => Some(value.as_slice()),
            Some(None) => None,
            None => self.data.get(key).map(Vec::as_slice),
        }
    }

    /// Value as of the last committed block.
    pub fn committed(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    pub fn versions(&self) -> &BTreeSet<u64> {
        &self.versions
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl VersionStamp for ModuleStore {
    fn set_upgrade_version(&mut self, height: u64) {
        self.upgrade_version = Some(height);
    }

    fn upgrade_version(&self) -> Option<u64> {
        self.upgrade_version
    }
}

/// Everything a finished transaction wants to write.
#[derive(Debug, Default)]
pub struct StateChanges {
    pub accounts: Vec<(Address, DbAccount)>,
    pub contracts: Vec<(B256, Bytecode)>,
    pub modules: BTreeMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

/// Committed ledger: EVM accounts plus per-module key-value stores.
///
/// Implements revm's `DatabaseRef`, so it can back any number of working
/// states without being borrowed mutably.
#[derive(Debug, Default)]
pub struct LedgerDb {
    pub accounts: BTreeMap<Address, AccountInfo>,
    pub storage: BTreeMap<Address, BTreeMap<U256, U256>>,
    pub block_hashes: BTreeMap<u64, B256>,
    pub codes: BTreeMap<B256, Bytes>,
    modules: BTreeMap<String, ModuleStore>,
}

impl LedgerDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put contract code at `address` (nonce 1, zero balance).
    pub fn deploy_contract(&mut self, address: Address, code: Bytes) -> B256 {
        let code_hash = keccak256(&code);
        self.codes.insert(code_hash, code.clone());
        self.accounts.insert(
            address,
            AccountInfo {
                balance: U256::ZERO,
                nonce: 1,
                code_hash,
                code: Some(Bytecode::new_raw(code)),
            },
        );
        code_hash
    }

    /// Create or overwrite a plain account.
    pub fn set_account(&mut self, address: Address, balance: U256, nonce: u64) {
        let info = self.accounts.entry(address).or_insert_with(|| AccountInfo {
            balance: U256::ZERO,
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: Some(Bytecode::default()),
        });
        info.balance = balance;
        info.nonce = nonce;
    }

    pub fn module(&self, name: &str) -> Option<&ModuleStore> {
        self.modules.get(name)
    }

    pub fn module_get(&self, name: &str, key: &[u8]) -> Option<&[u8]> {
        self.modules.get(name).and_then(|store| store.get(key))
    }

    /// Apply the writes of one committed transaction.
    ///
    /// Account changes are final immediately; module writes stay pending
    /// until [`LedgerDb::commit_block`].
    pub fn apply(&mut self, changes: StateChanges) {
        for (code_hash, code) in changes.contracts {
            if !code.is_empty() {
                self.codes.insert(code_hash, code.original_bytes());
            }
        }

        for (address, account) in changes.accounts {
            match account.account_state {
                AccountState::NotExisting => {
                    self.accounts.remove(&address);
                    self.storage.remove(&address);
                    continue;
                }
                AccountState::StorageCleared => {
                    self.storage.remove(&address);
                }
                AccountState::Touched | AccountState::None => {}
            }

            if let Some(code) = &account.info.code {
                if !code.is_empty() {
                    self.codes
                        .insert(account.info.code_hash, code.original_bytes());
                }
            }
            self.accounts.insert(address, account.info);

            if !account.storage.is_empty() {
                let slots = self.storage.entry(address).or_default();
                for (key, value) in account.storage {
                    if value.is_zero() {
                        slots.remove(&key);
                    } else {
                        slots.insert(key, value);
                    }
                }
                if slots.is_empty() {
                    self.storage.remove(&address);
                }
            }
        }

        for (name, writes) in changes.modules {
            let store = self.modules.entry(name).or_default();
            store.pending.extend(writes);
        }
    }

    /// Close a block: flush or drop each module's pending writes as the
    /// commit filter decides for `height`.
    pub fn commit_block(
        &mut self,
        height: u64,
        filters: &StoreFilters,
    ) -> BTreeMap<String, StoreFilterDecision> {
        let mut decisions = BTreeMap::new();
        for (name, store) in self.modules.iter_mut() {
            let stamp: &mut dyn VersionStamp = &mut *store;
            let decision = filters.commit(name, height, Some(stamp));
            match decision {
                StoreFilterDecision::Exclude => {
                    if store.has_pending() {
                        debug!(module = %name, height, "dropping writes of inactive module");
                    }
                    store.pending.clear();
                }
                StoreFilterDecision::Include | StoreFilterDecision::IncludeAndStamp => {
                    for (key, value) in std::mem::take(&mut store.pending) {
                        match value {
                            Some(value) => {
                                store.data.insert(key, value);
                            }
                            None => {
                                store.data.remove(&key);
                            }
                        }
                    }
                    store.versions.insert(height);
                }
            }
            if decision == StoreFilterDecision::IncludeAndStamp {
                info!(module = %name, height, "module store stamped with upgrade version");
            }
            decisions.insert(name.clone(), decision);
        }
        decisions
    }

    /// Drop recorded versions below `retain_from` where the prune filter allows it.
    /// Returns the number of versions removed.
    pub fn prune_versions(&mut self, retain_from: u64, filters: &StoreFilters) -> usize {
        let mut pruned = 0;
        for (name, store) in self.modules.iter_mut() {
            let doomed: Vec<u64> = store
                .versions
                .range(..retain_from)
                .copied()
                .filter(|h| filters.may_prune(name, *h))
                .collect();
            for h in doomed {
                store.versions.remove(&h);
                pruned += 1;
            }
        }
        pruned
    }
}

impl DatabaseRef for LedgerDb {
    type Error = Infallible;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        Ok(self.accounts.get(&address).cloned())
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        match self.codes.get(&code_hash) {
            Some(bytes) => Ok(Bytecode::new_raw(bytes.clone())),
            None => Ok(Bytecode::default()),
        }
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        Ok(self
            .storage
            .get(&address)
            .and_then(|slots| slots.get(&index))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        Ok(self.block_hashes.get(&number).copied().unwrap_or(B256::ZERO))
    }
}
