// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;

use alloy_primitives::{Bytes, U256};
use revm::db::AccountState;

use vmbridge_types::types::{AccountDiff, Delta, StateDiff};

use crate::context::WorkingState;

fn delta<T: PartialEq>(from: Option<T>, to: Option<T>) -> Delta<T> {
    match (from, to) {
        (None, None) => Delta::Unchanged,
        (None, Some(to)) => Delta::Added(to),
        (Some(from), None) => Delta::Removed(from),
        (Some(from), Some(to)) if from == to => Delta::Unchanged,
        (Some(from), Some(to)) => Delta::Changed { from, to },
    }
}

fn non_zero(value: U256) -> Option<U256> {
    (!value.is_zero()).then_some(value)
}

/// Compute the pending changes of a working state against the committed ledger.
pub fn compute_state_diff(state: &WorkingState<'_>) -> StateDiff {
    let ledger = state.ledger();
    let mut accounts = BTreeMap::new();

    for (address, cached) in &state.evm_db().accounts {
        let original = ledger.accounts.get(address);
        let current = cached.info();

        let mut diff = AccountDiff {
            balance: Delta::Unchanged,
            nonce: Delta::Unchanged,
            code_hash: Delta::Unchanged,
            storage: BTreeMap::new(),
        };

        if original.is_none() && current.as_ref().map_or(true, |info| info.is_empty()) {
            // looked up, never created
            continue;
        }

        diff.balance = delta(original.map(|o| o.balance), current.as_ref().map(|c| c.balance));
        diff.nonce = delta(original.map(|o| o.nonce), current.as_ref().map(|c| c.nonce));
        diff.code_hash = delta(
            original.map(|o| o.code_hash),
            current.as_ref().map(|c| c.code_hash),
        );

        let original_slots = ledger.storage.get(address);
        let cleared = matches!(
            cached.account_state,
            AccountState::NotExisting | AccountState::StorageCleared
        );
        if cleared {
            for (key, value) in original_slots.into_iter().flatten() {
                if !cached.storage.contains_key(key) {
                    diff.storage.insert(*key, Delta::Removed(*value));
                }
            }
        }
        for (key, value) in &cached.storage {
            let before = original_slots
                .and_then(|slots| slots.get(key))
                .copied()
                .and_then(non_zero);
            let slot = delta(before, non_zero(*value));
            if !slot.is_unchanged() {
                diff.storage.insert(*key, slot);
            }
        }

        let changed = !diff.balance.is_unchanged()
            || !diff.nonce.is_unchanged()
            || !diff.code_hash.is_unchanged()
            || !diff.storage.is_empty();
        if changed {
            accounts.insert(*address, diff);
        }
    }

    let mut modules = BTreeMap::new();
    for (name, writes) in state.module_writes() {
        let mut entries = BTreeMap::new();
        for (key, value) in writes {
            let before = ledger.module_get(name, key).map(Bytes::copy_from_slice);
            let after = value.clone().map(Bytes::from);
            let entry = delta(before, after);
            if !entry.is_unchanged() {
                entries.insert(hex::encode(key), entry);
            }
        }
        if !entries.is_empty() {
            modules.insert(name.clone(), entries);
        }
    }

    StateDiff { accounts, modules }
}
