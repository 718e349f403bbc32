// SPDX-License-Identifier: MIT
//! Account keeper over the EVM account records of a working state.
//!
//! The account sequence is the EVM nonce, so every call the system
//! account issues advances both in one step.
use alloy_primitives::Address;
use revm::db::AccountState;
use revm::DatabaseRef;

use vmbridge_types::types::BaseAccount;

use crate::context::{infallible, WorkingState};

pub trait AccountKeeper {
    fn get_account(&self, address: Address) -> Option<BaseAccount>;
    fn new_account_with_address(&mut self, address: Address) -> BaseAccount;
    fn set_account(&mut self, account: BaseAccount);

    fn get_sequence(&self, address: Address) -> Option<u64> {
        self.get_account(address).map(|account| account.sequence)
    }

    /// Set the sequence of an existing account; returns false if there is none.
    fn set_sequence(&mut self, address: Address, sequence: u64) -> bool {
        match self.get_account(address) {
            Some(mut account) => {
                account.sequence = sequence;
                self.set_account(account);
                true
            }
            None => false,
        }
    }
}

impl AccountKeeper for WorkingState<'_> {
    fn get_account(&self, address: Address) -> Option<BaseAccount> {
        let info = infallible(self.evm_db().basic_ref(address))?;
        Some(BaseAccount {
            address,
            sequence: info.nonce,
        })
    }

    fn new_account_with_address(&mut self, address: Address) -> BaseAccount {
        let account = BaseAccount::new(address);
        self.set_account(account);
        account
    }

    fn set_account(&mut self, account: BaseAccount) {
        let entry = infallible(self.evm_db_mut().load_account(account.address));
        if entry.account_state == AccountState::NotExisting {
            entry.account_state = AccountState::Touched;
        }
        entry.info.nonce = account.sequence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use vmbridge_types::types::system_account_address;

    use crate::db::LedgerDb;

    #[test]
    fn test_missing_account() {
        let ledger = LedgerDb::new();
        let state = WorkingState::new(&ledger);
        assert_eq!(state.get_account(system_account_address()), None);
        assert_eq!(state.get_sequence(system_account_address()), None);
    }

    #[test]
    fn test_new_account_is_visible_and_persisted() {
        let mut ledger = LedgerDb::new();
        let address = system_account_address();
        {
            let mut state = WorkingState::new(&ledger);
            let account = state.new_account_with_address(address);
            assert_eq!(account.sequence, 0);
            assert!(state.set_sequence(address, 4));
            assert_eq!(state.get_sequence(address), Some(4));
            let changes = state.into_changes();
            ledger.apply(changes);
        }
        assert_eq!(ledger.accounts[&address].nonce, 4);
    }

    #[test]
    fn test_sequence_reads_ledger_nonce() {
        let mut ledger = LedgerDb::new();
        let address = Address::from([0x11; 20]);
        ledger.set_account(address, U256::from(1u64), 9);
        let mut state = WorkingState::new(&ledger);
        assert_eq!(state.get_sequence(address), Some(9));
        assert!(!state.set_sequence(Address::from([0x12; 20]), 1));
    }
}
