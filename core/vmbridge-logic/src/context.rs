// SPDX-License-Identifier: MIT
//! Execution context of one transaction.
//!
//! All writes go to a [`WorkingState`] layered over the committed
//! [`LedgerDb`]. The owner of the context either turns it into
//! [`StateChanges`] and applies them, or drops it, which discards every
//! effect of the transaction, bridge calls included.
use std::collections::BTreeMap;
use std::convert::Infallible;

use revm::db::CacheDB;
use revm::primitives::EvmState;
use revm::DatabaseCommit;

use vmbridge_types::{BridgeError, Result};

use crate::db::{LedgerDb, StateChanges};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Block execution; the only mode whose changes are committed.
    Deliver,
    /// Mempool admission check.
    Check,
    /// Gas estimation / dry run.
    Simulate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: u64,
    pub time: u64,
    pub chain_id: u64,
}

/// Gas budget of a transaction. `limit == None` is an unmetered context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    limit: Option<u64>,
    consumed: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        GasMeter {
            limit: Some(limit),
            consumed: 0,
        }
    }

    pub fn infinite() -> Self {
        GasMeter {
            limit: None,
            consumed: 0,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.consumed))
    }

    pub fn consume(&mut self, amount: u64, descriptor: &str) -> Result<()> {
        let total = self.consumed.saturating_add(amount);
        if let Some(limit) = self.limit {
            if total > limit {
                tracing::debug!(descriptor, amount, limit, "gas limit exceeded");
                return Err(BridgeError::OutOfGas {
                    limit,
                    consumed: self.consumed,
                    wanted: amount,
                });
            }
        }
        self.consumed = total;
        Ok(())
    }
}

type ModuleWrites = BTreeMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

/// Uncommitted state of a transaction: an EVM account cache and module
/// store writes over the committed ledger.
#[derive(Debug, Clone)]
pub struct WorkingState<'a> {
    ledger: &'a LedgerDb,
    evm: CacheDB<&'a LedgerDb>,
    modules: ModuleWrites,
}

impl<'a> WorkingState<'a> {
    pub fn new(ledger: &'a LedgerDb) -> Self {
        WorkingState {
            ledger,
            evm: CacheDB::new(ledger),
            modules: BTreeMap::new(),
        }
    }

    pub fn ledger(&self) -> &'a LedgerDb {
        self.ledger
    }

    /// EVM view of the working state.
    pub fn evm_db(&self) -> &CacheDB<&'a LedgerDb> {
        &self.evm
    }

    pub(crate) fn evm_db_mut(&mut self) -> &mut CacheDB<&'a LedgerDb> {
        &mut self.evm
    }

    /// Fold the outcome of an EVM call into the working state.
    pub fn commit_evm(&mut self, changes: EvmState) {
        self.evm.commit(changes);
    }

    pub fn module_get(&self, module: &str, key: &[u8]) -> Option<Vec<u8>> {
        match self.modules.get(module).and_then(|writes| writes.get(key)) {
            Some(value) => value.clone(),
            None => self.ledger.module_get(module, key).map(<[u8]>::to_vec),
        }
    }

    pub fn module_set(&mut self, module: &str, key: &[u8], value: Vec<u8>) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(key.to_vec(), Some(value));
    }

    pub fn module_delete(&mut self, module: &str, key: &[u8]) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(key.to_vec(), None);
    }

    pub fn module_writes(&self) -> &ModuleWrites {
        &self.modules
    }

    pub fn into_changes(self) -> StateChanges {
        let CacheDB {
            accounts,
            contracts,
            ..
        } = self.evm;
        let mut accounts: Vec<_> = accounts.into_iter().collect();
        accounts.sort_by_key(|(address, _)| *address);
        let mut contracts: Vec<_> = contracts.into_iter().collect();
        contracts.sort_by_key(|(hash, _)| *hash);
        StateChanges {
            accounts,
            contracts,
            modules: self.modules,
        }
    }
}

pub(crate) fn infallible<T>(result: std::result::Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Context handed to every bridge entry point.
#[derive(Debug)]
pub struct TxContext<'a> {
    header: BlockHeader,
    mode: ExecMode,
    tx_bytes: Vec<u8>,
    gas_meter: GasMeter,
    state: WorkingState<'a>,
    bridge_call_active: bool,
}

impl<'a> TxContext<'a> {
    pub fn new(ledger: &'a LedgerDb, header: BlockHeader, mode: ExecMode) -> Self {
        TxContext {
            header,
            mode,
            tx_bytes: Vec::new(),
            gas_meter: GasMeter::infinite(),
            state: WorkingState::new(ledger),
            bridge_call_active: false,
        }
    }

    /// Block execution context with a finite gas budget.
    pub fn deliver(ledger: &'a LedgerDb, header: BlockHeader, tx_bytes: Vec<u8>, gas_limit: u64) -> Self {
        Self::new(ledger, header, ExecMode::Deliver)
            .with_tx_bytes(tx_bytes)
            .with_gas_meter(GasMeter::new(gas_limit))
    }

    /// Simulation context; unmetered unless a simulation gas limit is configured.
    pub fn simulate(
        ledger: &'a LedgerDb,
        header: BlockHeader,
        tx_bytes: Vec<u8>,
        simulation_gas_limit: Option<u64>,
    ) -> Self {
        let meter = simulation_gas_limit.map_or_else(GasMeter::infinite, GasMeter::new);
        Self::new(ledger, header, ExecMode::Simulate)
            .with_tx_bytes(tx_bytes)
            .with_gas_meter(meter)
    }

    pub fn with_tx_bytes(mut self, tx_bytes: Vec<u8>) -> Self {
        self.tx_bytes = tx_bytes;
        self
    }

    pub fn with_gas_meter(mut self, gas_meter: GasMeter) -> Self {
        self.gas_meter = gas_meter;
        self
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn block_time(&self) -> u64 {
        self.header.time
    }

    pub fn chain_id(&self) -> u64 {
        self.header.chain_id
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn is_check_tx(&self) -> bool {
        self.mode == ExecMode::Check
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn gas_meter(&self) -> &GasMeter {
        &self.gas_meter
    }

    pub fn consume_gas(&mut self, amount: u64, descriptor: &str) -> Result<()> {
        self.gas_meter.consume(amount, descriptor)
    }

    pub fn state(&self) -> &WorkingState<'a> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut WorkingState<'a> {
        &mut self.state
    }

    pub fn module_get(&self, module: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.state.module_get(module, key)
    }

    pub fn module_set(&mut self, module: &str, key: &[u8], value: Vec<u8>) {
        self.state.module_set(module, key, value)
    }

    /// Run `f` on a branch of the working state; the branch replaces the
    /// working state only if `f` succeeds. Gas consumed by `f` stays consumed.
    pub fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.state.clone();
        let result = f(self);
        if result.is_err() {
            self.state = checkpoint;
        }
        result
    }

    /// Run one bridge call. A second bridge call started from inside `f`
    /// fails with [`BridgeError::ReentrantCall`].
    pub fn bridge_call<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.bridge_call_active {
            return Err(BridgeError::ReentrantCall);
        }
        self.bridge_call_active = true;
        let result = self.atomic(f);
        self.bridge_call_active = false;
        result
    }

    /// Hand over the writes of a delivered transaction. Check and simulate
    /// contexts never persist anything.
    pub fn into_changes(self) -> Option<StateChanges> {
        match self.mode {
            ExecMode::Deliver => Some(self.state.into_changes()),
            ExecMode::Check | ExecMode::Simulate => None,
        }
    }
}
