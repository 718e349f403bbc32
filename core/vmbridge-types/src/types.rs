// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, Log, B256, U256};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_GAS_LIMIT_PER_TX, DEFAULT_WASM_MEMORY_CACHE_SIZE, DEFAULT_WASM_QUERY_GAS_LIMIT,
    SYSTEM_ACCOUNT_ADDRESS,
};

/// A single EVM call issued by module logic. Built per invocation, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub caller: Address,
    pub to: Address,
    pub value: U256,
    pub payload: Bytes,
}

impl CallRequest {
    /// A call issued by the system account.
    pub fn system(to: Address, value: U256, payload: impl Into<Bytes>) -> Self {
        CallRequest {
            caller: system_account_address(),
            to,
            value,
            payload: payload.into(),
        }
    }
}

pub fn system_account_address() -> Address {
    Address::from(SYSTEM_ACCOUNT_ADDRESS)
}

/// Outcome of a state transition, as seen by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub gas_used: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    /// Contracts created during the call, in address order.
    pub created_contracts: Vec<Address>,
}

/// Receipt-style data of a bridge call, owned by the caller until committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultData {
    pub tx_hash: B256,
    pub ret: Bytes,
    pub logs: Vec<Log>,
    pub contract_address: Option<Address>,
}

/// Account record as held by the account keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: Address,
    pub sequence: u64,
}

impl BaseAccount {
    pub fn new(address: Address) -> Self {
        BaseAccount {
            address,
            sequence: 0,
        }
    }
}

/// Operator-controlled module parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BridgeParams {
    /// Kill-switch for every bridge entry point, independent of height.
    pub vmbridge_enable: bool,
}

/// Parameters of the EVM module consumed by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmParams {
    pub max_gas_limit_per_tx: u64,
}

impl Default for EvmParams {
    fn default() -> Self {
        EvmParams {
            max_gas_limit_per_tx: DEFAULT_MAX_GAS_LIMIT_PER_TX,
        }
    }
}

/// WASM runtime tuning, loaded once at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasmConfig {
    pub memory_cache_size: u32,
    pub smart_query_gas_limit: u64,
    /// Gas limit of simulation contexts; unmetered when absent.
    pub simulation_gas_limit: Option<u64>,
    pub contract_debug_mode: bool,
}

impl Default for WasmConfig {
    fn default() -> Self {
        WasmConfig {
            memory_cache_size: DEFAULT_WASM_MEMORY_CACHE_SIZE,
            smart_query_gas_limit: DEFAULT_WASM_QUERY_GAS_LIMIT,
            simulation_gas_limit: None,
            contract_debug_mode: false,
        }
    }
}

/// Exported module state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: BridgeParams,
}

/// What the commit filter does with a module's writes at one height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StoreFilterDecision {
    Exclude,
    Include,
    IncludeAndStamp,
}

impl StoreFilterDecision {
    pub fn includes(self) -> bool {
        !matches!(self, StoreFilterDecision::Exclude)
    }
}

// --- State Diff Types ---

/// Represents a change in a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delta<T> {
    Unchanged,
    Added(T),
    Removed(T),
    Changed { from: T, to: T },
}

impl<T> Delta<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Delta::Unchanged)
    }
}

/// Diff of a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDiff {
    pub balance: Delta<U256>,
    pub nonce: Delta<u64>,
    pub code_hash: Delta<B256>,
    pub storage: BTreeMap<U256, Delta<U256>>,
}

/// Pending changes of a working state relative to the committed ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateDiff {
    pub accounts: BTreeMap<Address, AccountDiff>,
    /// Module store writes, keyed by module then hex-encoded key.
    pub modules: BTreeMap<String, BTreeMap<String, Delta<Bytes>>>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.modules.is_empty()
    }
}
