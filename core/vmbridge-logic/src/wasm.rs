// SPDX-License-Identifier: MIT
//! WASM side of the bridge.
//!
//! The bridge only needs one capability from the WASM VM: execute a
//! contract with a JSON message on behalf of a caller. [`MemoryWasmRuntime`]
//! provides it for a minimal cw20-style token whose state lives in the
//! `wasm` module store, so it is versioned and filtered like any other
//! module state.
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use vmbridge_types::address::WasmAddress;
use vmbridge_types::constants::WASM_MODULE_NAME;
use vmbridge_types::types::WasmConfig;
use vmbridge_types::{BridgeError, Result};

use crate::context::TxContext;

/// Flat gas charge of one contract execution.
pub const EXECUTE_BASE_GAS: u64 = 40_000;
/// Gas per byte of the execute message.
pub const EXECUTE_GAS_PER_BYTE: u64 = 3;

/// Execute messages understood by bridged token contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    MintCw20 { recipient: String, amount: String },
}

impl ExecuteMsg {
    pub fn mint(recipient: &str, amount: U256) -> Self {
        ExecuteMsg::MintCw20 {
            recipient: recipient.to_string(),
            amount: amount.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| BridgeError::Validation(e.to_string()))
    }
}

pub trait WasmRuntime {
    /// Execute `msg` on `contract` as `caller`. Returns the response data.
    fn execute(
        &self,
        ctx: &mut TxContext<'_>,
        contract: &WasmAddress,
        caller: &WasmAddress,
        msg: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Token contract metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cw20Contract {
    pub name: String,
    pub minter: WasmAddress,
}

/// In-memory token runtime over the `wasm` module store.
#[derive(Debug, Clone, Default)]
pub struct MemoryWasmRuntime {
    config: WasmConfig,
}

fn contract_key(contract: &WasmAddress) -> Vec<u8> {
    format!("contract/{contract}").into_bytes()
}

fn balance_key(contract: &WasmAddress, account: &WasmAddress) -> Vec<u8> {
    format!("balance/{contract}/{account}").into_bytes()
}

impl MemoryWasmRuntime {
    pub fn new(config: WasmConfig) -> Self {
        MemoryWasmRuntime { config }
    }

    pub fn config(&self) -> &WasmConfig {
        &self.config
    }

    /// Register a token contract whose only minter is `minter`.
    pub fn instantiate(
        &self,
        ctx: &mut TxContext<'_>,
        contract: &WasmAddress,
        name: &str,
        minter: WasmAddress,
    ) -> Result<()> {
        let info = Cw20Contract {
            name: name.to_string(),
            minter,
        };
        let value = serde_json::to_vec(&info).map_err(|e| BridgeError::Store(e.to_string()))?;
        ctx.module_set(WASM_MODULE_NAME, &contract_key(contract), value);
        Ok(())
    }

    pub fn contract_info(
        &self,
        ctx: &TxContext<'_>,
        contract: &WasmAddress,
    ) -> Result<Option<Cw20Contract>> {
        ctx.module_get(WASM_MODULE_NAME, &contract_key(contract))
            .map(|raw| serde_json::from_slice(&raw).map_err(|e| BridgeError::Store(e.to_string())))
            .transpose()
    }

    pub fn query_balance(
        &self,
        ctx: &TxContext<'_>,
        contract: &WasmAddress,
        account: &WasmAddress,
    ) -> Result<U256> {
        match ctx.module_get(WASM_MODULE_NAME, &balance_key(contract, account)) {
            None => Ok(U256::ZERO),
            Some(raw) => {
                let text = String::from_utf8(raw).map_err(|e| BridgeError::Store(e.to_string()))?;
                U256::from_str_radix(&text, 10).map_err(|e| BridgeError::Store(e.to_string()))
            }
        }
    }

    fn mint(
        &self,
        ctx: &mut TxContext<'_>,
        contract: &WasmAddress,
        caller: &WasmAddress,
        recipient: &str,
        amount: &str,
    ) -> Result<Vec<u8>> {
        let info = self
            .contract_info(ctx, contract)?
            .ok_or_else(|| BridgeError::Wasm(format!("no such contract: {contract}")))?;
        if &info.minter != caller {
            return Err(BridgeError::Wasm(format!("unauthorized: {caller} is not the minter")));
        }
        let recipient = WasmAddress::from_str(recipient)?;
        let amount = U256::from_str_radix(amount, 10)
            .map_err(|e| BridgeError::Wasm(format!("invalid amount {amount:?}: {e}")))?;

        let balance = self.query_balance(ctx, contract, &recipient)?;
        let updated = balance
            .checked_add(amount)
            .ok_or_else(|| BridgeError::Wasm("balance overflow".into()))?;
        ctx.module_set(
            WASM_MODULE_NAME,
            &balance_key(contract, &recipient),
            updated.to_string().into_bytes(),
        );

        if self.config.contract_debug_mode {
            debug!(%contract, %recipient, %amount, "cw20 mint");
        }
        Ok(Vec::new())
    }
}

impl WasmRuntime for MemoryWasmRuntime {
    fn execute(
        &self,
        ctx: &mut TxContext<'_>,
        contract: &WasmAddress,
        caller: &WasmAddress,
        msg: &[u8],
    ) -> Result<Vec<u8>> {
        let gas = EXECUTE_BASE_GAS + EXECUTE_GAS_PER_BYTE * msg.len() as u64;
        ctx.consume_gas(gas, "wasm execute")?;

        let msg: ExecuteMsg = serde_json::from_slice(msg)
            .map_err(|e| BridgeError::Wasm(format!("unknown execute message: {e}")))?;
        match msg {
            ExecuteMsg::MintCw20 { recipient, amount } => {
                self.mint(ctx, contract, caller, &recipient, &amount)
            }
        }
    }
}
