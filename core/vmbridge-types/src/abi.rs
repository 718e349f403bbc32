// SPDX-License-Identifier: MIT
//! Solidity ABI bindings for the two bridge directions.
//!
//! `amount` travels as a `uint256` ABI word and always decodes to an integer.
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};

sol! {
    /// Emitted by an EVM contract to move tokens into a WASM contract.
    event SendToWasm(string wasmAddr, string recipient, uint256 amount);

    /// Implemented by the EVM token contract paired with a WASM token.
    function mintERC20(string caller, address recipient, uint256 amount) external returns (bool success);
}

/// A decoded bridge log. Immutable once decoded and consumed by exactly one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    SendToWasm {
        wasm_addr: String,
        recipient: String,
        amount: U256,
    },
}

impl BridgeEvent {
    pub fn signature(&self) -> B256 {
        match self {
            BridgeEvent::SendToWasm { .. } => SendToWasm::SIGNATURE_HASH,
        }
    }

    /// ABI-encode the non-indexed fields, as they appear in a log's data.
    pub fn encode_data(&self) -> Vec<u8> {
        match self {
            BridgeEvent::SendToWasm {
                wasm_addr,
                recipient,
                amount,
            } => SendToWasm {
                wasmAddr: wasm_addr.clone(),
                recipient: recipient.clone(),
                amount: *amount,
            }
            .encode_data(),
        }
    }
}

/// Signature hash of `SendToWasm(string,string,uint256)`.
pub fn send_to_wasm_event_id() -> B256 {
    SendToWasm::SIGNATURE_HASH
}

/// Decode the data section of a `SendToWasm` log.
pub fn decode_send_to_wasm(data: &[u8]) -> Result<BridgeEvent, alloy_sol_types::Error> {
    let (wasm_addr, recipient, amount) = SendToWasm::abi_decode_data(data, true)?;
    Ok(BridgeEvent::SendToWasm {
        wasm_addr,
        recipient,
        amount,
    })
}

/// Call data for `mintERC20(caller, recipient, amount)`.
pub fn encode_mint_input(caller: &str, recipient: Address, amount: U256) -> Vec<u8> {
    mintERC20Call {
        caller: caller.to_string(),
        recipient,
        amount,
    }
    .abi_encode()
}

/// Decode the single boolean returned by `mintERC20`.
pub fn decode_mint_output(ret: &[u8]) -> Result<bool, alloy_sol_types::Error> {
    Ok(mintERC20Call::abi_decode_returns(ret, true)?.success)
}
