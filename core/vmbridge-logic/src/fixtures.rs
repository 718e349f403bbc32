// SPDX-License-Identifier: MIT
//! Hand-assembled EVM contracts used by tests and the CLI demo ledger.
//!
//! None of them inspect calldata, so each behaves the same for any call.
use hex_literal::hex;

/// Returns the ABI word `true`.
pub const MINT_TRUE: [u8; 10] = hex!("600160005260206000f3");

/// Returns the ABI word `false`.
pub const MINT_FALSE: [u8; 5] = hex!("60206000f3");

/// Reverts with empty data.
pub const REVERT: [u8; 5] = hex!("60006000fd");

/// Returns one byte, which no boolean decoder accepts.
pub const GARBAGE: [u8; 5] = hex!("60016000f3");

/// Writes 1 to slot 0, then returns `true`.
pub const STORE_AND_MINT: [u8; 15] = hex!("6001600055600160005260206000f3");

/// Deploys a one-byte child contract, then returns `true`.
pub const FACTORY: [u8; 32] =
    hex!("69600060005360016000f3600052600a60166000f050600160005260206000f3");

/// Deploys a child contract, then reverts.
pub const FACTORY_THEN_REVERT: [u8; 27] =
    hex!("69600060005360016000f3600052600a60166000f05060006000fd");

/// Executes the designated invalid opcode.
pub const INVALID: [u8; 1] = hex!("fe");

/// Jumps back to its first instruction until it runs out of gas.
pub const SPIN: [u8; 4] = hex!("5b600056");
