// SPDX-License-Identifier: MIT
use hex_literal::hex;

/// Name of the bridge module's key-value store.
pub const MODULE_NAME: &str = "vmbridge";

/// Name of the WASM runtime module store, activated together with the bridge.
pub const WASM_MODULE_NAME: &str = "wasm";

/// Reserved address of the system caller account (synthetic: ...b71d).
///
/// Only internally triggered bridge calls use this address; it never signs
/// an external transaction.
pub const SYSTEM_ACCOUNT_ADDRESS: [u8; 20] = hex!("000000000000000000000000000000000000b71d");

/// Gas ceiling for a bridge call made from an unmetered context (30M).
pub const DEFAULT_MAX_GAS_LIMIT_PER_TX: u64 = 30_000_000;

/// Key of the JSON-encoded module parameters inside the bridge store.
pub const PARAMS_KEY: &[u8] = b"params";

/// Top-level key of the message sent to a WASM token contract.
pub const MINT_CW20_MSG: &str = "mint_cw20";

/// Default WASM runtime tuning.
pub const DEFAULT_WASM_MEMORY_CACHE_SIZE: u32 = 100;
pub const DEFAULT_WASM_QUERY_GAS_LIMIT: u64 = 3_000_000;
