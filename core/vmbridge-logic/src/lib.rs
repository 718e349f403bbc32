// SPDX-License-Identifier: MIT
//! vmbridge-logic crate
//!
//! Cross-VM bridge: EVM logs trigger WASM contract calls, WASM requests
//! trigger privileged EVM calls, all inside the enclosing transaction.

pub mod accounts;
pub mod context;
pub mod db;
pub mod events;
pub mod evm_keeper;
pub mod executor;
pub mod fixtures;
pub mod keeper;
pub mod state_diff;
pub mod store_filter;
pub mod upgrade;
pub mod wasm;
