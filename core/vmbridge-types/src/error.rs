// SPDX-License-Identifier: MIT
use alloy_primitives::B256;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input; returned before any state is touched.
    Validation,
    /// Height below activation or bridge switched off; no state touched.
    NotSupported,
    /// VM trap, revert or out-of-gas; no partial state survives.
    Execution,
    /// Missing chain configuration or unreadable module state.
    Configuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("vmbridge not supported at height {height}")]
    NotSupported { height: u64 },

    #[error("vmbridge is disabled")]
    BridgeDisabled,

    #[error("bridge call already in progress in this transaction")]
    ReentrantCall,

    #[error("evm execution failed: {0}")]
    Execution(String),

    #[error("evm call reverted after {gas_used} gas")]
    Reverted { gas_used: u64, output: Vec<u8> },

    #[error("evm call halted ({reason}) after {gas_used} gas")]
    Halted { reason: String, gas_used: u64 },

    #[error("evm call failed: undecodable return data")]
    CallFailed,

    #[error("out of gas: limit {limit}, consumed {consumed}, wanted {wanted}")]
    OutOfGas { limit: u64, consumed: u64, wanted: u64 },

    #[error("wasm execution failed: {0}")]
    Wasm(String),

    #[error("chain config not found")]
    ChainConfigNotFound,

    #[error("corrupt module state: {0}")]
    Store(String),

    #[error("event handler already registered for {0}")]
    DuplicateHandler(B256),
}

impl BridgeError {
    pub fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        BridgeError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::InvalidAddress { .. }
            | BridgeError::Validation(_)
            | BridgeError::DuplicateHandler(_) => ErrorCategory::Validation,
            BridgeError::NotSupported { .. }
            | BridgeError::BridgeDisabled
            | BridgeError::ReentrantCall => ErrorCategory::NotSupported,
            BridgeError::Execution(_)
            | BridgeError::Reverted { .. }
            | BridgeError::Halted { .. }
            | BridgeError::CallFailed
            | BridgeError::OutOfGas { .. }
            | BridgeError::Wasm(_) => ErrorCategory::Execution,
            BridgeError::ChainConfigNotFound | BridgeError::Store(_) => {
                ErrorCategory::Configuration
            }
        }
    }
}
