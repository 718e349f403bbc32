// SPDX-License-Identifier: MIT
use revm::primitives::SpecId;

use vmbridge_types::types::EvmParams;

use crate::context::TxContext;

/// Chain configuration the EVM call executor runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub spec_id: SpecId,
}

impl ChainConfig {
    pub fn new(chain_id: u64) -> Self {
        ChainConfig {
            chain_id,
            spec_id: SpecId::CANCUN,
        }
    }
}

/// Read access to the EVM module's configuration.
pub trait EvmKeeper {
    /// `None` when the chain has no EVM configuration yet.
    fn chain_config(&self, ctx: &TxContext<'_>) -> Option<ChainConfig>;
    fn params(&self, ctx: &TxContext<'_>) -> EvmParams;
}

/// Keeper with a configuration fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticEvmKeeper {
    pub chain_config: Option<ChainConfig>,
    pub params: EvmParams,
}

impl StaticEvmKeeper {
    pub fn new(chain_config: ChainConfig, params: EvmParams) -> Self {
        StaticEvmKeeper {
            chain_config: Some(chain_config),
            params,
        }
    }
}

impl EvmKeeper for StaticEvmKeeper {
    fn chain_config(&self, _ctx: &TxContext<'_>) -> Option<ChainConfig> {
        self.chain_config
    }

    fn params(&self, _ctx: &TxContext<'_>) -> EvmParams {
        self.params
    }
}
