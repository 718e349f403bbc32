// SPDX-License-Identifier: MIT
use alloy_primitives::{Address, B256, U256};
use revm::primitives::{
    BlobExcessGasAndPrice, BlockEnv, CfgEnv, CfgEnvWithHandlerCfg, EnvWithHandlerCfg,
    ExecutionResult as RevmResult, ResultAndState, TransactTo, TxEnv,
};
use revm::Evm;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use vmbridge_types::types::{CallRequest, ExecutionResult, ResultData};
use vmbridge_types::{BridgeError, Result};

use crate::accounts::AccountKeeper;
use crate::context::TxContext;
use crate::evm_keeper::{ChainConfig, EvmKeeper};

/// Runs privileged calls into the EVM on behalf of module logic.
pub trait CallExecutor {
    /// Execute `request` against the working state of `ctx`.
    ///
    /// On `Err` nothing of the call is applied. On `Ok` the call's writes
    /// and the caller's sequence increment are part of the working state and
    /// share its fate.
    fn call_evm(
        &self,
        ctx: &mut TxContext<'_>,
        request: CallRequest,
    ) -> Result<(ExecutionResult, ResultData)>;
}

/// [`CallExecutor`] backed by revm.
#[derive(Debug, Clone)]
pub struct EvmCallExecutor<K> {
    keeper: K,
}

impl<K: EvmKeeper> EvmCallExecutor<K> {
    pub fn new(keeper: K) -> Self {
        EvmCallExecutor { keeper }
    }

    pub fn keeper(&self) -> &K {
        &self.keeper
    }

    fn execute(
        &self,
        ctx: &mut TxContext<'_>,
        config: ChainConfig,
        request: CallRequest,
    ) -> Result<(ExecutionResult, ResultData)> {
        let caller = request.caller;
        let account = match ctx.state().get_account(caller) {
            Some(account) => account,
            None => {
                info!(%caller, "creating system account");
                ctx.state_mut().new_account_with_address(caller)
            }
        };
        let nonce = account.sequence;
        let tx_hash = call_hash(ctx.tx_bytes(), ctx.height());

        let gas_limit = match ctx.gas_meter().remaining() {
            Some(remaining) => remaining,
            None => self.keeper.params(ctx).max_gas_limit_per_tx,
        };

        let block_env = BlockEnv {
            number: U256::from(ctx.height()),
            coinbase: Address::ZERO,
            timestamp: U256::from(ctx.block_time()),
            gas_limit: U256::from(gas_limit),
            basefee: U256::ZERO,
            difficulty: U256::ZERO,
            prevrandao: Some(B256::ZERO),
            blob_excess_gas_and_price: Some(BlobExcessGasAndPrice::new(0)),
        };

        // The system account pays no gas price; gas is charged to the
        // enclosing transaction's meter instead.
        let tx_env = TxEnv {
            caller,
            gas_limit,
            gas_price: U256::ZERO,
            transact_to: TransactTo::Call(request.to),
            value: request.value,
            data: request.payload,
            nonce: Some(nonce),
            chain_id: Some(config.chain_id),
            ..Default::default()
        };

        let mut cfg = CfgEnv::default();
        cfg.chain_id = config.chain_id;

        let cfg_with_handler = CfgEnvWithHandlerCfg::new_with_spec_id(cfg, config.spec_id);
        let env_with_handler =
            EnvWithHandlerCfg::new_with_cfg_env(cfg_with_handler, block_env, tx_env);

        let ResultAndState { result, state } = {
            let mut evm = Evm::builder()
                .with_ref_db(ctx.state().evm_db())
                .with_env_with_handler_cfg(env_with_handler)
                .build();
            evm.transact()
                .map_err(|e| BridgeError::Execution(format!("evm transaction failed: {e}")))?
        };

        let (gas_used, logs, output) = match result {
            RevmResult::Success {
                gas_used,
                logs,
                output,
                ..
            } => (gas_used, logs, output.into_data()),
            RevmResult::Revert { gas_used, output } => {
                ctx.consume_gas(gas_used, "evm call reverted")?;
                return Err(BridgeError::Reverted {
                    gas_used,
                    output: output.to_vec(),
                });
            }
            RevmResult::Halt { reason, gas_used } => {
                ctx.consume_gas(gas_used, "evm call halted")?;
                return Err(BridgeError::Halted {
                    reason: format!("{reason:?}"),
                    gas_used,
                });
            }
        };
        ctx.consume_gas(gas_used, "evm call")?;

        let mut created_contracts: Vec<Address> = state
            .iter()
            .filter(|(_, account)| account.is_created())
            .map(|(address, _)| *address)
            .collect();
        created_contracts.sort();

        ctx.state_mut().commit_evm(state);
        ctx.state_mut().set_sequence(caller, nonce + 1);

        debug!(
            %tx_hash,
            gas_used,
            logs = logs.len(),
            created = created_contracts.len(),
            "evm call committed to working state"
        );

        let data = ResultData {
            tx_hash,
            ret: output.clone(),
            logs: logs.clone(),
            contract_address: created_contracts.first().copied(),
        };
        let result = ExecutionResult {
            success: true,
            gas_used,
            output,
            logs,
            created_contracts,
        };
        Ok((result, data))
    }
}

impl<K: EvmKeeper> CallExecutor for EvmCallExecutor<K> {
    fn call_evm(
        &self,
        ctx: &mut TxContext<'_>,
        request: CallRequest,
    ) -> Result<(ExecutionResult, ResultData)> {
        let config = self
            .keeper
            .chain_config(ctx)
            .ok_or(BridgeError::ChainConfigNotFound)?;
        ctx.atomic(|ctx| self.execute(ctx, config, request))
    }
}

/// Identifier of a module-issued call, salted by the enclosing transaction
/// and the block height.
pub fn call_hash(tx_bytes: &[u8], height: u64) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(tx_bytes);
    hasher.update(height.to_be_bytes());
    B256::from_slice(&hasher.finalize())
}
