// SPDX-License-Identifier: MIT
use std::str::FromStr;

use alloy_primitives::U256;
use tracing::{debug, info, warn};

use vmbridge_types::abi::{decode_mint_output, encode_mint_input};
use vmbridge_types::address::{parse_evm_address, WasmAddress};
use vmbridge_types::constants::{MODULE_NAME, PARAMS_KEY};
use vmbridge_types::proposal::{
    validate_abstract, Proposal, ProposalContent, ProposalError, ProposalStatus,
    ProposalTypeRegistry, PROPOSAL_TYPE_BRIDGE_PARAMS,
};
use vmbridge_types::types::{BridgeParams, CallRequest, GenesisState};
use vmbridge_types::{BridgeError, Result};

use crate::context::TxContext;
use crate::executor::CallExecutor;
use crate::upgrade::UpgradeGate;
use crate::wasm::{ExecuteMsg, WasmRuntime};

/// Add the bridge's own proposal kind to a governance registry.
pub fn register_proposal_types(
    registry: &mut ProposalTypeRegistry,
) -> std::result::Result<(), ProposalError> {
    registry.register(PROPOSAL_TYPE_BRIDGE_PARAMS, validate_abstract)
}

/// Entry points of the bridge in both directions.
#[derive(Debug)]
pub struct BridgeKeeper<E, W> {
    gate: UpgradeGate,
    executor: E,
    wasm: W,
}

impl<E: CallExecutor, W: WasmRuntime> BridgeKeeper<E, W> {
    pub fn new(gate: UpgradeGate, executor: E, wasm: W) -> Self {
        BridgeKeeper {
            gate,
            executor,
            wasm,
        }
    }

    pub fn gate(&self) -> &UpgradeGate {
        &self.gate
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn wasm(&self) -> &W {
        &self.wasm
    }

    /// Module parameters; defaults (bridge disabled) until first written.
    pub fn get_params(&self, ctx: &TxContext<'_>) -> Result<BridgeParams> {
        match ctx.module_get(MODULE_NAME, PARAMS_KEY) {
            None => Ok(BridgeParams::default()),
            Some(raw) => serde_json::from_slice(&raw)
                .map_err(|e| BridgeError::Store(format!("params: {e}"))),
        }
    }

    pub fn set_params(&self, ctx: &mut TxContext<'_>, params: BridgeParams) -> Result<()> {
        let raw = serde_json::to_vec(&params).map_err(|e| BridgeError::Store(e.to_string()))?;
        ctx.module_set(MODULE_NAME, PARAMS_KEY, raw);
        Ok(())
    }

    pub fn init_genesis(&self, ctx: &mut TxContext<'_>, genesis: &GenesisState) -> Result<()> {
        self.set_params(ctx, genesis.params)
    }

    /// `None` below the activation height: the module has no state to export yet.
    pub fn export_genesis(&self, ctx: &TxContext<'_>) -> Result<Option<GenesisState>> {
        if !self.gate.is_live(ctx.height()) {
            return Ok(None);
        }
        Ok(Some(GenesisState {
            params: self.get_params(ctx)?,
        }))
    }

    /// Apply a passed governance proposal addressed to this module. Proposals
    /// that have not passed, or that carry other content, are left alone.
    pub fn handle_proposal(&self, ctx: &mut TxContext<'_>, proposal: &Proposal) -> Result<()> {
        self.gate.check(ctx.height())?;
        if proposal.status != ProposalStatus::Passed {
            debug!(id = proposal.id, status = %proposal.status, "skipping proposal that has not passed");
            return Ok(());
        }
        match &proposal.content {
            ProposalContent::BridgeParams { params, .. } => {
                info!(id = proposal.id, enable = params.vmbridge_enable, "updating vmbridge params");
                self.set_params(ctx, *params)
            }
            other => {
                debug!(id = proposal.id, kind = other.proposal_type(), "not a vmbridge proposal");
                Ok(())
            }
        }
    }

    /// `NotSupported` below activation, `BridgeDisabled` when switched off.
    pub fn ensure_live(&self, ctx: &TxContext<'_>) -> Result<()> {
        // height first: nothing is read from the module store below activation
        self.gate.check(ctx.height())?;
        let params = self.get_params(ctx)?;
        self.gate.check_enabled(ctx.height(), &params)
    }

    /// Mint `amount` of the WASM token `wasm_addr` to `recipient`, on behalf
    /// of the EVM contract `caller`.
    pub fn send_to_wasm(
        &self,
        ctx: &mut TxContext<'_>,
        caller: &WasmAddress,
        wasm_addr: &str,
        recipient: &str,
        amount: U256,
    ) -> Result<()> {
        self.ensure_live(ctx)?;
        let contract = WasmAddress::from_str(wasm_addr)?;
        let msg = ExecuteMsg::mint(recipient, amount).to_json()?;

        ctx.bridge_call(|ctx| self.wasm.execute(ctx, &contract, caller, &msg))
            .inspect_err(|e| warn!(%contract, error = %e, "send to wasm failed"))?;
        info!(height = ctx.height(), %caller, %contract, recipient, %amount, "sent to wasm");
        Ok(())
    }

    /// Call `mintERC20(caller, recipient, amount)` on the EVM contract
    /// `contract` from the system account. Returns the contract's answer.
    pub fn send_to_evm(
        &self,
        ctx: &mut TxContext<'_>,
        caller: &str,
        contract: &str,
        recipient: &str,
        amount: U256,
    ) -> Result<bool> {
        let recipient = parse_evm_address(recipient)?;
        let contract = parse_evm_address(contract)?;
        self.ensure_live(ctx)?;

        let input = encode_mint_input(caller, recipient, amount);
        let request = CallRequest::system(contract, U256::ZERO, input);
        let minted = ctx.bridge_call(|ctx| {
            let (_, data) = self.executor.call_evm(ctx, request)?;
            decode_mint_output(&data.ret).map_err(|_| BridgeError::CallFailed)
        })?;
        info!(height = ctx.height(), caller, %contract, %recipient, %amount, minted, "sent to evm");
        Ok(minted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use alloy_primitives::{Address, Bytes};
    use vmbridge_types::height::ActivationHeight;
    use vmbridge_types::types::{system_account_address, EvmParams, ExecutionResult, ResultData};

    use crate::accounts::AccountKeeper;
    use crate::context::{BlockHeader, ExecMode};
    use crate::db::LedgerDb;
    use crate::evm_keeper::{ChainConfig, StaticEvmKeeper};
    use crate::executor::EvmCallExecutor;
    use crate::fixtures;
    use crate::state_diff::compute_state_diff;
    use crate::wasm::MemoryWasmRuntime;

    const TOKEN_EVM: Address = Address::new([0x42; 20]);
    const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";
    const ACTIVATION: u64 = 100;

    struct CountingExecutor {
        inner: EvmCallExecutor<StaticEvmKeeper>,
        calls: Cell<usize>,
    }

    impl CallExecutor for CountingExecutor {
        fn call_evm(
            &self,
            ctx: &mut TxContext<'_>,
            request: CallRequest,
        ) -> Result<(ExecutionResult, ResultData)> {
            self.calls.set(self.calls.get() + 1);
            self.inner.call_evm(ctx, request)
        }
    }

    type TestKeeper = BridgeKeeper<CountingExecutor, MemoryWasmRuntime>;

    fn keeper() -> TestKeeper {
        let executor = CountingExecutor {
            inner: EvmCallExecutor::new(StaticEvmKeeper::new(
                ChainConfig::new(66),
                EvmParams::default(),
            )),
            calls: Cell::new(0),
        };
        BridgeKeeper::new(
            UpgradeGate::new(ActivationHeight::At(ACTIVATION)),
            executor,
            MemoryWasmRuntime::default(),
        )
    }

    fn header(height: u64) -> BlockHeader {
        BlockHeader {
            height,
            time: 1_700_000_000,
            chain_id: 66,
        }
    }

    fn ledger(keeper: &TestKeeper, code: &[u8], enabled: bool) -> LedgerDb {
        let mut ledger = LedgerDb::new();
        ledger.deploy_contract(TOKEN_EVM, Bytes::copy_from_slice(code));
        let changes = {
            let mut ctx = TxContext::new(&ledger, header(0), ExecMode::Deliver);
            keeper
                .set_params(&mut ctx, BridgeParams { vmbridge_enable: enabled })
                .unwrap();
            ctx.into_changes().unwrap()
        };
        ledger.apply(changes);
        ledger
    }

    fn wasm_token() -> WasmAddress {
        WasmAddress::from_str(&format!("0x{}", "07".repeat(32))).unwrap()
    }

    #[test]
    fn test_params_default_to_disabled() {
        let keeper = keeper();
        let ledger = LedgerDb::new();
        let ctx = TxContext::new(&ledger, header(ACTIVATION), ExecMode::Deliver);
        assert_eq!(keeper.get_params(&ctx).unwrap(), BridgeParams::default());
    }

    #[test]
    fn test_export_genesis_only_after_activation() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, true);

        let ctx = TxContext::new(&ledger, header(ACTIVATION - 1), ExecMode::Deliver);
        assert_eq!(keeper.export_genesis(&ctx).unwrap(), None);

        let ctx = TxContext::new(&ledger, header(ACTIVATION), ExecMode::Deliver);
        let genesis = keeper.export_genesis(&ctx).unwrap().unwrap();
        assert!(genesis.params.vmbridge_enable);
    }

    #[test]
    fn test_send_to_evm_bumps_sequence_once() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, true);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![1, 2, 3], 5_000_000);

        let minted = keeper
            .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(500u64))
            .unwrap();
        assert!(minted);
        assert_eq!(ctx.state().get_sequence(system_account_address()), Some(1));

        keeper
            .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(1u64))
            .unwrap();
        assert_eq!(ctx.state().get_sequence(system_account_address()), Some(2));
        assert_eq!(keeper.executor().calls.get(), 2);
    }

    #[test]
    fn test_send_to_evm_returns_contract_answer() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_FALSE, true);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION + 1), vec![], 5_000_000);

        let minted = keeper
            .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(5u64))
            .unwrap();
        assert!(!minted);
        assert_eq!(ctx.state().get_sequence(system_account_address()), Some(1));
    }

    #[test]
    fn test_send_to_evm_undecodable_return_is_call_failed() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::GARBAGE, true);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);

        let err = keeper
            .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(5u64))
            .unwrap_err();
        assert_eq!(err, BridgeError::CallFailed);
        assert_eq!(ctx.state().get_sequence(system_account_address()), None);
    }

    #[test]
    fn test_send_to_evm_revert_leaves_state_unchanged() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::FACTORY_THEN_REVERT, true);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);

        let err = keeper
            .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(5u64))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Reverted { .. }));
        assert_eq!(ctx.state().get_sequence(system_account_address()), None);
        assert!(compute_state_diff(ctx.state()).is_empty());
        let changes = ctx.into_changes().unwrap();
        assert!(changes.contracts.iter().all(|(_, code)| code.is_empty()));
    }

    #[test]
    fn test_send_to_evm_invalid_recipient_never_executes() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, true);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);

        let err = keeper
            .send_to_evm(
                &mut ctx,
                "0xcafe",
                &TOKEN_EVM.to_string(),
                "not-an-eth-address",
                U256::from(1u64),
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidAddress { .. }));
        assert_eq!(keeper.executor().calls.get(), 0);
        assert!(compute_state_diff(ctx.state()).is_empty());

        // the contract address is validated the same way
        let err = keeper
            .send_to_evm(&mut ctx, "0xcafe", "0x42", RECIPIENT, U256::from(1u64))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidAddress { .. }));
        assert_eq!(keeper.executor().calls.get(), 0);
    }

    #[test]
    fn test_every_entry_point_rejected_below_activation() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, true);
        for height in [0, 1, ACTIVATION - 1] {
            let mut ctx = TxContext::deliver(&ledger, header(height), vec![], 5_000_000);
            let err = keeper
                .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(1u64))
                .unwrap_err();
            assert_eq!(err, BridgeError::NotSupported { height });

            let caller = WasmAddress::from(TOKEN_EVM);
            let err = keeper
                .send_to_wasm(&mut ctx, &caller, &wasm_token().to_string(), RECIPIENT, U256::from(1u64))
                .unwrap_err();
            assert_eq!(err, BridgeError::NotSupported { height });

            assert!(compute_state_diff(ctx.state()).is_empty());
            assert_eq!(ctx.gas_meter().consumed(), 0);
        }
        assert_eq!(keeper.executor().calls.get(), 0);
    }

    #[test]
    fn test_disabled_bridge() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, false);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION + 5), vec![], 5_000_000);
        let err = keeper
            .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(1u64))
            .unwrap_err();
        assert_eq!(err, BridgeError::BridgeDisabled);
        assert_eq!(keeper.executor().calls.get(), 0);
    }

    #[test]
    fn test_send_to_wasm_mints() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, true);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);
        let token = wasm_token();
        let caller = WasmAddress::from(TOKEN_EVM);
        keeper
            .wasm()
            .instantiate(&mut ctx, &token, "TOK", caller.clone())
            .unwrap();

        keeper
            .send_to_wasm(&mut ctx, &caller, &token.to_string(), RECIPIENT, U256::from(500u64))
            .unwrap();
        let recipient = WasmAddress::from_str(RECIPIENT).unwrap();
        assert_eq!(
            keeper.wasm().query_balance(&ctx, &token, &recipient).unwrap(),
            U256::from(500u64)
        );
    }

    #[test]
    fn test_send_to_wasm_failure_propagates_without_writes() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, true);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);
        let token = wasm_token();
        keeper
            .wasm()
            .instantiate(&mut ctx, &token, "TOK", WasmAddress::from(TOKEN_EVM))
            .unwrap();
        let before = compute_state_diff(ctx.state());

        let stranger = WasmAddress::from(Address::from([0x99; 20]));
        let err = keeper
            .send_to_wasm(&mut ctx, &stranger, &token.to_string(), RECIPIENT, U256::from(500u64))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Wasm(_)));
        assert_eq!(compute_state_diff(ctx.state()), before);

        let err = keeper
            .send_to_wasm(&mut ctx, &stranger, "cosmos1xyz", RECIPIENT, U256::from(500u64))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidAddress { .. }));
    }

    #[test]
    fn test_outer_abort_discards_bridge_effects() {
        let keeper = keeper();
        let mut ledger = ledger(&keeper, &fixtures::STORE_AND_MINT, true);

        {
            let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);
            keeper
                .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(1u64))
                .unwrap();
            assert!(!compute_state_diff(ctx.state()).is_empty());
            // the enclosing transaction fails later on and is dropped unapplied
        }
        assert!(!ledger.accounts.contains_key(&system_account_address()));
        assert!(!ledger.storage.contains_key(&TOKEN_EVM));

        let changes = {
            let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);
            keeper
                .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(1u64))
                .unwrap();
            ctx.into_changes().unwrap()
        };
        ledger.apply(changes);
        assert_eq!(ledger.accounts[&system_account_address()].nonce, 1);
        assert_eq!(ledger.storage[&TOKEN_EVM][&U256::ZERO], U256::from(1u64));
    }

    #[test]
    fn test_simulation_is_unmetered_and_never_persists() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, true);
        let mut ctx = TxContext::simulate(&ledger, header(ACTIVATION), vec![], None);

        assert!(keeper
            .send_to_evm(&mut ctx, "0xcafe", &TOKEN_EVM.to_string(), RECIPIENT, U256::from(1u64))
            .unwrap());
        assert_eq!(ctx.gas_meter().limit(), None);
        assert!(ctx.gas_meter().consumed() > 0);
        assert!(ctx.into_changes().is_none());
    }

    struct ReentrantRuntime;

    impl WasmRuntime for ReentrantRuntime {
        fn execute(
            &self,
            ctx: &mut TxContext<'_>,
            _contract: &WasmAddress,
            _caller: &WasmAddress,
            _msg: &[u8],
        ) -> Result<Vec<u8>> {
            // a contract that calls straight back across the bridge
            ctx.bridge_call(|_| Ok(Vec::new()))
        }
    }

    #[test]
    fn test_reentrant_bridge_call_rejected() {
        let keeper = BridgeKeeper::new(
            UpgradeGate::new(ActivationHeight::At(ACTIVATION)),
            EvmCallExecutor::new(StaticEvmKeeper::new(ChainConfig::new(66), EvmParams::default())),
            ReentrantRuntime,
        );
        let mut ledger = LedgerDb::new();
        let changes = {
            let mut ctx = TxContext::new(&ledger, header(0), ExecMode::Deliver);
            keeper
                .set_params(&mut ctx, BridgeParams { vmbridge_enable: true })
                .unwrap();
            ctx.into_changes().unwrap()
        };
        ledger.apply(changes);

        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);
        let caller = WasmAddress::from(TOKEN_EVM);
        let err = keeper
            .send_to_wasm(&mut ctx, &caller, &wasm_token().to_string(), RECIPIENT, U256::from(1u64))
            .unwrap_err();
        assert_eq!(err, BridgeError::ReentrantCall);
    }

    #[test]
    fn test_bridge_params_proposal() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, false);
        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION), vec![], 5_000_000);

        let mut registry = ProposalTypeRegistry::with_defaults();
        register_proposal_types(&mut registry).unwrap();
        assert!(matches!(
            register_proposal_types(&mut registry),
            Err(ProposalError::DuplicateType(_))
        ));

        let mut proposal = Proposal {
            id: 7,
            status: ProposalStatus::VotingPeriod,
            content: ProposalContent::BridgeParams {
                title: "enable vmbridge".into(),
                description: "turn on the bridge".into(),
                params: BridgeParams { vmbridge_enable: true },
            },
        };
        registry.validate(&proposal.content).unwrap();
        keeper.handle_proposal(&mut ctx, &proposal).unwrap();
        assert!(!keeper.get_params(&ctx).unwrap().vmbridge_enable);

        proposal.status = ProposalStatus::Passed;
        keeper.handle_proposal(&mut ctx, &proposal).unwrap();
        assert!(keeper.get_params(&ctx).unwrap().vmbridge_enable);
    }

    #[test]
    fn test_other_proposals_are_ignored() {
        let keeper = keeper();
        let ledger = ledger(&keeper, &fixtures::MINT_TRUE, true);

        let rejected = Proposal {
            id: 1,
            status: ProposalStatus::Rejected,
            content: ProposalContent::BridgeParams {
                title: "disable vmbridge".into(),
                description: "turn off the bridge".into(),
                params: BridgeParams { vmbridge_enable: false },
            },
        };
        let text = Proposal {
            id: 2,
            status: ProposalStatus::Passed,
            content: ProposalContent::Text {
                title: "hello".into(),
                description: "nothing to apply".into(),
            },
        };

        let mut ctx = TxContext::deliver(&ledger, header(ACTIVATION + 5), vec![], 5_000_000);
        keeper.handle_proposal(&mut ctx, &rejected).unwrap();
        keeper.handle_proposal(&mut ctx, &text).unwrap();
        assert!(keeper.get_params(&ctx).unwrap().vmbridge_enable);
        assert!(compute_state_diff(ctx.state()).is_empty());

        let mut early = TxContext::deliver(&ledger, header(ACTIVATION - 1), vec![], 5_000_000);
        assert_eq!(
            keeper.handle_proposal(&mut early, &text),
            Err(BridgeError::NotSupported { height: ACTIVATION - 1 })
        );
    }
}
