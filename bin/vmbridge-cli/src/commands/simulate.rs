// SPDX-License-Identifier: MIT
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, Log, U256};
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use tracing::{info, warn};

use vmbridge_logic::context::{BlockHeader, ExecMode, TxContext};
use vmbridge_logic::db::LedgerDb;
use vmbridge_logic::events::{EventRegistry, SendToWasmEventHandler};
use vmbridge_logic::evm_keeper::{ChainConfig, StaticEvmKeeper};
use vmbridge_logic::executor::EvmCallExecutor;
use vmbridge_logic::fixtures;
use vmbridge_logic::keeper::BridgeKeeper;
use vmbridge_logic::state_diff::compute_state_diff;
use vmbridge_logic::store_filter::StoreFilters;
use vmbridge_logic::upgrade::UpgradeGate;
use vmbridge_logic::wasm::MemoryWasmRuntime;
use vmbridge_types::abi::{send_to_wasm_event_id, BridgeEvent};
use vmbridge_types::address::WasmAddress;
use vmbridge_types::types::{BridgeParams, EvmParams, GenesisState, StateDiff};

use crate::config::NodeConfig;

type Keeper = BridgeKeeper<EvmCallExecutor<StaticEvmKeeper>, MemoryWasmRuntime>;

/// EVM side of the demo token pair.
const DEMO_EVM_TOKEN: Address = Address::new([0x42; 20]);
/// WASM side of the demo token pair.
const DEMO_WASM_TOKEN: &str = "0x0707070707070707070707070707070707070707070707070707070707070707";
const DEMO_BLOCK_TIME: u64 = 1_700_000_000;

#[derive(Subcommand, Debug)]
pub enum SimulateCommand {
    /// WASM → EVM: call mintERC20 on the demo token from the system account.
    SendToEvm(SendToEvmArgs),

    /// EVM → WASM: dispatch a SendToWasm log emitted by the demo token.
    SendToWasm(SendToWasmArgs),
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Block height to execute at.
    #[arg(long)]
    pub height: u64,

    /// Decimal token amount.
    #[arg(long, default_value = "1000")]
    pub amount: String,

    /// Recipient address.
    #[arg(long, default_value = "0x00000000000000000000000000000000000000aa")]
    pub recipient: String,

    /// Run as a delivered transaction with this gas limit, then commit the
    /// block. Without it the call runs in an unmetered simulation context.
    #[arg(long)]
    pub gas_limit: Option<u64>,

    /// Start with the bridge switched off.
    #[arg(long)]
    pub disabled: bool,
}

/// Behaviour of the demo EVM token.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemoToken {
    /// Returns true.
    Mint,
    /// Writes storage, then returns true.
    StoreAndMint,
    /// Returns false.
    Refuse,
    /// Reverts.
    Revert,
    /// Returns data that is not a bool.
    Garbage,
    /// Deploys a child contract, then returns true.
    Factory,
}

impl DemoToken {
    fn code(self) -> &'static [u8] {
        match self {
            DemoToken::Mint => &fixtures::MINT_TRUE,
            DemoToken::StoreAndMint => &fixtures::STORE_AND_MINT,
            DemoToken::Refuse => &fixtures::MINT_FALSE,
            DemoToken::Revert => &fixtures::REVERT,
            DemoToken::Garbage => &fixtures::GARBAGE,
            DemoToken::Factory => &fixtures::FACTORY,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendToEvmArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// WASM-side caller recorded in the mint call.
    #[arg(long, default_value = DEMO_WASM_TOKEN)]
    pub caller: String,

    /// Target EVM contract. Defaults to the demo token.
    #[arg(long)]
    pub contract: Option<String>,

    /// Behaviour of the demo token contract.
    #[arg(long, value_enum, default_value_t = DemoToken::Mint)]
    pub token: DemoToken,
}

#[derive(Args, Debug)]
pub struct SendToWasmArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Contract that emits the log. Only the demo token may mint.
    #[arg(long)]
    pub emitter: Option<String>,

    /// Hex payload to use as log data instead of a well-formed event.
    #[arg(long)]
    pub raw_data: Option<String>,
}

fn demo_keeper(config: &NodeConfig) -> Keeper {
    let evm_keeper = StaticEvmKeeper::new(
        ChainConfig::new(config.chain_id),
        EvmParams {
            max_gas_limit_per_tx: config.max_gas_limit_per_tx,
        },
    );
    BridgeKeeper::new(
        UpgradeGate::new(config.activation_height),
        EvmCallExecutor::new(evm_keeper),
        MemoryWasmRuntime::new(config.wasm.clone()),
    )
}

/// Ledger with the demo token pair and the bridge genesis state.
fn demo_ledger(
    keeper: &Keeper,
    config: &NodeConfig,
    token: DemoToken,
    disabled: bool,
) -> Result<LedgerDb> {
    let mut ledger = LedgerDb::new();
    ledger.deploy_contract(DEMO_EVM_TOKEN, Bytes::from_static(token.code()));

    let genesis = GenesisState {
        params: BridgeParams {
            vmbridge_enable: config.vmbridge_enable && !disabled,
        },
    };
    let changes = {
        let header = BlockHeader {
            height: 0,
            time: DEMO_BLOCK_TIME,
            chain_id: config.chain_id,
        };
        let mut ctx = TxContext::new(&ledger, header, ExecMode::Deliver);
        keeper.init_genesis(&mut ctx, &genesis)?;
        let wasm_token = WasmAddress::from_str(DEMO_WASM_TOKEN)?;
        keeper
            .wasm()
            .instantiate(&mut ctx, &wasm_token, "DEMO", WasmAddress::from(DEMO_EVM_TOKEN))?;
        ctx.into_changes()
            .context("genesis context produced no changes")?
    };
    ledger.apply(changes);
    Ok(ledger)
}

fn tx_context<'a>(ledger: &'a LedgerDb, config: &NodeConfig, common: &CommonArgs) -> TxContext<'a> {
    let header = BlockHeader {
        height: common.height,
        time: DEMO_BLOCK_TIME + common.height,
        chain_id: config.chain_id,
    };
    let tx_bytes = format!("vmbridge-simulate-{}", common.height).into_bytes();
    match common.gas_limit {
        Some(limit) => TxContext::deliver(ledger, header, tx_bytes, limit),
        None => TxContext::simulate(ledger, header, tx_bytes, config.wasm.simulation_gas_limit),
    }
}

fn parse_amount(raw: &str) -> Result<U256> {
    U256::from_str_radix(raw, 10).with_context(|| format!("invalid amount {raw:?}"))
}

struct Outcome {
    error: Option<String>,
    minted: Option<bool>,
    gas_used: u64,
    diff: StateDiff,
    balance: Option<U256>,
    committed: Option<serde_json::Value>,
}

/// Run one bridge call in a fresh transaction context. A delivered,
/// successful transaction is applied and its block committed through the
/// store filters; anything else is discarded whole.
fn execute(
    ledger: &mut LedgerDb,
    config: &NodeConfig,
    common: &CommonArgs,
    call: impl FnOnce(&mut TxContext<'_>) -> vmbridge_types::Result<Option<bool>>,
    balance: impl FnOnce(&TxContext<'_>) -> Option<U256>,
) -> Outcome {
    let (result, gas_used, diff, balance, changes) = {
        let mut ctx = tx_context(ledger, config, common);
        let result = call(&mut ctx);
        let gas_used = ctx.gas_meter().consumed();
        let diff = compute_state_diff(ctx.state());
        let balance = balance(&ctx);
        let changes = match result {
            Ok(_) => ctx.into_changes(),
            Err(_) => None,
        };
        (result, gas_used, diff, balance, changes)
    };

    let (minted, error) = match result {
        Ok(minted) => (minted, None),
        Err(e) => {
            warn!(error = %e, category = ?e.category(), "bridge call failed");
            (None, Some(e.to_string()))
        }
    };

    let committed = changes.map(|changes| {
        ledger.apply(changes);
        let filters = StoreFilters::bridge(config.activation_height);
        let decisions = ledger.commit_block(common.height, &filters);
        info!(height = common.height, modules = decisions.len(), "block committed");
        serde_json::json!(decisions)
    });

    Outcome {
        error,
        minted,
        gas_used,
        diff,
        balance,
        committed,
    }
}

fn report(outcome: &Outcome, config: &NodeConfig, height: u64, json_output: bool) -> Result<()> {
    let phase = config.activation_height.phase(height);
    if json_output {
        let out = serde_json::json!({
            "height": height,
            "activation_height": config.activation_height,
            "phase": format!("{phase:?}"),
            "success": outcome.error.is_none(),
            "error": outcome.error,
            "minted": outcome.minted,
            "gas_used": outcome.gas_used,
            "recipient_balance": outcome.balance.map(|b| b.to_string()),
            "state_diff": outcome.diff,
            "commit": outcome.committed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Simulation at height {height} ({phase:?}):");
    match &outcome.error {
        None => println!("  success"),
        Some(e) => println!("  failed: {e}"),
    }
    if let Some(minted) = outcome.minted {
        println!("  mintERC20 returned: {minted}");
    }
    if let Some(balance) = outcome.balance {
        println!("  recipient balance: {balance}");
    }
    println!("  gas used: {}", outcome.gas_used);

    use vmbridge_types::types::Delta;
    if outcome.diff.is_empty() {
        println!("  no state changes");
    }
    for (addr, diff) in &outcome.diff.accounts {
        match &diff.nonce {
            Delta::Changed { from, to } => println!("  {addr}: Nonce {from} -> {to}"),
            Delta::Added(val) => println!("  {addr}: Nonce (New) {val}"),
            _ => {}
        }
        match &diff.code_hash {
            Delta::Added(hash) | Delta::Changed { to: hash, .. } => {
                println!("  {addr}: Code {hash}")
            }
            _ => {}
        }
        for (slot, delta) in &diff.storage {
            match delta {
                Delta::Changed { from, to } => println!("  {addr}: Slot {slot:#x} {from:#x} -> {to:#x}"),
                Delta::Added(val) => println!("  {addr}: Slot {slot:#x} (New) {val:#x}"),
                Delta::Removed(_) => println!("  {addr}: Slot {slot:#x} (Cleared)"),
                Delta::Unchanged => {}
            }
        }
    }
    for (module, writes) in &outcome.diff.modules {
        for key in writes.keys() {
            let key = hex::decode(key)
                .ok()
                .and_then(|raw| String::from_utf8(raw).ok())
                .unwrap_or_else(|| key.clone());
            println!("  {module}: write {key}");
        }
    }
    if let Some(committed) = &outcome.committed {
        println!("  block commit: {committed}");
    }
    Ok(())
}

pub fn run(cmd: SimulateCommand, config: &NodeConfig, json_output: bool) -> Result<()> {
    match cmd {
        SimulateCommand::SendToEvm(args) => send_to_evm(args, config, json_output),
        SimulateCommand::SendToWasm(args) => send_to_wasm(args, config, json_output),
    }
}

fn send_to_evm(args: SendToEvmArgs, config: &NodeConfig, json_output: bool) -> Result<()> {
    let keeper = demo_keeper(config);
    let mut ledger = demo_ledger(&keeper, config, args.token, args.common.disabled)?;
    let amount = parse_amount(&args.common.amount)?;
    let contract = args
        .contract
        .clone()
        .unwrap_or_else(|| DEMO_EVM_TOKEN.to_string());

    let outcome = execute(
        &mut ledger,
        config,
        &args.common,
        |ctx| {
            keeper
                .send_to_evm(ctx, &args.caller, &contract, &args.common.recipient, amount)
                .map(Some)
        },
        |_| None,
    );
    report(&outcome, config, args.common.height, json_output)
}

fn send_to_wasm(args: SendToWasmArgs, config: &NodeConfig, json_output: bool) -> Result<()> {
    let keeper = Arc::new(demo_keeper(config));
    let mut ledger = demo_ledger(&keeper, config, DemoToken::Mint, args.common.disabled)?;
    let amount = parse_amount(&args.common.amount)?;

    let mut registry = EventRegistry::new();
    registry.register(SendToWasmEventHandler::new(keeper.clone()))?;

    let emitter = match &args.emitter {
        Some(raw) => Address::from_str(raw).with_context(|| format!("invalid emitter {raw:?}"))?,
        None => DEMO_EVM_TOKEN,
    };
    let data = match &args.raw_data {
        Some(raw) => {
            hex::decode(raw.trim_start_matches("0x")).context("invalid --raw-data hex")?
        }
        None => BridgeEvent::SendToWasm {
            wasm_addr: DEMO_WASM_TOKEN.to_string(),
            recipient: args.common.recipient.clone(),
            amount,
        }
        .encode_data(),
    };
    let log = Log::new_unchecked(emitter, vec![send_to_wasm_event_id()], Bytes::from(data));

    let wasm_token = WasmAddress::from_str(DEMO_WASM_TOKEN)?;
    let recipient = WasmAddress::from_str(&args.common.recipient).ok();
    let outcome = execute(
        &mut ledger,
        config,
        &args.common,
        |ctx| registry.dispatch_logs(ctx, std::slice::from_ref(&log)).map(|()| None),
        |ctx| {
            let recipient = recipient.as_ref()?;
            keeper.wasm().query_balance(ctx, &wasm_token, recipient).ok()
        },
    );
    report(&outcome, config, args.common.height, json_output)
}
