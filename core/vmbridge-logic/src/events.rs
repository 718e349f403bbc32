// SPDX-License-Identifier: MIT
//! EVM log → bridge handler dispatch.
//!
//! The registry is filled once while the node starts and only read after
//! that. Log data comes from arbitrary contracts, so a payload that does not
//! decode is logged and skipped instead of failing the block.
use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Address, Log, B256};
use tracing::{debug, error};

use vmbridge_types::abi::{decode_send_to_wasm, send_to_wasm_event_id, BridgeEvent};
use vmbridge_types::address::WasmAddress;
use vmbridge_types::{BridgeError, Result};

use crate::context::TxContext;
use crate::executor::CallExecutor;
use crate::keeper::BridgeKeeper;
use crate::wasm::WasmRuntime;

pub trait EventHandler {
    /// Signature hash of the log this handler consumes.
    fn event_id(&self) -> B256;

    /// Runs before the payload is decoded; an error here is returned as is.
    fn precheck(&self, _ctx: &TxContext<'_>) -> Result<()> {
        Ok(())
    }

    fn decode(&self, data: &[u8]) -> std::result::Result<BridgeEvent, alloy_sol_types::Error>;

    fn handle(&self, ctx: &mut TxContext<'_>, contract: Address, event: BridgeEvent) -> Result<()>;
}

#[derive(Default)]
pub struct EventRegistry {
    handlers: BTreeMap<B256, Box<dyn EventHandler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: impl EventHandler + 'static) -> Result<()> {
        let id = handler.event_id();
        if self.handlers.contains_key(&id) {
            return Err(BridgeError::DuplicateHandler(id));
        }
        self.handlers.insert(id, Box::new(handler));
        Ok(())
    }

    pub fn is_registered(&self, signature: &B256) -> bool {
        self.handlers.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(
        &self,
        ctx: &mut TxContext<'_>,
        signature: B256,
        contract: Address,
        data: &[u8],
    ) -> Result<()> {
        let Some(handler) = self.handlers.get(&signature) else {
            return Ok(());
        };
        handler.precheck(ctx)?;
        let event = match handler.decode(data) {
            Ok(event) => event,
            Err(e) => {
                error!(%signature, %contract, error = %e, "log signature matches but failed to decode");
                return Ok(());
            }
        };
        debug!(%signature, %contract, "dispatching bridge event");
        handler.handle(ctx, contract, event)
    }

    /// Dispatch the logs of one receipt in order, stopping at the first
    /// handler error.
    pub fn dispatch_logs(&self, ctx: &mut TxContext<'_>, logs: &[Log]) -> Result<()> {
        for log in logs {
            if let Some(signature) = log.topics().first() {
                self.dispatch(ctx, *signature, log.address, &log.data.data)?;
            }
        }
        Ok(())
    }
}

/// Turns `SendToWasm` logs into [`BridgeKeeper::send_to_wasm`] calls made on
/// behalf of the emitting contract.
pub struct SendToWasmEventHandler<E, W> {
    keeper: Arc<BridgeKeeper<E, W>>,
}

impl<E, W> SendToWasmEventHandler<E, W> {
    pub fn new(keeper: Arc<BridgeKeeper<E, W>>) -> Self {
        SendToWasmEventHandler { keeper }
    }
}

impl<E: CallExecutor, W: WasmRuntime> EventHandler for SendToWasmEventHandler<E, W> {
    fn event_id(&self) -> B256 {
        send_to_wasm_event_id()
    }

    fn precheck(&self, ctx: &TxContext<'_>) -> Result<()> {
        self.keeper.ensure_live(ctx)
    }

    fn decode(&self, data: &[u8]) -> std::result::Result<BridgeEvent, alloy_sol_types::Error> {
        decode_send_to_wasm(data)
    }

    fn handle(&self, ctx: &mut TxContext<'_>, contract: Address, event: BridgeEvent) -> Result<()> {
        match event {
            BridgeEvent::SendToWasm {
                wasm_addr,
                recipient,
                amount,
            } => {
                let caller = WasmAddress::from(contract);
                self.keeper
                    .send_to_wasm(ctx, &caller, &wasm_addr, &recipient, amount)
            }
        }
    }
}
