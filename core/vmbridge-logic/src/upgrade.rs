// SPDX-License-Identifier: MIT
use tracing::debug;

use vmbridge_types::height::{ActivationHeight, HeightPhase};
use vmbridge_types::types::BridgeParams;
use vmbridge_types::{BridgeError, Result};

/// Activation predicate in front of every bridge entry point.
///
/// Below the activation height nothing is reachable. At or above it the
/// bridge is live, subject to the operator's `vmbridge_enable` switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeGate {
    activation: ActivationHeight,
}

impl UpgradeGate {
    pub fn new(activation: ActivationHeight) -> Self {
        UpgradeGate { activation }
    }

    pub fn activation(&self) -> ActivationHeight {
        self.activation
    }

    pub fn phase(&self, height: u64) -> HeightPhase {
        self.activation.phase(height)
    }

    pub fn is_live(&self, height: u64) -> bool {
        self.phase(height).is_live()
    }

    pub fn check(&self, height: u64) -> Result<()> {
        if !self.is_live(height) {
            debug!(height, activation = ?self.activation, "bridge not yet active");
            return Err(BridgeError::NotSupported { height });
        }
        Ok(())
    }

    /// Height check followed by the kill-switch.
    pub fn check_enabled(&self, height: u64, params: &BridgeParams) -> Result<()> {
        self.check(height)?;
        if !params.vmbridge_enable {
            return Err(BridgeError::BridgeDisabled);
        }
        Ok(())
    }
}
