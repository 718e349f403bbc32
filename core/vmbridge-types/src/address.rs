// SPDX-License-Identifier: MIT
use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

fn is_hex_body(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// True if `s` is `0x` followed by exactly 40 hex characters.
pub fn is_evm_address(s: &str) -> bool {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(body) => body.len() == 40 && is_hex_body(body),
        None => false,
    }
}

/// Parse an EVM address string, rejecting anything but `0x` + 40 hex chars.
pub fn parse_evm_address(s: &str) -> Result<Address> {
    if !is_evm_address(s) {
        return Err(BridgeError::invalid_address(
            s,
            "expected 0x followed by 40 hex characters",
        ));
    }
    Address::from_str(s).map_err(|e| BridgeError::invalid_address(s, e.to_string()))
}

/// Address of a WASM-side account or contract: 20 or 32 bytes.
///
/// Rendered as lowercase `0x`-hex, which is also the form WASM contracts see
/// in their messages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WasmAddress(Vec<u8>);

impl WasmAddress {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for WasmAddress {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| BridgeError::invalid_address(s, "address must start with 0x"))?;
        if body.len() != 40 && body.len() != 64 {
            return Err(BridgeError::invalid_address(
                s,
                "expected 20 or 32 bytes of hex",
            ));
        }
        let bytes = hex::decode(body).map_err(|e| BridgeError::invalid_address(s, e.to_string()))?;
        Ok(WasmAddress(bytes))
    }
}

impl TryFrom<String> for WasmAddress {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<WasmAddress> for String {
    fn from(value: WasmAddress) -> Self {
        value.to_string()
    }
}

/// An EVM contract acting on the WASM side keeps its 20 address bytes.
impl From<Address> for WasmAddress {
    fn from(value: Address) -> Self {
        WasmAddress(value.to_vec())
    }
}

impl fmt::Display for WasmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_evm_address() {
        assert!(is_evm_address("0x000000000000000000000000000000000000dEaD"));
        assert!(!is_evm_address("000000000000000000000000000000000000dEaD"));
        assert!(!is_evm_address("0x00000000000000000000000000000000000dEaD"));
        assert!(!is_evm_address("0x000000000000000000000000000000000000dEaG"));
        assert!(!is_evm_address("not-an-eth-address"));
    }

    #[test]
    fn test_parse_evm_address() {
        let addr = parse_evm_address("0x000000000000000000000000000000000000dead").unwrap();
        assert_eq!(addr.as_slice()[18..], [0xde, 0xad]);

        let err = parse_evm_address("not-an-eth-address").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidAddress { .. }));
    }

    #[test]
    fn test_wasm_address_lengths() {
        let short: WasmAddress = "0x000000000000000000000000000000000000beef".parse().unwrap();
        assert_eq!(short.as_bytes().len(), 20);

        let long: WasmAddress = format!("0x{}", "ab".repeat(32)).parse().unwrap();
        assert_eq!(long.as_bytes().len(), 32);

        assert!("0xabcd".parse::<WasmAddress>().is_err());
        assert!("cosmos1xyz".parse::<WasmAddress>().is_err());
    }

    #[test]
    fn test_wasm_address_from_evm_contract() {
        let contract = Address::from([0x11; 20]);
        let wasm = WasmAddress::from(contract);
        assert_eq!(wasm.to_string(), format!("0x{}", "11".repeat(20)));
    }
}
