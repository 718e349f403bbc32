// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use vmbridge_types::constants::DEFAULT_MAX_GAS_LIMIT_PER_TX;
use vmbridge_types::height::ActivationHeight;
use vmbridge_types::types::WasmConfig;

pub const DEFAULT_CHAIN_ID: u64 = 66;

const ENV_ACTIVATION_HEIGHT: &str = "VMBRIDGE_ACTIVATION_HEIGHT";
const ENV_MEMORY_CACHE_SIZE: &str = "VMBRIDGE_WASM_MEMORY_CACHE_SIZE";
const ENV_QUERY_GAS_LIMIT: &str = "VMBRIDGE_WASM_QUERY_GAS_LIMIT";
const ENV_SIMULATION_GAS_LIMIT: &str = "VMBRIDGE_WASM_SIMULATION_GAS_LIMIT";
const ENV_TRACE: &str = "VMBRIDGE_TRACE";

/// Node configuration, resolved once at startup and passed down by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub activation_height: ActivationHeight,
    pub chain_id: u64,
    pub max_gas_limit_per_tx: u64,
    /// Genesis value of the bridge's enable switch.
    pub vmbridge_enable: bool,
    pub wasm: WasmConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            activation_height: ActivationHeight::Unset,
            chain_id: DEFAULT_CHAIN_ID,
            max_gas_limit_per_tx: DEFAULT_MAX_GAS_LIMIT_PER_TX,
            vmbridge_enable: true,
            wasm: WasmConfig::default(),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub activation_height: Option<i64>,
    pub chain_id: Option<u64>,
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value {value:?} for {name}"))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => anyhow::bail!("invalid value {value:?} for {name}"),
    }
}

impl NodeConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse config file")
    }

    /// Apply environment variables, looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = var(ENV_ACTIVATION_HEIGHT) {
            self.activation_height = ActivationHeight::from_raw(parse_env(ENV_ACTIVATION_HEIGHT, &raw)?);
        }
        if let Some(raw) = var(ENV_MEMORY_CACHE_SIZE) {
            self.wasm.memory_cache_size = parse_env(ENV_MEMORY_CACHE_SIZE, &raw)?;
        }
        if let Some(raw) = var(ENV_QUERY_GAS_LIMIT) {
            self.wasm.smart_query_gas_limit = parse_env(ENV_QUERY_GAS_LIMIT, &raw)?;
        }
        if let Some(raw) = var(ENV_SIMULATION_GAS_LIMIT) {
            // set but empty means no limit
            self.wasm.simulation_gas_limit = if raw.trim().is_empty() {
                None
            } else {
                Some(parse_env(ENV_SIMULATION_GAS_LIMIT, &raw)?)
            };
        }
        if let Some(raw) = var(ENV_TRACE) {
            self.wasm.contract_debug_mode = parse_flag(ENV_TRACE, &raw)?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(raw) = overrides.activation_height {
            self.activation_height = ActivationHeight::from_raw(raw);
        }
        if let Some(chain_id) = overrides.chain_id {
            self.chain_id = chain_id;
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|h| h.join(".vmbridge").join("config.toml"))
}

/// Resolve the configuration: CLI flags, then environment, then config file,
/// then defaults.
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<NodeConfig> {
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            NodeConfig::from_toml(&contents)?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                NodeConfig::from_toml(&contents)?
            }
            None => NodeConfig::default(),
        },
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    config.apply_overrides(overrides);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.activation_height, ActivationHeight::Unset);
        assert_eq!(config.max_gas_limit_per_tx, 30_000_000);
        assert_eq!(config.wasm.memory_cache_size, 100);
        assert_eq!(config.wasm.simulation_gas_limit, None);
    }

    #[test]
    fn test_file_fills_missing_fields() {
        let config = NodeConfig::from_toml(
            r#"
            activation_height = 100
            [wasm]
            simulation_gas_limit = 50000
            "#,
        )
        .unwrap();
        assert_eq!(config.activation_height, ActivationHeight::At(100));
        assert_eq!(config.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(config.wasm.simulation_gas_limit, Some(50_000));
        assert_eq!(config.wasm.smart_query_gas_limit, 3_000_000);
    }

    #[test]
    fn test_file_activation_sentinel_is_unset() {
        for raw in ["-1", "0"] {
            let config = NodeConfig::from_toml(&format!("activation_height = {raw}")).unwrap();
            assert_eq!(config.activation_height, ActivationHeight::Unset, "{raw}");
        }

        // round-trips through the printed form
        let printed = toml::to_string(&NodeConfig::default()).unwrap();
        let reloaded = NodeConfig::from_toml(&printed).unwrap();
        assert_eq!(reloaded.activation_height, ActivationHeight::Unset);
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let mut config = NodeConfig::from_toml("activation_height = 100").unwrap();
        config
            .apply_env(env(&[(ENV_ACTIVATION_HEIGHT, "200")]))
            .unwrap();
        assert_eq!(config.activation_height, ActivationHeight::At(200));

        config.apply_overrides(&Overrides {
            activation_height: Some(300),
            chain_id: None,
        });
        assert_eq!(config.activation_height, ActivationHeight::At(300));

        config.apply_overrides(&Overrides {
            activation_height: Some(-1),
            chain_id: Some(1),
        });
        assert_eq!(config.activation_height, ActivationHeight::Unset);
        assert_eq!(config.chain_id, 1);
    }

    #[test]
    fn test_simulation_gas_limit_env() {
        let mut config = NodeConfig::from_toml("[wasm]\nsimulation_gas_limit = 7").unwrap();
        config
            .apply_env(env(&[(ENV_SIMULATION_GAS_LIMIT, "")]))
            .unwrap();
        assert_eq!(config.wasm.simulation_gas_limit, None);

        config
            .apply_env(env(&[(ENV_SIMULATION_GAS_LIMIT, "25000")]))
            .unwrap();
        assert_eq!(config.wasm.simulation_gas_limit, Some(25_000));

        assert!(config
            .apply_env(env(&[(ENV_SIMULATION_GAS_LIMIT, "lots")]))
            .is_err());
    }

    #[test]
    fn test_trace_and_cache_env() {
        let mut config = NodeConfig::default();
        config
            .apply_env(env(&[(ENV_TRACE, "true"), (ENV_MEMORY_CACHE_SIZE, "256")]))
            .unwrap();
        assert!(config.wasm.contract_debug_mode);
        assert_eq!(config.wasm.memory_cache_size, 256);
        assert!(config.apply_env(env(&[(ENV_TRACE, "maybe")])).is_err());
    }
}
