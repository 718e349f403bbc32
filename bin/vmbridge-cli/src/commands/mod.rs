// SPDX-License-Identifier: MIT
pub mod event_id;
pub mod filters;
pub mod simulate;

use anyhow::Result;

use crate::config::NodeConfig;

pub fn show_config(config: &NodeConfig, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
