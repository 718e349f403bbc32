// SPDX-License-Identifier: MIT
use anyhow::Result;
use clap::Args;

use vmbridge_logic::store_filter::StoreFilters;

use crate::config::NodeConfig;

#[derive(Args, Debug)]
pub struct FiltersArgs {
    /// Block height to evaluate.
    #[arg(long)]
    pub height: u64,

    /// Other module stores to report, e.g. `--module evm`.
    #[arg(long = "module")]
    pub modules: Vec<String>,
}

pub fn run(args: FiltersArgs, config: &NodeConfig, json_output: bool) -> Result<()> {
    let filters = StoreFilters::bridge(config.activation_height);
    let phase = config.activation_height.phase(args.height);

    let mut modules = vec![
        vmbridge_types::constants::MODULE_NAME.to_string(),
        vmbridge_types::constants::WASM_MODULE_NAME.to_string(),
    ];
    modules.extend(args.modules);

    let rows: Vec<_> = modules
        .iter()
        .map(|module| {
            (
                module.as_str(),
                filters.governs(module),
                filters.commit(module, args.height, None),
                filters.may_prune(module, args.height),
            )
        })
        .collect();
    let versions: Vec<_> = filters.versions().collect();

    if json_output {
        let out = serde_json::json!({
            "height": args.height,
            "activation_height": config.activation_height,
            "phase": format!("{phase:?}"),
            "modules": rows
                .iter()
                .map(|(module, governed, commit, prune)| serde_json::json!({
                    "module": module,
                    "governed": governed,
                    "commit": commit,
                    "may_prune": prune,
                }))
                .collect::<Vec<_>>(),
            "versions": versions
                .iter()
                .map(|(module, floor)| serde_json::json!({ "module": module, "floor": floor }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    match config.activation_height.height() {
        Some(h) => println!("height {} ({phase:?} activation at {h})", args.height),
        None => println!("height {} (bridge never activated)", args.height),
    }
    for (module, governed, commit, prune) in &rows {
        let note = if *governed { "" } else { " (not governed)" };
        println!("  {module}: commit {commit:?}, may prune {prune}{note}");
    }
    if versions.is_empty() {
        println!("  versions: none");
    }
    for (module, floor) in versions {
        println!("  versions: {module} from {floor}");
    }
    Ok(())
}
