// SPDX-License-Identifier: MIT
use anyhow::Result;
use alloy_sol_types::SolCall;

use vmbridge_types::abi::{mintERC20Call, send_to_wasm_event_id};
use vmbridge_types::types::system_account_address;

pub fn run(json_output: bool) -> Result<()> {
    let event_id = send_to_wasm_event_id();
    let selector = hex::encode(mintERC20Call::SELECTOR);

    if json_output {
        let out = serde_json::json!({
            "send_to_wasm_event_id": event_id,
            "send_to_wasm_signature": "SendToWasm(string,string,uint256)",
            "mint_erc20_selector": format!("0x{selector}"),
            "mint_erc20_signature": mintERC20Call::SIGNATURE,
            "system_account": system_account_address(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("SendToWasm(string,string,uint256)");
    println!("  event id: {event_id}");
    println!("{}", mintERC20Call::SIGNATURE);
    println!("  selector: 0x{selector}");
    println!("system account: {}", system_account_address());
    Ok(())
}
