//! Config command implementation.

use synapse_client::ClientConfig;

/// Execute the config command: print the effective configuration.
pub fn execute(config: &ClientConfig, json_output: bool) -> anyhow::Result<()> {
    let rendered =
        if json_output { serde_json::to_string_pretty(config)? } else { toml::to_string_pretty(config)? };
    println!("{rendered}");
    Ok(())
}
