//! CLI configuration loading and merging.

use anyhow::{Context, Result};
use synapse_client::ClientConfig;

/// Values given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub websocket_url: Option<String>,
    pub log_level: Option<String>,
}

/// Load and merge client configuration.
///
/// Configuration precedence:
/// 1. CLI arguments
/// 2. Environment variables (SYNAPSE_*)
/// 3. Local config file (./.synapserc)
/// 4. Global config file (~/.synapse/config.toml)
/// 5. Defaults
pub fn load_config(overrides: Overrides) -> Result<ClientConfig> {
    let mut config = ClientConfig::discover_and_load().context("Failed to load configuration")?;
    apply_overrides(&mut config, overrides);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut ClientConfig, overrides: Overrides) {
    if let Some(api_url) = overrides.api_url {
        config.api_url = api_url;
    }
    if let Some(websocket_url) = overrides.websocket_url {
        config.websocket_url = websocket_url;
    }
    if let Some(log_level) = overrides.log_level {
        config.log_level = Some(log_level);
    }
}
