//! Create command implementation.

use colored::Colorize;
use synapse_client::{ApiClient, ClientConfig};
use synapse_training::error::CREATE_FAILED_MESSAGE;
use synapse_training::{CreateNetworkResponse, NetworkConfig};
use tracing::warn;

use super::user_error;

/// Execute the create command.
pub async fn execute(
    config: &ClientConfig,
    hidden1: u32,
    hidden2: u32,
    single_layer: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    let network = NetworkConfig { hidden_layer_1: hidden1, hidden_layer_2: hidden2, use_second_layer: !single_layer };
    let api = ApiClient::new(config.api_url.clone());
    let response = create_network(&api, &network).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{} {}", "✓".green(), "Network created".bold());
    println!("  ID:     {}", response.network_id.as_str().cyan());
    println!("  Layers: {}", format_layers(&response.layer_sizes));
    println!();
    println!("  {}", format!("Train it with: synapse train --network {}", response.network_id).dimmed());
    Ok(())
}

/// Create `network`, mapping failures to what the user should see.
pub async fn create_network(api: &ApiClient, network: &NetworkConfig) -> anyhow::Result<CreateNetworkResponse> {
    match api.create_network(network).await {
        Ok(response) => Ok(response),
        Err(e @ synapse_client::ClientError::Training(_)) => Err(user_error(&e)),
        Err(e) => {
            warn!(error = %e, "Network creation failed");
            Err(anyhow::anyhow!(CREATE_FAILED_MESSAGE))
        }
    }
}

pub fn format_layers(layers: &[u32]) -> String {
    layers.iter().map(ToString::to_string).collect::<Vec<_>>().join(" → ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_layers() {
        assert_eq!(format_layers(&[784, 128, 10]), "784 → 128 → 10");
    }
}
