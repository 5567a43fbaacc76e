//! Demo command implementation.
//!
//! Walks the guided flow in order. Each step is entered through the same
//! navigation guards the sections use, so the test step is only reached after
//! training completed.

use std::sync::Arc;

use anyhow::bail;
use colored::Colorize;
use synapse_client::{ApiClient, ClientConfig};
use synapse_training::{AppSection, AppState, ExampleKind, TrainingConfig};
use tokio::sync::RwLock;

use super::{create, test, train};
use crate::render;

const LEARN_TEXT: &[&str] = &[
    "A neural network turns the 784 pixels of a 28x28 digit image into ten scores,",
    "one per digit. Training shows it labelled examples and nudges its weights so",
    "the right score wins more often. Accuracy is measured on digits it never saw.",
];

/// Execute the demo command.
pub async fn execute(config: &ClientConfig, epochs: u32) -> anyhow::Result<()> {
    let state = Arc::new(RwLock::new(AppState::new()));
    let api = ApiClient::new(config.api_url.clone());

    render::print_header("1. Learn");
    for line in LEARN_TEXT {
        println!("  {line}");
    }

    enter(&state, AppSection::Create).await?;
    render::print_header("2. Create");
    let network = state.read().await.network_config().clone();
    let created = create::create_network(&api, &network).await?;
    println!("  {} Network {} ({})", "✓".green(), created.network_id.as_str().cyan(), create::format_layers(&created.layer_sizes));
    {
        let mut state = state.write().await;
        state.set_network_id(created.network_id);
        state.set_training_config(TrainingConfig { epochs, ..TrainingConfig::default() });
    }

    enter(&state, AppSection::Train).await?;
    render::print_header("3. Train");
    let view = train::run_training(config, Arc::clone(&state), false).await?;
    if !view.training_complete {
        bail!(view.error.unwrap_or_else(|| "Training interrupted".to_string()));
    }

    enter(&state, AppSection::Test).await?;
    let network_id = state.read().await.network_id().cloned();
    for kind in [ExampleKind::Successful, ExampleKind::Unsuccessful] {
        let examples = test::fetch(&api, network_id.as_ref(), kind, false).await?;
        test::print_examples(kind, &examples);
    }

    println!();
    println!("{}", "Demo complete.".bold());
    Ok(())
}

async fn enter(state: &RwLock<AppState>, section: AppSection) -> anyhow::Result<()> {
    if !state.write().await.switch_section(section) {
        bail!("Cannot open the {section} step yet");
    }
    Ok(())
}
