//! Train command implementation.
//!
//! Opens the event connection, keeps it alive, attaches a training session and
//! renders its status until the run completes, fails, or the user interrupts.

use std::sync::Arc;

use anyhow::{Context, bail};
use colored::Colorize;
use synapse_client::{ApiClient, ClientConfig, EventConnection, KeepaliveMonitor, TrainingSession};
use synapse_training::{AppState, NetworkId, TrainingConfig, TrainingStatusView};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::render::{self, TrainingProgress};

/// Execute the train command.
pub async fn execute(
    config: &ClientConfig,
    network: String,
    epochs: u32,
    batch_size: u32,
    learning_rate: f64,
    json_output: bool,
) -> anyhow::Result<()> {
    let network_id = NetworkId::new(network);
    if network_id.is_blank() {
        bail!("Network ID must not be empty");
    }
    let training = TrainingConfig { epochs, mini_batch_size: batch_size, learning_rate };
    training.validate().map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let mut state = AppState::new();
    state.set_network_id(network_id.clone());
    state.set_training_config(training.clone());
    let state = Arc::new(RwLock::new(state));

    if !json_output {
        render::print_header("Synapse Training");
        println!("  Network:       {}", network_id.as_str().cyan());
        println!("  Epochs:        {}", training.epochs);
        println!("  Batch size:    {}", training.mini_batch_size);
        println!("  Learning rate: {}", training.learning_rate);
        println!();
    }

    let view = run_training(config, state, json_output).await?;
    if view.training_complete { Ok(()) } else { bail!(view.error.unwrap_or_else(|| "Training interrupted".to_string())) }
}

/// Connect, start training for the network in `state`, and follow it to a terminal status.
///
/// The final view is returned; `state` records the result on completion.
pub async fn run_training(
    config: &ClientConfig,
    state: Arc<RwLock<AppState>>,
    json_output: bool,
) -> anyhow::Result<TrainingStatusView> {
    let connection = Arc::new(EventConnection::new(config).context("Invalid event-stream configuration")?);
    connection.connect();

    let mut status = connection.watch_status();
    let connected = tokio::time::timeout(config.transport.connect_timeout(), status.wait_for(|s| s.connected))
        .await
        .is_ok_and(|r| r.is_ok());
    if !connected {
        connection.shutdown().await;
        bail!("Could not reach the training server at {}", config.websocket_url);
    }
    info!(socket_id = ?connection.status().socket_id, "Event stream connected");

    let keepalive = KeepaliveMonitor::spawn(Arc::clone(&connection), config.keepalive_interval());
    let session = TrainingSession::attach(&connection, ApiClient::new(config.api_url.clone()), state);
    let result = follow(&session, json_output).await;

    session.detach().await;
    keepalive.stop().await;
    connection.shutdown().await;
    result
}

async fn follow(session: &TrainingSession, json_output: bool) -> anyhow::Result<TrainingStatusView> {
    let progress = (!json_output).then(TrainingProgress::new);
    let mut views = session.watch();
    session.start_training();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; the server-side job keeps running");
                return Ok(session.view());
            }
            changed = views.changed() => {
                if changed.is_err() {
                    bail!("Training session ended unexpectedly");
                }
            }
        }

        let view = views.borrow_and_update().clone();
        if json_output {
            println!("{}", serde_json::to_string(&view)?);
        } else if let Some(progress) = progress.as_ref() {
            progress.update(&view);
        }

        if is_finished(&view) {
            if let Some(progress) = progress.as_ref() {
                progress.finish(&view);
                render::print_outcome(&view);
            }
            return Ok(view);
        }
    }
}

/// Completed, failed, or rejected before a job existed.
fn is_finished(view: &TrainingStatusView) -> bool {
    view.training_complete || (view.error.is_some() && !view.is_training && !view.training_loading)
}
