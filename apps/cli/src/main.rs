//! Synapse CLI - guided client for the digit-classifier training server
//!
//! Provides a `synapse` command that creates networks, trains them while
//! streaming live progress, and inspects how the trained network classifies
//! test digits.

mod commands;
mod config;
mod render;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config as config_cmd, create, demo, test, train};

/// Synapse - train and test a handwritten-digit network from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "synapse",
    author,
    version,
    about = "Synapse - build, train and test a digit-classifier network",
    long_about = "Synapse talks to a remote training server: it creates a network over REST,\nstarts training, and streams per-epoch progress over a live event connection."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// REST API base URL (overrides SYNAPSE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Event-stream base URL (overrides SYNAPSE_WEBSOCKET_URL)
    #[arg(long, global = true)]
    websocket_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new network
    ///
    /// Layers are 784 inputs, one or two hidden layers, and 10 outputs.
    Create {
        /// Neurons in the first hidden layer
        #[arg(long, default_value_t = 128)]
        hidden1: u32,

        /// Neurons in the second hidden layer
        #[arg(long, default_value_t = 64)]
        hidden2: u32,

        /// Use only the first hidden layer
        #[arg(long)]
        single_layer: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train a network and follow its progress live
    Train {
        /// Network ID returned by `synapse create`
        #[arg(long)]
        network: String,

        /// Training epochs
        #[arg(long, default_value_t = 10)]
        epochs: u32,

        /// Mini-batch size
        #[arg(long, default_value_t = 10)]
        batch_size: u32,

        /// Learning rate
        #[arg(long, default_value_t = 3.0)]
        learning_rate: f64,

        /// Print each status change as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Show how a trained network classifies test digits
    Test {
        /// Network ID
        #[arg(long)]
        network: String,

        /// Which examples to show
        #[arg(long, value_enum, default_value_t = test::Pick::Random)]
        pick: test::Pick,

        /// Show up to three examples instead of one
        #[arg(long)]
        gallery: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Walk through learn, create, train and test in one go
    Demo {
        /// Training epochs
        #[arg(long, default_value_t = 3)]
        epochs: u32,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let overrides = config::Overrides {
        api_url: args.api_url,
        websocket_url: args.websocket_url,
        log_level: args.log_level,
    };
    let client_config = config::load_config(overrides)?;

    // Initialize tracing
    let level = match client_config.log_level.as_deref().unwrap_or("info") {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Create { hidden1, hidden2, single_layer, json } => {
            create::execute(&client_config, hidden1, hidden2, single_layer, json).await?;
        }
        Command::Train { network, epochs, batch_size, learning_rate, json } => {
            train::execute(&client_config, network, epochs, batch_size, learning_rate, json).await?;
        }
        Command::Test { network, pick, gallery, json } => {
            test::execute(&client_config, network, pick, gallery, json).await?;
        }
        Command::Demo { epochs } => {
            demo::execute(&client_config, epochs).await?;
        }
        Command::Config { json } => {
            config_cmd::execute(&client_config, json)?;
        }
    }

    Ok(())
}
