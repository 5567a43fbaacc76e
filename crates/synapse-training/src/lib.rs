//! Synapse Training
//!
//! Transport-agnostic client-side training primitives for:
//! - Describing networks, hyperparameters and training jobs
//! - Server-pushed training events (`TrainingUpdate`, `TrainingComplete`, `TrainingError`)
//! - Filtering events by job identity
//! - Reducing events and user actions into a `TrainingStatusView`
//! - Formatting progress and test examples for display

pub mod error;
pub mod events;
pub mod example;
pub mod filter;
pub mod job;
pub mod presentation;
pub mod reducer;
pub mod state;

pub use error::{SynapseError, SynapseResult};
pub use events::{
    ConnectionStatus, JobScoped, Keepalive, TrainingComplete, TrainingError, TrainingEvent, TrainingUpdate,
};
pub use example::{ExampleKind, ExamplePayload, NetworkExample, fallback_example, fallback_examples};
pub use job::{
    CreateNetworkRequest, CreateNetworkResponse, NetworkConfig, NetworkId, TrainResponse, TrainingConfig,
    TrainingJob, TrainingJobId,
};
pub use reducer::{Outcome, StartTicket, TrainingPhase, TrainingReducer, TrainingStatusView};
pub use state::{AppSection, AppState};
