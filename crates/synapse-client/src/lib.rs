//! Synapse Client
//!
//! Network side of the Synapse training client:
//! - `EventConnection`: the single Socket.IO connection carrying training events
//! - `KeepaliveMonitor`: periodic liveness pings while connected
//! - `TrainingSession`: per-view subscription driving a `TrainingReducer`
//! - `ApiClient`: REST calls for creating, training and testing networks
//! - `ClientConfig`: layered TOML/environment configuration

pub mod api;
pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod keepalive;
pub mod protocol;
pub mod session;
pub mod transport;

pub use api::ApiClient;
pub use backoff::Backoff;
pub use config::{ClientConfig, ConfigError, TransportConfig, TransportKind};
pub use connection::{EventConnection, EventStream};
pub use error::{ClientError, Result};
pub use keepalive::{KeepaliveMonitor, KeepaliveSink};
pub use session::{SessionStreams, TrainingSession};
