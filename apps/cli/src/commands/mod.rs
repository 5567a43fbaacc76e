//! Command implementations for the Synapse CLI.

pub mod config;
pub mod create;
pub mod demo;
pub mod train;

use synapse_client::ClientError;

/// Error shown to the user: the API's message or a generic one, never raw transport detail.
pub(crate) fn user_error(error: &ClientError) -> anyhow::Error {
    anyhow::anyhow!(error.user_message())
}
