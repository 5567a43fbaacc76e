use thiserror::Error;

pub type SynapseResult<T> = std::result::Result<T, SynapseError>;

/// Message shown when training is requested before a network exists.
pub const NO_NETWORK_MESSAGE: &str = "No network available for training";

/// Message shown when the start-training request fails for any reason.
pub const START_FAILED_MESSAGE: &str = "Failed to start training. Please try again.";

/// Fallback message for a server-reported training error without detail.
pub const TRAINING_FAILED_MESSAGE: &str = "Training failed. Please try again.";

/// Message shown when the create-network request fails.
pub const CREATE_FAILED_MESSAGE: &str = "Failed to create network. Please try again.";

/// Message shown when examples are requested without a trained network.
pub const NO_TRAINED_NETWORK_MESSAGE: &str = "No trained network available";

#[derive(Debug, Error)]
pub enum SynapseError {
    /// A local, synchronous precondition failed. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SynapseError {
    /// Returns the string that may be shown to a user.
    ///
    /// Validation errors are already user-facing; everything else collapses
    /// into the generic start failure so internals never leak.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::InvalidConfig(message) => message.clone(),
            Self::Json(_) | Self::Other(_) => START_FAILED_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_displays_message_verbatim() {
        let err = SynapseError::Validation(NO_NETWORK_MESSAGE.to_string());
        assert_eq!(err.to_string(), NO_NETWORK_MESSAGE);
        assert_eq!(err.user_message(), NO_NETWORK_MESSAGE);
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SynapseError = json_err.into();
        assert_eq!(err.user_message(), START_FAILED_MESSAGE);
    }
}
