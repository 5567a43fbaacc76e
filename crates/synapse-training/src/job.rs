use crate::error::{SynapseError, SynapseResult};
use serde::{Deserialize, Serialize};

/// Size of an MNIST input image (28x28 pixels).
pub const INPUT_LAYER_SIZE: u32 = 784;

/// One output neuron per digit.
pub const OUTPUT_LAYER_SIZE: u32 = 10;

/// Identifier for a training job, assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingJobId(pub String);

impl TrainingJobId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrainingJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TrainingJobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier for a network created on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub String);

impl NetworkId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the id is blank and cannot address a network.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for NetworkId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A server-side training run bound to the network it trains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJob {
    pub job_id: TrainingJobId,
    pub network_id: NetworkId,
}

/// Hidden-layer layout chosen by the user before the network is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub hidden_layer_1: u32,
    pub hidden_layer_2: u32,
    pub use_second_layer: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { hidden_layer_1: 128, hidden_layer_2: 64, use_second_layer: true }
    }
}

impl NetworkConfig {
    /// Full layer layout sent to the server: input, hidden layer(s), output.
    #[must_use]
    pub fn layer_sizes(&self) -> Vec<u32> {
        let mut layers = vec![INPUT_LAYER_SIZE, self.hidden_layer_1];
        if self.use_second_layer {
            layers.push(self.hidden_layer_2);
        }
        layers.push(OUTPUT_LAYER_SIZE);
        layers
    }

    pub fn validate(&self) -> SynapseResult<()> {
        if self.hidden_layer_1 == 0 {
            return Err(SynapseError::InvalidConfig("hidden_layer_1 must be >= 1".to_string()));
        }
        if self.use_second_layer && self.hidden_layer_2 == 0 {
            return Err(SynapseError::InvalidConfig("hidden_layer_2 must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Training hyperparameters as edited by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: u32,
    pub mini_batch_size: u32,
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self { epochs: 10, mini_batch_size: 10, learning_rate: 3.0 }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> SynapseResult<()> {
        if self.epochs == 0 {
            return Err(SynapseError::InvalidConfig("epochs must be >= 1".to_string()));
        }
        if self.mini_batch_size == 0 {
            return Err(SynapseError::InvalidConfig("mini_batch_size must be >= 1".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(SynapseError::InvalidConfig("learning_rate must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Body of `POST /networks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNetworkRequest {
    pub layer_sizes: Vec<u32>,
}

/// Response of `POST /networks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNetworkResponse {
    pub network_id: NetworkId,
    pub layer_sizes: Vec<u32>,
    #[serde(default)]
    pub message: String,
}

/// Response of `POST /networks/{id}/train`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResponse {
    pub job_id: TrainingJobId,
    pub network_id: NetworkId,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_sizes_with_two_hidden_layers() {
        let config = NetworkConfig::default();
        assert_eq!(config.layer_sizes(), vec![784, 128, 64, 10]);
    }

    #[test]
    fn test_layer_sizes_with_single_hidden_layer() {
        let config = NetworkConfig { hidden_layer_1: 32, use_second_layer: false, ..Default::default() };
        assert_eq!(config.layer_sizes(), vec![784, 32, 10]);
    }

    #[test]
    fn test_training_config_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 10);
        assert_eq!(config.mini_batch_size, 10);
        assert!((config.learning_rate - 3.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_training_config_rejects_bad_learning_rate() {
        let config = TrainingConfig { learning_rate: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
        let config = TrainingConfig { learning_rate: 0.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_train_response_parses_wire_shape() {
        let response: TrainResponse = serde_json::from_str(
            r#"{"job_id":"J1","network_id":"N1","message":"Training started"}"#,
        )
        .unwrap();
        assert_eq!(response.job_id, TrainingJobId::from("J1"));
        assert_eq!(response.network_id.as_str(), "N1");
    }
}
