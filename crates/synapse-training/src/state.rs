//! Session-wide application state shared by the guided flow.

use crate::job::{NetworkConfig, NetworkId, TrainingConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Steps of the guided flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppSection {
    #[default]
    Learn,
    Create,
    Train,
    Test,
}

impl AppSection {
    pub const ALL: [Self; 4] = [Self::Learn, Self::Create, Self::Train, Self::Test];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Learn => "learn",
            Self::Create => "create",
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for AppSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppState {
    active_section: AppSection,
    network_id: Option<NetworkId>,
    network_config: NetworkConfig,
    training_config: TrainingConfig,
    training_complete: bool,
    final_accuracy: Option<f64>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn active_section(&self) -> AppSection {
        self.active_section
    }

    #[must_use]
    pub fn network_id(&self) -> Option<&NetworkId> {
        self.network_id.as_ref()
    }

    #[must_use]
    pub fn network_config(&self) -> &NetworkConfig {
        &self.network_config
    }

    #[must_use]
    pub fn training_config(&self) -> &TrainingConfig {
        &self.training_config
    }

    #[must_use]
    pub fn training_complete(&self) -> bool {
        self.training_complete
    }

    #[must_use]
    pub fn final_accuracy(&self) -> Option<f64> {
        self.final_accuracy
    }

    pub fn set_active_section(&mut self, section: AppSection) {
        self.active_section = section;
    }

    /// A blank id clears the network.
    pub fn set_network_id(&mut self, network_id: NetworkId) {
        self.network_id = (!network_id.is_blank()).then_some(network_id);
    }

    pub fn set_network_config(&mut self, config: NetworkConfig) {
        self.network_config = config;
    }

    /// Hyperparameter edits. Accepted at any time; never touches a running job.
    pub fn set_training_config(&mut self, config: TrainingConfig) {
        debug!(?config, "Training config changed");
        self.training_config = config;
    }

    pub fn set_training_complete(&mut self, complete: bool) {
        self.training_complete = complete;
    }

    pub fn set_final_accuracy(&mut self, accuracy: Option<f64>) {
        self.final_accuracy = accuracy;
    }

    /// Navigation guard for the guided flow.
    #[must_use]
    pub fn can_navigate(&self, section: AppSection) -> bool {
        match section {
            AppSection::Learn | AppSection::Create => true,
            AppSection::Train => self.network_id.is_some(),
            AppSection::Test => self.network_id.is_some() && self.training_complete,
        }
    }

    /// Switch sections if the guard allows it. Returns whether it switched.
    pub fn switch_section(&mut self, section: AppSection) -> bool {
        if !self.can_navigate(section) {
            debug!(section = %section, "Navigation blocked");
            return false;
        }
        self.active_section = section;
        true
    }

    pub fn clear_all(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = AppState::new();
        assert_eq!(state.active_section(), AppSection::Learn);
        assert!(state.network_id().is_none());
        assert_eq!(state.network_config().layer_sizes(), vec![784, 128, 64, 10]);
        assert_eq!(state.training_config().epochs, 10);
        assert!(!state.training_complete());
        assert!(state.final_accuracy().is_none());
    }

    #[test]
    fn test_navigation_guard() {
        let mut state = AppState::new();
        assert!(state.can_navigate(AppSection::Learn));
        assert!(state.can_navigate(AppSection::Create));
        assert!(!state.can_navigate(AppSection::Train));
        assert!(!state.can_navigate(AppSection::Test));

        state.set_network_id(NetworkId::from("N1"));
        assert!(state.can_navigate(AppSection::Train));
        assert!(!state.can_navigate(AppSection::Test));

        state.set_training_complete(true);
        assert!(state.can_navigate(AppSection::Test));
    }

    #[test]
    fn test_switch_section_respects_guard() {
        let mut state = AppState::new();
        assert!(!state.switch_section(AppSection::Test));
        assert_eq!(state.active_section(), AppSection::Learn);
        assert!(state.switch_section(AppSection::Create));
        assert_eq!(state.active_section(), AppSection::Create);
    }

    #[test]
    fn test_blank_network_id_clears() {
        let mut state = AppState::new();
        state.set_network_id(NetworkId::from("N1"));
        state.set_network_id(NetworkId::from(""));
        assert!(state.network_id().is_none());
    }

    #[test]
    fn test_clear_all_restores_defaults() {
        let mut state = AppState::new();
        state.set_network_id(NetworkId::from("N1"));
        state.set_training_complete(true);
        state.set_final_accuracy(Some(0.9));
        state.set_active_section(AppSection::Test);
        state.clear_all();
        assert_eq!(state, AppState::default());
    }
}
