//! Training state machine.
//!
//! One reducer governs one training run end to end:
//!
//! ```text
//! Idle --start--> Starting --response--> Running --complete--> Completed
//!                    |                      |
//!                    +--failed--> Idle      +--error--> Failed
//! ```
//!
//! `Completed` and `Failed` accept a new `start`. Events are applied only while
//! a run is in flight (`Starting` or `Running`) and only if they pass the job
//! identity filter.

use crate::error::{
    NO_NETWORK_MESSAGE, START_FAILED_MESSAGE, SynapseError, SynapseResult, TRAINING_FAILED_MESSAGE,
};
use crate::events::{JobScoped, TrainingComplete, TrainingError, TrainingEvent, TrainingUpdate};
use crate::filter;
use crate::job::{NetworkId, TrainingJob, TrainingJobId};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Message reported when a second run is requested while one is in flight.
pub const ALREADY_TRAINING_MESSAGE: &str = "Training is already in progress";

/// Identifies one start attempt so a late REST response cannot rebind a newer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StartTicket(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum TrainingPhase {
    Idle {
        /// Validation or start failure from the last attempt.
        error: Option<String>,
    },
    Starting {
        ticket: StartTicket,
        network_id: NetworkId,
        current: Option<TrainingUpdate>,
        progress: f64,
    },
    Running {
        job: TrainingJob,
        current: Option<TrainingUpdate>,
        progress: f64,
    },
    Completed {
        network_id: NetworkId,
        final_accuracy: f64,
        message: String,
        current: Option<TrainingUpdate>,
    },
    Failed {
        network_id: NetworkId,
        error: String,
        current: Option<TrainingUpdate>,
        progress: f64,
    },
}

impl TrainingPhase {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "idle",
            Self::Starting { .. } => "starting",
            Self::Running { .. } => "running",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// What a transition did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Event belonged to another job.
    Filtered,
    /// Nothing in flight to apply it to, or the response was for an older attempt.
    Ignored,
}

/// UI-facing snapshot derived from the current phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingStatusView {
    pub phase: &'static str,
    pub is_training: bool,
    pub training_loading: bool,
    pub training_started: bool,
    pub training_complete: bool,
    pub progress: f64,
    pub current: Option<TrainingUpdate>,
    pub final_accuracy: Option<f64>,
    pub error: Option<String>,
    pub job_id: Option<TrainingJobId>,
}

#[derive(Debug, Clone)]
pub struct TrainingReducer {
    phase: TrainingPhase,
    attempts: u64,
}

impl Default for TrainingReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingReducer {
    #[must_use]
    pub fn new() -> Self {
        Self { phase: TrainingPhase::Idle { error: None }, attempts: 0 }
    }

    #[must_use]
    pub fn phase(&self) -> &TrainingPhase {
        &self.phase
    }

    /// Job id events are currently filtered against. `None` during the grace
    /// window and whenever nothing is in flight.
    #[must_use]
    pub fn active_job_id(&self) -> Option<&TrainingJobId> {
        match &self.phase {
            TrainingPhase::Running { job, .. } => Some(&job.job_id),
            _ => None,
        }
    }

    /// Begin a run for `network_id`.
    ///
    /// Fails without leaving `Idle` when no network is available. The caller
    /// issues the start request and reports back with the returned ticket.
    pub fn start(&mut self, network_id: Option<&NetworkId>) -> SynapseResult<StartTicket> {
        if matches!(self.phase, TrainingPhase::Starting { .. } | TrainingPhase::Running { .. }) {
            return Err(SynapseError::Validation(ALREADY_TRAINING_MESSAGE.to_string()));
        }

        let Some(network_id) = network_id.filter(|id| !id.is_blank()) else {
            self.phase = TrainingPhase::Idle { error: Some(NO_NETWORK_MESSAGE.to_string()) };
            return Err(SynapseError::Validation(NO_NETWORK_MESSAGE.to_string()));
        };

        self.attempts += 1;
        let ticket = StartTicket(self.attempts);
        debug!(network_id = %network_id, attempt = self.attempts, "Training start requested");
        self.phase = TrainingPhase::Starting {
            ticket,
            network_id: network_id.clone(),
            current: None,
            progress: 0.0,
        };
        Ok(ticket)
    }

    /// The start request returned a job id.
    pub fn start_succeeded(&mut self, ticket: StartTicket, job_id: TrainingJobId) -> Outcome {
        let pending = match &self.phase {
            TrainingPhase::Starting { ticket, .. } => *ticket,
            other => {
                debug!(job_id = %job_id, phase = other.name(), "Start response arrived outside of starting phase");
                return Outcome::Ignored;
            }
        };
        if pending != ticket {
            debug!(job_id = %job_id, "Start response for an older attempt");
            return Outcome::Ignored;
        }
        if job_id.as_str().trim().is_empty() {
            return self.start_failed(ticket, "start response carried no job id");
        }

        let TrainingPhase::Starting { network_id, current, progress, .. } =
            std::mem::replace(&mut self.phase, TrainingPhase::Idle { error: None })
        else {
            return Outcome::Ignored;
        };
        info!(job_id = %job_id, network_id = %network_id, "Training started");
        self.phase = TrainingPhase::Running { job: TrainingJob { job_id, network_id }, current, progress };
        Outcome::Applied
    }

    /// The start request failed. `detail` is logged, never shown.
    pub fn start_failed(&mut self, ticket: StartTicket, detail: &str) -> Outcome {
        if !matches!(&self.phase, TrainingPhase::Starting { ticket: pending, .. } if *pending == ticket) {
            return Outcome::Ignored;
        }
        warn!(error = %detail, "Error starting training");
        self.phase = TrainingPhase::Idle { error: Some(START_FAILED_MESSAGE.to_string()) };
        Outcome::Applied
    }

    /// Apply one server event.
    pub fn apply(&mut self, event: TrainingEvent) -> Outcome {
        if !matches!(self.phase, TrainingPhase::Starting { .. } | TrainingPhase::Running { .. }) {
            debug!(event = event.name(), job_id = %event.job_id(), phase = self.phase.name(), "No run in flight, event ignored");
            return Outcome::Ignored;
        }
        if !filter::accepts_event(self.active_job_id(), &event) {
            debug!(event = event.name(), job_id = %event.job_id(), "Event for another job dropped");
            return Outcome::Filtered;
        }

        match event {
            TrainingEvent::Update(update) => self.apply_update(update),
            TrainingEvent::Complete(complete) => self.complete(complete),
            TrainingEvent::Error(error) => self.fail(error),
        }
        Outcome::Applied
    }

    /// Drop the run and return to `Idle`. The server job is left running.
    pub fn reset(&mut self) {
        if let Some(job_id) = self.active_job_id() {
            debug!(job_id = %job_id, "Training state reset while job active");
        }
        self.phase = TrainingPhase::Idle { error: None };
    }

    fn apply_update(&mut self, update: TrainingUpdate) {
        if let TrainingPhase::Starting { current, progress, .. }
        | TrainingPhase::Running { current, progress, .. } = &mut self.phase
        {
            debug!(
                job_id = %update.job_id,
                epoch = update.epoch,
                total_epochs = update.total_epochs,
                progress = update.progress,
                "Handling training update"
            );
            // Late or duplicate updates overwrite; progress may move backwards.
            *progress = update.progress;
            *current = Some(update);
        }
    }

    fn complete(&mut self, complete: TrainingComplete) {
        info!(job_id = %complete.job_id, accuracy = complete.accuracy, "Training completed");
        let current = self.take_current();
        self.phase = TrainingPhase::Completed {
            network_id: complete.network_id,
            final_accuracy: complete.accuracy,
            message: complete.message,
            current,
        };
    }

    fn fail(&mut self, error: TrainingError) {
        let message = error
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| TRAINING_FAILED_MESSAGE.to_string());
        warn!(job_id = %error.job_id, status = %error.status, error = %message, "Training error");
        let progress = self.progress();
        let current = self.take_current();
        self.phase = TrainingPhase::Failed { network_id: error.network_id, error: message, current, progress };
    }

    fn take_current(&mut self) -> Option<TrainingUpdate> {
        match &mut self.phase {
            TrainingPhase::Starting { current, .. } | TrainingPhase::Running { current, .. } => current.take(),
            _ => None,
        }
    }

    fn progress(&self) -> f64 {
        match &self.phase {
            TrainingPhase::Idle { .. } => 0.0,
            TrainingPhase::Starting { progress, .. }
            | TrainingPhase::Running { progress, .. }
            | TrainingPhase::Failed { progress, .. } => *progress,
            TrainingPhase::Completed { .. } => 100.0,
        }
    }

    #[must_use]
    pub fn view(&self) -> TrainingStatusView {
        let mut view = TrainingStatusView {
            phase: self.phase.name(),
            is_training: false,
            training_loading: false,
            training_started: false,
            training_complete: false,
            progress: self.progress(),
            current: None,
            final_accuracy: None,
            error: None,
            job_id: None,
        };

        match &self.phase {
            TrainingPhase::Idle { error } => {
                view.error.clone_from(error);
            }
            TrainingPhase::Starting { current, .. } => {
                view.is_training = true;
                view.training_loading = true;
                view.current.clone_from(current);
            }
            TrainingPhase::Running { job, current, .. } => {
                view.is_training = true;
                view.training_started = true;
                view.current.clone_from(current);
                view.job_id = Some(job.job_id.clone());
            }
            TrainingPhase::Completed { final_accuracy, current, .. } => {
                view.training_complete = true;
                view.final_accuracy = Some(*final_accuracy);
                view.current.clone_from(current);
            }
            TrainingPhase::Failed { error, current, .. } => {
                view.error = Some(error.clone());
                view.current.clone_from(current);
            }
        }
        view
    }
}
