//! Job identity filtering.
//!
//! Before the start-training response returns, the server may already push
//! events for the new job. While no job id is known every event is let
//! through; once it is known only that job's events pass.

use crate::events::JobScoped;
use crate::job::TrainingJobId;

/// Returns true if an event for `event_job` should reach the reducer.
#[must_use]
pub fn accepts(candidate: Option<&TrainingJobId>, event_job: &TrainingJobId) -> bool {
    candidate.is_none_or(|active| active == event_job)
}

/// Like [`accepts`], for any job-scoped event.
#[must_use]
pub fn accepts_event<E: JobScoped + ?Sized>(candidate: Option<&TrainingJobId>, event: &E) -> bool {
    accepts(candidate, event.job_id())
}
