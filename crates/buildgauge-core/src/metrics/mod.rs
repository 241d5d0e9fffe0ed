//! Per-job metric aggregation.
//!
//! The host delivers completion callbacks concurrently, with no ordering
//! guarantee across jobs nor across build numbers of the same job. The
//! aggregator keeps one [`JobRunState`] per [`JobIdentity`] behind striped
//! locking: a read-mostly map of per-job entries, each guarded by its own
//! mutex. Completions of different jobs never block each other; completions
//! of the same job serialize completely, so the read-modify-write of the
//! previous-build timestamps is atomic as a unit.
//!
//! State entries are created lazily on first observed completion and never
//! destroyed: the map grows with the number of distinct jobs ever observed,
//! an accepted tradeoff.
//!
//! All duration-like outputs are whole seconds (integer truncation of
//! milliseconds); the service-check status is the small integer code of
//! [`ServiceStatus`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::event::JobIdentity;

/// Service-check health states and their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Healthy (0): a successful, stable build.
    Ok,
    /// Warning (1): unstable or unrecognized outcome.
    Warning,
    /// Critical (2): failed or errored build.
    Critical,
    /// Unknown (3). Not produced by [`service_check_status`], but part of
    /// the sink contract.
    Unknown,
}

impl ServiceStatus {
    /// The numeric status code the sink contract expects.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }
}

/// Maps a raw result token to a service-check status.
///
/// Aborted and not-built runs return `None`: no service check is emitted for
/// them at all, rather than reporting a misleading health state.
#[must_use]
pub fn service_check_status(result: &str) -> Option<ServiceStatus> {
    match result.to_lowercase().as_str() {
        "success" => Some(ServiceStatus::Ok),
        "failure" | "error" => Some(ServiceStatus::Critical),
        "aborted" | "not_built" => None,
        // Unstable and anything unrecognized surface as a warning.
        _ => Some(ServiceStatus::Warning),
    }
}

/// Per-job running state, mutated exactly once per completion.
///
/// All timestamps are milliseconds since the epoch; 0 means "never
/// observed".
#[derive(Debug, Default)]
struct JobRunState {
    /// End time of the previous completion, whatever its outcome. Baseline
    /// for lead time.
    last_build_end_ms: u64,
    /// End time of the previous successful completion. Baseline for cycle
    /// time, tracked separately from `last_build_end_ms`.
    last_success_end_ms: u64,
    /// End time of the previous failed completion. Baseline for MTTR and
    /// MTBF.
    last_failure_end_ms: u64,
    /// Completions observed for this job.
    completions: u64,
}

/// Derived metrics for one completion event.
///
/// Optional fields are `None` when the metric does not apply to this
/// outcome or when the state it diffs against has never been observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricBundle {
    /// Build duration, seconds.
    pub duration_secs: u64,
    /// Time since the previous build of this job ended, seconds. Degenerates
    /// to the current end time on the first observed build (zero baseline).
    pub leadtime_secs: u64,
    /// Time since the previous successful completion, seconds. Success only.
    pub cycletime_secs: Option<u64>,
    /// Time from the last recorded failure to this success, seconds.
    pub mttr_secs: Option<u64>,
    /// Duration proxy for how long the failure took to surface, seconds.
    /// Failure only.
    pub feedbacktime_secs: Option<u64>,
    /// Time between the last recorded failure and this one, seconds.
    pub mtbf_secs: Option<u64>,
    /// Service-check status; `None` means no service check is emitted.
    pub service_check: Option<ServiceStatus>,
    /// Completions observed for this job, including this one.
    pub completions: u64,
}

/// Process-wide per-job aggregation state.
///
/// Owns all [`JobRunState`] entries exclusively; no other component observes
/// or mutates them. Construct one per handler — state is injected, not
/// ambient — so tests get isolated instances.
#[derive(Debug, Default)]
pub struct MetricAggregator {
    states: RwLock<HashMap<JobIdentity, Arc<Mutex<JobRunState>>>>,
}

impl MetricAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the metric bundle for one completion and updates the job's
    /// state.
    ///
    /// Serialized per job: the previous timestamps are read, the metrics
    /// derived, and the state updated under the job's own lock.
    pub fn on_completion(
        &self,
        identity: &JobIdentity,
        result: &str,
        duration_ms: u64,
        start_ms: u64,
    ) -> MetricBundle {
        let state = self.state_entry(identity);
        let mut state = state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let end_ms = start_ms + duration_ms;
        let leadtime_ms = end_ms.saturating_sub(state.last_build_end_ms);

        let mut bundle = MetricBundle {
            duration_secs: duration_ms / 1000,
            leadtime_secs: leadtime_ms / 1000,
            cycletime_secs: None,
            mttr_secs: None,
            feedbacktime_secs: None,
            mtbf_secs: None,
            service_check: service_check_status(result),
            completions: state.completions + 1,
        };

        match result.to_lowercase().as_str() {
            "success" => {
                if state.last_success_end_ms > 0 {
                    bundle.cycletime_secs =
                        Some(end_ms.saturating_sub(state.last_success_end_ms) / 1000);
                }
                if state.last_failure_end_ms > 0 {
                    // The failure timestamp stays as-is: a later failure
                    // still measures MTBF against it.
                    bundle.mttr_secs =
                        Some(end_ms.saturating_sub(state.last_failure_end_ms) / 1000);
                }
                state.last_success_end_ms = end_ms;
            }
            "failure" => {
                bundle.feedbacktime_secs = Some(duration_ms / 1000);
                if state.last_failure_end_ms > 0 {
                    bundle.mtbf_secs =
                        Some(end_ms.saturating_sub(state.last_failure_end_ms) / 1000);
                }
                state.last_failure_end_ms = end_ms;
            }
            _ => {}
        }

        state.last_build_end_ms = end_ms;
        state.completions += 1;
        bundle
    }

    /// Number of jobs with recorded state.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.states
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Completions recorded for a job; 0 when the job was never observed.
    #[must_use]
    pub fn completions(&self, identity: &JobIdentity) -> u64 {
        let states = self
            .states
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states.get(identity).map_or(0, |state| {
            state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .completions
        })
    }

    /// Fetches or lazily creates the state entry for a job. The map lock is
    /// held only for the lookup, never while a job's own lock is taken.
    fn state_entry(&self, identity: &JobIdentity) -> Arc<Mutex<JobRunState>> {
        {
            let states = self
                .states
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(state) = states.get(identity) {
                return Arc::clone(state);
            }
        }
        let mut states = self
            .states
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(states.entry(identity.clone()).or_default())
    }
}
