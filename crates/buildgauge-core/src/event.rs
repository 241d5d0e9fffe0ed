//! Build-completion event types.
//!
//! A [`BuildCompletionEvent`] is an immutable snapshot of one finished build,
//! constructed once per host callback and not retained beyond handling. The
//! [`JobIdentity`] inside it is the stable aggregation key for per-job state:
//! it survives across build numbers of the same job.

use std::collections::HashMap;
use std::fmt;

/// Stable identity of a job: the full hierarchical path of its parent groups
/// joined with `/`, plus the job's short name.
///
/// Two builds of the same job (different build numbers, retries, re-runs)
/// produce equal identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobIdentity {
    full_name: String,
}

impl JobIdentity {
    /// Builds an identity from a parent group path and a job short name.
    ///
    /// An empty parent path yields the short name alone (top-level jobs have
    /// no `/` prefix).
    #[must_use]
    pub fn new(parent_full_name: &str, job_name: &str) -> Self {
        let full_name = if parent_full_name.is_empty() {
            job_name.to_string()
        } else {
            format!("{parent_full_name}/{job_name}")
        };
        Self { full_name }
    }

    /// Builds an identity from an already-joined hierarchical name.
    #[must_use]
    pub fn from_full_name(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
        }
    }

    /// The full hierarchical job name, e.g. `folder/subfolder/job`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full_name
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Immutable snapshot of one build-finished callback.
#[derive(Debug, Clone)]
pub struct BuildCompletionEvent {
    /// Identity of the job that produced this build.
    pub identity: JobIdentity,
    /// Raw result token as reported by the host (`SUCCESS`, `FAILURE`,
    /// `UNSTABLE`, `ABORTED`, `NOT_BUILT`, ...). `None` when the host has not
    /// assigned a result; such events are not emitted.
    pub result: Option<String>,
    /// Wall-clock duration of the build in milliseconds. Pipeline runs may
    /// report 0 at the run level.
    pub duration_ms: u64,
    /// Build number within the job.
    pub number: u32,
    /// Build start time in milliseconds since the epoch.
    pub start_ms: u64,
    /// Environment-variable snapshot captured for this build.
    pub env: HashMap<String, String>,
    /// Free-form tag strings declared on the build's pipeline metadata.
    pub pipeline_tags: Vec<String>,
}

impl BuildCompletionEvent {
    /// Build end time in milliseconds since the epoch.
    #[must_use]
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }

    /// Looks up a variable in the event's environment snapshot.
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }
}
