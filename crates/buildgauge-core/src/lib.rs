//! Core tag-derivation and metric-aggregation engine for a CI monitoring
//! plugin.
//!
//! The host CI server delivers build-completion callbacks; this crate decides
//! *what* to emit to the monitoring backend and *when*:
//!
//! - [`tags`] reconciles tag sources (job tag file, job tag properties,
//!   global per-job-pattern tags, pipeline-declared tags) into a single
//!   deduplicated [`tags::TagSet`] per event.
//! - [`metrics`] keeps per-job run state (previous build end, previous
//!   success, previous failure) and derives lead time, cycle time, MTTR and
//!   MTBF across concurrent completions.
//! - [`status`] normalizes raw result tokens into the trace and webhook
//!   status vocabularies and classifies pipeline flow-node outcomes.
//! - [`handler`] orchestrates the above on each completion and emits through
//!   an injected [`handler::MetricSink`].
//!
//! The host's extension registration, UI configuration forms and network
//! transport are external collaborators: the transport is consumed through
//! the [`handler::MetricSink`] trait and never owned here.
//!
//! # Thread safety
//!
//! Completion callbacks arrive concurrently from the host's worker pool with
//! no ordering guarantee. [`metrics::MetricAggregator`] serializes state
//! mutations per job while letting distinct jobs proceed independently, and
//! the handler reads its configuration as an atomic snapshot so concurrent
//! reconfiguration never exposes a half-updated view.

pub mod config;
pub mod event;
pub mod handler;
pub mod metrics;
pub mod status;
pub mod tags;

pub use config::{CompiledConfig, ConfigError, GlobalConfig, JobConfig};
pub use event::{BuildCompletionEvent, JobIdentity};
pub use handler::{BuildCompletionHandler, MetricSink};
pub use metrics::{MetricAggregator, MetricBundle, ServiceStatus};
pub use tags::TagSet;
