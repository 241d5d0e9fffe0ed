//! Build-completion orchestration.
//!
//! [`BuildCompletionHandler`] wires the engine together: on each completion
//! it gates on the job filter and the API key, resolves the event's tag set,
//! derives the metric bundle, classifies the status, and emits through the
//! injected [`MetricSink`].
//!
//! Emission is fire-and-forget from this core's perspective: the sink owns
//! its own timeout and retry policy, and nothing here blocks on
//! acknowledgment.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::config::{resolve_hostname, CompiledConfig, JobConfig};
use crate::event::BuildCompletionEvent;
use crate::metrics::MetricAggregator;
use crate::status::webhook_status;
use crate::tags::{TagResolver, TagSet};

/// Metric name for build duration.
pub const METRIC_DURATION: &str = "jenkins.job.duration";
/// Metric name for lead time.
pub const METRIC_LEADTIME: &str = "jenkins.job.leadtime";
/// Metric name for cycle time (success only).
pub const METRIC_CYCLETIME: &str = "jenkins.job.cycletime";
/// Metric name for mean time to recovery (success after a failure).
pub const METRIC_MTTR: &str = "jenkins.job.mttr";
/// Metric name for feedback time (failure only).
pub const METRIC_FEEDBACKTIME: &str = "jenkins.job.feedbacktime";
/// Metric name for mean time between failures.
pub const METRIC_MTBF: &str = "jenkins.job.mtbf";
/// Service-check name for build status.
pub const SERVICE_CHECK_STATUS: &str = "jenkins.job.status";

/// The external transport contract.
///
/// Implementations are expected to be best-effort and non-blocking from the
/// caller's perspective; this core never inspects a delivery outcome.
pub trait MetricSink: Send + Sync {
    /// Emits one gauge-style metric value.
    fn emit_metric(&self, name: &str, value: u64, hostname: Option<&str>, tags: &[String]);

    /// Emits one service check with a numeric status code (0–3).
    fn emit_service_check(&self, name: &str, status: u8, hostname: Option<&str>, tags: &[String]);
}

/// Orchestrates tag resolution, metric aggregation and status
/// classification for build-completion events.
pub struct BuildCompletionHandler {
    config: RwLock<Option<Arc<CompiledConfig>>>,
    aggregator: MetricAggregator,
    sink: Arc<dyn MetricSink>,
    workspace: Option<PathBuf>,
}

impl BuildCompletionHandler {
    /// Creates a handler emitting through `sink`, initially unconfigured.
    /// An unconfigured handler emits nothing (no API key).
    #[must_use]
    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self {
            config: RwLock::new(None),
            aggregator: MetricAggregator::new(),
            sink,
            workspace: None,
        }
    }

    /// Creates a configured handler.
    #[must_use]
    pub fn with_config(sink: Arc<dyn MetricSink>, config: CompiledConfig) -> Self {
        let handler = Self::new(sink);
        handler.set_config(Some(config));
        handler
    }

    /// Sets the workspace root against which relative job tag-file paths
    /// resolve.
    #[must_use]
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Replaces the configuration snapshot. Events being handled
    /// concurrently keep the snapshot they already took; no event ever sees
    /// a partially-updated configuration.
    pub fn set_config(&self, config: Option<CompiledConfig>) {
        let mut slot = self
            .config
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = config.map(Arc::new);
    }

    /// The aggregator owning this handler's per-job state.
    #[must_use]
    pub fn aggregator(&self) -> &MetricAggregator {
        &self.aggregator
    }

    /// Handles one build-completion event.
    ///
    /// Skips emission entirely when the job is not tracked, when no API key
    /// is configured, or when the host reported no result for the run.
    pub fn on_completed(&self, event: &BuildCompletionEvent, job_config: Option<&JobConfig>) {
        let config = self.config_snapshot();
        let job_name = event.identity.as_str();

        if let Some(config) = config.as_deref() {
            if !config.is_tracked(job_name) {
                tracing::debug!(job = job_name, "job is not tracked, skipping emission");
                return;
            }
        }
        if config.as_deref().map_or(true, |c| c.api_key.is_none()) {
            tracing::debug!(job = job_name, "no API key configured, skipping emission");
            return;
        }
        let Some(result) = event.result.as_deref() else {
            tracing::debug!(job = job_name, "run has no result yet, skipping emission");
            return;
        };

        let config_ref = config.as_deref();
        let resolver = TagResolver::new(config_ref);
        let mut resolved = resolver.resolve(event, job_config, self.workspace.as_deref());
        resolved.merge(resolver.resolve_global_tags(event));
        let tags = render_event_tags(event, result, &resolved);

        let hostname = resolve_hostname(
            config_ref.and_then(|c| c.hostname.as_deref()),
            &event.env,
        );
        let hostname = hostname.as_deref();

        let bundle =
            self.aggregator
                .on_completion(&event.identity, result, event.duration_ms, event.start_ms);

        self.sink
            .emit_metric(METRIC_DURATION, bundle.duration_secs, hostname, &tags);
        self.sink
            .emit_metric(METRIC_LEADTIME, bundle.leadtime_secs, hostname, &tags);
        if let Some(cycletime) = bundle.cycletime_secs {
            self.sink
                .emit_metric(METRIC_CYCLETIME, cycletime, hostname, &tags);
        }
        if let Some(mttr) = bundle.mttr_secs {
            self.sink.emit_metric(METRIC_MTTR, mttr, hostname, &tags);
        }
        if let Some(feedbacktime) = bundle.feedbacktime_secs {
            self.sink
                .emit_metric(METRIC_FEEDBACKTIME, feedbacktime, hostname, &tags);
        }
        if let Some(mtbf) = bundle.mtbf_secs {
            self.sink.emit_metric(METRIC_MTBF, mtbf, hostname, &tags);
        }
        if let Some(status) = bundle.service_check {
            self.sink
                .emit_service_check(SERVICE_CHECK_STATUS, status.code(), hostname, &tags);
        }

        tracing::info!(
            job = job_name,
            number = event.number,
            result,
            status = webhook_status(result),
            completions = bundle.completions,
            "build completion emitted"
        );
    }

    fn config_snapshot(&self) -> Option<Arc<CompiledConfig>> {
        self.config
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// Renders the flat tag list carried by every emission of one event: the
/// fixed-order event tags (`job`, `node`, `result`, `branch`) with verbatim
/// values, followed by the resolved tag set.
fn render_event_tags(event: &BuildCompletionEvent, result: &str, resolved: &TagSet) -> Vec<String> {
    let mut tags = Vec::with_capacity(4 + resolved.len());
    tags.push(format!("job:{}", event.identity));
    if let Some(node) = event.env_var("NODE_NAME") {
        tags.push(format!("node:{node}"));
    }
    tags.push(format!("result:{result}"));
    if let Some(branch) = event.env_var("GIT_BRANCH") {
        tags.push(format!("branch:{branch}"));
    }
    tags.extend(resolved.render());
    tags
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::config::GlobalConfig;
    use crate::event::JobIdentity;

    use super::*;

    /// In-memory sink capturing every emission for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub metrics: Mutex<Vec<(String, u64, Option<String>, Vec<String>)>>,
        pub service_checks: Mutex<Vec<(String, u8, Option<String>, Vec<String>)>>,
    }

    impl MetricSink for RecordingSink {
        fn emit_metric(&self, name: &str, value: u64, hostname: Option<&str>, tags: &[String]) {
            self.metrics.lock().unwrap().push((
                name.to_string(),
                value,
                hostname.map(str::to_string),
                tags.to_vec(),
            ));
        }

        fn emit_service_check(
            &self,
            name: &str,
            status: u8,
            hostname: Option<&str>,
            tags: &[String],
        ) {
            self.service_checks.lock().unwrap().push((
                name.to_string(),
                status,
                hostname.map(str::to_string),
                tags.to_vec(),
            ));
        }
    }

    fn sample_event(result: Option<&str>) -> BuildCompletionEvent {
        let mut env = HashMap::new();
        env.insert("NODE_NAME".to_string(), "test-node".to_string());
        env.insert("GIT_BRANCH".to_string(), "test-branch".to_string());
        BuildCompletionEvent {
            identity: JobIdentity::new("ParentFullName", "JobName"),
            result: result.map(str::to_string),
            duration_ms: 123_000,
            number: 2,
            start_ms: 123_000,
            env,
            pipeline_tags: Vec::new(),
        }
    }

    fn configured_handler(sink: Arc<RecordingSink>) -> BuildCompletionHandler {
        let config = GlobalConfig {
            api_key: Some("key".to_string()),
            ..GlobalConfig::default()
        };
        BuildCompletionHandler::with_config(sink, config.compile().unwrap())
    }

    #[test]
    fn unconfigured_handler_emits_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let handler = BuildCompletionHandler::new(Arc::<RecordingSink>::clone(&sink));
        handler.on_completed(&sample_event(Some("SUCCESS")), None);
        assert!(sink.metrics.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_api_key_skips_emission() {
        let sink = Arc::new(RecordingSink::default());
        let handler = BuildCompletionHandler::with_config(
            Arc::<RecordingSink>::clone(&sink),
            GlobalConfig::default().compile().unwrap(),
        );
        handler.on_completed(&sample_event(Some("SUCCESS")), None);
        assert!(sink.metrics.lock().unwrap().is_empty());
        assert_eq!(handler.aggregator().job_count(), 0);
    }

    #[test]
    fn event_without_result_is_skipped() {
        let sink = Arc::new(RecordingSink::default());
        let handler = configured_handler(Arc::clone(&sink));
        handler.on_completed(&sample_event(None), None);
        assert!(sink.metrics.lock().unwrap().is_empty());
        assert!(sink.service_checks.lock().unwrap().is_empty());
    }

    #[test]
    fn excluded_job_is_skipped_even_when_included() {
        let sink = Arc::new(RecordingSink::default());
        let config = GlobalConfig {
            api_key: Some("key".to_string()),
            excluded_jobs: Some("ParentFullName/.*".to_string()),
            included_jobs: Some("ParentFullName/JobName".to_string()),
            ..GlobalConfig::default()
        };
        let handler =
            BuildCompletionHandler::with_config(Arc::<RecordingSink>::clone(&sink), config.compile().unwrap());
        handler.on_completed(&sample_event(Some("SUCCESS")), None);
        assert!(sink.metrics.lock().unwrap().is_empty());
    }

    #[test]
    fn event_tags_are_fixed_order_with_verbatim_values() {
        let event = sample_event(Some("SUCCESS"));
        let tags = render_event_tags(&event, "SUCCESS", &TagSet::new());
        assert_eq!(
            tags,
            vec![
                "job:ParentFullName/JobName",
                "node:test-node",
                "result:SUCCESS",
                "branch:test-branch",
            ]
        );
    }

    #[test]
    fn resolved_tags_follow_event_tags() {
        let event = sample_event(Some("SUCCESS"));
        let mut resolved = TagSet::new();
        resolved.insert("team", "ci");
        resolved.insert_bare("canary");
        let tags = render_event_tags(&event, "SUCCESS", &resolved);
        assert_eq!(&tags[4..], ["canary", "team:ci"]);
    }

    #[test]
    fn reconfiguration_swaps_whole_snapshots() {
        let sink = Arc::new(RecordingSink::default());
        let handler = configured_handler(Arc::clone(&sink));
        handler.set_config(None);
        handler.on_completed(&sample_event(Some("SUCCESS")), None);
        assert!(sink.metrics.lock().unwrap().is_empty());
    }
}
