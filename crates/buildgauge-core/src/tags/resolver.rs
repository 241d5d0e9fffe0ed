//! Five-stage tag resolution for a build-completion event.
//!
//! Stages are merged in a fixed precedence order; per the [`TagSet`]
//! invariant a later stage can only add values, never remove earlier ones:
//!
//! 1. Job tag file (falling back to the globally configured tag file when
//!    the job has none), parsed with the var-list grammar.
//! 2. Job tag-properties string, always evaluated when configured.
//! 3. Global per-job-pattern tags, full-matched against the hierarchical job
//!    name with `$N` capture-group / `$VAR` environment substitution.
//! 4. Pipeline-declared tags, `name:value` items.
//!
//! Any missing configuration object degrades to an empty contribution from
//! that stage; malformed items are dropped with a diagnostic. The only
//! failure mode this module cannot absorb — an invalid operator regex — is
//! ruled out before resolution, at configuration compile time.

use std::path::Path;

use crate::config::{CompiledConfig, JobConfig, JobTagRule};
use crate::event::BuildCompletionEvent;

use super::{parse_colon_item, parse_var_list, TagSet};

/// Resolves the final tag set for build-completion events against a
/// configuration snapshot.
#[derive(Debug, Clone, Copy)]
pub struct TagResolver<'cfg> {
    config: Option<&'cfg CompiledConfig>,
}

impl<'cfg> TagResolver<'cfg> {
    /// Creates a resolver over an optional configuration snapshot. Absent
    /// configuration reduces resolution to the job- and pipeline-contributed
    /// stages.
    #[must_use]
    pub fn new(config: Option<&'cfg CompiledConfig>) -> Self {
        Self { config }
    }

    /// Produces the merged tag set for one event.
    ///
    /// `workspace` is the root against which a relative job tag-file path is
    /// resolved. Unreadable tag files contribute nothing.
    #[must_use]
    pub fn resolve(
        &self,
        event: &BuildCompletionEvent,
        job_config: Option<&JobConfig>,
        workspace: Option<&Path>,
    ) -> TagSet {
        let mut tags = TagSet::new();

        if let Some(contents) = self.tag_file_contents(job_config, workspace) {
            parse_var_list(&contents, &event.env, &mut tags);
        }
        if let Some(properties) = job_config.and_then(|j| j.tag_properties.as_deref()) {
            parse_var_list(properties, &event.env, &mut tags);
        }
        if let Some(config) = self.config {
            for rule in config.job_tag_rules() {
                apply_job_tag_rule(rule, event, &mut tags);
            }
        }
        for item in &event.pipeline_tags {
            parse_colon_item(item, &mut tags);
        }

        tags
    }

    /// Parses the configured global tags (applied to every tracked job)
    /// against the event's environment.
    #[must_use]
    pub fn resolve_global_tags(&self, event: &BuildCompletionEvent) -> TagSet {
        let mut tags = TagSet::new();
        let Some(global_tags) = self.config.and_then(|c| c.global_tags.as_deref()) else {
            return tags;
        };
        for line in super::split_lines(global_tags) {
            for item in super::split_csv(line) {
                let item = item.replace(' ', "");
                match item.split_once(':') {
                    Some((name, value)) if !name.is_empty() => {
                        let value = resolve_env_reference(value, event);
                        match value {
                            Some(value) => tags.insert(name, &value),
                            None => tracing::debug!(
                                %item,
                                "environment variable not found, not applying tag"
                            ),
                        }
                    }
                    Some(_) => tracing::debug!(%item, "ignoring tag item with empty name"),
                    None => tags.insert_bare(item),
                }
            }
        }
        tags
    }

    /// Reads the job tag file, falling back to the global tag file when the
    /// job configures none. Relative paths resolve against the workspace.
    fn tag_file_contents(
        &self,
        job_config: Option<&JobConfig>,
        workspace: Option<&Path>,
    ) -> Option<String> {
        let job_file = job_config.and_then(|j| j.tag_file.as_deref());
        let path = job_file.or_else(|| {
            self.config
                .and_then(|c| c.global_tag_file.as_deref())
        })?;
        let resolved = match workspace {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        };
        match std::fs::read_to_string(&resolved) {
            Ok(contents) => Some(contents),
            Err(error) => {
                tracing::debug!(path = %resolved.display(), %error, "tag file not readable");
                None
            }
        }
    }
}

/// Applies one per-job-pattern rule: on a full job-name match, each spec is
/// parsed as a colon item, with `$`-prefixed values resolved as a capture
/// group first and an environment variable second.
fn apply_job_tag_rule(rule: &JobTagRule, event: &BuildCompletionEvent, tags: &mut TagSet) {
    let Some(captures) = rule.captures(event.identity.as_str()) else {
        return;
    };
    for spec in rule.specs() {
        let spec = spec.replace(' ', "");
        match spec.split_once(':') {
            Some((name, value)) if !name.is_empty() => {
                if let Some(reference) = value.strip_prefix('$') {
                    match resolve_reference(reference, &captures, event) {
                        Some(resolved) => tags.insert(name, &resolved),
                        None => tracing::debug!(
                            %spec,
                            "capture group or environment variable not found, not applying tag"
                        ),
                    }
                } else {
                    tags.insert(name, value);
                }
            }
            Some(_) => tracing::debug!(%spec, "ignoring tag item with empty name"),
            None if spec.is_empty() => tracing::debug!("ignoring empty tag item"),
            None => tags.insert_bare(spec),
        }
    }
}

/// Resolves a `$`-stripped reference: a leading digit names a capture group
/// (`$1`, `$2`, ...); a missing group — or a non-digit reference — falls back
/// to an environment lookup of the full reference text.
fn resolve_reference(
    reference: &str,
    captures: &regex::Captures<'_>,
    event: &BuildCompletionEvent,
) -> Option<String> {
    if let Some(digit) = reference.chars().next().and_then(|c| c.to_digit(10)) {
        if let Some(group) = captures.get(digit as usize) {
            return Some(group.as_str().to_string());
        }
    }
    event.env_var(reference).map(str::to_string)
}

/// Resolves a global-tag value: `$VAR` values are looked up in the event
/// environment (`None` when missing), anything else passes through.
fn resolve_env_reference(value: &str, event: &BuildCompletionEvent) -> Option<String> {
    match value.strip_prefix('$') {
        Some(name) => event.env_var(name).map(str::to_string),
        None => Some(value.to_string()),
    }
}
