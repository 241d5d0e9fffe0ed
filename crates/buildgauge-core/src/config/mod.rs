//! Plugin configuration.
//!
//! [`GlobalConfig`] is the raw, serde-friendly shape the host's
//! configuration lifecycle hands us: newline/comma separated pattern lists
//! and tag strings, all optional. [`GlobalConfig::compile`] turns it into a
//! [`CompiledConfig`] with every operator-supplied regex compiled up front,
//! so a malformed pattern surfaces as [`ConfigError::InvalidPattern`] at
//! configuration time instead of being silently treated as "never matches"
//! (which would quietly disable job exclusion).
//!
//! The host serializes its own configuration writes; readers here take an
//! immutable compiled snapshot, so concurrent reconfiguration swaps whole
//! snapshots and never exposes a partially-updated view.

mod hostname;

pub use hostname::{is_valid_hostname, resolve_hostname};

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tags::{split_csv, split_lines};

/// Errors raised while loading or compiling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration content is not valid TOML.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be serialized back to TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An operator-supplied job pattern failed to compile. Surfaced rather
    /// than masked: a bad pattern must be distinguishable from "no match".
    #[error("invalid job pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as written in the configuration.
        pattern: String,
        /// The underlying regex compilation failure.
        source: regex::Error,
    },
}

/// Global plugin configuration, as saved by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// API key for the monitoring backend. Emission is skipped entirely when
    /// absent.
    pub api_key: Option<String>,
    /// Hostname to report with every emission. Falls back to the build's
    /// `HOSTNAME` environment variable when absent or invalid.
    pub hostname: Option<String>,
    /// Newline/comma separated regexes; jobs matching any are never tracked.
    pub excluded_jobs: Option<String>,
    /// Newline/comma separated regexes; when non-empty, only matching jobs
    /// are tracked. Exclusion wins over inclusion.
    pub included_jobs: Option<String>,
    /// Comma/newline separated `name:value` tags applied to every emission.
    /// Values starting with `$` are resolved against the build environment.
    pub global_tags: Option<String>,
    /// Per-job-pattern tag lines: each line's first comma-separated item is a
    /// regex matched against the full job name, the rest are `name:value`
    /// specs (with `$N` capture-group or `$VAR` environment substitution).
    pub global_job_tags: Option<String>,
    /// Fallback tag file applied to jobs that configure none of their own.
    pub global_tag_file: Option<PathBuf>,
}

impl GlobalConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Compiles every operator-supplied pattern in this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for the first pattern that
    /// fails to compile, in the exclude list, include list, or any
    /// `global_job_tags` line.
    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        let filter = JobFilter::new(
            self.excluded_jobs.as_deref().unwrap_or(""),
            self.included_jobs.as_deref().unwrap_or(""),
        )?;
        let job_tag_rules = JobTagRule::parse_all(self.global_job_tags.as_deref().unwrap_or(""))?;
        Ok(CompiledConfig {
            api_key: self.api_key.clone(),
            hostname: self.hostname.clone(),
            global_tags: self.global_tags.clone(),
            global_tag_file: self.global_tag_file.clone(),
            filter,
            job_tag_rules,
        })
    }
}

/// Immutable compiled configuration snapshot consumed per event.
#[derive(Debug)]
pub struct CompiledConfig {
    /// API key for the monitoring backend.
    pub api_key: Option<String>,
    /// Configured reporting hostname.
    pub hostname: Option<String>,
    /// Raw global tag string, parsed per event against its environment.
    pub global_tags: Option<String>,
    /// Fallback tag file path.
    pub global_tag_file: Option<PathBuf>,
    filter: JobFilter,
    job_tag_rules: Vec<JobTagRule>,
}

impl CompiledConfig {
    /// Whether a job should be tracked at all.
    #[must_use]
    pub fn is_tracked(&self, job_name: &str) -> bool {
        self.filter.is_tracked(job_name)
    }

    /// Compiled per-job-pattern tag rules.
    #[must_use]
    pub fn job_tag_rules(&self) -> &[JobTagRule] {
        &self.job_tag_rules
    }
}

/// Compiled include/exclude job filter.
///
/// A job matching any exclude pattern is never tracked, even when it also
/// matches an include pattern. An empty include list tracks everything not
/// excluded.
#[derive(Debug, Default)]
pub struct JobFilter {
    excluded: Vec<Regex>,
    included: Vec<Regex>,
}

impl JobFilter {
    /// Compiles the exclude and include pattern lists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for the first pattern that
    /// fails to compile.
    pub fn new(excluded: &str, included: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            excluded: compile_pattern_list(excluded)?,
            included: compile_pattern_list(included)?,
        })
    }

    /// Whether `job_name` passes the filter.
    #[must_use]
    pub fn is_tracked(&self, job_name: &str) -> bool {
        !self.is_excluded(job_name) && self.is_included(job_name)
    }

    fn is_excluded(&self, job_name: &str) -> bool {
        self.excluded.iter().any(|p| p.is_match(job_name))
    }

    fn is_included(&self, job_name: &str) -> bool {
        self.included.is_empty() || self.included.iter().any(|p| p.is_match(job_name))
    }
}

/// One compiled `global_job_tags` line: a job-name pattern plus its tag
/// specs.
#[derive(Debug)]
pub struct JobTagRule {
    pattern: Regex,
    specs: Vec<String>,
}

impl JobTagRule {
    /// Parses every line of a `global_job_tags` configuration string.
    ///
    /// Lines with no comma-separated items are skipped; a line whose first
    /// item fails to compile as a regex is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for the first line pattern
    /// that fails to compile.
    pub fn parse_all(global_job_tags: &str) -> Result<Vec<Self>, ConfigError> {
        let mut rules = Vec::new();
        for line in split_lines(global_job_tags) {
            let mut items = split_csv(line).into_iter();
            let Some(pattern) = items.next() else {
                continue;
            };
            rules.push(Self {
                pattern: compile_full_match(pattern)?,
                specs: items.map(str::to_string).collect(),
            });
        }
        Ok(rules)
    }

    /// Matches the full job name against this rule's pattern, returning the
    /// captures on a full match.
    #[must_use]
    pub fn captures<'t>(&self, job_name: &'t str) -> Option<regex::Captures<'t>> {
        self.pattern.captures(job_name)
    }

    /// The raw `name:value` specs of this rule.
    #[must_use]
    pub fn specs(&self) -> &[String] {
        &self.specs
    }
}

fn compile_pattern_list(list: &str) -> Result<Vec<Regex>, ConfigError> {
    let mut patterns = Vec::new();
    for line in split_lines(list) {
        for item in split_csv(line) {
            patterns.push(compile_full_match(item)?);
        }
    }
    Ok(patterns)
}

/// Compiles `pattern` anchored on both ends, so matching is a full match
/// rather than a search. The non-capturing wrapper keeps capture-group
/// indices unchanged.
fn compile_full_match(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Per-job configuration contributed by the job's own properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Tag file path, resolved relative to the build workspace.
    pub tag_file: Option<PathBuf>,
    /// Tag properties string, same grammar as tag file contents.
    pub tag_properties: Option<String>,
}
