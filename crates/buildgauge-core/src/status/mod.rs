//! Result-token normalization.
//!
//! The host reports raw result tokens (`SUCCESS`, `FAILURE`, `UNSTABLE`,
//! `ABORTED`, `NOT_BUILT`, ...). Downstream reporters consume two distinct
//! normalized vocabularies:
//!
//! - the trace vocabulary, where `unstable` is a valid status;
//! - the webhook vocabulary, which has no `unstable` (it collapses to
//!   `success`) and distinguishes `skipped` from `canceled`.
//!
//! Both functions are pure and case-insensitive over their input; tokens
//! outside the mapping tables pass through lower-cased.

mod flow_node;

pub use flow_node::{result_tag, FlowNodeSnapshot, NodeEvidence, NodeMarkers};

/// Normalizes a raw result token for trace reporters.
#[must_use]
pub fn trace_status(result: &str) -> String {
    let lowered = result.to_lowercase();
    match lowered.as_str() {
        "failure" => "error".to_string(),
        "aborted" | "not_built" => "canceled".to_string(),
        _ => lowered,
    }
}

/// Normalizes a raw result token for webhook reporters.
///
/// Unlike [`trace_status`] this never yields `unstable`, which is not a
/// valid webhook status: unstable builds report as `success`.
#[must_use]
pub fn webhook_status(result: &str) -> String {
    let lowered = result.to_lowercase();
    match lowered.as_str() {
        "failure" => "error".to_string(),
        "aborted" => "canceled".to_string(),
        "not_built" => "skipped".to_string(),
        // Unstable builds completed with non-fatal errors.
        "unstable" => "success".to_string(),
        _ => lowered,
    }
}
