//! Flow-node (pipeline step) outcome classification.
//!
//! A flow node can carry several outcome markers at once — a skip marker and
//! a stale warning, say — so classification is an explicit priority-ordered
//! match over [`NodeEvidence`] variants rather than a first-marker-wins
//! probe. The priority order is load-bearing: only the highest-priority
//! piece of evidence decides the result.

/// One piece of outcome evidence attached to a flow node, in descending
/// classification priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvidence {
    /// The stage was explicitly marked skipped.
    SkippedStage,
    /// An error record is attached to the node.
    Error,
    /// A warning record is attached; it embeds the result token the warning
    /// was recorded with (`SUCCESS`, `NOT_BUILT`, `FAILURE`, ...).
    Warning {
        /// The warning's embedded result token, reported verbatim.
        result: String,
    },
    /// The node's queue item was cancelled before execution.
    QueueCancelled,
    /// The owning flow graph has completed execution.
    ExecutionComplete,
    /// The node itself carries an explicit "executed" marker.
    Executed,
}

/// Structural markers describing what kind of node this is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeMarkers {
    /// Legacy stage marker (stage block without a body).
    pub stage: bool,
    /// Thread-name marker; its presence means a parallel branch, not a stage.
    pub thread_name: bool,
    /// Label marker, the modern stage indicator.
    pub label: bool,
    /// The node closes the whole flow graph.
    pub flow_end: bool,
}

/// Snapshot of one flow node's outcome evidence and structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowNodeSnapshot {
    /// Outcome evidence attached to this node, in no particular order.
    pub evidence: Vec<NodeEvidence>,
    /// For block-end nodes, the snapshot of the matching block-start node;
    /// its skip marker also skips this node.
    pub block_start: Option<Box<FlowNodeSnapshot>>,
    /// Structural markers.
    pub markers: NodeMarkers,
}

impl FlowNodeSnapshot {
    fn has(&self, wanted: &NodeEvidence) -> bool {
        self.evidence.contains(wanted)
    }

    fn warning_result(&self) -> Option<&str> {
        self.evidence.iter().find_map(|e| match e {
            NodeEvidence::Warning { result } => Some(result.as_str()),
            _ => None,
        })
    }

    /// Whether this node is a stage node. A thread-name marker always means
    /// a parallel branch and wins over the label marker.
    #[must_use]
    pub fn is_stage_node(&self) -> bool {
        if self.markers.stage {
            return true;
        }
        if self.markers.thread_name {
            return false;
        }
        self.markers.label
    }

    /// Whether this node represents the pipeline itself (the flow-end node).
    #[must_use]
    pub fn is_pipeline_node(&self) -> bool {
        self.markers.flow_end
    }
}

/// Classifies a flow node's result token.
///
/// Priority order, highest first: skipped stage (on the node or its block
/// start), error, warning (verbatim embedded result), queue cancellation,
/// completed execution or explicit executed marker, otherwise `UNKNOWN`.
#[must_use]
pub fn result_tag(node: &FlowNodeSnapshot) -> String {
    let block_start_skipped = node
        .block_start
        .as_deref()
        .is_some_and(|start| start.has(&NodeEvidence::SkippedStage));
    if node.has(&NodeEvidence::SkippedStage) || block_start_skipped {
        return "SKIPPED".to_string();
    }
    if node.has(&NodeEvidence::Error) {
        return "ERROR".to_string();
    }
    if let Some(result) = node.warning_result() {
        return result.to_string();
    }
    if node.has(&NodeEvidence::QueueCancelled) {
        return "CANCELED".to_string();
    }
    if node.has(&NodeEvidence::ExecutionComplete) || node.has(&NodeEvidence::Executed) {
        return "SUCCESS".to_string();
    }
    "UNKNOWN".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(evidence: Vec<NodeEvidence>) -> FlowNodeSnapshot {
        FlowNodeSnapshot {
            evidence,
            ..FlowNodeSnapshot::default()
        }
    }

    #[test]
    fn bare_node_is_unknown() {
        assert_eq!(result_tag(&node(vec![])), "UNKNOWN");
    }

    #[test]
    fn skip_marker_wins_over_everything() {
        let node = node(vec![
            NodeEvidence::Error,
            NodeEvidence::Warning {
                result: "FAILURE".to_string(),
            },
            NodeEvidence::SkippedStage,
        ]);
        assert_eq!(result_tag(&node), "SKIPPED");
    }

    #[test]
    fn block_end_inherits_start_skip() {
        let snapshot = FlowNodeSnapshot {
            evidence: vec![NodeEvidence::ExecutionComplete],
            block_start: Some(Box::new(node(vec![NodeEvidence::SkippedStage]))),
            markers: NodeMarkers::default(),
        };
        assert_eq!(result_tag(&snapshot), "SKIPPED");
    }

    #[test]
    fn error_beats_warning_and_completion() {
        let node = node(vec![
            NodeEvidence::ExecutionComplete,
            NodeEvidence::Warning {
                result: "UNSTABLE".to_string(),
            },
            NodeEvidence::Error,
        ]);
        assert_eq!(result_tag(&node), "ERROR");
    }

    #[test]
    fn warning_result_passes_through_verbatim() {
        let node = node(vec![
            NodeEvidence::QueueCancelled,
            NodeEvidence::Warning {
                result: "NOT_BUILT".to_string(),
            },
        ]);
        assert_eq!(result_tag(&node), "NOT_BUILT");
    }

    #[test]
    fn queue_cancellation_beats_completion() {
        let node = node(vec![
            NodeEvidence::ExecutionComplete,
            NodeEvidence::QueueCancelled,
        ]);
        assert_eq!(result_tag(&node), "CANCELED");
    }

    #[test]
    fn completed_execution_is_success() {
        assert_eq!(result_tag(&node(vec![NodeEvidence::ExecutionComplete])), "SUCCESS");
        assert_eq!(result_tag(&node(vec![NodeEvidence::Executed])), "SUCCESS");
    }

    #[test]
    fn stage_detection_priority() {
        let mut snapshot = FlowNodeSnapshot::default();
        assert!(!snapshot.is_stage_node());

        snapshot.markers.label = true;
        assert!(snapshot.is_stage_node());

        // A parallel branch carries a label too, but is not a stage.
        snapshot.markers.thread_name = true;
        assert!(!snapshot.is_stage_node());

        // The legacy stage marker wins regardless.
        snapshot.markers.stage = true;
        assert!(snapshot.is_stage_node());
    }

    #[test]
    fn flow_end_is_the_pipeline_node() {
        let mut snapshot = FlowNodeSnapshot::default();
        assert!(!snapshot.is_pipeline_node());
        snapshot.markers.flow_end = true;
        assert!(snapshot.is_pipeline_node());
    }
}
