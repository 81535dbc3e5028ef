use crate::NodeId;
use thiserror::Error;

/// Graph construction failures.
///
/// Raised by `WorkflowBuilder::build`, never during a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("edge references unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("fan-in edge into '{consumer}' has no producers")]
    EmptyFanIn { consumer: NodeId },

    #[error("fan-out edge from '{producer}' has no targets")]
    EmptyFanOut { producer: NodeId },

    #[error("no start node declared")]
    MissingStart,

    #[error("workflow graph contains a cycle")]
    CyclicGraph,
}

/// Failures produced by a node handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("expected {expected} payload, got {actual}")]
    UnexpectedPayload {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("unrecoverable failure: {0}")]
    Unrecoverable(String),

    #[error("cancelled")]
    Cancelled,
}

/// Terminal failure of a single run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("node '{node}' failed: {source}")]
    Node {
        node: NodeId,
        #[source]
        source: NodeError,
    },

    #[error("duplicate completion from '{producer}' for fan-in consumer '{consumer}'")]
    DuplicateCompletion { producer: NodeId, consumer: NodeId },

    #[error("node '{0}' is not part of this workflow")]
    UnknownNode(NodeId),

    #[error("run cancelled")]
    Cancelled,

    #[error("run completed without yielding a terminal output")]
    NoOutput,

    #[error("internal run failure: {0}")]
    Internal(String),
}
