use crate::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RunId = Uuid;

/// Events surfaced on a run's stream.
///
/// A stream yields `RunStarted` once, any number of `NodeUpdate`s, and ends
/// after `Output` or `RunFailed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        timestamp: DateTime<Utc>,
    },
    /// Intermediate text chunk attributable to a node.
    NodeUpdate {
        run_id: RunId,
        node: NodeId,
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// Terminal output marker carrying the aggregated result.
    Output {
        run_id: RunId,
        text: String,
        timestamp: DateTime<Utc>,
    },
    RunFailed {
        run_id: RunId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::NodeUpdate { run_id, .. }
            | RunEvent::Output { run_id, .. }
            | RunEvent::RunFailed { run_id, .. } => *run_id,
        }
    }
}
